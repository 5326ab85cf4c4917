use synca_cloud::{Provider, Registry};
use synca_fanout::{FanOut, INBOUND_CAPACITY};
use synca_fs_watcher::FsEvent;

use std::{
	sync::{Arc, Mutex},
	time::Duration,
};

use async_channel as chan;
use async_trait::async_trait;
use pretty_assertions::assert_eq;
use tokio::{
	spawn,
	sync::{oneshot, Notify},
	time::timeout,
};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use tracing_test::traced_test;

const FIVE_SECONDS: Duration = Duration::from_secs(5);

/// Records everything it receives, optionally refusing to read until released.
struct RecordingProvider {
	name: String,
	received: Mutex<Vec<FsEvent>>,
	gate: Option<Arc<Notify>>,
}

impl RecordingProvider {
	fn new(name: &str) -> Arc<Self> {
		Arc::new(Self {
			name: name.to_string(),
			received: Mutex::new(Vec::new()),
			gate: None,
		})
	}

	fn gated(name: &str, gate: Arc<Notify>) -> Arc<Self> {
		Arc::new(Self {
			name: name.to_string(),
			received: Mutex::new(Vec::new()),
			gate: Some(gate),
		})
	}

	fn received(&self) -> Vec<FsEvent> {
		self.received.lock().unwrap().clone()
	}
}

#[async_trait]
impl Provider for RecordingProvider {
	fn name(&self) -> &str {
		&self.name
	}

	async fn queue_receive(&self, events: chan::Receiver<FsEvent>) {
		if let Some(gate) = &self.gate {
			gate.notified().await;
		}

		while let Ok(event) = events.recv().await {
			self.received.lock().unwrap().push(event);
		}
	}

	async fn start_workers(&self) {}

	fn cancel(&self, _done_tx: oneshot::Sender<()>) -> CancellationToken {
		CancellationToken::new()
	}
}

fn events(count: usize) -> Vec<FsEvent> {
	(0..count)
		.map(|i| {
			if i % 3 == 0 {
				FsEvent::deleted(format!("/tmp/x/f{i}"))
			} else {
				FsEvent::closed_after_write(format!("/tmp/x/f{i}"))
			}
		})
		.collect()
}

#[tokio::test]
#[traced_test]
async fn every_provider_gets_every_event_in_order() {
	let providers = [
		RecordingProvider::new("aws"),
		RecordingProvider::new("gcp"),
		RecordingProvider::new("local"),
	];

	let mut registry = Registry::new();
	for provider in &providers {
		registry
			.register(Arc::clone(provider) as Arc<dyn Provider>)
			.unwrap();
	}

	let (inbound_tx, inbound_rx) = chan::bounded(INBOUND_CAPACITY);
	let fan_out = spawn(FanOut::new(inbound_rx, Arc::new(registry)).run());

	let sent = events(25);
	for event in &sent {
		inbound_tx.send(event.clone()).await.unwrap();
	}
	drop(inbound_tx);

	timeout(FIVE_SECONDS, fan_out)
		.await
		.expect("fan-out did not stop after the inbound queue closed")
		.unwrap();

	for provider in &providers {
		assert_eq!(provider.received(), sent, "provider {}", provider.name());
	}
}

#[tokio::test]
#[traced_test]
async fn slow_provider_pushes_back_on_the_producer() {
	let gate = Arc::new(Notify::new());
	let fast = RecordingProvider::new("fast");
	let slow = RecordingProvider::gated("slow", Arc::clone(&gate));

	let mut registry = Registry::new();
	registry
		.register(Arc::clone(&fast) as Arc<dyn Provider>)
		.unwrap();
	registry
		.register(Arc::clone(&slow) as Arc<dyn Provider>)
		.unwrap();

	let (inbound_tx, inbound_rx) = chan::bounded(1);
	let fan_out = spawn(
		FanOut::new(inbound_rx, Arc::new(registry))
			.with_capacity(1)
			.run(),
	);

	let sent = events(10);
	let mut pushed = 0;
	for event in &sent {
		if timeout(Duration::from_millis(200), inbound_tx.send(event.clone()))
			.await
			.is_err()
		{
			break;
		}
		pushed += 1;
	}

	// One event parked in the slow provider's queue, one held by the fan-out while it waits
	// for room, one sitting in the inbound queue.
	assert!(pushed < sent.len(), "producer was never blocked");
	assert!(fast.received().len() < sent.len());

	gate.notify_one();

	for event in &sent[pushed..] {
		timeout(FIVE_SECONDS, inbound_tx.send(event.clone()))
			.await
			.expect("producer still blocked after the slow provider resumed")
			.unwrap();
	}
	drop(inbound_tx);

	timeout(FIVE_SECONDS, fan_out).await.unwrap().unwrap();

	assert_eq!(fast.received(), sent);
	assert_eq!(slow.received(), sent);
}

#[tokio::test]
#[traced_test]
async fn no_providers_still_drains_the_inbound_queue() {
	let (inbound_tx, inbound_rx) = chan::bounded(INBOUND_CAPACITY);
	let fan_out = spawn(FanOut::new(inbound_rx, Arc::new(Registry::new())).run());

	for event in events(5) {
		timeout(FIVE_SECONDS, inbound_tx.send(event))
			.await
			.unwrap()
			.unwrap();
	}
	drop(inbound_tx);

	timeout(FIVE_SECONDS, fan_out).await.unwrap().unwrap();
}

/// Returns from its receive loop right away, closing its outbound queue.
struct ClosedProvider;

#[async_trait]
impl Provider for ClosedProvider {
	fn name(&self) -> &str {
		"closed"
	}

	async fn queue_receive(&self, _events: chan::Receiver<FsEvent>) {}

	async fn start_workers(&self) {}

	fn cancel(&self, _done_tx: oneshot::Sender<()>) -> CancellationToken {
		CancellationToken::new()
	}
}

#[tokio::test]
#[traced_test]
async fn closed_provider_does_not_starve_the_others() {
	let healthy = RecordingProvider::new("healthy");

	let mut registry = Registry::new();
	registry.register(Arc::new(ClosedProvider)).unwrap();
	registry
		.register(Arc::clone(&healthy) as Arc<dyn Provider>)
		.unwrap();

	let (inbound_tx, inbound_rx) = chan::bounded(INBOUND_CAPACITY);
	let fan_out = spawn(
		FanOut::new(inbound_rx, Arc::new(registry))
			.run()
			.in_current_span(),
	);

	let sent = events(12);
	for event in &sent {
		timeout(FIVE_SECONDS, inbound_tx.send(event.clone()))
			.await
			.expect("fan-out stalled on a closed provider")
			.unwrap();
	}
	drop(inbound_tx);

	timeout(FIVE_SECONDS, fan_out).await.unwrap().unwrap();

	assert_eq!(healthy.received(), sent);
	assert!(logs_contain("Provider receive loop is gone"));
}
