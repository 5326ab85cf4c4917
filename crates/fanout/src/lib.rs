//!
//! # Fan-out
//!
//! One inbound queue, one outbound queue per registered provider. Every event popped from
//! the inbound queue is pushed onto every outbound queue before the next one is popped, so
//! each provider sees events in decode order and a slow provider throttles everyone
//! upstream, the watcher included.

#![warn(
	clippy::all,
	clippy::pedantic,
	clippy::correctness,
	clippy::perf,
	clippy::style,
	clippy::suspicious,
	clippy::complexity,
	clippy::nursery,
	clippy::unwrap_used,
	unused_qualifications,
	rust_2018_idioms,
	trivial_casts,
	trivial_numeric_casts,
	unused_allocation,
	clippy::unnecessary_cast,
	clippy::cast_lossless,
	clippy::cast_possible_truncation,
	clippy::cast_possible_wrap,
	clippy::cast_precision_loss,
	clippy::cast_sign_loss,
	clippy::dbg_macro,
	clippy::deprecated_cfg_attr,
	clippy::separated_literal_suffix,
	deprecated
)]
#![forbid(deprecated_in_future)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

use synca_cloud::Registry;
use synca_fs_watcher::FsEvent;

use std::sync::Arc;

use async_channel as chan;
use tokio::{spawn, task::JoinHandle};
use tracing::{debug, error, info, instrument, trace, warn, Instrument};

/// Capacity of the queue between the watcher and the fan-out.
pub const INBOUND_CAPACITY: usize = 3;

/// Capacity of each provider's outbound queue.
pub const OUTBOUND_CAPACITY: usize = 3;

#[derive(Debug)]
struct Outbound {
	provider: String,
	events_tx: chan::Sender<FsEvent>,
}

#[derive(Debug)]
pub struct FanOut {
	inbound: chan::Receiver<FsEvent>,
	providers: Arc<Registry>,
	capacity: usize,
}

impl FanOut {
	#[must_use]
	pub fn new(inbound: chan::Receiver<FsEvent>, providers: Arc<Registry>) -> Self {
		Self {
			inbound,
			providers,
			capacity: OUTBOUND_CAPACITY,
		}
	}

	/// Overrides the outbound queue capacity, clamped to at least one slot.
	#[must_use]
	pub fn with_capacity(mut self, capacity: usize) -> Self {
		self.capacity = capacity.max(1);
		self
	}

	/// Starts every provider's receive loop and duplicates events until the inbound queue
	/// closes.
	///
	/// In the daemon the watcher never closes the inbound queue, so this runs for the whole
	/// process. Once it does close, outbound queues are closed too and this waits for the
	/// receive loops to drain them.
	#[instrument(name = "fan_out", skip(self), fields(providers = self.providers.len()))]
	pub async fn run(self) {
		let Self {
			inbound,
			providers,
			capacity,
		} = self;

		let (outbound, receive_loops): (Vec<_>, Vec<_>) = providers
			.iter()
			.map(|provider| {
				let (events_tx, events_rx) = chan::bounded(capacity);

				info!(provider = provider.name(), "Starting provider receive loop;");

				let handle: JoinHandle<()> = spawn({
					let provider = Arc::clone(provider);
					async move { provider.queue_receive(events_rx).await }.in_current_span()
				});

				(
					Outbound {
						provider: provider.name().to_string(),
						events_tx,
					},
					handle,
				)
			})
			.unzip();

		while let Ok(event) = inbound.recv().await {
			trace!(path = %event.path.display(), operation = %event.operation, "Fanning out event;");

			for Outbound {
				provider,
				events_tx,
			} in &outbound
			{
				if events_tx.send(event.clone()).await.is_err() {
					warn!(
						%provider,
						path = %event.path.display(),
						"Provider receive loop is gone, event was not delivered;"
					);
				}
			}
		}

		debug!("Inbound queue closed, closing outbound queues;");
		drop(outbound);

		for handle in receive_loops {
			if let Err(e) = handle.await {
				error!(?e, "Provider receive loop failed;");
			}
		}

		info!("Fan-out stopped");
	}
}
