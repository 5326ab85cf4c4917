use crate::{error::RegistryError, provider::shutdown, Provider};

use std::{collections::BTreeMap, fmt, sync::Arc};

use tokio::{spawn, task::JoinHandle};
use tracing::{info, instrument};

/// Name to provider map built once by the entry point.
///
/// Append only: there is no way to remove a provider, and once the registry is shared behind
/// an [`Arc`] it can no longer grow either.
#[derive(Default)]
pub struct Registry {
	providers: BTreeMap<String, Arc<dyn Provider>>,
}

impl Registry {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	pub fn register(&mut self, provider: Arc<dyn Provider>) -> Result<(), RegistryError> {
		let name = provider.name().to_string();
		if self.providers.contains_key(&name) {
			return Err(RegistryError::Duplicate(name));
		}

		info!(%name, "Registered provider;");
		self.providers.insert(name, provider);

		Ok(())
	}

	#[must_use]
	pub fn get(&self, name: &str) -> Option<&Arc<dyn Provider>> {
		self.providers.get(name)
	}

	/// Providers in name order.
	pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Provider>> {
		self.providers.values()
	}

	pub fn names(&self) -> impl Iterator<Item = &str> {
		self.providers.keys().map(String::as_str)
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.providers.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.providers.is_empty()
	}

	/// Spawns [`Provider::start_workers`] for every provider.
	pub fn start_all(&self) -> Vec<JoinHandle<()>> {
		self.iter()
			.map(|provider| {
				let provider = Arc::clone(provider);
				spawn(async move { provider.start_workers().await })
			})
			.collect()
	}

	/// Cancels every provider in turn, waiting for each one's completion before moving on.
	#[instrument(skip(self), fields(providers = self.len()))]
	pub async fn shutdown_all(&self) {
		for provider in self.iter() {
			info!(provider = provider.name(), "Shutting down provider...");
			shutdown(provider.as_ref()).await;
			info!(provider = provider.name(), "Provider shut down");
		}
	}
}

impl fmt::Debug for Registry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_list().entries(self.names()).finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	use crate::Handshake;

	use synca_fs_watcher::FsEvent;

	use std::{
		sync::atomic::{AtomicBool, Ordering},
		time::Duration,
	};

	use async_channel as chan;
	use async_trait::async_trait;
	use pretty_assertions::assert_eq;
	use tokio::{sync::oneshot, time::timeout};
	use tokio_util::sync::CancellationToken;
	use tracing_test::traced_test;

	struct IdleProvider {
		name: &'static str,
		handshake: Handshake,
		stopped: AtomicBool,
	}

	impl IdleProvider {
		fn new(name: &'static str) -> Arc<Self> {
			Arc::new(Self {
				name,
				handshake: Handshake::new(),
				stopped: AtomicBool::new(false),
			})
		}
	}

	#[async_trait]
	impl Provider for IdleProvider {
		fn name(&self) -> &str {
			self.name
		}

		async fn queue_receive(&self, events: chan::Receiver<FsEvent>) {
			while events.recv().await.is_ok() {}
		}

		async fn start_workers(&self) {
			if !self.handshake.start() {
				return;
			}

			self.handshake.cancelled().await;
			self.stopped.store(true, Ordering::Release);
			self.handshake.complete();
		}

		fn cancel(&self, done_tx: oneshot::Sender<()>) -> CancellationToken {
			self.handshake.register(done_tx)
		}
	}

	#[test]
	fn duplicate_names_are_rejected() {
		let mut registry = Registry::new();
		registry.register(IdleProvider::new("aws")).unwrap();

		assert_eq!(
			registry.register(IdleProvider::new("aws")),
			Err(RegistryError::Duplicate("aws".to_string()))
		);
		assert_eq!(registry.len(), 1);
	}

	#[test]
	fn iterates_in_name_order() {
		let mut registry = Registry::new();
		registry.register(IdleProvider::new("gcp")).unwrap();
		registry.register(IdleProvider::new("aws")).unwrap();

		assert_eq!(registry.names().collect::<Vec<_>>(), vec!["aws", "gcp"]);
		assert!(registry.get("gcp").is_some());
		assert!(registry.get("azure").is_none());
	}

	#[tokio::test]
	#[traced_test]
	async fn shutdown_all_waits_for_every_provider() {
		let aws = IdleProvider::new("aws");
		let gcp = IdleProvider::new("gcp");

		let mut registry = Registry::new();
		registry.register(Arc::clone(&aws) as Arc<dyn Provider>).unwrap();
		registry.register(Arc::clone(&gcp) as Arc<dyn Provider>).unwrap();

		let handles = registry.start_all();

		timeout(Duration::from_secs(5), async {
			while !(aws.handshake.is_started() && gcp.handshake.is_started()) {
				tokio::time::sleep(Duration::from_millis(5)).await;
			}
		})
		.await
		.expect("workers never started");

		timeout(Duration::from_secs(5), registry.shutdown_all())
			.await
			.expect("shutdown hung");

		assert!(aws.stopped.load(Ordering::Acquire));
		assert!(gcp.stopped.load(Ordering::Acquire));

		for handle in handles {
			handle.await.unwrap();
		}
	}

	#[tokio::test]
	#[traced_test]
	async fn shutdown_of_never_started_providers_completes() {
		let aws = IdleProvider::new("aws");

		let mut registry = Registry::new();
		registry.register(Arc::clone(&aws) as Arc<dyn Provider>).unwrap();

		timeout(Duration::from_secs(5), registry.shutdown_all())
			.await
			.expect("shutdown waited on workers that never ran");

		assert!(!aws.stopped.load(Ordering::Acquire));
		assert!(logs_contain("dropped its completion channel"));
	}
}
