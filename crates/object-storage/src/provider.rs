use crate::{
	backend::ObjectBackend,
	retry::RetryPolicy,
	worker::{DeleteWorker, UploadWorker},
};

use synca_cloud::{Handshake, Provider};
use synca_fs_watcher::FsEvent;

use std::{
	fmt,
	path::PathBuf,
	sync::Arc,
};

use async_channel as chan;
use async_trait::async_trait;
use futures_concurrency::future::Join;
use tokio::{spawn, sync::oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn, Instrument};

/// Default number of concurrent delete workers.
pub const DELETE_WORKERS: usize = 4;

/// Default maximum number of paths sent in a single delete call.
pub const DELETE_MAX_BATCH_SIZE: usize = 10;

/// Default capacity of the delete and upload sub-queues.
pub const WORK_QUEUE_CAPACITY: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
	pub delete_workers: usize,
	pub max_batch_size: usize,
	pub queue_capacity: usize,
	pub retry: RetryPolicy,
}

impl Default for ProviderConfig {
	fn default() -> Self {
		Self {
			delete_workers: DELETE_WORKERS,
			max_batch_size: DELETE_MAX_BATCH_SIZE,
			queue_capacity: WORK_QUEUE_CAPACITY,
			retry: RetryPolicy::default(),
		}
	}
}

/// Provider syncing into an object store bucket.
///
/// Events are split into two sub-queues: deletions go to a pool of batching delete workers,
/// everything else to a single upload worker. Both sub-queues live as long as the provider,
/// so events routed before the workers start simply wait there.
pub struct ObjectStorageProvider {
	name: String,
	backend: Arc<dyn ObjectBackend>,
	config: ProviderConfig,

	deletes_tx: chan::Sender<PathBuf>,
	deletes_rx: chan::Receiver<PathBuf>,
	uploads_tx: chan::Sender<PathBuf>,
	uploads_rx: chan::Receiver<PathBuf>,

	handshake: Handshake,
}

impl ObjectStorageProvider {
	/// Builds the provider, clamping worker count and queue capacity to at least one.
	pub fn new(
		name: impl Into<String>,
		backend: Arc<dyn ObjectBackend>,
		mut config: ProviderConfig,
	) -> Self {
		config.delete_workers = config.delete_workers.max(1);
		config.queue_capacity = config.queue_capacity.max(1);

		let (deletes_tx, deletes_rx) = chan::bounded(config.queue_capacity);
		let (uploads_tx, uploads_rx) = chan::bounded(config.queue_capacity);

		Self {
			name: name.into(),
			backend,
			config,
			deletes_tx,
			deletes_rx,
			uploads_tx,
			uploads_rx,
			handshake: Handshake::new(),
		}
	}

	#[must_use]
	pub const fn config(&self) -> &ProviderConfig {
		&self.config
	}
}

impl fmt::Debug for ObjectStorageProvider {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ObjectStorageProvider")
			.field("name", &self.name)
			.field("config", &self.config)
			.field("pending_deletes", &self.deletes_rx.len())
			.field("pending_uploads", &self.uploads_rx.len())
			.finish_non_exhaustive()
	}
}

#[async_trait]
impl Provider for ObjectStorageProvider {
	fn name(&self) -> &str {
		&self.name
	}

	#[instrument(skip_all, fields(provider = %self.name))]
	async fn queue_receive(&self, events: chan::Receiver<FsEvent>) {
		while let Ok(FsEvent { path, operation }) = events.recv().await {
			debug!(path = %path.display(), %operation, "Event received;");

			let sub_queue = if operation.is_delete() {
				&self.deletes_tx
			} else {
				&self.uploads_tx
			};

			if let Err(chan::SendError(path)) = sub_queue.send(path).await {
				error!(path = %path.display(), %operation, "Sub-queue closed, dropping event;");
			}
		}

		debug!("Outbound queue closed;");
	}

	#[instrument(skip_all, fields(provider = %self.name))]
	async fn start_workers(&self) {
		if !self.handshake.start() {
			warn!("Workers were already started;");
			return;
		}

		let ProviderConfig {
			delete_workers,
			max_batch_size,
			retry,
			..
		} = self.config.clone();

		let mut handles = (0..delete_workers)
			.map(|id| {
				spawn(
					DeleteWorker {
						id,
						deletes_rx: self.deletes_rx.clone(),
						backend: Arc::clone(&self.backend),
						retry,
						max_batch_size,
						stop: self.handshake.worker_token(),
					}
					.run()
					.in_current_span(),
				)
			})
			.collect::<Vec<_>>();

		handles.push(spawn(
			UploadWorker {
				uploads_rx: self.uploads_rx.clone(),
				backend: Arc::clone(&self.backend),
				retry,
				stop: self.handshake.worker_token(),
			}
			.run()
			.in_current_span(),
		));

		info!(delete_workers, max_batch_size, "Workers started;");

		self.handshake.cancelled().await;

		info!("Cancellation requested, waiting for workers to finish...");

		for res in handles.join().await {
			if let Err(e) = res {
				error!(?e, "Worker task failed;");
			}
		}

		info!("All workers finished");

		self.handshake.complete();
	}

	fn cancel(&self, done_tx: oneshot::Sender<()>) -> CancellationToken {
		self.handshake.register(done_tx)
	}
}
