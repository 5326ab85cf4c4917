use crate::{
	backend::ObjectBackend,
	batch::{upload_key, DeleteBatch},
	error::UploadError,
	retry::RetryPolicy,
};

use std::{
	path::{Path, PathBuf},
	sync::Arc,
};

use async_channel as chan;
use tokio::fs::File;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, instrument, trace};

/// Drains the delete sub-queue in batches.
///
/// Paths keep accumulating while more are already waiting and the batch has room; an empty
/// sub-queue or a full batch triggers a flush, so a lone delete is never held back waiting
/// for company.
pub(crate) struct DeleteWorker {
	pub(crate) id: usize,
	pub(crate) deletes_rx: chan::Receiver<PathBuf>,
	pub(crate) backend: Arc<dyn ObjectBackend>,
	pub(crate) retry: RetryPolicy,
	pub(crate) max_batch_size: usize,
	pub(crate) stop: CancellationToken,
}

impl DeleteWorker {
	#[instrument(name = "delete_worker", skip(self), fields(worker_id = self.id))]
	pub(crate) async fn run(self) {
		let mut batch = DeleteBatch::new(self.max_batch_size);

		loop {
			tokio::select! {
				biased;

				() = self.stop.cancelled() => {
					if !batch.is_empty() {
						debug!(abandoned = batch.len(), "Stopping with unflushed deletes;");
					}
					break;
				}

				maybe_path = self.deletes_rx.recv() => {
					let Ok(path) = maybe_path else {
						debug!("Delete sub-queue closed;");
						break;
					};

					batch.push(path);

					if !self.deletes_rx.is_empty() && !batch.is_full() {
						continue;
					}

					self.flush(&mut batch).await;
				}
			}
		}

		trace!("Delete worker exiting;");
	}

	async fn flush(&self, batch: &mut DeleteBatch) {
		let keys = batch.take_keys();
		if keys.is_empty() {
			return;
		}

		let backend = self.backend.as_ref();
		let keys_ref = keys.as_slice();

		match self
			.retry
			.run("batch_delete_objects", move || async move {
				backend
					.batch_delete_objects(keys_ref)
					.await
					.map_err(backoff::Error::transient)
			})
			.await
		{
			Ok(()) => debug!(count = keys.len(), "Deleted objects;"),
			Err(e) => error!(?e, ?keys, "Failed to delete objects;"),
		}
	}
}

/// Uploads files named on the upload sub-queue, one at a time.
pub(crate) struct UploadWorker {
	pub(crate) uploads_rx: chan::Receiver<PathBuf>,
	pub(crate) backend: Arc<dyn ObjectBackend>,
	pub(crate) retry: RetryPolicy,
	pub(crate) stop: CancellationToken,
}

impl UploadWorker {
	#[instrument(name = "upload_worker", skip(self))]
	pub(crate) async fn run(self) {
		loop {
			tokio::select! {
				biased;

				() = self.stop.cancelled() => break,

				maybe_path = self.uploads_rx.recv() => {
					let Ok(path) = maybe_path else {
						debug!("Upload sub-queue closed;");
						break;
					};

					match upload(self.backend.as_ref(), self.retry, &path).await {
						Ok(()) => debug!(path = %path.display(), "Uploaded file;"),
						Err(e) => error!(?e, "Failed to upload file;"),
					}
				}
			}
		}

		trace!("Upload worker exiting;");
	}
}

async fn upload(
	backend: &dyn ObjectBackend,
	retry: RetryPolicy,
	path: &Path,
) -> Result<(), UploadError> {
	let key = upload_key(path)?;

	retry
		.run("put_object", move || async move {
			// Reopened on every attempt, a failed one may have consumed part of the file.
			let mut file = File::open(path).await.map_err(|e| {
				backoff::Error::permanent(UploadError::FileIO {
					path: path.into(),
					source: e,
				})
			})?;

			backend.put_object(key, &mut file).await.map_err(|e| {
				backoff::Error::transient(UploadError::Backend {
					key: key.to_string(),
					source: e,
				})
			})
		})
		.await
}
