//! Remote side of the provider: the two calls workers make, and their opendal implementation.

use crate::error::BackendError;

use std::path::PathBuf;

use async_trait::async_trait;
use bytes::BytesMut;
use opendal::{services, Operator};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{instrument, trace, warn};

/// opendal buffers writes up to this size before sending a part.
const UPLOAD_CHUNK_SIZE: usize = 8 * 1024 * 1024;

/// How much is pulled from the local file per read.
const READ_BUFFER_SIZE: usize = 64 * 1024;

/// The calls a worker makes against the remote store. Failures are reported, never retried
/// here; the bucket is fixed when the backend is built.
#[async_trait]
pub trait ObjectBackend: Send + Sync + 'static {
	/// Streams `body` to the object named `key`, replacing it if present.
	async fn put_object(
		&self,
		key: &str,
		body: &mut (dyn AsyncRead + Send + Unpin),
	) -> Result<(), BackendError>;

	/// Deletes every object in `keys` in as few requests as the service allows.
	async fn batch_delete_objects(&self, keys: &[String]) -> Result<(), BackendError>;
}

/// Target S3 bucket, consumed once when the backend is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketConfig {
	pub name: String,
	pub region: String,
	/// Custom endpoint for S3 compatible services, AWS is used when unset.
	pub endpoint: Option<String>,
}

/// Target GCS bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GcsConfig {
	pub bucket: String,
	/// Service account key file, ambient credentials are used when unset.
	pub credential_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct OpendalBackend {
	operator: Operator,
}

impl OpendalBackend {
	pub fn s3(config: &BucketConfig) -> Result<Self, BackendError> {
		let mut builder = services::S3::default()
			.bucket(&config.name)
			.region(&config.region);

		if let Some(endpoint) = &config.endpoint {
			builder = builder.endpoint(endpoint);
		}

		Ok(Self::from_operator(Operator::new(builder)?.finish()))
	}

	pub fn gcs(config: &GcsConfig) -> Result<Self, BackendError> {
		let mut builder = services::Gcs::default().bucket(&config.bucket);

		if let Some(credential_path) = &config.credential_path {
			builder = builder.credential_path(&credential_path.to_string_lossy());
		}

		Ok(Self::from_operator(Operator::new(builder)?.finish()))
	}

	#[must_use]
	pub const fn from_operator(operator: Operator) -> Self {
		Self { operator }
	}
}

#[async_trait]
impl ObjectBackend for OpendalBackend {
	#[instrument(skip(self, body), err)]
	async fn put_object(
		&self,
		key: &str,
		body: &mut (dyn AsyncRead + Send + Unpin),
	) -> Result<(), BackendError> {
		let mut writer = self
			.operator
			.writer_with(key)
			.chunk(UPLOAD_CHUNK_SIZE)
			.await?;

		let res: Result<usize, BackendError> = async {
			let mut buf = BytesMut::with_capacity(READ_BUFFER_SIZE);
			let mut total = 0;

			loop {
				buf.reserve(READ_BUFFER_SIZE);
				let read = body.read_buf(&mut buf).await?;
				if read == 0 {
					break;
				}

				total += read;
				writer.write(buf.split().freeze()).await?;
			}

			writer.close().await?;

			Ok(total)
		}
		.await;

		match res {
			Ok(total) => {
				trace!(total, "Object written;");
				Ok(())
			}
			Err(e) => {
				if let Err(abort_err) = writer.abort().await {
					warn!(?abort_err, "Failed to abort partial upload;");
				}
				Err(e)
			}
		}
	}

	#[instrument(skip(self), fields(count = keys.len()), err)]
	async fn batch_delete_objects(&self, keys: &[String]) -> Result<(), BackendError> {
		self.operator.delete_iter(keys.iter().cloned()).await?;

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	use pretty_assertions::assert_eq;

	fn memory_backend() -> (OpendalBackend, Operator) {
		let operator = Operator::new(services::Memory::default())
			.unwrap()
			.finish();

		(OpendalBackend::from_operator(operator.clone()), operator)
	}

	#[tokio::test]
	async fn put_streams_the_whole_body() {
		let (backend, operator) = memory_backend();
		let content = (0..200_000_u32)
			.map(|i| u8::try_from(i % 251).unwrap())
			.collect::<Vec<_>>();

		backend
			.put_object("data/a.bin", &mut content.as_slice())
			.await
			.unwrap();

		assert_eq!(operator.read("data/a.bin").await.unwrap().to_vec(), content);
	}

	#[tokio::test]
	async fn empty_body_creates_an_empty_object() {
		let (backend, operator) = memory_backend();

		backend
			.put_object("empty", &mut &b""[..])
			.await
			.unwrap();

		assert!(operator.read("empty").await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn batch_delete_removes_every_key() {
		let (backend, operator) = memory_backend();
		for key in ["a", "b", "c"] {
			operator.write(key, key.as_bytes().to_vec()).await.unwrap();
		}

		backend
			.batch_delete_objects(&["a".to_string(), "c".to_string()])
			.await
			.unwrap();

		assert!(!operator.exists("a").await.unwrap());
		assert!(operator.exists("b").await.unwrap());
		assert!(!operator.exists("c").await.unwrap());
	}
}
