use std::{io, path::Path};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
	#[error("object storage request failed: {0}")]
	Opendal(#[from] opendal::Error),
	#[error("failed to read object body: {0}")]
	Io(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum UploadError {
	#[error("failed to open file for upload <path='{}'>: {source}", .path.display())]
	FileIO {
		path: Box<Path>,
		#[source]
		source: io::Error,
	},
	#[error(transparent)]
	NonUtf8Path(#[from] NonUtf8PathError),
	#[error("failed to upload object <key='{key}'>: {source}")]
	Backend {
		key: String,
		#[source]
		source: BackendError,
	},
}

/// Object keys are UTF-8, paths that are not can't be synced.
#[derive(Debug, Error)]
#[error("received a non UTF-8 path: <path='{}'>", .0.display())]
pub struct NonUtf8PathError(pub Box<Path>);
