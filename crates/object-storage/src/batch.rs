use crate::error::NonUtf8PathError;

use std::path::{Path, PathBuf};

use tracing::error;

/// Object key a deleted path maps to: the path text with leading `/` stripped.
pub fn delete_key(path: &Path) -> Result<String, NonUtf8PathError> {
	path.to_str()
		.map(|text| text.trim_start_matches('/').to_string())
		.ok_or_else(|| NonUtf8PathError(path.into()))
}

/// Object key an uploaded path maps to: the path text as is.
///
/// Unlike [`delete_key`] nothing is stripped, so an absolute path uploads under a key with a
/// leading `/`. Backends that normalize keys will make both land on the same object.
pub fn upload_key(path: &Path) -> Result<&str, NonUtf8PathError> {
	path.to_str().ok_or_else(|| NonUtf8PathError(path.into()))
}

/// Paths accumulated by one delete worker between flushes.
#[derive(Debug)]
pub struct DeleteBatch {
	paths: Vec<PathBuf>,
	max_size: usize,
}

impl DeleteBatch {
	#[must_use]
	pub fn new(max_size: usize) -> Self {
		let max_size = max_size.max(1);
		Self {
			paths: Vec::with_capacity(max_size),
			max_size,
		}
	}

	pub fn push(&mut self, path: PathBuf) {
		self.paths.push(path);
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.paths.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.paths.is_empty()
	}

	#[must_use]
	pub fn is_full(&self) -> bool {
		self.paths.len() >= self.max_size
	}

	/// Empties the batch, returning the object keys to delete.
	///
	/// The batch is left empty whatever happens to the keys afterwards, a failed delete call
	/// never carries paths over into the next flush. Non UTF-8 paths are logged and dropped.
	pub fn take_keys(&mut self) -> Vec<String> {
		self.paths
			.drain(..)
			.filter_map(|path| match delete_key(&path) {
				Ok(key) => Some(key),
				Err(e) => {
					error!(?e, "Dropping path that can't be turned into an object key;");
					None
				}
			})
			.collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	use pretty_assertions::assert_eq;

	#[test]
	fn delete_keys_lose_leading_slashes_upload_keys_do_not() {
		let path = Path::new("/data/a.txt");

		assert_eq!(delete_key(path).unwrap(), "data/a.txt");
		assert_eq!(upload_key(path).unwrap(), "/data/a.txt");

		assert_eq!(delete_key(Path::new("//data/b")).unwrap(), "data/b");
		assert_eq!(delete_key(Path::new("rel/c")).unwrap(), "rel/c");
	}

	#[test]
	fn fills_up_to_the_limit() {
		let mut batch = DeleteBatch::new(3);
		assert!(batch.is_empty());

		for i in 0..3 {
			assert!(!batch.is_full());
			batch.push(PathBuf::from(format!("/f{i}")));
		}

		assert!(batch.is_full());
		assert_eq!(batch.len(), 3);
	}

	#[test]
	fn zero_limit_still_holds_one_path() {
		let mut batch = DeleteBatch::new(0);
		assert!(!batch.is_full());

		batch.push(PathBuf::from("/a"));
		assert!(batch.is_full());
	}

	#[test]
	fn take_keys_always_empties() {
		let mut batch = DeleteBatch::new(10);
		batch.push(PathBuf::from("/a"));
		batch.push(PathBuf::from("/b/c"));

		assert_eq!(batch.take_keys(), vec!["a".to_string(), "b/c".to_string()]);
		assert!(batch.is_empty());
		assert!(batch.take_keys().is_empty());
	}

	#[cfg(unix)]
	#[test]
	#[tracing_test::traced_test]
	fn non_utf8_paths_are_dropped() {
		use std::{ffi::OsStr, os::unix::ffi::OsStrExt};

		let mut batch = DeleteBatch::new(10);
		batch.push(PathBuf::from(OsStr::from_bytes(b"/bad\xff")));
		batch.push(PathBuf::from("/good"));

		assert_eq!(batch.take_keys(), vec!["good".to_string()]);
		assert!(batch.is_empty());
		assert!(logs_contain("Dropping path"));
	}
}
