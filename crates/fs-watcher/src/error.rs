use std::{io, path::Path};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WatcherError {
	#[error("failed to create inotify instance: {0}")]
	Init(#[source] io::Error),
	#[error("failed to add watch <path='{}'>: {source}", .path.display())]
	AddWatch {
		path: Box<Path>,
		#[source]
		source: io::Error,
	},
	#[error("watched path contains an interior NUL byte: <path='{}'>", .0.display())]
	InvalidPath(Box<Path>),
	#[error("failed to register inotify descriptor with the runtime: {0}")]
	Reactor(#[source] io::Error),
}

/// Framing violation found while decoding a read buffer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
	#[error(
		"truncated inotify record at offset {offset}: needed {needed} bytes, {available} available"
	)]
	Truncated {
		offset: usize,
		needed: usize,
		available: usize,
	},
}
