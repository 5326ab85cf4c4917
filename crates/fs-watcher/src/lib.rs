//!
//! # Filesystem Watcher
//!
//! Watches a single directory through the kernel notification facility and turns the raw
//! record stream into [`FsEvent`]s.
//!
//! Three classes of mutation are registered: entry created, write stream closed and entry
//! deleted. Events are pushed one by one onto a caller supplied bounded queue, so a slow
//! consumer throttles the reader instead of losing events.
//!
//! ```no_run
//! use synca_fs_watcher::{watch, FsEvent};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), synca_fs_watcher::WatcherError> {
//! 	let (events_tx, events_rx) = async_channel::bounded::<FsEvent>(3);
//!
//! 	let _reader = watch("/tmp/x", events_tx)?;
//!
//! 	while let Ok(event) = events_rx.recv().await {
//! 		println!("{} {}", event.operation, event.path.display());
//! 	}
//!
//! 	Ok(())
//! }
//! ```

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

pub mod decoder;
mod error;
mod event;
mod platform;

pub use decoder::{decode_events, RawEventRecord, RawEvents};
pub use error::{DecodeError, WatcherError};
pub use event::{mask, FsEvent, Operation};

#[cfg(target_os = "linux")]
pub use platform::watch;

pub type Result<T> = std::result::Result<T, WatcherError>;
