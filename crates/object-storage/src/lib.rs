//!
//! # Object Storage Provider
//!
//! A [`synca_cloud::Provider`] backed by an object store. Create and write events become
//! uploads of the file at the event path; delete events are coalesced into batch deletes
//! spread across a small worker pool.
//!
//! The remote side is abstracted behind [`ObjectBackend`]; [`OpendalBackend`] implements it
//! for S3 and GCS buckets.

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

mod backend;
mod batch;
mod error;
mod provider;
mod retry;
mod worker;

pub use backend::{BucketConfig, GcsConfig, ObjectBackend, OpendalBackend};
pub use batch::{delete_key, upload_key, DeleteBatch};
pub use error::{BackendError, NonUtf8PathError, UploadError};
pub use provider::{
	ObjectStorageProvider, ProviderConfig, DELETE_MAX_BATCH_SIZE, DELETE_WORKERS,
	WORK_QUEUE_CAPACITY,
};
pub use retry::RetryPolicy;
