//!
//! # Cloud Providers
//!
//! The contract every sync backend implements, plus the registry the entry point fills
//! before handing it to the fan-out.
//!
//! A provider's life is split in two long running halves: [`Provider::queue_receive`]
//! consumes the provider's copy of the event stream, while [`Provider::start_workers`] runs
//! whatever does the actual work until shutdown is requested through the token returned by
//! [`Provider::cancel`].

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

mod error;
mod provider;
mod registry;

pub use error::RegistryError;
pub use provider::{shutdown, Handshake, Provider};
pub use registry::Registry;
