//! Command line arguments, the optional TOML file, and the settings resolved from both.

use synca_object_storage::{BucketConfig, GcsConfig, ProviderConfig, RetryPolicy};

use std::{
	fs,
	path::{Path, PathBuf},
	time::Duration,
};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
	Aws,
	Gcp,
}

impl ProviderKind {
	/// Name the provider is registered under.
	pub const fn name(self) -> &'static str {
		match self {
			Self::Aws => "aws",
			Self::Gcp => "gcp",
		}
	}
}

#[derive(Parser, Debug)]
#[command(name = "synca", version, about = "Keeps cloud buckets in sync with a directory")]
pub struct Args {
	/// Directory to watch
	pub dir: PathBuf,

	/// Destination bucket name
	pub bucket: String,

	/// Bucket region
	pub region: String,

	/// Cloud provider to sync into, may be repeated [default: aws]
	#[arg(long = "provider", value_enum, env = "SYNCA_PROVIDERS", value_delimiter = ',')]
	pub providers: Vec<ProviderKind>,

	/// Custom endpoint for S3 compatible services
	#[arg(long, env = "SYNCA_ENDPOINT")]
	pub endpoint: Option<String>,

	/// Service account key file for GCS
	#[arg(long, env = "SYNCA_GCS_CREDENTIAL")]
	pub gcs_credential: Option<PathBuf>,

	/// Number of concurrent delete workers per provider
	#[arg(long, env = "SYNCA_DELETE_WORKERS")]
	pub delete_workers: Option<usize>,

	/// Maximum number of objects removed per delete call
	#[arg(long, env = "SYNCA_MAX_BATCH_SIZE")]
	pub max_batch_size: Option<usize>,

	/// Keep retrying failed backend calls for this many seconds, 0 disables retries
	#[arg(long, env = "SYNCA_RETRY_WINDOW_SECS")]
	pub retry_window_secs: Option<u64>,

	/// TOML file providing defaults for the options above
	#[arg(long, env = "SYNCA_CONFIG")]
	pub config: Option<PathBuf>,
}

/// Same knobs as [`Args`], every one optional. Command line values win.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
	pub providers: Option<Vec<ProviderKind>>,
	pub endpoint: Option<String>,
	pub gcs_credential: Option<PathBuf>,
	pub delete_workers: Option<usize>,
	pub max_batch_size: Option<usize>,
	pub retry_window_secs: Option<u64>,
}

impl FileConfig {
	pub fn load(path: &Path) -> Result<Self> {
		let text = fs::read_to_string(path)
			.with_context(|| format!("failed to read config file {}", path.display()))?;

		toml::from_str(&text)
			.with_context(|| format!("failed to parse config file {}", path.display()))
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
	pub dir: PathBuf,
	pub providers: Vec<ProviderKind>,
	pub s3: BucketConfig,
	pub gcs: GcsConfig,
	pub provider: ProviderConfig,
}

impl Settings {
	pub fn resolve(args: Args, file: FileConfig) -> Self {
		let mut providers = if args.providers.is_empty() {
			file.providers.unwrap_or_else(|| vec![ProviderKind::Aws])
		} else {
			args.providers
		};
		let mut seen = Vec::with_capacity(providers.len());
		providers.retain(|kind| {
			if seen.contains(kind) {
				false
			} else {
				seen.push(*kind);
				true
			}
		});

		let defaults = ProviderConfig::default();
		let retry = match args.retry_window_secs.or(file.retry_window_secs) {
			None | Some(0) => RetryPolicy::Never,
			Some(secs) => RetryPolicy::backoff(Duration::from_secs(secs)),
		};

		Self {
			providers,
			s3: BucketConfig {
				name: args.bucket.clone(),
				region: args.region,
				endpoint: args.endpoint.or(file.endpoint),
			},
			gcs: GcsConfig {
				bucket: args.bucket,
				credential_path: args.gcs_credential.or(file.gcs_credential),
			},
			provider: ProviderConfig {
				delete_workers: args
					.delete_workers
					.or(file.delete_workers)
					.unwrap_or(defaults.delete_workers),
				max_batch_size: args
					.max_batch_size
					.or(file.max_batch_size)
					.unwrap_or(defaults.max_batch_size),
				retry,
				..defaults
			},
			dir: args.dir,
		}
	}
}
