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
	clippy::dbg_macro,
	deprecated
)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

mod config;

use config::{Args, FileConfig, ProviderKind, Settings};

use synca_cloud::Registry;
use synca_fanout::{FanOut, INBOUND_CAPACITY};
use synca_object_storage::{ObjectBackend, ObjectStorageProvider, OpendalBackend};

use std::{io, process, sync::Arc};

use anyhow::{bail, Context, Result};
use async_channel as chan;
use clap::Parser;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_LOG_FILTER: &str =
	"synca=info,synca_cloud=info,synca_fanout=info,synca_fs_watcher=info,synca_object_storage=info";

#[tokio::main]
async fn main() -> process::ExitCode {
	let args = Args::parse();

	if let Err(e) = init_tracing() {
		eprintln!("{e:#}");
		return process::ExitCode::FAILURE;
	}

	match run(args).await {
		Ok(()) => process::ExitCode::SUCCESS,
		Err(e) => {
			error!("{e:#}");
			process::ExitCode::FAILURE
		}
	}
}

fn init_tracing() -> Result<()> {
	tracing_subscriber::registry()
		.with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)))
		.with(fmt::layer().with_target(true).with_thread_ids(true))
		.try_init()
		.context("failed to initialize tracing")
}

async fn run(args: Args) -> Result<()> {
	let file = match &args.config {
		Some(path) => FileConfig::load(path)?,
		None => FileConfig::default(),
	};
	let settings = Settings::resolve(args, file);

	let is_dir = tokio::fs::metadata(&settings.dir)
		.await
		.map(|metadata| metadata.is_dir())
		.unwrap_or(false);
	if !is_dir {
		bail!("path {} does not exist", settings.dir.display());
	}

	let registry = Arc::new(build_registry(&settings)?);

	// Workers run detached, their completion is observed through the shutdown handshake.
	drop(registry.start_all());

	let (inbound_tx, inbound_rx) = chan::bounded(INBOUND_CAPACITY);
	let reader = watch(&settings, inbound_tx)?;

	info!(
		dir = %settings.dir.display(),
		providers = ?registry.names().collect::<Vec<_>>(),
		"Syncing directory;"
	);

	tokio::select! {
		() = FanOut::new(inbound_rx, Arc::clone(&registry)).run() => {
			reader.abort();
			bail!("directory watcher stopped");
		}

		res = shutdown_signal() => {
			let received = res?;
			info!(signal = received, "Received signal, shutting down providers...");

			registry.shutdown_all().await;

			info!("Shutdown complete");
			process::exit(1);
		}
	}
}

fn build_registry(settings: &Settings) -> Result<Registry> {
	let mut registry = Registry::new();

	for kind in &settings.providers {
		let backend: Arc<dyn ObjectBackend> = match kind {
			ProviderKind::Aws => Arc::new(
				OpendalBackend::s3(&settings.s3).context("failed to create S3 session")?,
			),
			ProviderKind::Gcp => Arc::new(
				OpendalBackend::gcs(&settings.gcs).context("failed to create GCS session")?,
			),
		};

		registry.register(Arc::new(ObjectStorageProvider::new(
			kind.name(),
			backend,
			settings.provider.clone(),
		)))?;
	}

	if registry.is_empty() {
		warn!("No providers configured, events will be discarded;");
	}

	Ok(registry)
}

#[cfg(target_os = "linux")]
fn watch(
	settings: &Settings,
	inbound_tx: chan::Sender<synca_fs_watcher::FsEvent>,
) -> Result<tokio::task::JoinHandle<()>> {
	synca_fs_watcher::watch(&settings.dir, inbound_tx)
		.with_context(|| format!("failed to watch {}", settings.dir.display()))
}

#[cfg(not(target_os = "linux"))]
fn watch(
	_settings: &Settings,
	_inbound_tx: chan::Sender<synca_fs_watcher::FsEvent>,
) -> Result<tokio::task::JoinHandle<()>> {
	bail!("directory watching is only supported on Linux");
}

async fn shutdown_signal() -> Result<&'static str> {
	let ctrl_c = async { signal::ctrl_c().await.map(|()| "SIGINT") };

	#[cfg(unix)]
	let terminate = async {
		signal::unix::signal(signal::unix::SignalKind::terminate())?
			.recv()
			.await;
		Ok::<_, io::Error>("SIGTERM")
	};

	#[cfg(not(unix))]
	let terminate = std::future::pending::<io::Result<&'static str>>();

	tokio::select! {
		res = ctrl_c => res,
		res = terminate => res,
	}
	.context("failed to listen for shutdown signals")
}
