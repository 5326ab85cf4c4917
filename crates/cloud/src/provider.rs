use synca_fs_watcher::FsEvent;

use std::sync::{Mutex, MutexGuard, PoisonError};

use async_channel as chan;
use async_trait::async_trait;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// A pluggable backend consuming the filesystem event stream.
#[async_trait]
pub trait Provider: Send + Sync + 'static {
	/// Stable, unique key the provider is registered under.
	fn name(&self) -> &str;

	/// Long running consumer of this provider's outbound queue.
	///
	/// Demultiplexes the generic stream into whatever internal queues the provider needs and
	/// returns once `events` is closed.
	async fn queue_receive(&self, events: chan::Receiver<FsEvent>);

	/// Reserved extension point, providers are not required to do anything here.
	async fn queue_write(&self) {}

	/// Runs the provider's workers.
	///
	/// Returns only after the cancellation token handed out by [`Provider::cancel`] fired
	/// and every worker exited, signalling the registered completion channel on the way out.
	/// Implementations backed by a [`Handshake`] call [`Handshake::start`] first.
	async fn start_workers(&self);

	/// Registers `done_tx` as the completion channel and returns the token that triggers
	/// this provider's shutdown.
	fn cancel(&self, done_tx: oneshot::Sender<()>) -> CancellationToken;
}

/// Cancellation and completion state a provider hands out through [`Provider::cancel`].
///
/// The root token is the external request. Workers get child tokens, so a single
/// cancellation is observed by all of them at once no matter how many there are.
///
/// The completion channel is only kept while workers are running. Registered before
/// [`Handshake::start`] or after [`Handshake::complete`], it is dropped on the spot: nobody
/// would ever signal it.
#[derive(Debug, Default)]
pub struct Handshake {
	cancel: CancellationToken,
	state: Mutex<State>,
}

#[derive(Debug, Default)]
struct State {
	phase: Phase,
	done_tx: Option<oneshot::Sender<()>>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum Phase {
	#[default]
	Idle,
	Running,
	Finished,
}

impl Handshake {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	fn state(&self) -> MutexGuard<'_, State> {
		self.state.lock().unwrap_or_else(PoisonError::into_inner)
	}

	/// Marks workers as running. Returns `false` if they were started before.
	#[must_use]
	pub fn start(&self) -> bool {
		let mut state = self.state();
		if state.phase != Phase::Idle {
			return false;
		}

		state.phase = Phase::Running;
		true
	}

	#[must_use]
	pub fn is_started(&self) -> bool {
		self.state().phase != Phase::Idle
	}

	/// Stores the caller's completion channel, replacing any earlier one.
	pub fn register(&self, done_tx: oneshot::Sender<()>) -> CancellationToken {
		let mut state = self.state();

		match state.phase {
			Phase::Running => {
				if state.done_tx.replace(done_tx).is_some() {
					debug!("Replaced a previously registered completion channel;");
				}
			}
			Phase::Idle | Phase::Finished => {
				debug!(phase = ?state.phase, "No workers running, dropping completion channel;");
				drop(done_tx);
			}
		}

		self.cancel.clone()
	}

	/// Token for a single worker, cancelled together with the root token.
	#[must_use]
	pub fn worker_token(&self) -> CancellationToken {
		self.cancel.child_token()
	}

	pub async fn cancelled(&self) {
		self.cancel.cancelled().await;
	}

	#[must_use]
	pub fn is_cancelled(&self) -> bool {
		self.cancel.is_cancelled()
	}

	/// Marks workers as finished and signals the registered completion channel, if anyone is
	/// waiting on it.
	pub fn complete(&self) {
		let maybe_done_tx = {
			let mut state = self.state();
			state.phase = Phase::Finished;
			state.done_tx.take()
		};

		match maybe_done_tx {
			Some(done_tx) => {
				if done_tx.send(()).is_err() {
					warn!("Shutdown requester went away before completion was signalled;");
				}
			}
			None => debug!("Workers finished with no completion channel registered;"),
		}
	}
}

/// Requests shutdown of `provider` and waits until its workers are done.
///
/// Returns once [`Provider::start_workers`] signalled completion. A provider with no workers
/// running drops the completion channel instead, which is logged and taken as done.
pub async fn shutdown(provider: &dyn Provider) {
	let (done_tx, done_rx) = oneshot::channel();

	provider.cancel(done_tx).cancel();

	if done_rx.await.is_err() {
		warn!(
			provider = provider.name(),
			"Provider dropped its completion channel without signalling;"
		);
	}
}
