use std::{fmt, future::Future, time::Duration};

use backoff::{future::retry_notify, ExponentialBackoffBuilder};
use tracing::warn;

const DEFAULT_INITIAL_INTERVAL: Duration = Duration::from_millis(200);

/// What a worker does when a backend call fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RetryPolicy {
	/// Log the failure and move on to the next unit of work.
	#[default]
	Never,
	/// Retry transient failures with exponential backoff until `max_elapsed` has passed.
	Backoff {
		initial_interval: Duration,
		max_elapsed: Duration,
	},
}

impl RetryPolicy {
	#[must_use]
	pub const fn backoff(max_elapsed: Duration) -> Self {
		Self::Backoff {
			initial_interval: DEFAULT_INITIAL_INTERVAL,
			max_elapsed,
		}
	}

	/// Runs `op` under this policy. Errors `op` marks as permanent are never retried.
	pub(crate) async fn run<T, E, F, Fut>(&self, operation: &'static str, op: F) -> Result<T, E>
	where
		E: fmt::Display,
		F: FnMut() -> Fut,
		Fut: Future<Output = Result<T, backoff::Error<E>>>,
	{
		match *self {
			Self::Never => {
				let mut op = op;
				op().await.map_err(into_inner)
			}

			Self::Backoff {
				initial_interval,
				max_elapsed,
			} => {
				let policy = ExponentialBackoffBuilder::new()
					.with_initial_interval(initial_interval)
					.with_max_elapsed_time(Some(max_elapsed))
					.build();

				retry_notify(policy, op, |e: E, wait: Duration| {
					warn!(operation, %e, ?wait, "Backend call failed, retrying;");
				})
				.await
			}
		}
	}
}

fn into_inner<E>(e: backoff::Error<E>) -> E {
	match e {
		backoff::Error::Permanent(e) | backoff::Error::Transient { err: e, .. } => e,
	}
}
