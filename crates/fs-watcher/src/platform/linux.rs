//! Linux inotify watcher
//!
//! Talks to the kernel directly through `libc` and owns decoding of the returned byte
//! stream, see [`crate::decoder`].

use crate::{
	decoder::{RawEvents, HEADER_SIZE},
	error::WatcherError,
	event::{mask, FsEvent},
	Result,
};

use std::{
	ffi::CString,
	io,
	os::{
		fd::{AsRawFd, FromRawFd, OwnedFd, RawFd},
		unix::ffi::OsStrExt,
	},
	path::{Path, PathBuf},
};

use async_channel as chan;
use tokio::{
	io::{unix::AsyncFd, Interest},
	spawn,
	task::JoinHandle,
};
use tracing::{debug, error, info, instrument, trace, warn, Instrument};

/// Entry created, write stream closed and entry deleted.
const WATCH_MASK: u32 = mask::IN_CREATE | mask::IN_CLOSE_WRITE | mask::IN_DELETE;

/// Room for a few thousand records per read.
const READ_BUFFER_SIZE: usize = HEADER_SIZE * 4096;

/// An inotify instance with a single watch on it, closed on drop.
#[derive(Debug)]
struct Inotify {
	fd: OwnedFd,
	wd: i32,
}

impl Inotify {
	fn open(root: &Path) -> Result<Self> {
		let c_path = CString::new(root.as_os_str().as_bytes())
			.map_err(|_| WatcherError::InvalidPath(root.into()))?;

		// SAFETY: plain syscall, no pointers involved
		let raw = unsafe { libc::inotify_init1(libc::IN_NONBLOCK | libc::IN_CLOEXEC) };
		if raw == -1 {
			return Err(WatcherError::Init(io::Error::last_os_error()));
		}

		// SAFETY: `raw` was just returned by `inotify_init1` and nothing else owns it
		let fd = unsafe { OwnedFd::from_raw_fd(raw) };

		// SAFETY: `c_path` is a valid NUL terminated string that outlives the call
		let wd = unsafe { libc::inotify_add_watch(fd.as_raw_fd(), c_path.as_ptr(), WATCH_MASK) };
		if wd == -1 {
			return Err(WatcherError::AddWatch {
				path: root.into(),
				source: io::Error::last_os_error(),
			});
		}

		Ok(Self { fd, wd })
	}

	fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
		// SAFETY: `buf` is valid for writes of `buf.len()` bytes for the whole call
		let read = unsafe { libc::read(self.fd.as_raw_fd(), buf.as_mut_ptr().cast(), buf.len()) };

		usize::try_from(read).map_err(|_| io::Error::last_os_error())
	}
}

impl AsRawFd for Inotify {
	fn as_raw_fd(&self) -> RawFd {
		self.fd.as_raw_fd()
	}
}

/// Starts watching `root` for created, written and deleted entries.
///
/// Setup failures are returned to the caller. On success a reader task is spawned on the
/// current runtime and every decoded event is pushed onto `queue`; a full queue suspends the
/// reader, nothing is dropped. The reader stops once `queue` is closed, the watched directory
/// is removed or the descriptor fails; `queue` is dropped with it.
#[instrument(skip_all, fields(root = %root.as_ref().display()), err)]
pub fn watch(root: impl AsRef<Path>, queue: chan::Sender<FsEvent>) -> Result<JoinHandle<()>> {
	let root = root.as_ref().to_path_buf();

	let inotify = Inotify::open(&root)?;
	debug!(wd = inotify.wd, "Watch registered;");

	let inotify =
		AsyncFd::with_interest(inotify, Interest::READABLE).map_err(WatcherError::Reactor)?;

	Ok(spawn(read_events(root, inotify, queue).in_current_span()))
}

async fn read_events(root: PathBuf, inotify: AsyncFd<Inotify>, queue: chan::Sender<FsEvent>) {
	let mut buf = vec![0; READ_BUFFER_SIZE];

	loop {
		let read = match inotify.readable().await {
			Ok(mut guard) => match guard.try_io(|inner| inner.get_ref().read(&mut buf)) {
				Ok(read) => read,
				Err(_would_block) => continue,
			},
			Err(e) => {
				error!(?e, "Failed to poll inotify descriptor;");
				break;
			}
		};

		let count = match read {
			Ok(0) => {
				warn!("Inotify descriptor returned end of file;");
				break;
			}
			Ok(count) => count,
			Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
			Err(e) => {
				error!(?e, "Failed to read inotify events;");
				break;
			}
		};

		trace!(count, "Read inotify buffer;");

		for record in RawEvents::new(&buf[..count]) {
			let record = match record {
				Ok(record) => record,
				Err(e) => {
					error!(?e, "Malformed inotify record, skipping the rest of the buffer;");
					break;
				}
			};

			if record.is_overflow() {
				warn!("Kernel event queue overflowed, some events were lost;");
			}

			if record.wd == inotify.get_ref().wd && record.is_watch_removed() {
				warn!("Watched directory is gone, watcher will exit;");
				return;
			}

			let event = record.to_event(&root);
			trace!(path = %event.path.display(), operation = %event.operation, "Decoded event;");

			if queue.send(event).await.is_err() {
				info!("Event queue closed, watcher will exit");
				return;
			}
		}
	}

	info!("Watcher stopped");
}
