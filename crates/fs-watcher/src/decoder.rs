//! Decoder for the packed record stream returned by `read(2)` on an inotify descriptor.
//!
//! Each record is a fixed header followed by a NUL padded name:
//!
//! ```text
//! ┌──────────┬──────────┬──────────┬──────────┬───────────────────────┐
//! │ wd: i32  │ mask: u32│cookie:u32│ len: u32 │ name: [u8; len]       │
//! └──────────┴──────────┴──────────┴──────────┴───────────────────────┘
//! ```
//!
//! All integers are native endian. Framing is validated before every access, a record
//! that claims more bytes than the buffer holds ends decoding with [`DecodeError`].

use crate::{
	error::DecodeError,
	event::{mask, FsEvent, Operation},
};

use std::path::Path;

#[cfg(unix)]
use std::{ffi::OsStr, os::unix::ffi::OsStrExt};

/// Size of `struct inotify_event` without its flexible name member.
pub const HEADER_SIZE: usize = 16;

#[cfg(target_os = "linux")]
const _: () = assert!(HEADER_SIZE == std::mem::size_of::<libc::inotify_event>());

/// One record, borrowed straight out of the read buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawEventRecord<'buf> {
	pub wd: i32,
	pub mask: u32,
	pub cookie: u32,
	/// Name with the trailing NUL padding already stripped, empty for events on the watched
	/// directory itself.
	pub name: &'buf [u8],
}

impl RawEventRecord<'_> {
	#[must_use]
	pub const fn operation(&self) -> Operation {
		Operation::from_mask(self.mask)
	}

	/// The kernel dropped events because its queue overflowed.
	#[must_use]
	pub const fn is_overflow(&self) -> bool {
		self.mask & mask::IN_Q_OVERFLOW != 0
	}

	/// The watch was removed, by the kernel once the watched directory is gone.
	#[must_use]
	pub const fn is_watch_removed(&self) -> bool {
		self.mask & mask::IN_IGNORED != 0
	}

	#[cfg(unix)]
	pub fn to_event(&self, root: &Path) -> FsEvent {
		let path = if self.name.is_empty() {
			root.to_path_buf()
		} else {
			root.join(OsStr::from_bytes(self.name))
		};

		FsEvent::new(path, self.operation())
	}
}

/// Iterator over the records packed in a single read buffer.
///
/// Yields at most one error, after which it is exhausted: once framing is lost there is no
/// way to find the start of the next record.
#[derive(Debug)]
pub struct RawEvents<'buf> {
	buf: &'buf [u8],
	offset: usize,
	failed: bool,
}

impl<'buf> RawEvents<'buf> {
	#[must_use]
	pub const fn new(buf: &'buf [u8]) -> Self {
		Self {
			buf,
			offset: 0,
			failed: false,
		}
	}

	fn truncated(&mut self, needed: usize, available: usize) -> DecodeError {
		self.failed = true;
		DecodeError::Truncated {
			offset: self.offset,
			needed,
			available,
		}
	}
}

impl<'buf> Iterator for RawEvents<'buf> {
	type Item = Result<RawEventRecord<'buf>, DecodeError>;

	fn next(&mut self) -> Option<Self::Item> {
		if self.failed || self.offset >= self.buf.len() {
			return None;
		}

		let remaining = &self.buf[self.offset..];
		if remaining.len() < HEADER_SIZE {
			return Some(Err(self.truncated(HEADER_SIZE, remaining.len())));
		}

		let wd = i32::from_ne_bytes(word(remaining, 0));
		let mask = u32::from_ne_bytes(word(remaining, 4));
		let cookie = u32::from_ne_bytes(word(remaining, 8));
		let len = usize::try_from(u32::from_ne_bytes(word(remaining, 12))).unwrap_or(usize::MAX);

		let Some(record_size) = HEADER_SIZE
			.checked_add(len)
			.filter(|size| *size <= remaining.len())
		else {
			return Some(Err(
				self.truncated(HEADER_SIZE.saturating_add(len), remaining.len())
			));
		};

		let name = strip_nul_padding(&remaining[HEADER_SIZE..record_size]);
		self.offset += record_size;

		Some(Ok(RawEventRecord {
			wd,
			mask,
			cookie,
			name,
		}))
	}
}

/// Decodes every record in `buf` into events rooted at `root`.
#[cfg(unix)]
pub fn decode_events<'buf>(
	root: &'buf Path,
	buf: &'buf [u8],
) -> impl Iterator<Item = Result<FsEvent, DecodeError>> + 'buf {
	RawEvents::new(buf).map(move |record| record.map(|record| record.to_event(root)))
}

fn word(bytes: &[u8], at: usize) -> [u8; 4] {
	let mut word = [0; 4];
	word.copy_from_slice(&bytes[at..at + 4]);
	word
}

fn strip_nul_padding(name: &[u8]) -> &[u8] {
	let end = name.iter().rposition(|&b| b != 0).map_or(0, |last| last + 1);
	&name[..end]
}
