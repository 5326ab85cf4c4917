//! Canonical filesystem event shape shared by the watcher, the fan-out and every provider.

use std::{fmt, path::PathBuf};

/// Kernel mask bits we care about. Values are the inotify ABI, kept here so the decoder
/// stays usable (and testable) without pulling the platform constants in.
pub mod mask {
	pub const IN_CLOSE_WRITE: u32 = 0x0000_0008;
	pub const IN_CREATE: u32 = 0x0000_0100;
	pub const IN_DELETE: u32 = 0x0000_0200;
	pub const IN_Q_OVERFLOW: u32 = 0x0000_4000;
	pub const IN_IGNORED: u32 = 0x0000_8000;

	#[cfg(target_os = "linux")]
	const _: () = {
		assert!(IN_CLOSE_WRITE == libc::IN_CLOSE_WRITE);
		assert!(IN_CREATE == libc::IN_CREATE);
		assert!(IN_DELETE == libc::IN_DELETE);
		assert!(IN_Q_OVERFLOW == libc::IN_Q_OVERFLOW);
		assert!(IN_IGNORED == libc::IN_IGNORED);
	};
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
	Created,
	ClosedAfterWrite,
	Deleted,
	Unknown,
}

impl Operation {
	/// Maps a kernel mask to a single operation.
	///
	/// When more than one bit is set the priority is fixed: delete, then close-write,
	/// then create; anything else is [`Operation::Unknown`].
	#[must_use]
	pub const fn from_mask(bits: u32) -> Self {
		if bits & mask::IN_DELETE != 0 {
			Self::Deleted
		} else if bits & mask::IN_CLOSE_WRITE != 0 {
			Self::ClosedAfterWrite
		} else if bits & mask::IN_CREATE != 0 {
			Self::Created
		} else {
			Self::Unknown
		}
	}

	#[must_use]
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Created => "create",
			Self::ClosedAfterWrite => "close_write",
			Self::Deleted => "delete",
			Self::Unknown => "unknown",
		}
	}

	#[must_use]
	pub const fn is_delete(self) -> bool {
		matches!(self, Self::Deleted)
	}
}

impl fmt::Display for Operation {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// A single mutation notification for one path.
///
/// Events carry no identity beyond `path` + `operation`, duplicates are expected.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FsEvent {
	pub path: PathBuf,
	pub operation: Operation,
}

impl FsEvent {
	pub fn new(path: impl Into<PathBuf>, operation: Operation) -> Self {
		Self {
			path: path.into(),
			operation,
		}
	}

	pub fn created(path: impl Into<PathBuf>) -> Self {
		Self::new(path, Operation::Created)
	}

	pub fn closed_after_write(path: impl Into<PathBuf>) -> Self {
		Self::new(path, Operation::ClosedAfterWrite)
	}

	pub fn deleted(path: impl Into<PathBuf>) -> Self {
		Self::new(path, Operation::Deleted)
	}
}

#[cfg(test)]
mod tests {
	use super::{mask::*, *};

	#[test]
	fn delete_wins_over_everything() {
		assert_eq!(
			Operation::from_mask(IN_DELETE | IN_CLOSE_WRITE | IN_CREATE),
			Operation::Deleted
		);
		assert_eq!(Operation::from_mask(IN_DELETE | IN_CREATE), Operation::Deleted);
	}

	#[test]
	fn close_write_wins_over_create() {
		assert_eq!(
			Operation::from_mask(IN_CLOSE_WRITE | IN_CREATE),
			Operation::ClosedAfterWrite
		);
	}

	#[test]
	fn unmatched_bits_are_unknown() {
		assert_eq!(Operation::from_mask(0), Operation::Unknown);
		assert_eq!(Operation::from_mask(IN_IGNORED), Operation::Unknown);
		assert_eq!(Operation::from_mask(IN_Q_OVERFLOW), Operation::Unknown);
	}

	#[test]
	fn display_names() {
		assert_eq!(Operation::ClosedAfterWrite.to_string(), "close_write");
		assert_eq!(FsEvent::deleted("/a").operation.to_string(), "delete");
	}
}
