use std::sync::Arc;

use crate::coding;

/// A list of possible errors that can occur while producing or consuming media.
#[derive(thiserror::Error, Debug, Clone)]
pub enum Error {
	/// The underlying byte stream failed.
	#[error("io error: {0}")]
	Io(Arc<std::io::Error>),

	#[error("decode error: {0}")]
	Decode(#[from] coding::DecodeError),

	#[error("encode error: {0}")]
	Encode(#[from] coding::EncodeError),

	/// An unexpected stream type was received
	#[error("unexpected stream type")]
	UnexpectedStream,

	/// A duplicate ID was used
	#[error("duplicate")]
	Duplicate,

	// Cancel is returned when there are no more readers.
	#[error("cancelled")]
	Cancel,

	/// The producer went away without closing.
	#[error("dropped")]
	Dropped,

	/// The group is older than the retention window.
	#[error("expired")]
	Expired,

	/// The group is older than the latest group and dropped.
	#[error("old")]
	Old,

	#[error("closed")]
	Closed,

	// The application closes the stream with a code.
	#[error("app code={0}")]
	App(u32),

	#[error("not found")]
	NotFound,

	#[error("wrong frame size")]
	WrongSize,

	#[error("unsupported")]
	Unsupported,
}

impl Error {
	/// An integer code that is sent over the wire.
	pub fn to_code(&self) -> u32 {
		match self {
			Self::Cancel => 0,
			Self::Old => 2,
			Self::Io(_) => 4,
			Self::Decode(_) => 5,
			Self::Encode(_) => 6,
			Self::Dropped => 7,
			Self::Expired => 8,
			Self::UnexpectedStream => 10,
			Self::Duplicate => 12,
			Self::NotFound => 13,
			Self::WrongSize => 14,
			Self::Unsupported => 17,
			Self::Closed => 20,
			Self::App(app) => *app + 64,
		}
	}
}

impl From<std::io::Error> for Error {
	fn from(err: std::io::Error) -> Self {
		Self::Io(Arc::new(err))
	}
}

pub type Result<T> = std::result::Result<T, Error>;
