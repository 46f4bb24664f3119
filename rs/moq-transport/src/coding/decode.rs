use std::string::FromUtf8Error;

use bytes::{Buf, Bytes};
use thiserror::Error;

/// Read the value from the buffer.
///
/// If [DecodeError::Short] is returned, the caller should try again with more data.
pub trait Decode: Sized {
	/// Decode the value from the given buffer.
	fn decode<B: Buf>(buf: &mut B) -> Result<Self, DecodeError>;
}

/// A decode error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
	/// More bytes are needed; not a protocol violation.
	#[error("short buffer")]
	Short,

	/// The declared size did not match the bytes consumed.
	#[error("long buffer")]
	Long,

	#[error("invalid string")]
	InvalidString(#[from] FromUtf8Error),

	#[error("invalid value")]
	InvalidValue,

	#[error("bounds exceeded")]
	BoundsExceeded,

	#[error("too many")]
	TooMany,

	#[error("expected end")]
	ExpectedEnd,

	/// A size-delimited body ended before the value was complete.
	#[error("expected data")]
	ExpectedData,

	#[error("unknown type: {0:#x}")]
	UnknownType(u64),

	#[error("duplicate parameter: {0}")]
	DuplicateParameter(u64),

	#[error("unsupported")]
	Unsupported,
}

impl DecodeError {
	/// Returns true if the bytes are malformed, as opposed to merely incomplete.
	pub fn is_malformed(&self) -> bool {
		!matches!(self, Self::Short)
	}
}

impl Decode for bool {
	fn decode<R: Buf>(r: &mut R) -> Result<Self, DecodeError> {
		match u8::decode(r)? {
			0 => Ok(false),
			1 => Ok(true),
			_ => Err(DecodeError::InvalidValue),
		}
	}
}

impl Decode for u8 {
	fn decode<R: Buf>(r: &mut R) -> Result<Self, DecodeError> {
		match r.has_remaining() {
			true => Ok(r.get_u8()),
			false => Err(DecodeError::Short),
		}
	}
}

impl Decode for u16 {
	fn decode<R: Buf>(r: &mut R) -> Result<Self, DecodeError> {
		match r.remaining() >= 2 {
			true => Ok(r.get_u16()),
			false => Err(DecodeError::Short),
		}
	}
}

impl Decode for String {
	/// Decode a string with a varint length prefix.
	fn decode<R: Buf>(r: &mut R) -> Result<Self, DecodeError> {
		let v = Vec::<u8>::decode(r)?;
		let str = String::from_utf8(v)?;

		Ok(str)
	}
}

impl Decode for Vec<u8> {
	fn decode<B: Buf>(buf: &mut B) -> Result<Self, DecodeError> {
		Ok(Bytes::decode(buf)?.to_vec())
	}
}

impl Decode for Bytes {
	fn decode<R: Buf>(r: &mut R) -> Result<Self, DecodeError> {
		let len = usize::decode(r)?;
		if r.remaining() < len {
			return Err(DecodeError::Short);
		}

		Ok(r.copy_to_bytes(len))
	}
}

impl<T: Decode> Decode for Option<T> {
	/// A presence byte followed by the value.
	fn decode<R: Buf>(r: &mut R) -> Result<Self, DecodeError> {
		match bool::decode(r)? {
			true => Ok(Some(T::decode(r)?)),
			false => Ok(None),
		}
	}
}
