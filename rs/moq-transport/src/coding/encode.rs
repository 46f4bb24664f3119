use std::sync::Arc;

use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;

use super::BoundsExceeded;

/// Write the value to the buffer.
pub trait Encode: Sized {
	/// Encode the value to the given writer.
	///
	/// This will panic if the [BufMut] does not have enough capacity.
	fn encode<W: BufMut>(&self, w: &mut W) -> Result<(), EncodeError>;

	/// Encode the value into a [Bytes] buffer.
	///
	/// NOTE: This will allocate.
	fn encode_bytes(&self) -> Result<Bytes, EncodeError> {
		let mut buf = BytesMut::new();
		self.encode(&mut buf)?;
		Ok(buf.freeze())
	}
}

/// An encode error.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeError {
	#[error("bounds exceeded")]
	BoundsExceeded,

	#[error("message too large: {0} bytes")]
	TooLarge(usize),

	#[error("subgroup id requires the subgroup flag")]
	InvalidSubgroup,

	#[error("invalid parameter: {0}")]
	InvalidParameter(u64),
}

impl From<BoundsExceeded> for EncodeError {
	fn from(_: BoundsExceeded) -> Self {
		Self::BoundsExceeded
	}
}

impl Encode for bool {
	fn encode<W: BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		w.put_u8(*self as u8);
		Ok(())
	}
}

impl Encode for u8 {
	fn encode<W: BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		w.put_u8(*self);
		Ok(())
	}
}

impl Encode for u16 {
	fn encode<W: BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		w.put_u16(*self);
		Ok(())
	}
}

impl Encode for String {
	fn encode<W: BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		self.as_str().encode(w)
	}
}

impl Encode for &str {
	fn encode<W: BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		self.as_bytes().encode(w)
	}
}

impl Encode for &[u8] {
	fn encode<W: BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		self.len().encode(w)?;
		w.put_slice(self);
		Ok(())
	}
}

impl Encode for Vec<u8> {
	fn encode<W: BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		self.as_slice().encode(w)
	}
}

impl Encode for Bytes {
	fn encode<W: BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		self.as_ref().encode(w)
	}
}

impl<T: Encode> Encode for Arc<T> {
	fn encode<W: BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		(**self).encode(w)
	}
}

impl<T: Encode> Encode for Option<T> {
	fn encode<W: BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		match self {
			Some(v) => {
				true.encode(w)?;
				v.encode(w)
			}
			None => false.encode(w),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::coding::Decode;

	#[test]
	fn test_string() {
		let buf = "hello".encode_bytes().unwrap();
		assert_eq!(buf.as_ref(), b"\x05hello");
	}

	#[test]
	fn test_option() {
		let buf = Some(7u64).encode_bytes().unwrap();
		assert_eq!(buf.as_ref(), [0x01, 0x07]);
		assert_eq!(Option::<u64>::decode(&mut buf.clone()).unwrap(), Some(7));

		let buf = None::<u64>.encode_bytes().unwrap();
		assert_eq!(buf.as_ref(), [0x00]);
	}

	#[test]
	fn test_length_prefix() {
		// A length prefix uses the compact class; anything in range is fine.
		let payload = Bytes::from_static(&[0xab; 300]);
		let buf = payload.encode_bytes().unwrap();
		assert_eq!(&buf[..2], [0x41, 0x2c]);
		assert_eq!(buf.len(), 302);
	}
}
