// Based on quinn-proto's VarInt, extended with the 2^53 "safe" class.
use std::fmt;

use bytes::{Buf, BufMut};
use thiserror::Error;

use super::{Decode, DecodeError, Encode, EncodeError};

/// The value does not fit in the requested integer class.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Error)]
#[error("value out of range")]
pub struct BoundsExceeded;

/// An integer less than 2^62, encoded as a QUIC variable-length integer.
///
/// The two most significant bits of the first byte select the length (1, 2, 4 or 8 bytes).
/// The remaining bits hold the value in network byte order.
#[derive(Default, Copy, Clone, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VarInt(u64);

impl VarInt {
	/// The largest representable value.
	pub const MAX: Self = Self((1 << 62) - 1);

	/// The largest value of the compact class, which survives a round trip through an IEEE double.
	pub const MAX_SAFE: Self = Self((1 << 53) - 1);

	pub const ZERO: Self = Self(0);

	/// Construct a `VarInt` infallibly.
	pub const fn from_u32(x: u32) -> Self {
		Self(x as u64)
	}

	pub const fn from_u64(x: u64) -> Option<Self> {
		if x <= Self::MAX.0 {
			Some(Self(x))
		} else {
			None
		}
	}

	pub const fn from_u128(x: u128) -> Option<Self> {
		if x <= Self::MAX.0 as u128 {
			Some(Self(x as u64))
		} else {
			None
		}
	}

	/// Extract the integer value.
	pub const fn into_inner(self) -> u64 {
		self.0
	}

	/// The number of bytes this value occupies on the wire.
	pub const fn size(self) -> usize {
		match self.0 {
			0..=0x3f => 1,
			0x40..=0x3fff => 2,
			0x4000..=0x3fff_ffff => 4,
			_ => 8,
		}
	}

	pub(super) fn write<W: BufMut>(self, w: &mut W) {
		let x = self.0;
		match self.size() {
			1 => w.put_u8(x as u8),
			2 => w.put_u16((0b01 << 14) | x as u16),
			4 => w.put_u32((0b10 << 30) | x as u32),
			_ => w.put_u64((0b11 << 62) | x),
		}
	}

	pub(super) fn read<R: Buf>(r: &mut R) -> Result<Self, DecodeError> {
		if !r.has_remaining() {
			return Err(DecodeError::Short);
		}

		let size = 1usize << (r.chunk()[0] >> 6);
		if r.remaining() < size {
			return Err(DecodeError::Short);
		}

		let x = match size {
			1 => (r.get_u8() & 0x3f) as u64,
			2 => (r.get_u16() & 0x3fff) as u64,
			4 => (r.get_u32() & 0x3fff_ffff) as u64,
			_ => r.get_u64() & 0x3fff_ffff_ffff_ffff,
		};

		Ok(Self(x))
	}
}

impl From<VarInt> for u64 {
	fn from(x: VarInt) -> Self {
		x.0
	}
}

impl From<u8> for VarInt {
	fn from(x: u8) -> Self {
		Self(x.into())
	}
}

impl From<u16> for VarInt {
	fn from(x: u16) -> Self {
		Self(x.into())
	}
}

impl From<u32> for VarInt {
	fn from(x: u32) -> Self {
		Self(x.into())
	}
}

impl TryFrom<u64> for VarInt {
	type Error = BoundsExceeded;

	fn try_from(x: u64) -> Result<Self, BoundsExceeded> {
		Self::from_u64(x).ok_or(BoundsExceeded)
	}
}

impl TryFrom<usize> for VarInt {
	type Error = BoundsExceeded;

	fn try_from(x: usize) -> Result<Self, BoundsExceeded> {
		Self::try_from(x as u64)
	}
}

impl fmt::Debug for VarInt {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		self.0.fmt(f)
	}
}

impl fmt::Display for VarInt {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		self.0.fmt(f)
	}
}

impl Encode for VarInt {
	fn encode<W: BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		self.write(w);
		Ok(())
	}
}

impl Decode for VarInt {
	fn decode<R: Buf>(r: &mut R) -> Result<Self, DecodeError> {
		Self::read(r)
	}
}

// The compact class: same wire format, capped at 2^53-1.
impl Encode for u64 {
	fn encode<W: BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		if *self > VarInt::MAX_SAFE.0 {
			return Err(EncodeError::BoundsExceeded);
		}

		VarInt(*self).write(w);
		Ok(())
	}
}

impl Decode for u64 {
	fn decode<R: Buf>(r: &mut R) -> Result<Self, DecodeError> {
		let x = VarInt::read(r)?.0;
		if x > VarInt::MAX_SAFE.0 {
			return Err(DecodeError::BoundsExceeded);
		}

		Ok(x)
	}
}

impl Encode for usize {
	fn encode<W: BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		(*self as u64).encode(w)
	}
}

impl Decode for usize {
	fn decode<R: Buf>(r: &mut R) -> Result<Self, DecodeError> {
		let x = u64::decode(r)?;
		x.try_into().map_err(|_| DecodeError::BoundsExceeded)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use bytes::BytesMut;

	fn encoded(x: VarInt) -> Vec<u8> {
		let mut buf = BytesMut::new();
		x.encode(&mut buf).unwrap();
		buf.to_vec()
	}

	#[test]
	fn test_length_classes() {
		// Examples from RFC 9000 Appendix A.1
		assert_eq!(encoded(VarInt::from_u32(37)), [0x25]);
		assert_eq!(encoded(VarInt::from_u32(15_293)), [0x7b, 0xbd]);
		assert_eq!(encoded(VarInt::from_u32(494_878_333)), [0x9d, 0x7f, 0x3e, 0x7d]);
		assert_eq!(
			encoded(VarInt::from_u64(151_288_809_941_952_652).unwrap()),
			[0xc2, 0x19, 0x7c, 0x5e, 0xff, 0x14, 0xe8, 0x8c]
		);
	}

	#[test]
	fn test_boundaries() {
		for (value, size) in [
			(0x3f, 1),
			(0x40, 2),
			(0x3fff, 2),
			(0x4000, 4),
			(0x3fff_ffff, 4),
			(0x4000_0000, 8),
			(VarInt::MAX.0, 8),
		] {
			let x = VarInt::from_u64(value).unwrap();
			let buf = encoded(x);
			assert_eq!(buf.len(), size, "value {value}");
			assert_eq!(VarInt::decode(&mut &buf[..]).unwrap(), x);
		}
	}

	#[test]
	fn test_non_minimal() {
		// Decoders must accept a value padded into a longer length class.
		let mut buf = &[0x40, 0x25][..];
		assert_eq!(VarInt::decode(&mut buf).unwrap(), VarInt::from_u32(37));
	}

	#[test]
	fn test_wide_bounds() {
		assert!(VarInt::from_u64(1 << 62).is_none());
		assert_eq!(VarInt::try_from(u64::MAX), Err(BoundsExceeded));
	}

	#[test]
	fn test_compact_bounds() {
		let mut buf = BytesMut::new();
		VarInt::MAX_SAFE.0.encode(&mut buf).unwrap();
		assert_eq!(u64::decode(&mut buf.clone().freeze()).unwrap(), VarInt::MAX_SAFE.0);

		let mut buf = BytesMut::new();
		assert_eq!((1u64 << 53).encode(&mut buf), Err(EncodeError::BoundsExceeded));

		// A wide value is rejected when read as a compact one.
		let mut buf = BytesMut::new();
		VarInt::MAX.encode(&mut buf).unwrap();
		assert_eq!(u64::decode(&mut buf.freeze()), Err(DecodeError::BoundsExceeded));
	}

	#[test]
	fn test_short() {
		let mut buf = &[0x80, 0x01][..];
		assert_eq!(VarInt::decode(&mut buf), Err(DecodeError::Short));

		let mut buf = &[][..];
		assert_eq!(u64::decode(&mut buf), Err(DecodeError::Short));
	}
}
