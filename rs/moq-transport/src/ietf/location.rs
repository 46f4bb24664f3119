use bytes::{Buf, BufMut};

use crate::coding::{Decode, DecodeError, Encode, EncodeError, VarInt};

/// A pointer to an object within a group, used for fetch ranges and end-of-track markers.
///
/// Both fields use the wide varint class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Location {
	pub group: u64,
	pub object: u64,
}

impl Location {
	pub const fn new(group: u64, object: u64) -> Self {
		Self { group, object }
	}
}

impl Encode for Location {
	fn encode<W: BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		VarInt::try_from(self.group)?.encode(w)?;
		VarInt::try_from(self.object)?.encode(w)
	}
}

impl Decode for Location {
	fn decode<B: Buf>(buf: &mut B) -> Result<Self, DecodeError> {
		let group = VarInt::decode(buf)?.into_inner();
		let object = VarInt::decode(buf)?.into_inner();
		Ok(Self { group, object })
	}
}
