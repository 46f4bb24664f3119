use bytes::{Buf, BufMut};
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::coding::{Decode, DecodeError, Encode, EncodeError, VarInt};

/// The order in which groups are delivered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum GroupOrder {
	/// Use the publisher's preference.
	#[default]
	Any = 0x0,
	Ascending = 0x1,
	Descending = 0x2,
}

impl Encode for GroupOrder {
	fn encode<W: BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		u8::from(*self).encode(w)
	}
}

impl Decode for GroupOrder {
	fn decode<R: Buf>(r: &mut R) -> Result<Self, DecodeError> {
		let value = u8::decode(r)?;
		Self::try_from(value).map_err(|_| DecodeError::UnknownType(value.into()))
	}
}

/// The low nibble of a group stream's type byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GroupFlags {
	/// Every object carries an extension header block.
	pub has_extensions: bool,

	/// The subgroup ID is the first object ID.
	pub has_subgroup_object: bool,

	/// There's an explicit subgroup ID on the wire.
	pub has_subgroup: bool,

	/// The group ends when the stream ends, without an end-of-group object.
	pub has_end: bool,
}

impl GroupFlags {
	pub const START: u64 = 0x10;
	pub const END: u64 = 0x1f;

	/// The type byte for these flags.
	pub fn type_id(&self) -> u64 {
		let mut id = Self::START;
		if self.has_extensions {
			id |= 0x01;
		}
		if self.has_subgroup_object {
			id |= 0x02;
		}
		if self.has_subgroup {
			id |= 0x04;
		}
		if self.has_end {
			id |= 0x08;
		}
		id
	}

	pub fn from_type_id(id: u64) -> Result<Self, DecodeError> {
		if !(Self::START..=Self::END).contains(&id) {
			return Err(DecodeError::UnknownType(id));
		}

		Ok(Self {
			has_extensions: id & 0x01 != 0,
			has_subgroup_object: id & 0x02 != 0,
			has_subgroup: id & 0x04 != 0,
			has_end: id & 0x08 != 0,
		})
	}
}

impl Default for GroupFlags {
	fn default() -> Self {
		Self {
			has_extensions: false,
			has_subgroup_object: false,
			has_subgroup: false,
			has_end: true,
		}
	}
}

/// The header at the start of each group stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GroupHeader {
	pub flags: GroupFlags,

	/// Wide varint.
	pub track_alias: u64,
	pub group_id: u64,

	/// Must be zero unless [GroupFlags::has_subgroup] is set.
	pub sub_group_id: u64,
	pub publisher_priority: u8,
}

impl Encode for GroupHeader {
	fn encode<W: BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		if !self.flags.has_subgroup && self.sub_group_id != 0 {
			return Err(EncodeError::InvalidSubgroup);
		}

		self.flags.type_id().encode(w)?;
		VarInt::try_from(self.track_alias)?.encode(w)?;
		self.group_id.encode(w)?;

		if self.flags.has_subgroup {
			self.sub_group_id.encode(w)?;
		}

		self.publisher_priority.encode(w)
	}
}

impl Decode for GroupHeader {
	fn decode<R: Buf>(r: &mut R) -> Result<Self, DecodeError> {
		let flags = GroupFlags::from_type_id(u64::decode(r)?)?;
		let track_alias = VarInt::decode(r)?.into_inner();
		let group_id = u64::decode(r)?;

		let sub_group_id = match flags.has_subgroup {
			true => u64::decode(r)?,
			false => 0,
		};

		let publisher_priority = u8::decode(r)?;

		Ok(Self {
			flags,
			track_alias,
			group_id,
			sub_group_id,
			publisher_priority,
		})
	}
}
