use std::fmt;

use bytes::{Buf, BufMut};

use crate::{
	coding::{Decode, DecodeError, Encode, EncodeError, VarInt},
	ietf::Message,
};

/// A request ID; clients allocate even IDs and servers odd IDs.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RequestId(pub u64);

impl RequestId {
	/// Return the current ID and advance to the next one with the same parity.
	pub fn increment(&mut self) -> RequestId {
		let prev = *self;
		self.0 += 2;
		prev
	}
}

impl fmt::Display for RequestId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

// Request IDs use the wide class.
impl Encode for RequestId {
	fn encode<W: BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		VarInt::try_from(self.0)?.encode(w)
	}
}

impl Decode for RequestId {
	fn decode<R: Buf>(r: &mut R) -> Result<Self, DecodeError> {
		Ok(Self(VarInt::decode(r)?.into_inner()))
	}
}

/// Raise the limit on request IDs the peer may allocate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MaxRequestId {
	pub request_id: RequestId,
}

impl Message for MaxRequestId {
	const ID: u64 = 0x15;

	fn encode_msg<W: BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		self.request_id.0.encode(w)
	}

	fn decode_msg<R: Buf>(r: &mut R) -> Result<Self, DecodeError> {
		let request_id = RequestId(u64::decode(r)?);
		Ok(Self { request_id })
	}
}

/// Sent when a new request is blocked by the peer's [MaxRequestId].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RequestsBlocked {
	pub request_id: RequestId,
}

impl Message for RequestsBlocked {
	const ID: u64 = 0x1a;

	fn encode_msg<W: BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		self.request_id.0.encode(w)
	}

	fn decode_msg<R: Buf>(r: &mut R) -> Result<Self, DecodeError> {
		let request_id = RequestId(u64::decode(r)?);
		Ok(Self { request_id })
	}
}
