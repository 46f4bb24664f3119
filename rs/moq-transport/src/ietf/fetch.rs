use bytes::{Buf, BufMut};

use crate::{
	coding::{Decode, DecodeError, Encode, EncodeError},
	ietf::{GroupOrder, Location, Message, Namespace, Parameters, RequestId},
};

/// Which objects a [Fetch] asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchType {
	/// An explicit range of a named track.
	Standalone {
		namespace: Namespace,
		track: String,
		start: Location,
		end: Location,
	},
	/// A number of groups before the latest group of an existing subscription.
	RelativeJoining {
		subscriber_request_id: RequestId,
		group_offset: u64,
	},
	/// From an absolute group of an existing subscription.
	AbsoluteJoining {
		subscriber_request_id: RequestId,
		group_id: u64,
	},
}

impl FetchType {
	const STANDALONE: u64 = 0x1;
	const RELATIVE: u64 = 0x2;
	const ABSOLUTE: u64 = 0x3;
}

impl Encode for FetchType {
	fn encode<W: BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		match self {
			Self::Standalone {
				namespace,
				track,
				start,
				end,
			} => {
				Self::STANDALONE.encode(w)?;
				namespace.encode(w)?;
				track.encode(w)?;
				start.encode(w)?;
				end.encode(w)
			}
			Self::RelativeJoining {
				subscriber_request_id,
				group_offset,
			} => {
				Self::RELATIVE.encode(w)?;
				subscriber_request_id.encode(w)?;
				group_offset.encode(w)
			}
			Self::AbsoluteJoining {
				subscriber_request_id,
				group_id,
			} => {
				Self::ABSOLUTE.encode(w)?;
				subscriber_request_id.encode(w)?;
				group_id.encode(w)
			}
		}
	}
}

impl Decode for FetchType {
	fn decode<B: Buf>(buf: &mut B) -> Result<Self, DecodeError> {
		Ok(match u64::decode(buf)? {
			Self::STANDALONE => Self::Standalone {
				namespace: Namespace::decode(buf)?,
				track: String::decode(buf)?,
				start: Location::decode(buf)?,
				end: Location::decode(buf)?,
			},
			Self::RELATIVE => Self::RelativeJoining {
				subscriber_request_id: RequestId::decode(buf)?,
				group_offset: u64::decode(buf)?,
			},
			Self::ABSOLUTE => Self::AbsoluteJoining {
				subscriber_request_id: RequestId::decode(buf)?,
				group_id: u64::decode(buf)?,
			},
			other => return Err(DecodeError::UnknownType(other)),
		})
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetch {
	pub request_id: RequestId,
	pub subscriber_priority: u8,
	pub group_order: GroupOrder,
	pub fetch_type: FetchType,
}

impl Message for Fetch {
	const ID: u64 = 0x16;

	fn encode_msg<W: BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		self.request_id.encode(w)?;
		self.subscriber_priority.encode(w)?;
		self.group_order.encode(w)?;
		self.fetch_type.encode(w)?;
		// no parameters
		Parameters::default().encode(w)
	}

	fn decode_msg<B: Buf>(buf: &mut B) -> Result<Self, DecodeError> {
		let request_id = RequestId::decode(buf)?;
		let subscriber_priority = u8::decode(buf)?;
		let group_order = GroupOrder::decode(buf)?;
		let fetch_type = FetchType::decode(buf)?;
		let _params = Parameters::decode(buf)?;

		Ok(Self {
			request_id,
			subscriber_priority,
			group_order,
			fetch_type,
		})
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOk {
	pub request_id: RequestId,
	pub group_order: GroupOrder,
	pub end_of_track: bool,
	pub end_location: Location,
}

impl Message for FetchOk {
	const ID: u64 = 0x18;

	fn encode_msg<W: BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		self.request_id.encode(w)?;
		self.group_order.encode(w)?;
		self.end_of_track.encode(w)?;
		self.end_location.encode(w)?;
		Parameters::default().encode(w)
	}

	fn decode_msg<B: Buf>(buf: &mut B) -> Result<Self, DecodeError> {
		let request_id = RequestId::decode(buf)?;
		let group_order = GroupOrder::decode(buf)?;
		let end_of_track = bool::decode(buf)?;
		let end_location = Location::decode(buf)?;
		let _params = Parameters::decode(buf)?;

		Ok(Self {
			request_id,
			group_order,
			end_of_track,
			end_location,
		})
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchError {
	pub request_id: RequestId,
	pub error_code: u64,
	pub reason_phrase: String,
}

impl Message for FetchError {
	const ID: u64 = 0x19;

	fn encode_msg<W: BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		self.request_id.encode(w)?;
		self.error_code.encode(w)?;
		self.reason_phrase.encode(w)
	}

	fn decode_msg<B: Buf>(buf: &mut B) -> Result<Self, DecodeError> {
		let request_id = RequestId::decode(buf)?;
		let error_code = u64::decode(buf)?;
		let reason_phrase = String::decode(buf)?;

		Ok(Self {
			request_id,
			error_code,
			reason_phrase,
		})
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchCancel {
	pub request_id: RequestId,
}

impl Message for FetchCancel {
	const ID: u64 = 0x17;

	fn encode_msg<W: BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		self.request_id.encode(w)
	}

	fn decode_msg<B: Buf>(buf: &mut B) -> Result<Self, DecodeError> {
		let request_id = RequestId::decode(buf)?;
		Ok(Self { request_id })
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::ietf::ControlMessage;

	fn roundtrip(fetch_type: FetchType) {
		let msg = Fetch {
			request_id: RequestId(6),
			subscriber_priority: 3,
			group_order: GroupOrder::Descending,
			fetch_type,
		};

		let buf = msg.encode_bytes().unwrap();
		assert_eq!(Fetch::decode(&mut buf.clone()).unwrap(), msg);
		assert_eq!(ControlMessage::decode(&mut buf.clone()).unwrap(), ControlMessage::Fetch(msg));
	}

	#[test]
	fn test_standalone() {
		roundtrip(FetchType::Standalone {
			namespace: Namespace::from("demo/bbb"),
			track: "video".to_string(),
			start: Location::new(0, 0),
			end: Location::new(10, 5),
		});
	}

	#[test]
	fn test_relative() {
		roundtrip(FetchType::RelativeJoining {
			subscriber_request_id: RequestId(2),
			group_offset: 4,
		});
	}

	#[test]
	fn test_absolute() {
		roundtrip(FetchType::AbsoluteJoining {
			subscriber_request_id: RequestId(2),
			group_id: 1 << 40,
		});
	}

	#[test]
	fn test_unknown_fetch_type() {
		// request id, priority, order, then discriminant 4
		let mut buf = &[0x16, 0x00, 0x05, 0x06, 0x00, 0x01, 0x04, 0x00][..];
		assert_eq!(Fetch::decode(&mut buf), Err(DecodeError::UnknownType(4)));
	}

	#[test]
	fn test_replies() {
		let ok = FetchOk {
			request_id: RequestId(6),
			group_order: GroupOrder::Ascending,
			end_of_track: true,
			end_location: Location::new(12, 0),
		};
		let buf = ok.encode_bytes().unwrap();
		assert_eq!(buf[0], 0x18);
		assert_eq!(FetchOk::decode(&mut buf.clone()).unwrap(), ok);

		let err = FetchError {
			request_id: RequestId(6),
			error_code: 404,
			reason_phrase: "track not found".to_string(),
		};
		let buf = err.encode_bytes().unwrap();
		assert_eq!(buf[0], 0x19);
		assert_eq!(FetchError::decode(&mut buf.clone()).unwrap(), err);
	}
}
