use std::fmt::Debug;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::{
	coding::{Decode, DecodeError, Encode, EncodeError},
	ietf::{Fetch, FetchCancel, FetchError, FetchOk, MaxRequestId, RequestsBlocked},
};

/// A control message with a fixed ID, wrapped in a size-prefixed envelope on the wire.
///
/// The envelope is `id (i) | size (16) | body`.
/// Implementors only provide the body; [Encode] and [Decode] handle the envelope,
/// rejecting a mismatched ID and any body that is not consumed exactly.
pub trait Message: Sized + Debug {
	const ID: u64;

	/// Encode the message body.
	fn encode_msg<W: BufMut>(&self, w: &mut W) -> Result<(), EncodeError>;

	/// Decode the message body.
	fn decode_msg<B: Buf>(buf: &mut B) -> Result<Self, DecodeError>;
}

impl<T: Message> Encode for T {
	fn encode<W: BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		let mut body = BytesMut::new();
		self.encode_msg(&mut body)?;

		RawMessage {
			id: T::ID,
			body: body.freeze(),
		}
		.encode(w)
	}
}

impl<T: Message> Decode for T {
	fn decode<B: Buf>(buf: &mut B) -> Result<Self, DecodeError> {
		let raw = RawMessage::decode(buf)?;
		if raw.id != T::ID {
			return Err(DecodeError::UnknownType(raw.id));
		}

		raw.decode_body()
	}
}

/// A control message envelope that has not been parsed yet.
///
/// Decoding only consumes the envelope, so a message with an unknown ID or a malformed body
/// can be skipped without losing the position in the stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawMessage {
	pub id: u64,
	pub body: Bytes,
}

impl RawMessage {
	/// Parse the body into one of the known control messages.
	pub fn parse(&self) -> Result<ControlMessage, DecodeError> {
		Ok(match self.id {
			Fetch::ID => self.decode_body::<Fetch>()?.into(),
			FetchCancel::ID => self.decode_body::<FetchCancel>()?.into(),
			FetchOk::ID => self.decode_body::<FetchOk>()?.into(),
			FetchError::ID => self.decode_body::<FetchError>()?.into(),
			MaxRequestId::ID => self.decode_body::<MaxRequestId>()?.into(),
			RequestsBlocked::ID => self.decode_body::<RequestsBlocked>()?.into(),
			id => return Err(DecodeError::UnknownType(id)),
		})
	}

	fn decode_body<T: Message>(&self) -> Result<T, DecodeError> {
		let mut body = self.body.clone();

		let msg = match T::decode_msg(&mut body) {
			Ok(msg) => msg,
			// The whole body is here, so running out means the body is malformed.
			Err(DecodeError::Short) => return Err(DecodeError::ExpectedData),
			Err(err) => return Err(err),
		};

		if body.has_remaining() {
			return Err(DecodeError::Long);
		}

		Ok(msg)
	}
}

impl Encode for RawMessage {
	fn encode<W: BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		let size: u16 = self
			.body
			.len()
			.try_into()
			.map_err(|_| EncodeError::TooLarge(self.body.len()))?;

		self.id.encode(w)?;
		size.encode(w)?;
		w.put_slice(&self.body);

		Ok(())
	}
}

impl Decode for RawMessage {
	fn decode<B: Buf>(buf: &mut B) -> Result<Self, DecodeError> {
		let id = u64::decode(buf)?;
		let size = u16::decode(buf)? as usize;

		if buf.remaining() < size {
			return Err(DecodeError::Short);
		}

		let body = buf.copy_to_bytes(size);
		Ok(Self { id, body })
	}
}

/// Every control message this crate understands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ControlMessage {
	Fetch(Fetch),
	FetchCancel(FetchCancel),
	FetchOk(FetchOk),
	FetchError(FetchError),
	MaxRequestId(MaxRequestId),
	RequestsBlocked(RequestsBlocked),
}

impl ControlMessage {
	pub fn id(&self) -> u64 {
		match self {
			Self::Fetch(_) => Fetch::ID,
			Self::FetchCancel(_) => FetchCancel::ID,
			Self::FetchOk(_) => FetchOk::ID,
			Self::FetchError(_) => FetchError::ID,
			Self::MaxRequestId(_) => MaxRequestId::ID,
			Self::RequestsBlocked(_) => RequestsBlocked::ID,
		}
	}
}

macro_rules! control_messages {
	($($name:ident),*) => {
		$(impl From<$name> for ControlMessage {
			fn from(msg: $name) -> Self {
				Self::$name(msg)
			}
		})*

		impl Encode for ControlMessage {
			fn encode<W: BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
				match self {
					$(Self::$name(msg) => msg.encode(w),)*
				}
			}
		}
	};
}

control_messages!(Fetch, FetchCancel, FetchOk, FetchError, MaxRequestId, RequestsBlocked);

impl Decode for ControlMessage {
	/// Decode the envelope and parse it; an unknown ID consumes the message before failing.
	fn decode<B: Buf>(buf: &mut B) -> Result<Self, DecodeError> {
		RawMessage::decode(buf)?.parse()
	}
}
