use std::collections::{hash_map, HashMap};

use bytes::{Buf, BufMut, Bytes};
use num_enum::{FromPrimitive, IntoPrimitive};

use crate::coding::*;

const MAX_PARAMS: u64 = 64;

/// Parameters with an even ID, carrying a single varint inline.
#[derive(Debug, Copy, Clone, FromPrimitive, IntoPrimitive, Eq, Hash, PartialEq)]
#[repr(u64)]
pub enum ParameterVarInt {
	MaxRequestId = 2,
	MaxAuthTokenCacheSize = 4,
	#[num_enum(catch_all)]
	Unknown(u64),
}

/// Parameters with an odd ID, carrying a length-prefixed byte blob.
#[derive(Debug, Copy, Clone, FromPrimitive, IntoPrimitive, Eq, Hash, PartialEq)]
#[repr(u64)]
pub enum ParameterBytes {
	Path = 1,
	AuthorizationToken = 3,
	Authority = 5,
	Implementation = 7,
	#[num_enum(catch_all)]
	Unknown(u64),
}

/// A set of key-value parameters, keyed by a 62-bit ID whose parity selects the value encoding.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct Parameters {
	vars: HashMap<ParameterVarInt, u64>,
	bytes: HashMap<ParameterBytes, Bytes>,
}

impl Decode for Parameters {
	fn decode<R: Buf>(r: &mut R) -> Result<Self, DecodeError> {
		let mut vars = HashMap::new();
		let mut bytes = HashMap::new();

		let count = u64::decode(r)?;
		if count > MAX_PARAMS {
			return Err(DecodeError::TooMany);
		}

		for _ in 0..count {
			let id = VarInt::decode(r)?.into_inner();

			if id % 2 == 0 {
				match vars.entry(ParameterVarInt::from(id)) {
					hash_map::Entry::Occupied(_) => return Err(DecodeError::DuplicateParameter(id)),
					hash_map::Entry::Vacant(entry) => entry.insert(VarInt::decode(r)?.into_inner()),
				};
			} else {
				match bytes.entry(ParameterBytes::from(id)) {
					hash_map::Entry::Occupied(_) => return Err(DecodeError::DuplicateParameter(id)),
					hash_map::Entry::Vacant(entry) => entry.insert(Bytes::decode(r)?),
				};
			}
		}

		Ok(Parameters { vars, bytes })
	}
}

impl Encode for Parameters {
	fn encode<W: BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		(self.vars.len() + self.bytes.len()).encode(w)?;

		for (kind, value) in self.vars.iter() {
			let id = u64::from(*kind);
			if id % 2 != 0 {
				return Err(EncodeError::InvalidParameter(id));
			}

			VarInt::try_from(id)?.encode(w)?;
			VarInt::try_from(*value)?.encode(w)?;
		}

		for (kind, value) in self.bytes.iter() {
			let id = u64::from(*kind);
			if id % 2 == 0 {
				return Err(EncodeError::InvalidParameter(id));
			}

			VarInt::try_from(id)?.encode(w)?;
			value.encode(w)?;
		}

		Ok(())
	}
}

impl Parameters {
	pub fn is_empty(&self) -> bool {
		self.vars.is_empty() && self.bytes.is_empty()
	}

	pub fn len(&self) -> usize {
		self.vars.len() + self.bytes.len()
	}

	pub fn get_varint(&self, kind: ParameterVarInt) -> Option<u64> {
		self.vars.get(&ParameterVarInt::from(u64::from(kind))).copied()
	}

	/// Set a varint parameter; `Unknown(id)` for a known ID replaces the named variant.
	pub fn set_varint(&mut self, kind: ParameterVarInt, value: u64) {
		self.vars.insert(ParameterVarInt::from(u64::from(kind)), value);
	}

	pub fn get_bytes(&self, kind: ParameterBytes) -> Option<&[u8]> {
		self.bytes.get(&ParameterBytes::from(u64::from(kind))).map(|v| v.as_ref())
	}

	pub fn set_bytes<B: Into<Bytes>>(&mut self, kind: ParameterBytes, value: B) {
		self.bytes.insert(ParameterBytes::from(u64::from(kind)), value.into());
	}
}
