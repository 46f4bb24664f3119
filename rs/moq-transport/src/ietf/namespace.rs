use std::fmt;

use bytes::{Buf, BufMut};

use crate::coding::*;

const MAX_PARTS: usize = 32;

/// A track namespace: an ordered tuple of strings.
///
/// Displayed and parsed as the parts joined by `/`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Namespace(pub Vec<String>);

impl Namespace {
	pub fn parts(&self) -> impl Iterator<Item = &str> {
		self.0.iter().map(String::as_str)
	}
}

impl From<&str> for Namespace {
	fn from(path: &str) -> Self {
		match path.is_empty() {
			true => Self::default(),
			false => Self(path.split('/').map(String::from).collect()),
		}
	}
}

impl fmt::Display for Namespace {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0.join("/"))
	}
}

impl Encode for Namespace {
	fn encode<W: BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		if self.0.len() > MAX_PARTS {
			return Err(EncodeError::BoundsExceeded);
		}

		self.0.len().encode(w)?;
		for part in &self.0 {
			part.encode(w)?;
		}

		Ok(())
	}
}

impl Decode for Namespace {
	fn decode<R: Buf>(r: &mut R) -> Result<Self, DecodeError> {
		let count = usize::decode(r)?;
		if count > MAX_PARTS {
			return Err(DecodeError::TooMany);
		}

		let mut parts = Vec::with_capacity(count);
		for _ in 0..count {
			parts.push(String::decode(r)?);
		}

		Ok(Self(parts))
	}
}
