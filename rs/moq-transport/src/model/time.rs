use bytes::{Buf, BufMut};

use crate::coding::{Decode, DecodeError, Encode, EncodeError, VarInt};

/// A presentation time in milliseconds.
pub type Time = Timescale<1_000>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("time overflow")]
pub struct TimeOverflow;

/// A presentation time in units of `1 / SCALE` seconds.
///
/// Times are relative to the track, not wall clock. Values fit in a wide varint so they can be encoded directly.
#[derive(Clone, Default, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Timescale<const SCALE: u64>(VarInt);

impl<const SCALE: u64> Timescale<SCALE> {
	pub const MAX: Self = Self(VarInt::MAX);
	pub const ZERO: Self = Self(VarInt::ZERO);

	/// Construct from a raw value in this scale.
	pub const fn new(value: u64) -> Result<Self, TimeOverflow> {
		match VarInt::from_u64(value) {
			Some(varint) => Ok(Self(varint)),
			None => Err(TimeOverflow),
		}
	}

	/// Convert `value` measured in `1 / scale` seconds, rounding down.
	pub const fn from_scale(value: u64, scale: u64) -> Result<Self, TimeOverflow> {
		match VarInt::from_u128(value as u128 * SCALE as u128 / scale as u128) {
			Some(varint) => Ok(Self(varint)),
			None => Err(TimeOverflow),
		}
	}

	pub const fn from_secs(secs: u64) -> Result<Self, TimeOverflow> {
		Self::from_scale(secs, 1)
	}

	pub const fn from_millis(millis: u64) -> Result<Self, TimeOverflow> {
		Self::from_scale(millis, 1_000)
	}

	pub const fn from_micros(micros: u64) -> Result<Self, TimeOverflow> {
		Self::from_scale(micros, 1_000_000)
	}

	/// The raw value in this scale.
	pub const fn value(self) -> u64 {
		self.0.into_inner()
	}

	pub const fn as_scale(self, scale: u64) -> u128 {
		self.0.into_inner() as u128 * scale as u128 / SCALE as u128
	}

	pub const fn as_secs(self) -> u64 {
		self.0.into_inner() / SCALE
	}

	pub const fn as_millis(self) -> u128 {
		self.as_scale(1_000)
	}

	pub const fn as_micros(self) -> u128 {
		self.as_scale(1_000_000)
	}

	pub fn as_secs_f64(self) -> f64 {
		self.0.into_inner() as f64 / SCALE as f64
	}

	pub const fn checked_add(self, rhs: Self) -> Result<Self, TimeOverflow> {
		match self.0.into_inner().checked_add(rhs.0.into_inner()) {
			Some(value) => Self::new(value),
			None => Err(TimeOverflow),
		}
	}

	pub const fn checked_sub(self, rhs: Self) -> Result<Self, TimeOverflow> {
		match self.0.into_inner().checked_sub(rhs.0.into_inner()) {
			Some(value) => Self::new(value),
			None => Err(TimeOverflow),
		}
	}

	/// Subtract, clamping at zero.
	pub const fn saturating_sub(self, rhs: Self) -> Self {
		match self.checked_sub(rhs) {
			Ok(time) => time,
			Err(_) => Self::ZERO,
		}
	}

	pub const fn is_zero(self) -> bool {
		self.0.into_inner() == 0
	}
}

impl<const SCALE: u64> TryFrom<std::time::Duration> for Timescale<SCALE> {
	type Error = TimeOverflow;

	fn try_from(duration: std::time::Duration) -> Result<Self, Self::Error> {
		let value = duration
			.as_nanos()
			.checked_mul(SCALE as u128)
			.ok_or(TimeOverflow)?
			/ 1_000_000_000;

		VarInt::from_u128(value).map(Self).ok_or(TimeOverflow)
	}
}

impl<const SCALE: u64> From<Timescale<SCALE>> for std::time::Duration {
	fn from(time: Timescale<SCALE>) -> Self {
		let nanos = time.as_scale(1_000_000_000);
		std::time::Duration::new((nanos / 1_000_000_000) as u64, (nanos % 1_000_000_000) as u32)
	}
}

impl<const SCALE: u64> std::fmt::Debug for Timescale<SCALE> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let micros = self.as_micros();

		// The largest unit without a fraction.
		if micros % 1_000_000 == 0 {
			write!(f, "{}s", micros / 1_000_000)
		} else if micros % 1_000 == 0 {
			write!(f, "{}ms", micros / 1_000)
		} else {
			write!(f, "{}µs", micros)
		}
	}
}

impl<const SCALE: u64> Encode for Timescale<SCALE> {
	fn encode<W: BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		self.0.encode(w)
	}
}

impl<const SCALE: u64> Decode for Timescale<SCALE> {
	fn decode<R: Buf>(r: &mut R) -> Result<Self, DecodeError> {
		Ok(Self(VarInt::decode(r)?))
	}
}
