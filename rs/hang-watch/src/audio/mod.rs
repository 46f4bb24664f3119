//! Audio playback: a jitter buffer between the network and an audio callback.

mod ring_buffer;
mod samples;

pub use ring_buffer::*;
pub use samples::*;

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
	/// Samples per second, per channel.
	pub sample_rate: u32,
	pub channel_count: u32,

	/// The amount of audio buffered before playback starts, and the most that is ever buffered.
	#[serde(with = "humantime_serde")]
	pub latency: Duration,
}

impl Default for AudioConfig {
	fn default() -> Self {
		Self {
			sample_rate: 48_000,
			channel_count: 2,
			latency: Duration::from_millis(100),
		}
	}
}
