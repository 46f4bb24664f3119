//! A jitter buffer for audio samples.
//!
//! Samples are written at the position given by their timestamp and read back as a continuous stream.
//! Reads return nothing until the buffer first overflows, which fills a whole latency window before playback.
//! After that the buffer never holds more than its capacity: old samples are evicted to make room.
//!
//! Indices only increase; they wrap only when indexing into storage.

use std::sync::Arc;

use parking_lot::Mutex;

use super::{decode_samples, AudioConfig};
use crate::{Error, Frame, Result, Timestamp};

/// A snapshot of the buffer, for monitoring.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Status {
	/// Samples per channel ready to be read.
	pub available: usize,

	/// The fraction of the capacity in use, from 0 to 1.
	pub utilization: f64,
}

struct Ring {
	sample_rate: u32,
	channels: Vec<Vec<f32>>,
	capacity: u64,

	write: u64,
	read: u64,
	refilling: bool,
}

impl Ring {
	fn new(config: &AudioConfig) -> Result<Self> {
		if config.sample_rate == 0 {
			return Err(Error::InvalidConfig("sample rate must be positive"));
		}

		if config.channel_count == 0 {
			return Err(Error::InvalidConfig("channel count must be positive"));
		}

		if config.latency.is_zero() {
			return Err(Error::InvalidConfig("latency must be positive"));
		}

		let capacity = (config.sample_rate as u128 * config.latency.as_nanos()).div_ceil(1_000_000_000);
		let capacity = usize::try_from(capacity).map_err(|_| Error::InvalidConfig("latency is too large"))?;

		Ok(Self {
			sample_rate: config.sample_rate,
			channels: vec![vec![0.0; capacity]; config.channel_count as usize],
			capacity: capacity as u64,
			write: 0,
			read: 0,
			refilling: true,
		})
	}

	fn position(&self, index: u64) -> usize {
		(index % self.capacity) as usize
	}

	fn fill(&mut self, index: u64, data: &[&[f32]], offset: usize) {
		let position = self.position(index);
		for (channel, storage) in self.channels.iter_mut().enumerate() {
			storage[position] = data
				.get(channel)
				.and_then(|samples| samples.get(offset))
				.copied()
				.unwrap_or(0.0);
		}
	}

	fn write(&mut self, timestamp: Timestamp, data: &[&[f32]]) {
		let samples = data.first().map_or(0, |channel| channel.len()) as u64;
		if samples == 0 {
			return;
		}

		// Round to the nearest sample.
		let start = (timestamp.as_micros() * self.sample_rate as u128 + 500_000) / 1_000_000;
		let Ok(mut start) = u64::try_from(start) else {
			tracing::warn!(?timestamp, "timestamp out of range");
			return;
		};

		let end = start.saturating_add(samples);
		if end <= self.read {
			tracing::trace!(start, end, read = self.read, "dropping late samples");
			return;
		}

		if end - self.read > self.capacity {
			let read = end - self.capacity;
			if self.refilling {
				tracing::debug!(available = self.write.saturating_sub(self.read), "buffer full, starting playback");
			} else {
				tracing::trace!(evicted = read - self.read, "buffer overflow");
			}

			self.read = read;
			self.refilling = false;
		}

		// Skip anything that was already played or evicted.
		let mut offset = 0;
		if start < self.read {
			offset = (self.read - start) as usize;
			start = self.read;
		}

		// Silence any gap since the last write.
		if start > self.write {
			for index in self.write.max(self.read)..start {
				self.fill(index, &[], 0);
			}
		}

		for index in start..end {
			self.fill(index, data, offset);
			offset += 1;
		}

		self.write = self.write.max(end);
	}

	fn read(&mut self, output: &mut [&mut [f32]]) -> usize {
		if self.refilling {
			return 0;
		}

		let wanted = output.iter().map(|channel| channel.len()).min().unwrap_or(0);
		let count = (self.write - self.read).min(wanted as u64) as usize;

		for (channel, out) in output.iter_mut().enumerate() {
			match self.channels.get(channel) {
				Some(storage) => {
					for (offset, sample) in out[..count].iter_mut().enumerate() {
						*sample = storage[((self.read + offset as u64) % self.capacity) as usize];
					}
				}
				None => out[..count].fill(0.0),
			}
		}

		self.read += count as u64;
		count
	}

	fn len(&self) -> usize {
		(self.write.saturating_sub(self.read)) as usize
	}
}

/// A buffer of audio samples per channel, indexed by timestamp.
#[derive(Default)]
pub struct AudioRingBuffer {
	ring: Option<Ring>,
}

impl AudioRingBuffer {
	pub fn new() -> Self {
		Self::default()
	}

	/// Allocate the buffer; the capacity is `ceil(sample_rate * latency)` samples per channel.
	pub fn initialize(&mut self, config: &AudioConfig) -> Result<()> {
		if self.ring.is_some() {
			return Err(Error::AlreadyInitialized);
		}

		let ring = Ring::new(config)?;
		tracing::debug!(?config, capacity = ring.capacity, "initialized audio buffer");

		self.ring = Some(ring);
		Ok(())
	}

	fn ring(&self) -> Result<&Ring> {
		self.ring.as_ref().ok_or(Error::NotInitialized)
	}

	fn ring_mut(&mut self) -> Result<&mut Ring> {
		self.ring.as_mut().ok_or(Error::NotInitialized)
	}

	/// Write one slice per channel, starting at the given timestamp.
	///
	/// Missing channels are written as silence.
	/// Samples that were already played are dropped.
	pub fn write(&mut self, timestamp: Timestamp, data: &[&[f32]]) -> Result<()> {
		self.ring_mut()?.write(timestamp, data);
		Ok(())
	}

	/// Write a frame of interleaved little-endian `f32` samples.
	pub fn write_frame(&mut self, frame: &Frame) -> Result<()> {
		let ring = self.ring_mut()?;

		let mut payload = frame.payload.clone();
		let channels = decode_samples(&mut payload, ring.channels.len())?;
		let channels: Vec<&[f32]> = channels.iter().map(Vec::as_slice).collect();

		ring.write(frame.timestamp, &channels);
		Ok(())
	}

	/// Fill each output channel, returning the number of samples written per channel.
	///
	/// Returns 0 until the buffer has filled up once. A short read means the buffer ran dry.
	pub fn read(&mut self, output: &mut [&mut [f32]]) -> Result<usize> {
		Ok(self.ring_mut()?.read(output))
	}

	pub fn status(&self) -> Status {
		match &self.ring {
			Some(ring) => {
				let available = ring.len();
				Status {
					available,
					utilization: available as f64 / ring.capacity as f64,
				}
			}
			None => Status::default(),
		}
	}

	/// The number of samples per channel waiting to be read.
	pub fn len(&self) -> usize {
		self.ring.as_ref().map_or(0, Ring::len)
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// The capacity in samples per channel.
	pub fn capacity(&self) -> Result<usize> {
		Ok(self.ring()?.capacity as usize)
	}

	pub fn is_refilling(&self) -> Result<bool> {
		Ok(self.ring()?.refilling)
	}
}

/// An [AudioRingBuffer] shared between a producer and an audio callback on another thread.
#[derive(Clone, Default)]
pub struct SharedRingBuffer {
	inner: Arc<Mutex<AudioRingBuffer>>,
}

impl SharedRingBuffer {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn initialize(&self, config: &AudioConfig) -> Result<()> {
		self.inner.lock().initialize(config)
	}

	pub fn write(&self, timestamp: Timestamp, data: &[&[f32]]) -> Result<()> {
		self.inner.lock().write(timestamp, data)
	}

	pub fn write_frame(&self, frame: &Frame) -> Result<()> {
		self.inner.lock().write_frame(frame)
	}

	pub fn read(&self, output: &mut [&mut [f32]]) -> Result<usize> {
		self.inner.lock().read(output)
	}

	pub fn status(&self) -> Status {
		self.inner.lock().status()
	}

	pub fn is_refilling(&self) -> Result<bool> {
		self.inner.lock().is_refilling()
	}
}

#[cfg(test)]
mod tests {
	use std::time::Duration;

	use super::*;
	use crate::audio::encode_samples;

	// One sample per millisecond keeps timestamps readable.
	fn mono(capacity_ms: u64) -> AudioRingBuffer {
		let mut buffer = AudioRingBuffer::new();
		buffer
			.initialize(&AudioConfig {
				sample_rate: 1_000,
				channel_count: 1,
				latency: Duration::from_millis(capacity_ms),
			})
			.unwrap();
		buffer
	}

	fn at(millis: u64) -> Timestamp {
		Timestamp::from_millis(millis).unwrap()
	}

	fn ramp(start: usize, count: usize) -> Vec<f32> {
		(start..start + count).map(|i| i as f32).collect()
	}

	fn write(buffer: &mut AudioRingBuffer, millis: u64, samples: &[f32]) {
		buffer.write(at(millis), &[samples]).unwrap();
	}

	fn read(buffer: &mut AudioRingBuffer, count: usize) -> Vec<f32> {
		let mut out = vec![-1.0; count];
		let n = buffer.read(&mut [out.as_mut_slice()]).unwrap();
		out.truncate(n);
		out
	}

	#[test]
	fn test_initialize() {
		let mut buffer = AudioRingBuffer::new();
		let samples = [1.0];
		assert!(matches!(buffer.capacity(), Err(Error::NotInitialized)));
		assert!(matches!(buffer.write(at(0), &[&samples[..]]), Err(Error::NotInitialized)));
		assert!(matches!(buffer.read(&mut []), Err(Error::NotInitialized)));
		assert_eq!(buffer.status(), Status::default());

		buffer.initialize(&AudioConfig::default()).unwrap();
		assert_eq!(buffer.capacity().unwrap(), 4800);
		assert!(buffer.is_refilling().unwrap());
		assert!(matches!(
			buffer.initialize(&AudioConfig::default()),
			Err(Error::AlreadyInitialized)
		));
	}

	#[test]
	fn test_invalid_config() {
		let invalid = [
			AudioConfig {
				sample_rate: 0,
				..Default::default()
			},
			AudioConfig {
				channel_count: 0,
				..Default::default()
			},
			AudioConfig {
				latency: Duration::ZERO,
				..Default::default()
			},
		];

		for config in invalid {
			let mut buffer = AudioRingBuffer::new();
			assert!(matches!(buffer.initialize(&config), Err(Error::InvalidConfig(_))));

			// A failed initialize can be retried.
			buffer.initialize(&AudioConfig::default()).unwrap();
		}
	}

	#[test]
	fn test_capacity_rounds_up() {
		let mut buffer = AudioRingBuffer::new();
		buffer
			.initialize(&AudioConfig {
				sample_rate: 44_100,
				channel_count: 1,
				latency: Duration::from_micros(100),
			})
			.unwrap();

		// 4.41 samples
		assert_eq!(buffer.capacity().unwrap(), 5);
	}

	#[test]
	fn test_contiguous_writes() {
		let mut buffer = AudioRingBuffer::new();
		buffer.initialize(&AudioConfig::default()).unwrap();

		let samples = [0.5; 10];
		buffer.write(Timestamp::ZERO, &[&samples[..], &samples[..]]).unwrap();
		assert_eq!(buffer.len(), 10);

		// 10 samples at 48kHz is 208.3µs
		let next = Timestamp::from_micros(208).unwrap();
		buffer.write(next, &[&samples[..], &samples[..]]).unwrap();
		assert_eq!(buffer.len(), 20);

		// Still filling up.
		let mut left = [0.0; 20];
		let mut right = [0.0; 20];
		assert_eq!(buffer.read(&mut [&mut left[..], &mut right[..]]).unwrap(), 0);
		assert_eq!(buffer.len(), 20);
	}

	#[test]
	fn test_gap_is_silent() {
		let mut buffer = mono(100);

		write(&mut buffer, 0, &ramp(1, 10));
		write(&mut buffer, 20, &ramp(21, 10));
		assert_eq!(buffer.len(), 30);

		// One more sample overflows, evicting the first.
		write(&mut buffer, 100, &[100.0]);
		assert!(!buffer.is_refilling().unwrap());
		assert_eq!(buffer.len(), 100);

		let out = read(&mut buffer, 40);
		assert_eq!(out[..9], ramp(2, 9)[..]);
		assert_eq!(out[9..19], [0.0; 10]);
		assert_eq!(out[19..29], ramp(21, 10)[..]);
		assert_eq!(out[29..], [0.0; 11]);
	}

	#[test]
	fn test_eviction_ends_refill() {
		let mut buffer = mono(100);

		write(&mut buffer, 0, &ramp(0, 100));
		assert_eq!(buffer.len(), 100);
		assert!(buffer.is_refilling().unwrap());
		assert!(read(&mut buffer, 10).is_empty());

		write(&mut buffer, 100, &ramp(100, 10));
		assert!(!buffer.is_refilling().unwrap());
		assert_eq!(buffer.len(), 100);

		// The oldest 10 samples were evicted.
		assert_eq!(read(&mut buffer, 5), ramp(10, 5));
		assert_eq!(buffer.status().available, 95);
	}

	#[test]
	fn test_wrap_around() {
		let mut buffer = mono(100);
		write(&mut buffer, 0, &ramp(0, 101));
		assert_eq!(read(&mut buffer, 100), ramp(1, 100));

		// These straddle the end of storage.
		write(&mut buffer, 101, &ramp(101, 60));
		assert_eq!(read(&mut buffer, 30), ramp(101, 30));
		write(&mut buffer, 161, &ramp(161, 60));
		assert_eq!(read(&mut buffer, 200), ramp(131, 90));

		// Ran dry.
		assert!(read(&mut buffer, 10).is_empty());
	}

	#[test]
	fn test_late_writes_dropped() {
		let mut buffer = mono(100);
		write(&mut buffer, 0, &ramp(0, 150));
		assert_eq!(buffer.len(), 100);

		write(&mut buffer, 10, &ramp(0, 20));
		assert_eq!(buffer.len(), 100);
		assert_eq!(read(&mut buffer, 1), [50.0]);
	}

	#[test]
	fn test_prefix_trimmed() {
		let mut buffer = mono(100);
		write(&mut buffer, 0, &ramp(0, 150));
		assert_eq!(read(&mut buffer, 90), ramp(50, 90));

		// Straddles the read index: only the unread part lands.
		write(&mut buffer, 130, &ramp(1000, 30));
		assert_eq!(buffer.len(), 20);
		assert_eq!(read(&mut buffer, 30), ramp(1010, 20));
	}

	#[test]
	fn test_missing_channel_is_silent() {
		let mut buffer = AudioRingBuffer::new();
		buffer
			.initialize(&AudioConfig {
				sample_rate: 1_000,
				channel_count: 2,
				latency: Duration::from_millis(10),
			})
			.unwrap();
		write(&mut buffer, 0, &ramp(1, 11));

		let mut left = [-1.0; 10];
		let mut right = [-1.0; 10];
		assert_eq!(buffer.read(&mut [&mut left[..], &mut right[..]]).unwrap(), 10);
		assert_eq!(left[..], ramp(2, 10)[..]);
		assert_eq!(right, [0.0; 10]);
	}

	#[test]
	fn test_write_frame() {
		let shared = SharedRingBuffer::new();
		shared
			.initialize(&AudioConfig {
				sample_rate: 1_000,
				channel_count: 2,
				latency: Duration::from_millis(4),
			})
			.unwrap();

		let left = [1.0, 2.0, 3.0, 4.0, 5.0];
		let right = [-1.0, -2.0, -3.0, -4.0, -5.0];
		let frame = Frame::new(at(0), true, encode_samples(&[&left[..], &right[..]]));
		shared.write_frame(&frame).unwrap();

		let status = shared.status();
		assert_eq!(status.available, 4);
		assert_eq!(status.utilization, 1.0);

		let reader = shared.clone();
		let handle = std::thread::spawn(move || {
			let mut left = [0.0; 4];
			let mut right = [0.0; 4];
			let n = reader.read(&mut [&mut left[..], &mut right[..]]).unwrap();
			(n, left, right)
		});

		let (n, left, right) = handle.join().unwrap();
		assert_eq!(n, 4);
		assert_eq!(left, [2.0, 3.0, 4.0, 5.0]);
		assert_eq!(right, [-2.0, -3.0, -4.0, -5.0]);
	}
}
