use std::{f32::consts::TAU, time::Duration};

use clap::Args;
use hang_watch::{
	audio::{encode_samples, AudioConfig, SharedRingBuffer},
	Frame, Timestamp, TrackConsumer, TrackProducer,
};
use moq_transport::Track;

use crate::Network;

#[derive(Args, Clone, Debug)]
pub struct AudioArgs {
	#[command(flatten)]
	pub network: Network,

	#[arg(long, default_value_t = 48_000)]
	pub sample_rate: u32,

	#[arg(long, default_value_t = 2)]
	pub channels: u32,

	/// The frequency of the tone in Hz.
	#[arg(long, default_value_t = 440.0)]
	pub frequency: f32,

	/// The duration of each published frame.
	#[arg(long, default_value = "20ms", value_parser = humantime::parse_duration)]
	pub frame: Duration,

	/// The total duration to publish.
	#[arg(long, default_value = "5s", value_parser = humantime::parse_duration)]
	pub duration: Duration,

	/// The size of the jitter buffer.
	#[arg(long, default_value = "100ms", value_parser = humantime::parse_duration)]
	pub buffer: Duration,

	/// How much audio the playback callback pulls at a time.
	#[arg(long, default_value = "10ms", value_parser = humantime::parse_duration)]
	pub chunk: Duration,
}

impl AudioArgs {
	fn config(&self) -> AudioConfig {
		AudioConfig {
			sample_rate: self.sample_rate,
			channel_count: self.channels,
			latency: self.buffer,
		}
	}

	fn samples(&self, duration: Duration) -> usize {
		(duration.as_secs_f64() * self.sample_rate as f64).round() as usize
	}
}

pub async fn run(args: AudioArgs) -> anyhow::Result<()> {
	let buffer = SharedRingBuffer::new();
	buffer.initialize(&args.config())?;

	let source = Track::new("audio").produce();
	let dest = Track::new("audio").produce();
	let consumer = TrackConsumer::new(dest.consumer, args.network.latency);

	let playback = tokio::spawn(playback(buffer.clone(), args.clone()));

	tokio::try_join!(
		publish(source.producer.into(), &args),
		args.network.run(source.consumer, dest.producer),
		consume(consumer, buffer),
	)?;

	let stats = playback.await?;
	tracing::info!(
		played = stats.played,
		short = stats.short,
		silent = stats.silent,
		"done"
	);

	Ok(())
}

async fn publish(mut track: TrackProducer, args: &AudioArgs) -> anyhow::Result<()> {
	anyhow::ensure!(!args.frame.is_zero(), "frame duration must be positive");

	let per_frame = args.samples(args.frame);
	let mut interval = tokio::time::interval(args.frame);
	let mut written = 0;

	while written < args.samples(args.duration) {
		interval.tick().await;

		let tone: Vec<f32> = (written..written + per_frame)
			.map(|index| (TAU * args.frequency * index as f32 / args.sample_rate as f32).sin() * 0.5)
			.collect();
		let channels = vec![tone.as_slice(); args.channels as usize];

		let timestamp = Timestamp::from_scale(written as u64, args.sample_rate as u64)?;

		// Every audio frame can be decoded on its own, so each is a group.
		track.write(Frame::new(timestamp, true, encode_samples(&channels)))?;
		written += per_frame;
	}

	track.close()?;
	Ok(())
}

async fn consume(mut consumer: TrackConsumer, buffer: SharedRingBuffer) -> anyhow::Result<()> {
	while let Some(frame) = consumer.read_frame().await? {
		tracing::trace!(group = frame.group, timestamp = ?frame.timestamp, "audio frame");
		buffer.write_frame(&frame)?;
	}

	Ok(())
}

#[derive(Debug, Default)]
struct Playback {
	played: usize,
	short: usize,
	silent: usize,
}

// Pull fixed size chunks on a timer, the same way an audio callback would.
async fn playback(buffer: SharedRingBuffer, args: AudioArgs) -> Playback {
	let chunk = args.samples(args.chunk).max(1);
	let mut output = vec![vec![0.0; chunk]; args.channels as usize];
	let mut interval = tokio::time::interval(args.chunk.max(Duration::from_millis(1)));

	let mut stats = Playback::default();
	let mut refilling = true;

	// Stop once everything was published and played.
	let deadline = tokio::time::Instant::now() + args.duration + args.buffer * 2 + args.network.latency;

	while tokio::time::Instant::now() < deadline {
		interval.tick().await;

		let mut slices: Vec<&mut [f32]> = output.iter_mut().map(Vec::as_mut_slice).collect();
		let count = match buffer.read(&mut slices) {
			Ok(count) => count,
			Err(err) => {
				tracing::warn!(%err, "playback failed");
				break;
			}
		};

		let status = buffer.status();
		let now_refilling = buffer.is_refilling().unwrap_or(true);
		if refilling && !now_refilling {
			tracing::info!(available = status.available, "playback started");
		}
		refilling = now_refilling;

		if refilling {
			stats.silent += 1;
		} else if count < chunk {
			tracing::debug!(count, chunk, utilization = status.utilization, "short read");
			stats.short += 1;
		}

		stats.played += count;
		tracing::trace!(count, available = status.available, utilization = status.utilization, "pulled audio");
	}

	stats
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test(start_paused = true)]
	async fn test_tone_plays() {
		let args = AudioArgs {
			network: Network {
				latency: Duration::from_millis(500),
				jitter: Duration::ZERO,
				stall: None,
				stall_duration: Duration::ZERO,
			},
			sample_rate: 1_000,
			channels: 1,
			frequency: 100.0,
			frame: Duration::from_millis(20),
			duration: Duration::from_millis(400),
			buffer: Duration::from_millis(100),
			chunk: Duration::from_millis(10),
		};

		let buffer = SharedRingBuffer::new();
		buffer.initialize(&args.config()).unwrap();

		let source = Track::new("audio").produce();
		let dest = Track::new("audio").produce();
		let consumer = TrackConsumer::new(dest.consumer, args.network.latency);

		let playback = tokio::spawn(playback(buffer.clone(), args.clone()));

		tokio::try_join!(
			publish(source.producer.into(), &args),
			args.network.run(source.consumer, dest.producer),
			consume(consumer, buffer.clone()),
		)
		.unwrap();

		let stats = playback.await.unwrap();
		assert!(!buffer.is_refilling().unwrap());
		assert!(stats.played > 0);
		assert!(stats.silent > 0);
	}
}
