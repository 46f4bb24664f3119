use std::{collections::BTreeSet, time::Duration};

use bytes::Bytes;
use clap::Args;
use hang_watch::{ConsumerConfig, Frame, Timestamp, TrackConsumer, TrackProducer};
use moq_transport::Track;
use tokio::time::Instant;

use crate::Network;

#[derive(Args, Clone, Debug)]
pub struct VideoArgs {
	#[command(flatten)]
	pub network: Network,

	/// The number of groups to publish.
	#[arg(long, default_value_t = 10)]
	pub groups: u32,

	/// The number of frames in each group, starting with a keyframe.
	#[arg(long, default_value_t = 30)]
	pub frames: u32,

	#[arg(long, default_value_t = 30)]
	pub fps: u32,

	/// The size of each frame payload in bytes.
	#[arg(long, default_value_t = 1200)]
	pub size: usize,
}

pub async fn run(args: VideoArgs) -> anyhow::Result<()> {
	anyhow::ensure!(args.fps > 0 && args.frames > 0, "fps and frames must be positive");

	let source = Track::new("video").produce();
	let dest = Track::new("video").produce();

	let start = Instant::now();
	let consumer = TrackConsumer::with_config(
		dest.consumer,
		ConsumerConfig {
			latency: args.network.latency,
		},
	);

	let (published, _, stats) = tokio::try_join!(
		publish(source.producer.into(), &args),
		args.network.run(source.consumer, dest.producer),
		consume(consumer, start),
	)?;

	let skipped: Vec<u64> = (0..published).filter(|group| !stats.groups.contains(group)).collect();
	tracing::info!(published, frames = stats.frames, ?skipped, max_delay = ?stats.max_delay, "done");

	Ok(())
}

async fn publish(mut track: TrackProducer, args: &VideoArgs) -> anyhow::Result<u64> {
	let frame_duration = Duration::from_secs(1) / args.fps;
	let payload = Bytes::from(vec![0u8; args.size]);

	let mut interval = tokio::time::interval(frame_duration);

	for index in 0..args.groups * args.frames {
		interval.tick().await;

		let timestamp = Timestamp::try_from(frame_duration * index)?;
		let keyframe = index % args.frames == 0;
		track.write(Frame::new(timestamp, keyframe, payload.clone()))?;
	}

	track.close()?;
	Ok(args.groups as u64)
}

#[derive(Default)]
struct Stats {
	groups: BTreeSet<u64>,
	frames: u64,
	max_delay: Duration,
}

async fn consume(mut consumer: TrackConsumer, start: Instant) -> anyhow::Result<Stats> {
	let mut stats = Stats::default();

	while let Some(frame) = consumer.read_frame().await? {
		// How late the frame is compared to a perfect network.
		let delay = Instant::now().saturating_duration_since(start + Duration::from(frame.timestamp));

		tracing::info!(group = frame.group, timestamp = ?frame.timestamp, keyframe = frame.keyframe, ?delay, "frame");

		stats.groups.insert(frame.group);
		stats.frames += 1;
		stats.max_delay = stats.max_delay.max(delay);
	}

	Ok(stats)
}
