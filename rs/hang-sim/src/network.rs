use std::time::Duration;

use clap::Args;
use moq_transport::{
	coding::{Reader, Writer},
	ietf::{self, GroupFlags, GroupHeader},
	GroupConsumer, TrackConsumer, TrackProducer,
};
use rand::Rng;
use tokio::task::JoinSet;

/// How groups are delayed on their way to the consumer.
#[derive(Args, Clone, Debug)]
pub struct Network {
	/// The latency budget of the consumer; older groups are skipped.
	#[arg(long, default_value = "500ms", value_parser = humantime::parse_duration)]
	pub latency: Duration,

	/// Each group is delayed by a random amount up to this.
	#[arg(long, default_value = "0ms", value_parser = humantime::parse_duration)]
	pub jitter: Duration,

	/// Delay this group sequence number by --stall-duration.
	#[arg(long)]
	pub stall: Option<u64>,

	#[arg(long, default_value = "2s", value_parser = humantime::parse_duration)]
	pub stall_duration: Duration,
}

impl Network {
	fn delay(&self, sequence: u64) -> Duration {
		let mut delay = Duration::ZERO;

		if !self.jitter.is_zero() {
			let jitter = rand::rng().random_range(0..=self.jitter.as_micros() as u64);
			delay += Duration::from_micros(jitter);
		}

		if self.stall == Some(sequence) {
			delay += self.stall_duration;
		}

		delay
	}

	/// Forward every group from `source` to `dest`, each over its own simulated stream.
	pub async fn run(&self, mut source: TrackConsumer, mut dest: TrackProducer) -> anyhow::Result<()> {
		let mut tasks = JoinSet::new();

		while let Some(group) = source.next_group().await? {
			let delay = self.delay(group.info.sequence);
			if !delay.is_zero() {
				tracing::debug!(group = group.info.sequence, ?delay, "delaying group");
			}

			let track = dest.clone();
			tasks.spawn(async move {
				tokio::time::sleep(delay).await;
				deliver(group, track).await
			});
		}

		while let Some(res) = tasks.join_next().await {
			if let Err(err) = res? {
				tracing::warn!(%err, "failed to deliver group");
			}
		}

		dest.close()?;
		Ok(())
	}
}

// Send a group over an in-memory stream and decode it on the other side.
async fn deliver(group: GroupConsumer, mut track: TrackProducer) -> Result<(), moq_transport::Error> {
	let header = GroupHeader {
		flags: GroupFlags {
			has_end: false,
			..Default::default()
		},
		track_alias: 0,
		group_id: group.info.sequence,
		sub_group_id: 0,
		publisher_priority: track.info.priority,
	};

	let (client, server) = tokio::io::duplex(64 * 1024);

	let send = async move {
		let mut writer = Writer::new(client);
		ietf::send_group(&mut writer, header, group).await
	};

	let recv = async {
		let mut reader = Reader::new(server);
		ietf::recv_group(&mut reader, &mut track).await
	};

	let (sent, received) = tokio::join!(send, recv);
	if let Err(err) = &sent {
		tracing::debug!(%err, group = header.group_id, "group aborted by publisher");
	}

	received?;
	Ok(())
}
