//! Merges the groups of a track into a single stream of frames, bounded by a latency budget.
//!
//! Every group is read by its own task so a stalled group never blocks a newer one.
//! Frames are emitted from the oldest group first. The oldest group is skipped once its
//! next frame lags the newest timestamp seen on any group by more than the latency budget.

use std::{
	collections::{BTreeMap, VecDeque},
	ops::Deref,
	time::Duration,
};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::{Frame, GroupConsumer, Result, Timestamp};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsumerConfig {
	/// The maximum lag before an old group is skipped.
	#[serde(with = "humantime_serde")]
	pub latency: Duration,
}

impl Default for ConsumerConfig {
	fn default() -> Self {
		Self {
			latency: Duration::from_millis(500),
		}
	}
}

/// A frame along with the sequence number of its group.
#[derive(Clone, Debug)]
pub struct OrderedFrame {
	pub group: u64,
	pub frame: Frame,
}

impl Deref for OrderedFrame {
	type Target = Frame;

	fn deref(&self) -> &Self::Target {
		&self.frame
	}
}

enum Event {
	Group { sequence: u64, cancel: CancellationToken },
	Frame { sequence: u64, frame: Frame },
	GroupDone { sequence: u64 },
	TrackDone(Result<()>),
}

struct GroupReader {
	buffered: VecDeque<Frame>,

	// The timestamp of the last emitted frame.
	last: Option<Timestamp>,

	// The group was closed or aborted; anything left is buffered.
	done: bool,

	// Stops the reader task when this is removed.
	_guard: DropGuard,
}

impl GroupReader {
	fn new(cancel: CancellationToken) -> Self {
		Self {
			buffered: VecDeque::new(),
			last: None,
			done: false,
			_guard: cancel.drop_guard(),
		}
	}
}

/// Cancels a [TrackConsumer] from anywhere.
#[derive(Clone)]
pub struct Closer {
	cancel: CancellationToken,
}

impl Closer {
	pub fn close(&self) {
		self.cancel.cancel();
	}
}

/// Reads a track as a single ordered stream of frames.
///
/// Must be created within a tokio runtime; the reader tasks stop when this is dropped.
pub struct TrackConsumer {
	pub info: moq_transport::Track,

	latency: Duration,
	events: mpsc::UnboundedReceiver<Event>,
	readers: BTreeMap<u64, GroupReader>,

	// The largest timestamp received on any group.
	newest: Option<Timestamp>,

	// Groups below this were emitted or skipped already.
	floor: u64,

	// How the track ended, returned once every reader is drained.
	ended: Option<Result<()>>,

	cancel: CancellationToken,
	_guard: DropGuard,
}

impl TrackConsumer {
	pub fn new(track: moq_transport::TrackConsumer, latency: Duration) -> Self {
		Self::with_config(track, ConsumerConfig { latency })
	}

	pub fn with_config(track: moq_transport::TrackConsumer, config: ConsumerConfig) -> Self {
		let cancel = CancellationToken::new();
		let (tx, events) = mpsc::unbounded_channel();
		let info = track.info.clone();

		tracing::debug!(track = %info.name, latency = ?config.latency, "consuming track");
		web_async::spawn(run_track(track, tx, cancel.clone()));

		Self {
			info,
			latency: config.latency,
			events,
			readers: BTreeMap::new(),
			newest: None,
			floor: 0,
			ended: None,
			_guard: cancel.clone().drop_guard(),
			cancel,
		}
	}

	/// Return the next frame in group order, or None when the track ends or is closed.
	///
	/// This is cancel safe.
	pub async fn read_frame(&mut self) -> Result<Option<OrderedFrame>> {
		loop {
			if self.cancel.is_cancelled() {
				return Ok(None);
			}

			while let Ok(event) = self.events.try_recv() {
				self.apply(event);
			}

			if let Some(frame) = self.next_buffered() {
				tracing::trace!(group = frame.group, timestamp = ?frame.timestamp, keyframe = frame.keyframe, "emit frame");
				return Ok(Some(frame));
			}

			if self.readers.is_empty() {
				if let Some(ended) = &self.ended {
					return ended.clone().map(|_| None);
				}
			}

			tokio::select! {
				biased;
				_ = self.cancel.cancelled() => return Ok(None),
				event = self.events.recv() => match event {
					Some(event) => self.apply(event),
					None => self.disconnected(),
				},
			}
		}
	}

	/// Stop reading; pending and future reads return None.
	pub fn close(&mut self) {
		self.cancel.cancel();
		self.readers.clear();
	}

	pub fn closer(&self) -> Closer {
		Closer {
			cancel: self.cancel.clone(),
		}
	}

	pub fn latency(&self) -> Duration {
		self.latency
	}

	pub fn set_latency(&mut self, latency: Duration) {
		self.latency = latency;
	}

	fn apply(&mut self, event: Event) {
		match event {
			Event::Group { sequence, cancel } => {
				if sequence < self.floor {
					tracing::debug!(group = sequence, floor = self.floor, "discarding old group");
					cancel.cancel();
					return;
				}

				self.readers.insert(sequence, GroupReader::new(cancel));
			}
			Event::Frame { sequence, frame } => {
				let Some(reader) = self.readers.get_mut(&sequence) else {
					return;
				};

				self.newest = Some(match self.newest {
					Some(newest) => newest.max(frame.timestamp),
					None => frame.timestamp,
				});
				reader.buffered.push_back(frame);
			}
			Event::GroupDone { sequence } => {
				if let Some(reader) = self.readers.get_mut(&sequence) {
					reader.done = true;
				}
			}
			Event::TrackDone(res) => self.ended = Some(res),
		}
	}

	// Every task has exited, so nothing else will arrive.
	fn disconnected(&mut self) {
		for reader in self.readers.values_mut() {
			reader.done = true;
		}

		self.ended.get_or_insert(Ok(()));
	}

	fn next_buffered(&mut self) -> Option<OrderedFrame> {
		loop {
			let mut readers = self.readers.iter_mut();
			let (&sequence, oldest) = readers.next()?;
			let mut newer = readers.map(|(_, reader)| reader).peekable();

			// The newest group is never skipped.
			let lag = match self.newest {
				Some(newest) if newer.peek().is_some() => oldest
					.buffered
					.front()
					.map(|frame| frame.timestamp)
					.or(oldest.last)
					// A group that never produced anything is measured against the oldest newer frame.
					.or_else(|| newer.find_map(|reader| reader.buffered.front().map(|frame| frame.timestamp)))
					.map(|reference| Duration::from(newest.saturating_sub(reference))),
				_ => None,
			};

			if let Some(lag) = lag.filter(|lag| *lag > self.latency) {
				tracing::debug!(group = sequence, ?lag, latency = ?self.latency, "skipping slow group");
				self.readers.remove(&sequence);
				self.floor = self.floor.max(sequence.saturating_add(1));
				continue;
			}

			if let Some(frame) = oldest.buffered.pop_front() {
				oldest.last = Some(frame.timestamp);
				self.floor = self.floor.max(sequence);
				return Some(OrderedFrame { group: sequence, frame });
			}

			if oldest.done {
				tracing::trace!(group = sequence, "group finished");
				self.readers.remove(&sequence);
				continue;
			}

			// Wait for the oldest group to produce a frame or fall behind.
			return None;
		}
	}
}

async fn run_track(mut track: moq_transport::TrackConsumer, tx: mpsc::UnboundedSender<Event>, cancel: CancellationToken) {
	loop {
		let group = tokio::select! {
			biased;
			_ = cancel.cancelled() => return,
			group = track.next_group() => group,
		};

		match group {
			Ok(Some(group)) => {
				let sequence = group.info.sequence;
				let cancel = cancel.child_token();

				// Announce before spawning so no frame can arrive first.
				let event = Event::Group {
					sequence,
					cancel: cancel.clone(),
				};
				if tx.send(event).is_err() {
					return;
				}

				web_async::spawn(run_group(group.into(), tx.clone(), cancel));
			}
			Ok(None) => {
				tx.send(Event::TrackDone(Ok(()))).ok();
				return;
			}
			Err(err) => {
				tracing::debug!(%err, track = %track.info.name, "track error");
				tx.send(Event::TrackDone(Err(err.into()))).ok();
				return;
			}
		}
	}
}

async fn run_group(mut group: GroupConsumer, tx: mpsc::UnboundedSender<Event>, cancel: CancellationToken) {
	let sequence = group.info.sequence;

	loop {
		let frame = tokio::select! {
			biased;
			_ = cancel.cancelled() => return,
			frame = group.read_frame() => frame,
		};

		match frame {
			Ok(Some(frame)) => {
				if tx.send(Event::Frame { sequence, frame }).is_err() {
					return;
				}
			}
			Ok(None) => break,
			Err(err) => {
				// Treated the same as a finished group.
				tracing::debug!(%err, group = sequence, "group aborted");
				break;
			}
		}
	}

	tx.send(Event::GroupDone { sequence }).ok();
}

#[cfg(test)]
mod tests {
	use futures::FutureExt;
	use moq_transport::{Group, GroupProducer, Track};

	use super::*;
	use crate::Error;

	fn write(group: &mut GroupProducer, millis: u64) {
		let frame = Frame::new(Timestamp::from_millis(millis).unwrap(), false, &b"frame"[..]);
		frame.encode(group).unwrap();
	}

	fn group(track: &mut moq_transport::TrackProducer, timestamps: &[u64]) -> GroupProducer {
		let mut group = track.append_group().unwrap();
		for millis in timestamps {
			write(&mut group, *millis);
		}
		group
	}

	async fn expect(consumer: &mut TrackConsumer, group: u64, millis: u128, keyframe: bool) {
		let frame = consumer.read_frame().await.unwrap().expect("track ended");
		assert_eq!(frame.group, group);
		assert_eq!(frame.timestamp.as_millis(), millis);
		assert_eq!(frame.keyframe, keyframe);
	}

	async fn buffer() {
		tokio::time::sleep(Duration::from_millis(10)).await;
	}

	#[tokio::test(start_paused = true)]
	async fn test_single_group() {
		let mut track = Track::new("video").produce();
		group(&mut track.producer, &[1000, 2000, 3000]).close().unwrap();

		let mut consumer = TrackConsumer::new(track.consumer, Duration::from_secs(10));
		expect(&mut consumer, 0, 1000, true).await;
		expect(&mut consumer, 0, 2000, false).await;
		expect(&mut consumer, 0, 3000, false).await;

		track.producer.close().unwrap();
		assert!(consumer.read_frame().await.unwrap().is_none());
	}

	#[tokio::test(start_paused = true)]
	async fn test_group_order() {
		let mut track = Track::new("video").produce();
		let mut consumer = TrackConsumer::new(track.consumer, Duration::from_secs(10));

		group(&mut track.producer, &[1000, 2000]).close().unwrap();
		group(&mut track.producer, &[3000, 4000]).close().unwrap();
		buffer().await;

		expect(&mut consumer, 0, 1000, true).await;
		expect(&mut consumer, 0, 2000, false).await;
		expect(&mut consumer, 1, 3000, true).await;
		expect(&mut consumer, 1, 4000, false).await;
	}

	#[tokio::test(start_paused = true)]
	async fn test_skip_stale_group() {
		let mut track = Track::new("video").produce();
		let mut consumer = TrackConsumer::new(track.consumer, Duration::from_millis(100));

		let _old = group(&mut track.producer, &[1000, 2000, 3000]);
		let _new = group(&mut track.producer, &[5000, 6000]);
		buffer().await;

		expect(&mut consumer, 1, 5000, true).await;
		expect(&mut consumer, 1, 6000, false).await;
	}

	#[tokio::test(start_paused = true)]
	async fn test_skip_stalled_groups() {
		let mut track = Track::new("video").produce();
		let mut consumer = TrackConsumer::new(track.consumer, Duration::from_millis(100));

		// Two groups that never produce a frame, followed by one that does.
		let _first = track.producer.append_group().unwrap();
		let _second = track.producer.append_group().unwrap();
		let timestamps: Vec<u64> = (0..50).map(|index| 10_000 + index * 100).collect();
		let _flowing = group(&mut track.producer, &timestamps);
		buffer().await;

		let frame = tokio::time::timeout(Duration::from_secs(5), consumer.read_frame())
			.await
			.expect("blocked behind stalled groups")
			.unwrap()
			.unwrap();
		assert_eq!(frame.group, 2);
		assert_eq!(frame.timestamp.as_millis(), 10_000);
		assert!(frame.keyframe);

		for millis in timestamps.iter().skip(1) {
			expect(&mut consumer, 2, *millis as u128, false).await;
		}
	}

	#[tokio::test(start_paused = true)]
	async fn test_skip_boundary() {
		let mut track = Track::new("video").produce();
		let mut consumer = TrackConsumer::new(track.consumer, Duration::from_millis(100));

		let mut old = group(&mut track.producer, &[1000]);
		buffer().await;
		expect(&mut consumer, 0, 1000, true).await;

		// Exactly at the budget: keep waiting for the old group.
		let mut new = group(&mut track.producer, &[1100]);
		let pending = tokio::time::timeout(Duration::from_millis(50), consumer.read_frame()).await;
		assert!(pending.is_err());

		// Over budget: the old group is abandoned for good.
		write(&mut new, 1101);
		expect(&mut consumer, 1, 1100, true).await;
		expect(&mut consumer, 1, 1101, false).await;

		write(&mut old, 1050);
		old.close().unwrap();
		new.close().unwrap();
		track.producer.close().unwrap();
		assert!(consumer.read_frame().await.unwrap().is_none());
	}

	#[tokio::test(start_paused = true)]
	async fn test_set_latency() {
		let mut track = Track::new("video").produce();
		let mut consumer = TrackConsumer::new(track.consumer, Duration::from_secs(10));

		let _old = group(&mut track.producer, &[1000]);
		let _new = group(&mut track.producer, &[3000]);
		buffer().await;

		consumer.set_latency(Duration::from_secs(1));
		assert_eq!(consumer.latency(), Duration::from_secs(1));
		expect(&mut consumer, 1, 3000, true).await;
	}

	#[tokio::test(start_paused = true)]
	async fn test_empty_group() {
		let mut track = Track::new("video").produce();
		group(&mut track.producer, &[]).close().unwrap();
		group(&mut track.producer, &[1000]).close().unwrap();

		let mut consumer = TrackConsumer::new(track.consumer, Duration::from_secs(10));
		expect(&mut consumer, 1, 1000, true).await;
	}

	#[tokio::test(start_paused = true)]
	async fn test_aborted_group() {
		let mut track = Track::new("video").produce();
		group(&mut track.producer, &[1000]).abort(moq_transport::Error::App(1));
		group(&mut track.producer, &[2000]).close().unwrap();
		track.producer.close().unwrap();

		let mut consumer = TrackConsumer::new(track.consumer, Duration::from_secs(10));
		expect(&mut consumer, 1, 2000, true).await;
		assert!(consumer.read_frame().await.unwrap().is_none());
	}

	#[tokio::test(start_paused = true)]
	async fn test_old_group_discarded() {
		let mut track = Track::new("video").produce();
		let mut consumer = TrackConsumer::new(track.consumer, Duration::from_secs(10));

		let mut two = track.producer.create_group(Group { sequence: 2 }).unwrap();
		write(&mut two, 1000);
		two.close().unwrap();
		expect(&mut consumer, 2, 1000, true).await;

		let mut one = track.producer.create_group(Group { sequence: 1 }).unwrap();
		write(&mut one, 500);
		one.close().unwrap();

		group(&mut track.producer, &[2000]).close().unwrap();
		expect(&mut consumer, 3, 2000, true).await;
	}

	#[tokio::test(start_paused = true)]
	async fn test_track_error() {
		let mut track = Track::new("video").produce();
		let mut consumer = TrackConsumer::new(track.consumer, Duration::from_secs(10));

		group(&mut track.producer, &[1000]).close().unwrap();
		buffer().await;
		track.producer.abort(moq_transport::Error::App(2));

		// Groups already announced are drained before the error.
		expect(&mut consumer, 0, 1000, true).await;
		let err = consumer.read_frame().await.unwrap_err();
		assert!(matches!(err, Error::Moq(moq_transport::Error::App(2))));
	}

	#[tokio::test(start_paused = true)]
	async fn test_close() {
		let mut track = Track::new("video").produce();
		let _group = group(&mut track.producer, &[1000]);

		let mut consumer = TrackConsumer::new(track.consumer, Duration::from_secs(10));
		consumer.close();
		assert!(consumer.read_frame().now_or_never().unwrap().unwrap().is_none());
		assert!(consumer.read_frame().now_or_never().unwrap().unwrap().is_none());
	}

	#[tokio::test(start_paused = true)]
	async fn test_closer_wakes_pending_read() {
		let track = Track::new("video").produce();
		let mut consumer = TrackConsumer::new(track.consumer, Duration::from_secs(10));
		let closer = consumer.closer();

		let (frame, _) = tokio::join!(consumer.read_frame(), async move {
			buffer().await;
			closer.close();
		});
		assert!(frame.unwrap().is_none());
		drop(track.producer);
	}

	#[test]
	fn test_config() {
		assert_eq!(ConsumerConfig::default().latency, Duration::from_millis(500));
	}
}
