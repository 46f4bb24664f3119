//! A track is a sequence of groups, split into a [TrackProducer] and [TrackConsumer] handle.
//!
//! The producer creates groups with increasing sequence numbers, starting at zero.
//! Groups may also be inserted out of order when they arrive from the network.
//!
//! A [TrackConsumer] returns each group at most once, in the order they were created.
//! Only a bounded window of recent groups is retained, so a slow consumer may skip groups.
//! A cloned consumer is a fork: it remembers what was already returned and then runs independently.

use std::collections::{HashSet, VecDeque};

use tokio::sync::watch;

use crate::{Error, Produce, Result};

use super::{Group, GroupConsumer, GroupProducer};

/// The number of recent groups retained for consumers.
const MAX_GROUPS: usize = 32;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Track {
	pub name: String,
	pub priority: u8,
}

impl Track {
	pub fn new<T: Into<String>>(name: T) -> Self {
		Self {
			name: name.into(),
			priority: 0,
		}
	}

	pub fn produce(self) -> Produce<TrackProducer, TrackConsumer> {
		let producer = TrackProducer::new(self);
		let consumer = producer.consume();
		Produce { producer, consumer }
	}
}

#[derive(Default)]
struct TrackState {
	// In creation order, not sequence order.
	groups: VecDeque<GroupConsumer>,

	// The largest sequence number seen so far.
	max: Option<u64>,

	closed: Option<Result<()>>,
}

impl TrackState {
	fn check_open(&self) -> Result<()> {
		match &self.closed {
			Some(Err(err)) => Err(err.clone()),
			Some(Ok(_)) => Err(Error::Closed),
			None => Ok(()),
		}
	}

	fn insert_group(&mut self, group: GroupConsumer) -> Result<()> {
		self.check_open()?;

		let sequence = group.info.sequence;
		if self.groups.iter().any(|other| other.info.sequence == sequence) {
			return Err(Error::Duplicate);
		}

		self.max = Some(self.max.map_or(sequence, |max| max.max(sequence)));
		self.groups.push_back(group);

		while self.groups.len() > MAX_GROUPS {
			self.groups.pop_front();
		}

		Ok(())
	}

	fn next_sequence(&self) -> u64 {
		self.max.map_or(0, |max| max + 1)
	}
}

/// Creates groups on a track.
#[derive(Clone)]
pub struct TrackProducer {
	pub info: Track,
	state: watch::Sender<TrackState>,
}

impl TrackProducer {
	fn new(info: Track) -> Self {
		Self {
			info,
			state: Default::default(),
		}
	}

	/// Create a group with an explicit sequence number, failing with [Error::Duplicate] if it is retained already.
	pub fn create_group(&mut self, info: Group) -> Result<GroupProducer> {
		let group = info.produce();
		self.insert_group(group.consumer)?;
		Ok(group.producer)
	}

	/// Create a group with the next sequence number: zero for the first group.
	pub fn append_group(&mut self) -> Result<GroupProducer> {
		let mut result = Err(Error::Closed);

		self.state.send_if_modified(|state| {
			let group = Group {
				sequence: state.next_sequence(),
			}
			.produce();

			result = state.insert_group(group.consumer).map(|_| group.producer);
			result.is_ok()
		});

		result
	}

	fn insert_group(&mut self, group: GroupConsumer) -> Result<()> {
		let mut result = Ok(());
		self.state.send_if_modified(|state| {
			result = state.insert_group(group);
			result.is_ok()
		});
		result
	}

	/// A helper to create a group containing a single frame.
	pub fn write_frame<B: Into<bytes::Bytes>>(&mut self, frame: B) -> Result<()> {
		let mut group = self.append_group()?;
		group.write_frame(frame)?;
		group.close()
	}

	/// Cleanly end the track; consumers drain the retained groups and then return None.
	pub fn close(&mut self) -> Result<()> {
		let mut result = Ok(());
		self.state.send_if_modified(|state| {
			result = state.check_open();
			if result.is_ok() {
				state.closed = Some(Ok(()));
			}
			result.is_ok()
		});
		result
	}

	/// Abort the track with an error.
	pub fn abort(&mut self, err: Error) {
		self.state.send_modify(|state| state.closed = Some(Err(err)));
	}

	pub fn consume(&self) -> TrackConsumer {
		TrackConsumer {
			info: self.info.clone(),
			state: self.state.subscribe(),
			seen: Default::default(),
		}
	}

	/// Return true if this is the same track.
	pub fn is_clone(&self, other: &Self) -> bool {
		self.state.same_channel(&other.state)
	}
}

impl From<Track> for TrackProducer {
	fn from(info: Track) -> Self {
		TrackProducer::new(info)
	}
}

/// Reads the groups of a track.
#[derive(Clone)]
pub struct TrackConsumer {
	pub info: Track,
	state: watch::Receiver<TrackState>,

	// Groups already returned by this cursor.
	seen: HashSet<u64>,
}

impl TrackConsumer {
	/// Return the next group this cursor has not seen yet.
	///
	/// Returns None once the track is closed and every retained group was returned.
	/// An aborted track returns its error, even if unseen groups remain.
	pub async fn next_group(&mut self) -> Result<Option<GroupConsumer>> {
		let seen = &self.seen;
		let state = self
			.state
			.wait_for(|state| state.closed.is_some() || state.groups.iter().any(|g| !seen.contains(&g.info.sequence)))
			.await
			.map_err(|_| Error::Dropped)?;

		if let Some(Err(err)) = &state.closed {
			return Err(err.clone());
		}

		// Forget anything that has left the window.
		if self.seen.len() > 2 * MAX_GROUPS {
			self.seen
				.retain(|sequence| state.groups.iter().any(|group| group.info.sequence == *sequence));
		}

		match state.groups.iter().find(|group| !self.seen.contains(&group.info.sequence)) {
			Some(group) => {
				self.seen.insert(group.info.sequence);
				Ok(Some(group.clone()))
			}
			None => Ok(None),
		}
	}

	/// Block until the track is closed or aborted.
	pub async fn closed(&self) -> Result<()> {
		match self.state.clone().wait_for(|state| state.closed.is_some()).await {
			Ok(state) => state.closed.clone().unwrap_or(Err(Error::Dropped)),
			Err(_) => Err(Error::Dropped),
		}
	}

	pub fn is_clone(&self, other: &Self) -> bool {
		self.state.same_channel(&other.state)
	}
}

#[cfg(test)]
use futures::FutureExt;

#[cfg(test)]
impl TrackConsumer {
	pub fn assert_group(&mut self) -> GroupConsumer {
		self.next_group()
			.now_or_never()
			.expect("group would have blocked")
			.expect("would have errored")
			.expect("track was closed")
	}

	pub fn assert_no_group(&mut self) {
		assert!(
			self.next_group().now_or_never().is_none(),
			"next group would not have blocked"
		);
	}

	pub fn assert_done(&mut self) {
		let group = self
			.next_group()
			.now_or_never()
			.expect("next group would have blocked")
			.expect("would have errored");
		assert!(group.is_none(), "track was not closed");
	}

	pub fn assert_error(&mut self) {
		let res = self.next_group().now_or_never().expect("next group would have blocked");
		assert!(res.is_err(), "should be error");
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_append_starts_at_zero() {
		let Produce {
			mut producer,
			mut consumer,
		} = Track::new("video").produce();

		consumer.assert_no_group();

		let first = producer.append_group().unwrap();
		assert_eq!(first.info.sequence, 0);

		let second = producer.append_group().unwrap();
		assert_eq!(second.info.sequence, 1);

		assert_eq!(consumer.assert_group().info.sequence, 0);
		assert_eq!(consumer.assert_group().info.sequence, 1);
		consumer.assert_no_group();
	}

	#[test]
	fn test_create_group() {
		let mut producer = Track::new("video").produce().producer;
		let mut consumer = producer.consume();

		producer.create_group(5u64.into()).unwrap();
		assert!(matches!(producer.create_group(5u64.into()), Err(Error::Duplicate)));

		// Out of order is fine, and append continues after the largest.
		producer.create_group(2u64.into()).unwrap();
		assert_eq!(producer.append_group().unwrap().info.sequence, 6);

		let order: Vec<u64> = (0..3).map(|_| consumer.assert_group().info.sequence).collect();
		assert_eq!(order, [5, 2, 6]);
	}

	#[test]
	fn test_forks() {
		let mut producer = Track::new("audio").produce().producer;
		let mut consumer = producer.consume();

		producer.write_frame(&b"a"[..]).unwrap();
		assert_eq!(consumer.assert_group().info.sequence, 0);

		let mut fork = consumer.clone();
		producer.write_frame(&b"b"[..]).unwrap();

		let mut group = consumer.assert_group();
		group.assert_frame(b"b");
		group.assert_done();

		// The fork inherits what was seen, then reads independently.
		assert_eq!(fork.assert_group().info.sequence, 1);
		fork.assert_no_group();

		// A fresh consumer sees every retained group.
		let mut fresh = producer.consume();
		assert_eq!(fresh.assert_group().info.sequence, 0);
	}

	#[test]
	fn test_close_drains() {
		let mut producer = Track::new("video").produce().producer;
		let mut consumer = producer.consume();

		producer.append_group().unwrap();
		producer.close().unwrap();
		assert!(producer.append_group().is_err());

		consumer.assert_group();
		consumer.assert_done();
	}

	#[test]
	fn test_abort() {
		let mut producer = Track::new("video").produce().producer;
		let mut consumer = producer.consume();

		producer.append_group().unwrap();
		producer.abort(Error::App(7));

		consumer.assert_error();
		assert!(matches!(consumer.closed().now_or_never(), Some(Err(Error::App(7)))));
	}

	#[test]
	fn test_window() {
		let mut producer = Track::new("video").produce().producer;
		for _ in 0..MAX_GROUPS + 4 {
			producer.append_group().unwrap();
		}

		let mut consumer = producer.consume();
		assert_eq!(consumer.assert_group().info.sequence, 4);
	}

	#[test]
	fn test_dropped() {
		let mut consumer = Track::new("video").produce().consumer;
		assert!(matches!(consumer.next_group().now_or_never(), Some(Err(Error::Dropped))));
	}
}
