//! A group is an ordered stream of frames, split into a [GroupProducer] and [GroupConsumer] handle.
//!
//! Frames are delivered in order; a cloned [GroupConsumer] is an independent cursor over the same frames.
//! Aborting the group fails every consumer and every frame still being written.
use bytes::Bytes;
use tokio::sync::watch;

use crate::{Error, Produce, Result};

use super::{Frame, FrameConsumer, FrameProducer};

#[derive(Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Group {
	pub sequence: u64,
}

impl Group {
	pub fn produce(self) -> Produce<GroupProducer, GroupConsumer> {
		let producer = GroupProducer::new(self);
		let consumer = producer.consume();
		Produce { producer, consumer }
	}
}

impl From<u64> for Group {
	fn from(sequence: u64) -> Self {
		Self { sequence }
	}
}

impl From<usize> for Group {
	fn from(sequence: usize) -> Self {
		Self {
			sequence: sequence as u64,
		}
	}
}

#[derive(Default)]
struct GroupState {
	frames: Vec<FrameProducer>,
	closed: Option<Result<()>>,
}

impl GroupState {
	fn append_frame(&mut self, frame: FrameProducer) -> Result<()> {
		if let Some(res) = &self.closed {
			return Err(res.clone().err().unwrap_or(Error::Closed));
		}

		self.frames.push(frame);
		Ok(())
	}

	fn close(&mut self) -> Result<()> {
		if let Some(res) = &self.closed {
			return Err(res.clone().err().unwrap_or(Error::Closed));
		}

		self.closed = Some(Ok(()));
		Ok(())
	}

	fn abort(&mut self, err: Error) {
		for frame in &mut self.frames {
			frame.abort(err.clone());
		}
		self.closed = Some(Err(err));
	}
}

/// Writes a group, frame by frame.
#[derive(Clone)]
pub struct GroupProducer {
	pub info: Group,
	state: watch::Sender<GroupState>,
}

impl GroupProducer {
	fn new(info: Group) -> Self {
		Self {
			info,
			state: Default::default(),
		}
	}

	/// Write a whole frame from a single buffer.
	pub fn write_frame<B: Into<Bytes>>(&mut self, payload: B) -> Result<()> {
		let payload = payload.into();
		let mut frame = self.create_frame(payload.len().into())?;
		frame.write_chunk(payload)?;
		frame.close()
	}

	/// Start a frame of a known size, to be written in chunks.
	pub fn create_frame(&mut self, info: Frame) -> Result<FrameProducer> {
		let frame = info.produce();
		self.append_frame(frame.producer.clone())?;
		Ok(frame.producer)
	}

	pub fn append_frame(&mut self, frame: FrameProducer) -> Result<()> {
		let mut result = Ok(());
		self.state.send_if_modified(|state| {
			result = state.append_frame(frame);
			result.is_ok()
		});
		result
	}

	/// Cleanly end the group.
	pub fn close(&mut self) -> Result<()> {
		let mut result = Ok(());
		self.state.send_if_modified(|state| {
			result = state.close();
			result.is_ok()
		});
		result
	}

	/// Abort the group; readers of this group observe `Err(err)`.
	pub fn abort(&mut self, err: Error) {
		self.state.send_modify(|state| state.abort(err));
	}

	pub fn consume(&self) -> GroupConsumer {
		GroupConsumer {
			info: self.info.clone(),
			state: self.state.subscribe(),
			index: 0,
			active: None,
		}
	}
}

/// Reads a group, frame by frame.
#[derive(Clone)]
pub struct GroupConsumer {
	pub info: Group,
	state: watch::Receiver<GroupState>,

	// The number of frames returned so far.
	index: usize,

	// A frame that was started but not finished, so read_frame is cancel safe.
	active: Option<FrameConsumer>,
}

impl GroupConsumer {
	/// Read the next whole frame, or None when the group is closed.
	pub async fn read_frame(&mut self) -> Result<Option<Bytes>> {
		if self.active.is_none() {
			self.active = self.next_frame().await?;
		}

		let frame = match self.active.as_mut() {
			Some(frame) => frame.read_all().await?,
			None => return Ok(None),
		};

		self.active = None;
		Ok(Some(frame))
	}

	/// Return a reader for the next frame, or None when the group is closed.
	pub async fn next_frame(&mut self) -> Result<Option<FrameConsumer>> {
		if let Some(frame) = self.active.take() {
			return Ok(Some(frame));
		}

		loop {
			{
				let state = self.state.borrow_and_update();

				if let Some(Err(err)) = &state.closed {
					return Err(err.clone());
				}

				if let Some(frame) = state.frames.get(self.index) {
					self.index += 1;
					return Ok(Some(frame.consume()));
				}

				if let Some(Ok(_)) = &state.closed {
					return Ok(None);
				}
			}

			if self.state.changed().await.is_err() {
				return Err(Error::Dropped);
			}
		}
	}

	/// Block until the group is closed or aborted.
	pub async fn closed(&self) -> Result<()> {
		match self.state.clone().wait_for(|state| state.closed.is_some()).await {
			Ok(state) => state.closed.clone().unwrap_or(Err(Error::Dropped)),
			Err(_) => Err(Error::Dropped),
		}
	}
}

#[cfg(test)]
use futures::FutureExt;

#[cfg(test)]
impl GroupConsumer {
	pub fn assert_frame(&mut self, expected: &[u8]) {
		let frame = self
			.read_frame()
			.now_or_never()
			.expect("frame would have blocked")
			.expect("would have errored")
			.expect("group was closed");
		assert_eq!(frame, expected, "wrong frame");
	}

	pub fn assert_no_frame(&mut self) {
		assert!(self.read_frame().now_or_never().is_none(), "read would not have blocked");
	}

	pub fn assert_done(&mut self) {
		let frame = self
			.read_frame()
			.now_or_never()
			.expect("read would have blocked")
			.expect("would have errored");
		assert!(frame.is_none(), "group was not closed");
	}

	pub fn assert_error(&mut self) {
		let res = self.read_frame().now_or_never().expect("read would have blocked");
		assert!(res.is_err(), "should be error");
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_in_order() {
		let Produce {
			mut producer,
			mut consumer,
		} = Group::from(0u64).produce();

		consumer.assert_no_frame();

		producer.write_frame(&b"one"[..]).unwrap();
		producer.write_frame(&b"two"[..]).unwrap();

		let mut fork = consumer.clone();

		consumer.assert_frame(b"one");
		consumer.assert_frame(b"two");
		consumer.assert_no_frame();

		producer.close().unwrap();
		consumer.assert_done();

		// Forks keep their own position.
		fork.assert_frame(b"one");
		fork.assert_frame(b"two");
		fork.assert_done();

		assert!(producer.write_frame(&b"three"[..]).is_err());
	}

	#[test]
	fn test_abort_propagates() {
		let Produce {
			mut producer,
			mut consumer,
		} = Group::from(3u64).produce();

		let mut frame = producer.create_frame(Frame { size: 6 }).unwrap();
		frame.write_chunk(&b"par"[..]).unwrap();

		producer.abort(Error::Cancel);

		consumer.assert_error();
		assert!(matches!(frame.close(), Err(Error::Cancel)));
		assert!(matches!(producer.close(), Err(Error::Cancel)));
	}

	#[tokio::test]
	async fn test_cancel_safe() {
		let Produce {
			mut producer,
			mut consumer,
		} = Group::from(1u64).produce();

		let mut frame = producer.create_frame(Frame { size: 4 }).unwrap();
		frame.write_chunk(&b"ab"[..]).unwrap();

		// Started but incomplete; dropping the future must not lose the frame.
		consumer.assert_no_frame();

		frame.write_chunk(&b"cd"[..]).unwrap();
		frame.close().unwrap();

		consumer.assert_frame(b"abcd");
	}

	#[tokio::test]
	async fn test_dropped() {
		let group = Group::from(0u64).produce();
		let consumer = group.consumer;
		drop(group.producer);

		assert!(matches!(consumer.closed().await, Err(Error::Dropped)));
	}
}
