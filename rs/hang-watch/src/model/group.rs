use std::ops::Deref;

use crate::{Frame, Result};

/// Reads the frames of a single group, marking the first one as the keyframe.
pub struct GroupConsumer {
	inner: moq_transport::GroupConsumer,

	// The number of frames returned so far.
	index: usize,
}

impl GroupConsumer {
	pub fn new(inner: moq_transport::GroupConsumer) -> Self {
		Self { inner, index: 0 }
	}

	/// Read the next frame, or None when the group is finished.
	///
	/// This is cancel safe.
	pub async fn read_frame(&mut self) -> Result<Option<Frame>> {
		let Some(payload) = self.inner.read_frame().await? else {
			return Ok(None);
		};

		let frame = Frame::decode(payload, self.index == 0)?;
		self.index += 1;

		tracing::trace!(group = self.inner.info.sequence, ?frame, "read frame");
		Ok(Some(frame))
	}
}

impl Deref for GroupConsumer {
	type Target = moq_transport::GroupConsumer;

	fn deref(&self) -> &Self::Target {
		&self.inner
	}
}

impl From<moq_transport::GroupConsumer> for GroupConsumer {
	fn from(inner: moq_transport::GroupConsumer) -> Self {
		Self::new(inner)
	}
}

#[cfg(test)]
mod tests {
	use futures::FutureExt;
	use moq_transport::Group;

	use super::*;
	use crate::Timestamp;

	#[test]
	fn test_keyframe_is_positional() {
		let mut group = Group { sequence: 3 }.produce();

		let timestamp = Timestamp::from_millis(5).unwrap();
		Frame::new(timestamp, false, &b"first"[..]).encode(&mut group.producer).unwrap();
		Frame::new(timestamp, true, &b"second"[..]).encode(&mut group.producer).unwrap();
		group.producer.close().unwrap();

		let mut consumer = GroupConsumer::from(group.consumer);
		let first = consumer.read_frame().now_or_never().unwrap().unwrap().unwrap();
		assert!(first.keyframe);

		let second = consumer.read_frame().now_or_never().unwrap().unwrap().unwrap();
		assert!(!second.keyframe);

		assert!(consumer.read_frame().now_or_never().unwrap().unwrap().is_none());
	}
}
