use std::ops::Deref;

use moq_transport::GroupProducer;

use crate::{Error, Frame, Result};

/// Writes frames to a track, starting a new group at each keyframe.
pub struct TrackProducer {
	pub inner: moq_transport::TrackProducer,
	group: Option<GroupProducer>,
}

impl TrackProducer {
	pub fn new(inner: moq_transport::TrackProducer) -> Self {
		Self { inner, group: None }
	}

	/// Write a frame; a keyframe closes the current group and starts the next one.
	pub fn write(&mut self, frame: Frame) -> Result<()> {
		tracing::trace!(?frame, "write frame");

		if frame.keyframe {
			if let Some(mut group) = self.group.take() {
				group.close()?;
			}

			self.group = Some(self.inner.append_group()?);
		}

		let group = self.group.as_mut().ok_or(Error::MissingKeyframe)?;
		frame.encode(group)
	}

	/// Close the current group and the track.
	pub fn close(&mut self) -> Result<()> {
		if let Some(mut group) = self.group.take() {
			group.close()?;
		}

		self.inner.close()?;
		Ok(())
	}
}

impl Deref for TrackProducer {
	type Target = moq_transport::TrackProducer;

	fn deref(&self) -> &Self::Target {
		&self.inner
	}
}

impl From<moq_transport::TrackProducer> for TrackProducer {
	fn from(inner: moq_transport::TrackProducer) -> Self {
		Self::new(inner)
	}
}
