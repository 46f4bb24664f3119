use buf_list::BufList;
use bytes::{Bytes, BytesMut};
use derive_more::Debug;
use moq_transport::coding::{Decode, Encode};

use crate::{Result, Timestamp};

/// A media frame with a timestamp and codec-specific payload.
///
/// On the wire each frame is the timestamp as a varint, followed by the payload.
/// The keyframe flag is not encoded: the first frame of a group is always the keyframe.
#[derive(Clone, Debug)]
pub struct Frame {
	/// The presentation timestamp for this frame.
	pub timestamp: Timestamp,

	/// Whether this frame can be decoded independently.
	pub keyframe: bool,

	/// The encoded media data for this frame, split into chunks.
	#[debug("{} bytes", payload.num_bytes())]
	pub payload: BufList,
}

impl Frame {
	pub fn new<B: Into<Bytes>>(timestamp: Timestamp, keyframe: bool, payload: B) -> Self {
		let mut chunks = BufList::new();
		chunks.push_chunk(payload.into());

		Self {
			timestamp,
			keyframe,
			payload: chunks,
		}
	}

	/// Write the frame to a group without copying the payload.
	///
	/// # Note
	/// `keyframe` is not written; a decoded frame is a keyframe only if it is first in its group.
	pub fn encode(&self, group: &mut moq_transport::GroupProducer) -> Result<()> {
		let mut header = BytesMut::new();
		self.timestamp.encode(&mut header)?;

		let size = header.len() + self.payload.num_bytes();
		let mut frame = group.create_frame(size.into())?;

		frame.write_chunk(header.freeze())?;
		for index in 0..self.payload.num_chunks() {
			if let Some(chunk) = self.payload.get_chunk(index) {
				frame.write_chunk(chunk.clone())?;
			}
		}

		frame.close()?;
		Ok(())
	}

	/// Decode a frame; the caller decides if it is a keyframe based on its position.
	pub fn decode(mut buf: Bytes, keyframe: bool) -> Result<Self> {
		let timestamp = Timestamp::decode(&mut buf)?;

		let mut payload = BufList::new();
		if !buf.is_empty() {
			payload.push_chunk(buf);
		}

		Ok(Self {
			timestamp,
			keyframe,
			payload,
		})
	}
}
