use bytes::{Bytes, BytesMut};
use tokio::sync::watch;

use crate::{Error, Produce, Result};

/// The size of a frame, declared up front so it can be written in chunks.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Frame {
	pub size: u64,
}

impl Frame {
	pub fn produce(self) -> Produce<FrameProducer, FrameConsumer> {
		let producer = FrameProducer::new(self);
		let consumer = producer.consume();
		Produce { producer, consumer }
	}
}

impl From<usize> for Frame {
	fn from(size: usize) -> Self {
		Self { size: size as u64 }
	}
}

impl From<u64> for Frame {
	fn from(size: u64) -> Self {
		Self { size }
	}
}

#[derive(Default)]
struct FrameState {
	chunks: Vec<Bytes>,
	written: u64,
	closed: Option<Result<()>>,
}

impl FrameState {
	fn write_chunk(&mut self, chunk: Bytes, size: u64) -> Result<()> {
		if let Some(res) = &self.closed {
			return Err(res.clone().err().unwrap_or(Error::Closed));
		}

		let written = self.written + chunk.len() as u64;
		if written > size {
			return Err(Error::WrongSize);
		}

		self.written = written;
		self.chunks.push(chunk);
		Ok(())
	}

	fn close(&mut self, size: u64) -> Result<()> {
		if let Some(res) = &self.closed {
			return Err(res.clone().err().unwrap_or(Error::Closed));
		}

		if self.written != size {
			return Err(Error::WrongSize);
		}

		self.closed = Some(Ok(()));
		Ok(())
	}
}

/// Writes a frame's payload in chunks.
#[derive(Clone)]
pub struct FrameProducer {
	pub info: Frame,
	state: watch::Sender<FrameState>,
}

impl FrameProducer {
	fn new(info: Frame) -> Self {
		Self {
			info,
			state: Default::default(),
		}
	}

	/// Append a chunk, failing with [Error::WrongSize] if it would exceed the declared size.
	pub fn write_chunk<B: Into<Bytes>>(&mut self, chunk: B) -> Result<()> {
		let chunk = chunk.into();
		let size = self.info.size;

		let mut result = Ok(());
		self.state.send_if_modified(|state| {
			result = state.write_chunk(chunk, size);
			result.is_ok()
		});
		result
	}

	/// Finish the frame, failing with [Error::WrongSize] if fewer bytes were written than declared.
	pub fn close(&mut self) -> Result<()> {
		let size = self.info.size;

		let mut result = Ok(());
		self.state.send_if_modified(|state| {
			result = state.close(size);
			result.is_ok()
		});
		result
	}

	/// Abort the frame; consumers receive the error.
	pub fn abort(&mut self, err: Error) {
		self.state.send_modify(|state| state.closed = Some(Err(err)));
	}

	pub fn consume(&self) -> FrameConsumer {
		FrameConsumer {
			info: self.info.clone(),
			state: self.state.subscribe(),
			index: 0,
		}
	}
}

/// Reads a frame's payload, chunk by chunk or all at once.
#[derive(Clone)]
pub struct FrameConsumer {
	pub info: Frame,
	state: watch::Receiver<FrameState>,

	// The next chunk to return; clones keep their own position.
	index: usize,
}

impl FrameConsumer {
	/// Return the next chunk, or None once the frame is complete.
	pub async fn read_chunk(&mut self) -> Result<Option<Bytes>> {
		loop {
			{
				let state = self.state.borrow_and_update();

				if let Some(Err(err)) = &state.closed {
					return Err(err.clone());
				}

				if let Some(chunk) = state.chunks.get(self.index).cloned() {
					self.index += 1;
					return Ok(Some(chunk));
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

	/// Wait for the whole frame and return the remaining payload.
	///
	/// Nothing is consumed until the frame is complete, so this is cancel safe.
	pub async fn read_all(&mut self) -> Result<Bytes> {
		let state = self
			.state
			.wait_for(|state| state.closed.is_some())
			.await
			.map_err(|_| Error::Dropped)?;

		if let Some(Err(err)) = &state.closed {
			return Err(err.clone());
		}

		let chunks = &state.chunks[self.index..];
		self.index = state.chunks.len();

		// Avoid a copy in the common single-chunk case.
		if let [chunk] = chunks {
			return Ok(chunk.clone());
		}

		let mut buf = BytesMut::with_capacity(chunks.iter().map(Bytes::len).sum());
		for chunk in chunks {
			buf.extend_from_slice(chunk);
		}

		Ok(buf.freeze())
	}

	/// Block until the frame is complete or aborted.
	pub async fn closed(&self) -> Result<()> {
		match self.state.clone().wait_for(|state| state.closed.is_some()).await {
			Ok(state) => state.closed.clone().unwrap_or(Err(Error::Dropped)),
			Err(_) => Err(Error::Dropped),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use futures::FutureExt;

	#[tokio::test]
	async fn test_chunks() {
		let Produce {
			mut producer,
			mut consumer,
		} = Frame::from(10usize).produce();

		producer.write_chunk(&b"hello"[..]).unwrap();
		assert_eq!(consumer.read_chunk().await.unwrap(), Some(Bytes::from_static(b"hello")));

		// Not complete yet.
		assert!(consumer.clone().read_all().now_or_never().is_none());

		producer.write_chunk(&b"world"[..]).unwrap();
		producer.close().unwrap();

		assert_eq!(consumer.read_chunk().await.unwrap(), Some(Bytes::from_static(b"world")));
		assert_eq!(consumer.read_chunk().await.unwrap(), None);
	}

	#[tokio::test]
	async fn test_read_all() {
		let frame = Frame::from(10usize).produce();
		let mut producer = frame.producer;
		let mut consumer = frame.consumer;

		producer.write_chunk(&b"hello"[..]).unwrap();
		producer.write_chunk(&b"world"[..]).unwrap();
		producer.close().unwrap();

		assert_eq!(consumer.read_all().await.unwrap(), Bytes::from_static(b"helloworld"));
		assert_eq!(consumer.read_all().await.unwrap(), Bytes::new());
	}

	#[test]
	fn test_wrong_size() {
		let mut producer = Frame::from(5usize).produce().producer;
		assert!(matches!(producer.write_chunk(&b"toolong"[..]), Err(Error::WrongSize)));

		producer.write_chunk(&b"abc"[..]).unwrap();
		assert!(matches!(producer.close(), Err(Error::WrongSize)));

		producer.write_chunk(&b"de"[..]).unwrap();
		producer.close().unwrap();
		assert!(matches!(producer.write_chunk(&b"f"[..]), Err(Error::Closed)));
	}

	#[tokio::test]
	async fn test_abort() {
		let frame = Frame::from(10usize).produce();
		let mut producer = frame.producer;
		let mut consumer = frame.consumer;

		producer.write_chunk(&b"hello"[..]).unwrap();
		producer.abort(Error::Cancel);

		assert!(matches!(consumer.read_chunk().await, Err(Error::Cancel)));
		assert!(matches!(consumer.closed().await, Err(Error::Cancel)));
	}

	#[tokio::test]
	async fn test_dropped() {
		let frame = Frame::from(10usize).produce();
		let mut consumer = frame.consumer;
		drop(frame.producer);

		assert!(matches!(consumer.read_chunk().await, Err(Error::Dropped)));
	}
}
