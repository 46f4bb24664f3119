use std::{cmp, fmt::Debug, io};

use bytes::{Buf, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::{coding::*, Error};

/// A reader for decoding messages from a byte stream.
pub struct Reader<S> {
	stream: S,
	buffer: BytesMut,
}

impl<S: AsyncRead + Unpin> Reader<S> {
	pub fn new(stream: S) -> Self {
		Self {
			stream,
			buffer: Default::default(),
		}
	}

	// Returns false if the stream is finished.
	async fn fill(&mut self) -> Result<bool, Error> {
		let n = self.stream.read_buf(&mut self.buffer).await?;
		Ok(n > 0)
	}

	/// Decode the next message from the stream.
	///
	/// Any error other than [DecodeError::Short] leaves the buffer untouched.
	pub async fn decode<T: Decode + Debug>(&mut self) -> Result<T, Error> {
		loop {
			let mut cursor = io::Cursor::new(&self.buffer[..]);
			match T::decode(&mut cursor) {
				Ok(msg) => {
					self.buffer.advance(cursor.position() as usize);
					return Ok(msg);
				}
				Err(DecodeError::Short) => {
					if !self.fill().await? {
						// Stream closed while we still need more data
						return Err(DecodeError::Short.into());
					}
				}
				Err(e) => return Err(e.into()),
			}
		}
	}

	/// Decode the next message unless the stream is cleanly finished.
	pub async fn decode_maybe<T: Decode + Debug>(&mut self) -> Result<Option<T>, Error> {
		if self.buffer.is_empty() && !self.fill().await? {
			return Ok(None);
		}

		Ok(Some(self.decode().await?))
	}

	/// Decode the next message from the stream without consuming it.
	pub async fn decode_peek<T: Decode + Debug>(&mut self) -> Result<T, Error> {
		loop {
			let mut cursor = io::Cursor::new(&self.buffer[..]);
			match T::decode(&mut cursor) {
				Ok(msg) => return Ok(msg),
				Err(DecodeError::Short) => {
					if !self.fill().await? {
						return Err(DecodeError::Short.into());
					}
				}
				Err(e) => return Err(e.into()),
			}
		}
	}

	/// Returns a non-empty chunk of at most `max` bytes, or None if the stream is finished.
	pub async fn read(&mut self, max: usize) -> Result<Option<Bytes>, Error> {
		if self.buffer.is_empty() && !self.fill().await? {
			return Ok(None);
		}

		let size = cmp::min(max, self.buffer.len());
		Ok(Some(self.buffer.split_to(size).freeze()))
	}

	/// Read exactly the given number of bytes from the stream.
	pub async fn read_exact(&mut self, size: usize) -> Result<Bytes, Error> {
		while self.buffer.len() < size {
			if !self.fill().await? {
				return Err(DecodeError::Short.into());
			}
		}

		Ok(self.buffer.split_to(size).freeze())
	}

	/// Skip the given number of bytes from the stream.
	pub async fn skip(&mut self, mut size: usize) -> Result<(), Error> {
		loop {
			let buffered = self.buffer.len().min(size);
			self.buffer.advance(buffered);
			size -= buffered;

			if size == 0 {
				return Ok(());
			}

			if !self.fill().await? {
				return Err(DecodeError::Short.into());
			}
		}
	}

	/// Wait until the stream is finished, erroring if there are any additional bytes.
	pub async fn closed(&mut self) -> Result<(), Error> {
		if self.buffer.is_empty() && !self.fill().await? {
			return Ok(());
		}

		Err(DecodeError::ExpectedEnd.into())
	}

	/// Return the underlying stream, discarding anything buffered.
	pub fn into_inner(self) -> S {
		self.stream
	}
}
