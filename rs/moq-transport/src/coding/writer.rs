use std::fmt::Debug;

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::{coding::*, Error};

/// A writer for encoding messages to a byte stream.
pub struct Writer<S> {
	stream: S,
	buffer: BytesMut,
}

impl<S: AsyncWrite + Unpin> Writer<S> {
	pub fn new(stream: S) -> Self {
		Self {
			stream,
			buffer: Default::default(),
		}
	}

	/// Encode the given message to the stream.
	///
	/// Nothing is written if encoding fails.
	pub async fn encode<T: Encode + Debug>(&mut self, msg: &T) -> Result<(), Error> {
		self.buffer.clear();
		msg.encode(&mut self.buffer)?;
		self.stream.write_all(&self.buffer).await?;

		Ok(())
	}

	/// Write the entire [Buf] to the stream.
	///
	/// NOTE: This can avoid performing a copy when using [Bytes].
	pub async fn write_all<B: Buf>(&mut self, buf: &mut B) -> Result<(), Error> {
		self.stream.write_all_buf(buf).await?;
		Ok(())
	}

	/// Flush and mark the stream as finished.
	pub async fn finish(&mut self) -> Result<(), Error> {
		self.stream.shutdown().await?;
		Ok(())
	}

	pub fn into_inner(self) -> S {
		self.stream
	}
}
