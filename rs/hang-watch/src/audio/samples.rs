use bytes::{Buf, BufMut, Bytes, BytesMut};
use moq_transport::coding::DecodeError;

use crate::Result;

const SAMPLE_SIZE: usize = std::mem::size_of::<f32>();

/// Split interleaved little-endian `f32` samples into one buffer per channel.
pub fn decode_samples<B: Buf>(mut buf: B, channels: usize) -> Result<Vec<Vec<f32>>> {
	if channels == 0 || buf.remaining() % (SAMPLE_SIZE * channels) != 0 {
		return Err(DecodeError::InvalidValue.into());
	}

	let count = buf.remaining() / (SAMPLE_SIZE * channels);
	let mut output = vec![Vec::with_capacity(count); channels];

	for _ in 0..count {
		for channel in output.iter_mut() {
			channel.push(buf.get_f32_le());
		}
	}

	Ok(output)
}

/// Interleave the channels as little-endian `f32` samples, padding short channels with silence.
pub fn encode_samples(channels: &[&[f32]]) -> Bytes {
	let count = channels.iter().map(|channel| channel.len()).max().unwrap_or(0);
	let mut buf = BytesMut::with_capacity(count * channels.len() * SAMPLE_SIZE);

	for index in 0..count {
		for channel in channels {
			buf.put_f32_le(channel.get(index).copied().unwrap_or(0.0));
		}
	}

	buf.freeze()
}
