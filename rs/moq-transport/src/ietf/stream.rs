//! Group streams: a [GroupHeader] followed by one object per frame.
//!
//! Each object is `id delta (i) | [extensions size (i) | extensions] | size (i) | payload`.
//! An empty object carries a status instead of a payload; status 3 ends the group
//! when [GroupFlags::has_end] is false.
//!
//! [GroupFlags::has_end]: super::GroupFlags::has_end

use tokio::io::{AsyncRead, AsyncWrite};

use crate::{
	coding::{Reader, Writer},
	ietf::GroupHeader,
	Error, Frame, FrameProducer, Group, GroupConsumer, GroupProducer, TrackProducer,
};

const STATUS_NORMAL: u64 = 0;
const STATUS_END_OF_GROUP: u64 = 3;

/// Write every frame of the group to the stream, then finish it.
///
/// On error the stream is left unfinished so the peer cannot mistake it for a complete group.
pub async fn send_group<S: AsyncWrite + Unpin>(
	writer: &mut Writer<S>,
	header: GroupHeader,
	mut group: GroupConsumer,
) -> Result<(), Error> {
	writer.encode(&header).await?;
	tracing::trace!(?header, "sent group header");

	while let Some(mut frame) = group.next_frame().await? {
		writer.encode(&0u64).await?;

		if header.flags.has_extensions {
			writer.encode(&0usize).await?;
		}

		writer.encode(&frame.info.size).await?;

		if frame.info.size == 0 {
			writer.encode(&STATUS_NORMAL).await?;
			continue;
		}

		let mut remain = frame.info.size;
		while let Some(mut chunk) = frame.read_chunk().await? {
			remain = remain.checked_sub(chunk.len() as u64).ok_or(Error::WrongSize)?;
			writer.write_all(&mut chunk).await?;
		}

		if remain > 0 {
			return Err(Error::WrongSize);
		}

		tracing::trace!(size = frame.info.size, "sent frame");
	}

	if !header.flags.has_end {
		writer.encode(&0u64).await?;
		if header.flags.has_extensions {
			writer.encode(&0usize).await?;
		}
		writer.encode(&0u64).await?;
		writer.encode(&STATUS_END_OF_GROUP).await?;
	}

	writer.finish().await
}

/// Read a group stream into a new group on the track.
///
/// A failure after the header aborts that group only, and the header is still returned.
/// An error is returned when the header is invalid or the group cannot be created.
pub async fn recv_group<S: AsyncRead + Unpin>(
	reader: &mut Reader<S>,
	track: &mut TrackProducer,
) -> Result<GroupHeader, Error> {
	let header: GroupHeader = reader.decode().await?;
	tracing::trace!(?header, "received group header");

	if header.sub_group_id != 0 {
		tracing::warn!(sub_group_id = header.sub_group_id, "subgroup ID is not supported, ignoring");
	}

	let mut group = track.create_group(Group {
		sequence: header.group_id,
	})?;

	match run_group(reader, &header, &mut group).await {
		Ok(()) => {
			tracing::trace!(group = header.group_id, "group complete");
			group.close()?;
		}
		Err(err) => {
			tracing::debug!(%err, group = header.group_id, "group error");
			group.abort(err);
		}
	}

	Ok(header)
}

async fn run_group<S: AsyncRead + Unpin>(
	reader: &mut Reader<S>,
	header: &GroupHeader,
	group: &mut GroupProducer,
) -> Result<(), Error> {
	while let Some(id_delta) = reader.decode_maybe::<u64>().await? {
		if id_delta != 0 {
			tracing::warn!(id_delta, "object ID gaps not supported, ignoring");
		}

		if header.flags.has_extensions {
			let size: usize = reader.decode().await?;
			reader.skip(size).await?;
		}

		let size: u64 = reader.decode().await?;
		if size == 0 {
			let status: u64 = reader.decode().await?;
			match status {
				STATUS_NORMAL => group.create_frame(Frame { size: 0 })?.close()?,
				STATUS_END_OF_GROUP if !header.flags.has_end => return reader.closed().await,
				_ => return Err(Error::Unsupported),
			}

			continue;
		}

		let mut frame = group.create_frame(Frame { size })?;
		if let Err(err) = run_frame(reader, &mut frame).await {
			frame.abort(err.clone());
			return Err(err);
		}
	}

	// Without the flag, the stream must end with an explicit end of group.
	if !header.flags.has_end {
		return Err(Error::Dropped);
	}

	Ok(())
}

async fn run_frame<S: AsyncRead + Unpin>(reader: &mut Reader<S>, frame: &mut FrameProducer) -> Result<(), Error> {
	let mut remain = frame.info.size;

	while remain > 0 {
		let max = usize::try_from(remain).unwrap_or(usize::MAX);
		let chunk = reader.read(max).await?.ok_or(Error::WrongSize)?;
		remain -= chunk.len() as u64;
		frame.write_chunk(chunk)?;
	}

	tracing::trace!(size = frame.info.size, "read frame");
	frame.close()
}
