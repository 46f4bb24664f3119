use std::sync::Arc;

use bytes::Bytes;
use tokio::{
	io::{AsyncRead, AsyncWrite},
	sync::{mpsc, Notify},
};
use web_async::Lock;

use crate::{
	coding::{Encode, Reader, Writer},
	ietf::{ControlMessage, Message, RawMessage, RequestId, RequestsBlocked},
	Error,
};

struct ControlState {
	request_id_next: RequestId,
	request_id_max: RequestId,

	// Set once RequestsBlocked was sent for the current maximum.
	blocked: bool,
	notify: Arc<Notify>,
}

/// The outbound half of a control stream, with request ID flow control.
///
/// Messages are encoded immediately and queued; [Control::run] drains the queue to the stream.
#[derive(Clone)]
pub struct Control {
	tx: mpsc::UnboundedSender<Bytes>,
	state: Lock<ControlState>,
}

impl Control {
	/// Clients allocate even request IDs, servers allocate odd ones.
	pub fn new(tx: mpsc::UnboundedSender<Bytes>, request_id_max: RequestId, client: bool) -> Self {
		Self {
			tx,
			state: Lock::new(ControlState {
				request_id_next: if client { RequestId(0) } else { RequestId(1) },
				request_id_max,
				blocked: false,
				notify: Arc::new(Notify::new()),
			}),
		}
	}

	pub fn send<T: Message>(&self, msg: T) -> Result<(), Error> {
		tracing::debug!(message = ?msg, "sending control message");

		let buf = msg.encode_bytes()?;
		tracing::trace!(id = T::ID, size = buf.len(), hex = %hex::encode(&buf), "encoded control message");

		self.tx.send(buf).map_err(|_| Error::Closed)
	}

	/// Write queued messages to the stream until every [Control] handle is dropped.
	pub async fn run<S: AsyncWrite + Unpin>(
		mut writer: Writer<S>,
		mut rx: mpsc::UnboundedReceiver<Bytes>,
	) -> Result<(), Error> {
		while let Some(mut msg) = rx.recv().await {
			writer.write_all(&mut msg).await?;
		}

		writer.finish().await
	}

	/// Raise the request ID limit granted by the peer; a lower value is ignored.
	pub fn max_request_id(&self, max: RequestId) {
		let mut state = self.state.lock();
		if max <= state.request_id_max {
			return;
		}

		state.request_id_max = max;
		state.blocked = false;
		state.notify.notify_waiters();
	}

	/// Allocate the next request ID, waiting for the peer to raise the limit if needed.
	pub async fn next_request_id(&self) -> Result<RequestId, Error> {
		loop {
			let notify = {
				let mut state = self.state.lock();

				if state.request_id_next < state.request_id_max {
					return Ok(state.request_id_next.increment());
				}

				if !state.blocked {
					state.blocked = true;
					let request_id = state.request_id_max;
					tracing::debug!(%request_id, "blocked on request id");

					// Don't hold the lock while sending.
					let notify = state.notify.clone().notified_owned();
					drop(state);

					self.send(RequestsBlocked { request_id })?;
					notify
				} else {
					state.notify.clone().notified_owned()
				}
			};

			tokio::select! {
				_ = notify => continue,
				_ = self.tx.closed() => return Err(Error::Cancel),
			}
		}
	}

	/// Read the next known control message from the peer, or None when the stream is finished.
	///
	/// [crate::ietf::MaxRequestId] is applied before it is returned.
	/// Unknown and malformed messages are logged and skipped.
	pub async fn recv<S: AsyncRead + Unpin>(&self, reader: &mut Reader<S>) -> Result<Option<ControlMessage>, Error> {
		loop {
			let Some(raw) = reader.decode_maybe::<RawMessage>().await? else {
				return Ok(None);
			};

			tracing::trace!(id = raw.id, size = raw.body.len(), hex = %hex::encode(&raw.body), "received control message");

			let msg = match raw.parse() {
				Ok(msg) => msg,
				Err(err) if err.is_malformed() => {
					tracing::warn!(id = raw.id, ?err, "skipping malformed control message");
					continue;
				}
				Err(err) => {
					tracing::warn!(id = raw.id, ?err, "skipping unsupported control message");
					continue;
				}
			};

			tracing::debug!(message = ?msg, "received control message");

			if let ControlMessage::MaxRequestId(max) = &msg {
				self.max_request_id(max.request_id);
			}

			return Ok(Some(msg));
		}
	}
}
