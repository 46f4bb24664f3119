//! # hang-watch: latency bounded playback of Media over QUIC tracks
//!
//! `hang-watch` is built on top of [`moq_transport`] and provides the consuming half of a media pipeline:
//! - **Container**: each [Frame] is a timestamp followed by the codec payload.
//! - **Frame consumer**: [TrackConsumer] reads every group concurrently and emits one ordered
//!   stream of frames, skipping groups that fall too far behind.
//! - **Audio**: [audio::AudioRingBuffer] turns timestamped sample batches into a continuous stream.
//!
mod error;

pub mod audio;
pub mod model;

// export the moq-transport version in use
pub use moq_transport;

pub use error::*;
pub use model::*;
