//! # moq-transport: the Media over QUIC wire format and delivery model
//!
//! This crate contains the protocol core without any network session:
//! byte streams are plain tokio [AsyncRead](tokio::io::AsyncRead) and [AsyncWrite](tokio::io::AsyncWrite) halves.
//!
//! - [coding]: QUIC variable-length integers and the [Encode](coding::Encode)/[Decode](coding::Decode) traits.
//! - [ietf]: control messages, parameters, group headers and group streams.
//!
//! ## API
//!
//! The delivery model is built around Producer/Consumer pairs, with the hierarchy:
//! - [Broadcast]: A collection of [Track]s, produced by a single publisher.
//! - [Track]: A collection of [Group]s, delivered out-of-order until expired.
//! - [Group]: A collection of [Frame]s, delivered in order until aborted.
//!
//! To publish media, create:
//! - [BroadcastProducer::create_track] to create a [TrackProducer] for each track.
//! - [TrackProducer::append_group] for each Group of Pictures (GOP) or audio frames.
//! - [GroupProducer::write_frame] to write each encoded frame in the group.
//!
//! To consume media, create:
//! - [BroadcastConsumer::subscribe_track] to get a [TrackConsumer] for a specific track.
//! - [TrackConsumer::next_group] to receive the next available group.
//! - [GroupConsumer::read_frame] to read each frame in the group.
//!
//! Use [FrameProducer] and [FrameConsumer] for chunked frame writes and reads,
//! and [TrackProducer::create_group] to produce groups out-of-order.

mod error;
mod model;

pub mod coding;
pub mod ietf;

pub use error::*;
pub use model::*;
