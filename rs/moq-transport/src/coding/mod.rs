//! This module contains encoding and decoding helpers.
//!
//! Every integer on the wire is a QUIC variable-length integer in one of two classes:
//! - [VarInt] is the wide class, up to 2^62-1, used for track aliases, request IDs and locations.
//! - `u64` and `usize` are the compact class, up to 2^53-1, used for counts, lengths and group IDs.

mod decode;
mod encode;
mod reader;
mod varint;
mod writer;

pub use decode::*;
pub use encode::*;
pub use reader::*;
pub use varint::*;
pub use writer::*;

// Re-export the bytes crate
pub use bytes::*;
