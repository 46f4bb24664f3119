//! The media model: timestamped frames, grouped at keyframes.

mod consumer;
mod frame;
mod group;
mod timestamp;
mod track;

pub use consumer::*;
pub use frame::*;
pub use group::*;
pub use timestamp::*;
pub use track::*;
