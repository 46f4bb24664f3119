//! The IETF MoQ transport messages used by this crate.
//!
//! Only fetch, request flow control and group streams are implemented;
//! see [crate] for the delivery model they feed.

mod control;
mod fetch;
mod group;
mod location;
mod message;
mod namespace;
mod parameters;
mod request;
mod stream;

pub use control::*;
pub use fetch::*;
pub use group::*;
pub use location::*;
pub use message::*;
pub use namespace::*;
pub use parameters::*;
pub use request::*;
pub use stream::*;
