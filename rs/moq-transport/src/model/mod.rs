mod broadcast;
mod frame;
mod group;
mod produce;
mod time;
mod track;

pub use broadcast::*;
pub use frame::*;
pub use group::*;
pub use produce::*;
pub use time::*;
pub use track::*;
