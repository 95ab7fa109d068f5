//! Tile addressing and per-tile request tracking.

mod address;
mod request;

pub use address::{Direction, TileAddress};
pub use request::{AppliedHook, ChannelCompletion, ChannelTask, TaskState, TileRequest};
