//! Arena allocation of device memory.
//!
//! An [`ArenaBuffer`] owns one growable device buffer and hands out
//! [`BufferRegion`]s inside it. Regions never move: growth copies the whole
//! buffer into a larger one at identical offsets.

mod buffer;
mod config;
mod free_list;

pub use buffer::{ArenaBuffer, ArenaStats, BufferRegion};
pub use config::{ArenaConfig, DEFAULT_INITIAL_CAPACITY};

pub(crate) use config::lcm;
