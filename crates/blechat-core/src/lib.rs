//! blechat-core — packet format, dissemination engine, and command handling.
//! The daemon and the integration tests depend on this crate; it never touches
//! the radio directly.

pub mod command;
pub mod config;
pub mod crc;
pub mod dedup;
pub mod engine;
pub mod minute;
pub mod node;
pub mod packet;
pub mod radio;
pub mod scheduler;
pub mod wire;

pub use node::{ChatNode, Reception, Submission};
pub use packet::AppPacket;
pub use radio::Radio;
pub use scheduler::{Scheduler, Slot};
