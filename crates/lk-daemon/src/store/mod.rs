//! Session and actor-state store implementations
//!
//! The in-memory stores back tests and `--ephemeral` runs; the file stores
//! keep one JSON document per user under the daemon's state directory so
//! alarms survive a restart.

mod file;
mod memory;

pub use file::{FileSessionStore, FileStateStore};
pub use memory::{MemorySessionStore, MemoryStateStore};
