//! Per-user session timer actors
//!
//! Each user with an active session gets one actor task. The task owns the
//! user's durable [`ActorState`](lk_core::session::ActorState) and its single
//! alarm, and processes `schedule`, `cancel`, alarm firing and inspection
//! strictly one at a time. Actors for different users share nothing but the
//! stores and the gateway.
//!
//! # Lifecycle
//!
//! ```text
//! Idle --schedule--> Scheduled --alarm--> Firing --ok--> Idle
//!                        ^                  |
//!                        +----retry---------+
//! ```
//!
//! `cancel` returns any phase to `Idle`. An actor that reaches `Idle`
//! leaves the registry and stops; the next command for that user spawns
//! a fresh one.

mod registry;
mod timer;

pub use registry::{ActorDeps, ActorRegistry};
pub use timer::{FireReport, ScheduleRequest};
