//! Core trait definitions

mod gateway;
mod store;

pub use gateway::{BackendGateway, DeleteAck, ServiceDeleteAck};
pub use store::{SessionStore, StateStore};
