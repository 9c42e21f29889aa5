//! IPC server for operator tooling
//!
//! Provides a localhost TCP server that operators and scripts use to
//! create, inspect and delete sessions on the running daemon.

mod server;

pub use server::IpcServer;
