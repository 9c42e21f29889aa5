//! lk-gateway: HTTP client for the lab backend control plane
//!
//! Wraps the two remote operations the cleanup path needs, deleting a
//! lab's exposed services and deleting a VM allocation, behind the
//! [`BackendGateway`](lk_core::traits::BackendGateway) trait.

pub mod client;

pub use client::{HttpBackendGateway, EXPOSE_PATH, LAB_DELETE_PATH};
