//! API Module
//!
//! REST boundary that dispatches node, identity, and controller requests
//! to the orchestrator.

pub mod rest;
pub mod server;

pub use rest::*;
pub use server::*;
