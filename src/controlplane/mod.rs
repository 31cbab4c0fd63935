//! Control Plane Module
//!
//! Orchestrates volume attach and detach on this node and proxies the
//! remaining calls to the downstream volume backend.

pub mod api;
pub mod attach;
pub mod backends;
pub mod controller;
pub mod detach;
pub mod identity;
pub mod locks;
pub mod node;
pub mod orchestrator;

#[cfg(test)]
pub(crate) mod testing;

pub use api::*;
pub use attach::*;
pub use backends::*;
pub use locks::*;
pub use orchestrator::*;
