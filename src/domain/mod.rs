//! Domain Module
//!
//! Core types and port traits shared by the orchestrators and adapters.

pub mod ports;

pub use ports::*;
