//! Namespace Discovery Module
//!
//! Finds the NVMe namespaces exposed by the offload processor and maps
//! volume ids onto their block devices.

pub mod identity;
pub mod resolver;
pub mod scanner;

pub use identity::*;
pub use resolver::*;
pub use scanner::*;
