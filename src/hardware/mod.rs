//! Hardware Module
//!
//! Host-side device handling: namespace discovery, device resolution, and
//! the mount table.

pub mod discovery;
pub mod mount;

pub use discovery::*;
pub use mount::*;
