//! Common module - shared traits and interfaces
//!
//! The traits here are the boundary between the migration core and the
//! registries it drives.

pub mod traits;

pub use traits::*;
