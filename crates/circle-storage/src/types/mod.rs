//! Type definitions for screencircle storage.

mod groups;
mod ids;
mod usage;

// Re-export all types from submodules
pub use groups::*;
pub use ids::*;
pub use usage::*;
