//! Curio: an asset/collection lifecycle state machine with pluggable
//! authority rules.
//!
//! This crate re-exports all the components of the Curio system.

pub use curio_core::*;
pub use curio_runtime::*;
pub use curio_store::*;
