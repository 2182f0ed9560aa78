//! Builders to construct scheduler components from configuration.

pub mod core_builder;

pub use core_builder::{CoreHandles, build_core, build_core_with_clock};
