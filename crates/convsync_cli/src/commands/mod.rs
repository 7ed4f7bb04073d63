//! CLI command implementations.

pub mod model;
pub mod scenario;
pub mod simulate;
