//! Benchmark support for convsync.

#![warn(missing_docs)]

pub mod utils;
