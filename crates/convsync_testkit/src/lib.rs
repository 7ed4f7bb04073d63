//! # convsync Testkit
//!
//! Test utilities for convsync.
//!
//! This crate provides:
//! - Fixtures: a mutable test entity, a test session and a recording policy
//! - Property-based generators for entity graphs using proptest
//! - Concurrency helpers that race disclosures against drains
//!
//! ## Usage
//!
//! ```rust,ignore
//! use convsync_testkit::prelude::*;
//!
//! #[test]
//! fn slave_first() {
//!     let conversation = test_conversation(1);
//!     let b = TestEntity::new("Task", "b");
//!     let a = TestEntity::new("Story", "a").with_slave(&b);
//!     conversation.disclose(&a).unwrap();
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::stress::*;
}

pub use fixtures::*;
pub use generators::*;
pub use stress::*;
