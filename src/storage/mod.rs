//! External storage layer.
//!
//! Meridian persists its crash-recovery state in an external linearizable
//! key-value service shared by all coordinator replicas. This module
//! contains:
//! - [`external`] - The storage interface, well-known keys, and value codec
//! - [`memory`] - An in-process implementation for tests and embedded use

pub mod external;
pub mod memory;
