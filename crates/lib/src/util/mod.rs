//! Shared utilities.
//!
//! Hashing primitives and small helpers used across the crate.

pub mod hash;

#[cfg(test)]
pub mod testutil;
