//! Deterministic, pure logic shared by the execution core.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod classifier;
pub mod feedback;
pub mod invariants;
pub mod plan;
pub mod success;
pub mod tags;
pub mod types;
pub mod verifier;
