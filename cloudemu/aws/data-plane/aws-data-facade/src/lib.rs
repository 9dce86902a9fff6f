//! AWS Data-Plane Facade
//!
//! Public API for AWS data operations: re-exports the storage engines
//! and domain types without exposing internal module layout.

pub mod saf;

pub use aws_data_core;
