//! SAF — Service Access Facade re-exports.
//!
//! A unified public API surface for the AWS control-plane, kept
//! separate from `lib.rs` so downstream crates can `use
//! aws_control_facade::saf::*` for the commonly-needed types without
//! pulling in routing internals.

pub use aws_control_core::Emulator;
pub use aws_control_core::{ApiError, EmulatorError, Result};
