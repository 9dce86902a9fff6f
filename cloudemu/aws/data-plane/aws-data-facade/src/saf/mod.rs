//! SAF — Service Access Facade re-exports.
//!
//! Provides a unified public API surface for the AWS data-plane.

pub use aws_data_core::error::{EmulatorError, Result};
pub use aws_data_core::Config;
