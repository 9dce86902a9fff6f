//! AWS Control-Plane Facade
//!
//! Public API surface re-exported for the server binary: a single
//! entry point (`gateway::start_all`) that boots one HTTP server per
//! service port against a shared [`aws_control_core::Emulator`].

pub mod saf;

pub use aws_control_core;
pub use aws_control_core::gateway;
pub use aws_control_core::Emulator;
