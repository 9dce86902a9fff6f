//! Data-plane core: storage engines and shared value machinery for
//! every AWS-dialect service the emulator exposes.
//!
//! This crate has no knowledge of HTTP, ports, or wire dialects — that
//! lives one layer up in `aws-control-core`. It owns persistence (one
//! `StorageEngine` per process, SQLite-backed, via [`storage`]), the
//! in-memory engines that are deliberately non-persisted ([`queue`],
//! [`pubsub`], [`eventbus`]), the value codec and expression language
//! shared by the KV engine and the workflow interpreter ([`codec`],
//! [`path`], [`expr`]), and the event propagation fabric ([`fabric`])
//! that lets every engine invoke a function without depending on the
//! function runtime directly.

pub mod codec;
pub mod config;
pub mod error;
pub mod eventbus;
pub mod expr;
pub mod fabric;
pub mod path;
pub mod pubsub;
pub mod queue;
pub mod storage;

pub use config::{Config, IamMode};
pub use error::{EmulatorError, Result};
pub use storage::StorageEngine;
