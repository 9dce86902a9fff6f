//! Process-wide configuration for a single service's storage engine.
//!
//! This is the data-plane half of configuration: `aws-data-core`
//! doesn't know about ports or which services are enabled (that's
//! `cloudemu_server::config::AppConfig`), only where to persist state
//! and which account/region to stamp into generated ARNs.

use std::path::PathBuf;

/// How strictly the IAM-evaluation middleware enforces policy decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IamMode {
    /// Skip evaluation entirely; every request is allowed.
    #[default]
    Disabled,
    /// Evaluate and log denials, but let the request through regardless.
    Audit,
    /// Evaluate and turn denials into access-denied responses.
    Enforce,
}

impl std::str::FromStr for IamMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "disabled" => Ok(Self::Disabled),
            "audit" => Ok(Self::Audit),
            "enforce" => Ok(Self::Enforce),
            other => Err(format!("unknown iam mode: {other}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub region: String,
    pub account_id: String,
    /// `true` for an ephemeral, non-persisted (`:memory:`) engine.
    pub in_memory: bool,
    /// Probability in [0, 1] that a request is answered with a synthetic
    /// service error instead of being handled normally.
    pub chaos_error_rate: f64,
    /// Probability in [0, 1] that a request is answered with a simulated
    /// dropped/timed-out connection instead of a response.
    pub chaos_drop_rate: f64,
    /// Artificial latency range (milliseconds) applied before every
    /// request when `chaos_latency_ms_max > 0`.
    pub chaos_latency_ms_min: u64,
    pub chaos_latency_ms_max: u64,
    pub iam_mode: IamMode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 4566,
            data_dir: PathBuf::from(".ldk/aws"),
            region: "us-east-1".to_string(),
            account_id: "000000000000".to_string(),
            in_memory: false,
            chaos_error_rate: 0.0,
            chaos_drop_rate: 0.0,
            chaos_latency_ms_min: 0,
            chaos_latency_ms_max: 0,
            iam_mode: IamMode::Disabled,
        }
    }
}
