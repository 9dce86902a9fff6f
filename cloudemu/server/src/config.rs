//! Process-wide CLI/env configuration for the `ldk` binary.

use clap::Parser;
use std::path::PathBuf;

/// `ldk --port 4500` and `LDK_PORT=4500 ldk` are equivalent.
#[derive(Parser, Debug, Clone)]
#[command(name = "ldk", author, version, about = "LDK/LWS - single-process AWS service emulator")]
pub struct AppConfig {
    /// Baseline port; each enabled service binds a fixed offset from this.
    #[arg(long, default_value_t = 4566, env = "LDK_PORT")]
    pub port: u16,

    /// Bind host for every listener.
    #[arg(long, default_value = "0.0.0.0", env = "LDK_HOST")]
    pub host: String,

    /// Root directory for persisted KV/object/identity state.
    #[arg(long, default_value = ".ldk/aws", env = "LDK_DATA_DIR")]
    pub data_dir: PathBuf,

    /// Skip disk persistence entirely; state resets on restart.
    #[arg(long, env = "LDK_IN_MEMORY")]
    pub in_memory: bool,

    /// Log level passed to `tracing_subscriber`'s env filter.
    #[arg(long, default_value = "info", env = "LDK_LOG")]
    pub log_level: String,

    /// IAM-evaluation mode: disabled, audit, or enforce.
    #[arg(long, default_value = "disabled", env = "LDK_IAM_MODE")]
    pub iam_mode: String,

    /// Chance [0, 1] a request is answered with a synthetic service error.
    #[arg(long, default_value_t = 0.0, env = "LDK_CHAOS_ERROR_RATE")]
    pub chaos_error_rate: f64,

    /// Chance [0, 1] a request is answered with a simulated dropped connection.
    #[arg(long, default_value_t = 0.0, env = "LDK_CHAOS_DROP_RATE")]
    pub chaos_drop_rate: f64,

    /// Minimum artificial latency (ms) injected per request.
    #[arg(long, default_value_t = 0, env = "LDK_CHAOS_LATENCY_MIN_MS")]
    pub chaos_latency_ms_min: u64,

    /// Maximum artificial latency (ms) injected per request; 0 disables it.
    #[arg(long, default_value_t = 0, env = "LDK_CHAOS_LATENCY_MAX_MS")]
    pub chaos_latency_ms_max: u64,
}
