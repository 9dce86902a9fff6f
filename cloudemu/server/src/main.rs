use aws_data_core::Config;
use clap::Parser;
use cloudemu_server::config::AppConfig;
use std::str::FromStr;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_config = AppConfig::parse();
    tracing_subscriber::fmt().with_env_filter(app_config.log_level.as_str()).init();

    info!("Starting LDK (baseline port {}, +1..+13 per service)", app_config.port);
    info!("Data directory: {:?}", app_config.data_dir);

    let iam_mode = aws_data_core::IamMode::from_str(&app_config.iam_mode)
        .map_err(|e| anyhow::anyhow!("invalid --iam-mode: {e}"))?;

    let config = Config {
        host: app_config.host,
        port: app_config.port,
        data_dir: app_config.data_dir,
        in_memory: app_config.in_memory,
        chaos_error_rate: app_config.chaos_error_rate,
        chaos_drop_rate: app_config.chaos_drop_rate,
        chaos_latency_ms_min: app_config.chaos_latency_ms_min,
        chaos_latency_ms_max: app_config.chaos_latency_ms_max,
        iam_mode,
        ..Default::default()
    };

    aws_control_facade::gateway::start_all(config).await?;

    Ok(())
}
