use aws_data_core::Config;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

/// Standalone CLI surface for the AWS provider alone — the full
/// multi-port topology (baseline + 13 service ports), without
/// `cloudemu-server`'s multi-provider process wiring around it.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Baseline port; service ports are this plus a fixed offset each.
    #[arg(long, default_value_t = 4566, env = "LDK_PORT")]
    port: u16,

    /// Data directory for persisted engines (KV, object, identity).
    #[arg(long, default_value = ".ldk/aws", env = "LDK_DATA_DIR")]
    data_dir: PathBuf,

    /// Bind host.
    #[arg(long, default_value = "0.0.0.0", env = "LDK_HOST")]
    host: String,

    /// Skip disk persistence entirely; state resets on restart.
    #[arg(long, env = "LDK_IN_MEMORY")]
    in_memory: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    info!("Starting AWS emulator on {}:{} (+1..+13)", cli.host, cli.port);
    info!("Data directory: {:?}", cli.data_dir);

    let config = Config {
        host: cli.host,
        port: cli.port,
        data_dir: cli.data_dir,
        in_memory: cli.in_memory,
        ..Default::default()
    };

    aws_control_core::gateway::start_all(config).await?;

    Ok(())
}
