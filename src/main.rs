use std::path::PathBuf;

use clap::Parser;

use meetclock_lib::AppOptions;

/// Synchronized countdown timer for meeting participants.
#[derive(Debug, Parser)]
#[command(name = "meetclock", version, about)]
struct Args {
    /// Config file to use instead of the default location
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// WebSocket URL of the host relay
    #[arg(long)]
    relay_url: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    meetclock_lib::run(AppOptions {
        config_path: args.config,
        relay_url: args.relay_url,
        log_level: args.log_level,
    })
    .await
}
