mod account;
mod channel;
mod error;
mod gateway;
mod message;
mod util;

use anyhow::{anyhow, Result};
use clap::Parser;
use std::time::Duration;

use crate::channel::ChannelConfig;
use crate::gateway::GatewayClient;

#[derive(Parser, Debug)]
#[command(name = "keygate", version, about = "Key gateway credential client")]
struct Args {
    /// Hex secret key of the requesting account. Falls back to
    /// KEYGATE_ACCOUNT_KEY.
    #[arg(long)]
    account_key: Option<String>,
    #[arg(long, default_value = "warn")]
    log_level: String,
    #[arg(long, default_value = "10")]
    timeout_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    if std::env::var("RUST_LOG").is_err() {
        let level = util::normalize_log_level(&args.log_level)
            .ok_or_else(|| anyhow!("invalid log level: {}", args.log_level))?;
        std::env::set_var("RUST_LOG", level);
    }

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let account_key = match args.account_key {
        Some(key) => key,
        None => std::env::var("KEYGATE_ACCOUNT_KEY")
            .map_err(|_| anyhow!("missing 'KEYGATE_ACCOUNT_KEY' environment variable"))?,
    };

    let mut config = ChannelConfig::from_env().map_err(|err| anyhow!(err.to_string()))?;
    config.io_timeout = Duration::from_secs(args.timeout_secs.max(1));

    let client = GatewayClient::new(config);
    let reply = client.generate_credentials(&account_key).await;

    println!("{}", serde_json::to_string_pretty(&reply)?);
    if !reply.is_ok() {
        std::process::exit(1);
    }
    Ok(())
}
