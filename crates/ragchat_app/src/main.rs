mod platform;

use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use ragchat_core::Session;
use ragchat_logging::chat_info;
use uuid::Uuid;

use platform::config::ClientConfig;

/// Terminal chat client for a document question-answering backend.
#[derive(Parser, Debug)]
#[command(name = "ragchat", version, about)]
struct Args {
    /// Configuration file (RON). A missing file means defaults.
    #[arg(short, long, env = "RAGCHAT_CONFIG", default_value = "ragchat.ron")]
    config: PathBuf,

    /// WebSocket address of the chat server, e.g. ws://localhost:5000/ws
    #[arg(long)]
    server_url: Option<String>,

    /// Base address of the document API, e.g. http://localhost:5000
    #[arg(long)]
    api_base_url: Option<String>,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long)]
    log_level: Option<String>,

    /// Print the effective configuration as RON and exit.
    #[arg(long)]
    print_config: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = ClientConfig::load(&args.config)
        .with_context(|| format!("loading configuration from {:?}", args.config))?;
    config.apply_overrides(args.server_url, args.api_base_url, args.log_level);
    config.validate()?;

    if args.print_config {
        println!("{}", config.to_ron().context("serializing configuration")?);
        return Ok(());
    }

    platform::logging::initialize(config.log_destination, config.level_filter()?);

    let session = Session::new(
        format!("session_{}", Uuid::new_v4().simple()),
        Utc::now().to_rfc3339(),
    );
    chat_info!(
        "ragchat starting: server={} api={}",
        config.server_url,
        config.api_base_url
    );
    platform::run(config, session)
}
