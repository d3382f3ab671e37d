// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use turbx::{options, Engine, FileSystemResolver};
use turbx_cli::config::Config;
use turbx_cli::oembed::HttpOEmbed;
use turbx_cli::server::{Server, ServerSettings};

#[derive(Parser)]
#[command(name = "turbx")]
#[command(author = "Maravilla Labs")]
#[command(version)]
#[command(about = "Line-oriented compile server for turbx templates", long_about = None)]
struct Cli {
    /// Log level: error, warn, info, debug, trace
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Serve static assets from /assets instead of the CDN
    #[arg(long)]
    debug: bool,

    /// Configuration file (defaults to ./turbx.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Template root directory
    #[arg(long)]
    root: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout is the response channel
    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load(cli.config.as_deref())?;

    let mut engine = Engine::with_memory_cache(FileSystemResolver::new(), config.engine.capacity);
    engine.set_oembed(HttpOEmbed::default());
    if cli.debug {
        engine.set_option(options::ASSETS, options::LOCAL_ASSETS);
    }

    let settings = ServerSettings {
        memory_floor_mb: config.server.memory_floor_mb,
        debounce: config.server.debounce(),
        watch: true,
    };
    let server = Arc::new(Server::new(Arc::new(engine), settings));
    for (key, value) in config.engine.options() {
        server.set_option(key, &value);
    }
    if let Some(root) = &cli.root {
        server.set_option(options::ROOT, root);
    }

    tracing::info!("turbx ready");
    server.serve(tokio::io::stdin(), tokio::io::stdout()).await?;
    Ok(())
}
