use std::io;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use transferir::{Config, ControlLoop, ServerLifecycle};

#[derive(Parser, Debug)]
#[command(name = "transferir")]
#[command(about = "Share a local folder over the LAN for browser downloads")]
#[command(version)]
struct Cli {
    /// Directory to serve files from [default: ./transferir]
    #[arg(short, long)]
    root: Option<PathBuf>,

    /// Port to listen on [default: 8080]
    #[arg(short, long)]
    port: Option<u16>,

    /// Address to bind to [default: 0.0.0.0]
    #[arg(short, long)]
    bind: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Config file path (optional)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so they stay out of the menu
    let filter = if cli.verbose {
        "transferir=debug,tower_http=debug"
    } else {
        "transferir=info,tower_http=warn"
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    // Load config from file if provided, otherwise use defaults
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)
            .map_err(|e| anyhow::anyhow!(e))
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(root) = cli.root {
        config.root_dir = root;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(bind) = cli.bind {
        config.bind = bind;
    }

    info!("Serving directory: {}", config.root_dir.display());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?;

    let mut control = ControlLoop::new(
        ServerLifecycle::new(config),
        runtime.handle().clone(),
        io::stdin().lock(),
        io::stdout(),
    );
    let result = control.run();

    // Leaving ends any transfer still in progress
    drop(control);
    runtime.shutdown_background();

    result?;
    Ok(())
}
