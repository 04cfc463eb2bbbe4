use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vigil_config::{ConfigLoader, Paths};
use vigil_server::{infra::startup, routes::create_router};

/// Command line arguments for the Vigil daemon
#[derive(Parser, Debug)]
#[command(name = "vigil-server")]
#[command(about = "Personal activity-tracking daemon with a loopback HTTP API")]
struct Args {
    /// Path to the configuration file (defaults to vigil.toml when present)
    #[arg(long, env = "VIGIL_CONFIG")]
    config: Option<PathBuf>,

    /// API port (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Data directory (overrides config and the per-OS default)
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut loader = ConfigLoader::new();
    if let Some(path) = &args.config {
        loader = loader.with_config_path(path);
    }
    let mut config = loader.load().context("loading configuration")?;
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(data_dir) = args.data_dir {
        config.data_dir = Some(data_dir);
    }

    let default_filter = config
        .log_filter
        .clone()
        .unwrap_or_else(|| "info,sqlx=warn".to_owned());
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let paths = Paths::resolve(config.data_dir.as_deref());
    info!(data_dir = %paths.root().display(), "starting vigil");

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("parsing server address")?;

    let app = startup::build(config, paths).await?;
    let router = create_router(app.state.clone());
    let mut exit_rx = app.exit_rx.clone();

    // The API is unauthenticated; never bind beyond loopback.
    anyhow::ensure!(
        addr.ip().is_loopback(),
        "refusing to bind the unauthenticated API to non-loopback address {addr}"
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding API listener on {addr}"))?;
    info!(%addr, "api listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("interrupt received, shutting down");
                }
                _ = exit_rx.changed() => {
                    info!("exit requested (pending restore), shutting down");
                }
            }
        })
        .await
        .context("serving API")?;

    app.shutdown().await;
    Ok(())
}
