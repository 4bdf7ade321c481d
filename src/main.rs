// Copyright 2026 The Parapet Project
// SPDX-License-Identifier: Apache-2.0

use clap::Parser;
use persona_relay::config::{self, ConfigSource};
use persona_relay::relay::{self, AppState};
use persona_relay::upstream::{ReqwestUpstreamClient, UpstreamClient};
use tracing_subscriber::EnvFilter;

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "persona-relay", about = "Streaming persona chat relay")]
struct Cli {
    /// Path to a relay.yaml config file. Without it, the upstream URL and
    /// key are read from $BASE_URL and $OPENAI_API_KEY.
    #[arg(long, env = "PERSONA_RELAY_CONFIG")]
    config: Option<PathBuf>,

    /// Address to bind to
    #[arg(long, default_value = "127.0.0.1", env = "PERSONA_RELAY_HOST")]
    host: IpAddr,

    /// Port to listen on
    #[arg(long, default_value_t = 3000, env = "PERSONA_RELAY_PORT")]
    port: u16,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let addr = SocketAddr::new(cli.host, cli.port);
    tracing::info!(%addr, "persona-relay starting");

    let source: Box<dyn ConfigSource> = match cli.config {
        Some(path) => Box::new(config::FileSource { path }),
        None => Box::new(config::DefaultSource),
    };
    let config = match config::load_config(source.as_ref()) {
        Ok(c) => Arc::new(c),
        Err(e) => {
            tracing::error!("failed to load config: {e}");
            std::process::exit(1);
        }
    };

    tracing::info!(
        base_url = %config.upstream.base_url,
        model = %config.upstream.model,
        max_tokens = config.upstream.max_tokens,
        temperature = config.upstream.temperature,
        "config loaded"
    );

    let upstream: Arc<dyn UpstreamClient> = Arc::new(ReqwestUpstreamClient::new(
        reqwest::Client::new(),
        Arc::new(config.upstream.clone()),
    ));

    let app = relay::build_router(AppState { config, upstream });

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(%addr, "failed to bind: {e}");
            std::process::exit(1);
        }
    };

    tracing::info!(%addr, "persona-relay listening");

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("server error: {e}");
        std::process::exit(1);
    }
}
