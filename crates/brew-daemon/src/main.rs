//! brew-daemon entry point.
//!
//! Thin: parse flags, set up tracing, load config, build services, wire
//! middleware and serve. Handlers live in `routes.rs`; state in `state.rs`.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use brew_config::secrets::resolve_secrets;
use brew_daemon::{bootstrap, routes, state};
use brew_nlu::IntentDetector;
use clap::Parser;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{debug, info, Level};

#[derive(Parser, Debug)]
#[command(name = "brew-daemon")]
#[command(about = "Voice/text coffee order webhook", long_about = None)]
struct Args {
    /// Layered YAML config files, merged in order.
    #[arg(long = "config")]
    config: Vec<String>,

    /// Listen address; overrides server.addr.
    #[arg(long)]
    addr: Option<String>,

    /// Debug-level logging (RUST_LOG still wins when set).
    #[arg(long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Silent if the file does not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    let args = Args::parse();
    init_tracing(args.verbose);
    debug!("logging level set to debug");

    let (_loaded, cfg) = bootstrap::load_config(&args.config)?;
    let secrets = resolve_secrets(&cfg)?;
    let services = bootstrap::build_services(&cfg, &secrets).await?;

    let nlu = Arc::clone(&services.nlu);
    let shared = Arc::new(state::AppState::new(
        services.workflow,
        nlu.clone() as Arc<dyn IntentDetector>,
        cfg.server.static_dir.clone(),
    ));

    state::spawn_heartbeat(shared.bus.clone(), Duration::from_secs(1));

    let app = routes::build_router(Arc::clone(&shared))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_localhost_only());

    let raw_addr = args.addr.unwrap_or(cfg.server.addr);
    let addr: SocketAddr = raw_addr
        .parse()
        .with_context(|| format!("invalid listen address: {raw_addr}"))?;
    info!("brew-daemon listening on http://{}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server crashed")?;

    nlu.shutdown().await;
    info!("brew-daemon stopped");
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()),
        )
        .init();
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        // No signal handler available; run until killed.
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

/// CORS: allow only localhost origins.
fn cors_localhost_only() -> CorsLayer {
    let allowed_origins = [
        "http://localhost",
        "http://127.0.0.1",
        "http://localhost:5000",
        "http://127.0.0.1:5000",
    ];

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(tower_http::cors::Any)
}
