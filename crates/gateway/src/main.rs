//! `keyguard-svc` gateway entry point.
//!
//! Startup sequence:
//! 1. Load and validate [`Config`] from environment variables.
//! 2. Initialise the telemetry pipeline (tracing + optional OTLP).
//! 3. Build the envelope codec, the Starknet signer and the Firebase verifier
//!    for whichever of them is configured.
//! 4. Build the Axum router and serve it over TLS or plain HTTP until SIGINT
//!    or SIGTERM.

mod auth;
mod config;
mod crypto;
mod server;
mod signing;
mod telemetry;

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use tracing::{info, warn};

use auth::{FirebaseVerifier, JwksCache};
use config::Config;
use crypto::EnvelopeCodec;
use server::state::AppState;
use signing::{SigningService, StarknetSigner};

#[tokio::main]
async fn main() -> Result<()> {
    // -----------------------------------------------------------------------
    // 1. Configuration
    // -----------------------------------------------------------------------
    let cfg = Config::from_env().map_err(|e| {
        // Telemetry is not yet up; write to stderr directly.
        eprintln!("ERROR: configuration invalid: {e:#}");
        e
    })?;

    // -----------------------------------------------------------------------
    // 2. Telemetry
    // -----------------------------------------------------------------------
    telemetry::init_telemetry(cfg.otel_exporter_otlp_endpoint.as_deref(), &cfg.log_level)?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        port = cfg.listen_port,
        tls = cfg.tls_paths().is_some(),
        "keyguard-svc starting"
    );

    // -----------------------------------------------------------------------
    // 3. Components
    // -----------------------------------------------------------------------
    let state = build_state(&cfg)?;

    // -----------------------------------------------------------------------
    // 4. HTTP server
    // -----------------------------------------------------------------------
    let router = server::router::build(state);
    let addr: std::net::SocketAddr = ([0, 0, 0, 0], cfg.listen_port).into();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(addr = %addr, "listening");

    match cfg.tls_paths() {
        Some((cert, key)) => {
            let tls = server::tls::load_server_config(cert, key)?;
            server::tls::serve(listener, router, tls, shutdown_signal()).await;
        }
        None => {
            axum::serve(listener, router)
                .with_graceful_shutdown(shutdown_signal())
                .await
                .context("HTTP server failed")?;
        }
    }

    info!("keyguard-svc stopped");
    telemetry::shutdown_telemetry();
    Ok(())
}

fn build_state(cfg: &Config) -> Result<AppState> {
    let mut state = AppState::new();

    match cfg.secret() {
        Some(secret) => state = state.with_codec(EnvelopeCodec::new(secret.clone())),
        None => warn!("ENCRYPTION_SECRET not set; crypto endpoints will answer 500"),
    }

    if let Some(rpc_url) = cfg.starknet_rpc_url.as_deref() {
        let signer = StarknetSigner::new(rpc_url, cfg.starknet_chain_id.as_deref())?;
        let timeout = Duration::from_secs(cfg.signing_timeout_secs);
        state = state.with_signing(SigningService::new(Arc::new(signer), timeout));
        info!(timeout_secs = cfg.signing_timeout_secs, "transaction signing enabled");
    }

    if let Some(project_id) = cfg.firebase_project_id.as_deref() {
        let jwks = JwksCache::new(cfg.firebase_jwks_url.as_str())
            .context("failed to build JWKS HTTP client")?
            .with_cache_ttl(Duration::from_secs(cfg.jwks_cache_ttl_secs))
            .with_min_refresh_interval(Duration::from_secs(cfg.jwks_min_refresh_secs));
        info!(project_id, jwks_url = jwks.url(), "ID token verification enabled");
        state = state.with_verifier(FirebaseVerifier::new(project_id, jwks));
    }

    Ok(state)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("shutdown signal received");
}
