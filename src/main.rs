// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::process::ExitCode;
use std::time::Duration;

use axum_server::{tls_rustls::RustlsConfig, Handle};
use tracing::{error, info, warn};

use wallet_link_server::{
    api::{cors_layer, router},
    auth::{KeyDirectoryClient, TokenVerifier},
    config::{setup_tracing, AppConfig, ConfigError, DEFAULT_LOG_FILTER},
    providers::moonpay::RequestSigner,
    state::AppState,
};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to build key directory client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("failed to load TLS certificate: {0}")]
    Tls(std::io::Error),

    #[error("server failed: {0}")]
    Serve(std::io::Error),
}

#[tokio::main]
async fn main() -> ExitCode {
    setup_tracing(DEFAULT_LOG_FILTER);

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Server exited with error");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), StartupError> {
    // Install the ring crypto provider for rustls (must be done before any TLS operations).
    // Another component may already have installed one.
    let _ = rustls::crypto::ring::default_provider().install_default();

    let config = AppConfig::from_env()?;
    info!(config = ?config, "Loaded configuration");

    let keys = KeyDirectoryClient::new(&config.jwks_url)?;
    match keys.refresh().await {
        Ok(count) => info!(keys = count, "Loaded signing keys"),
        Err(e) => warn!(error = %e, "Key directory unavailable at startup, will retry on demand"),
    }

    let verifier = TokenVerifier::new(keys, &config.privy_issuer, &config.privy_app_id);
    let signer = RequestSigner::from_config(&config);
    let state = AppState::new(verifier, signer);
    let app = router(state, cors_layer(config.cors_allowed_origin.as_deref())?);

    let handle = Handle::new();
    tokio::spawn(shutdown_signal(handle.clone()));

    let addr = config.bind_addr;
    match &config.tls {
        Some(tls) => {
            let tls_config = RustlsConfig::from_pem_file(&tls.cert, &tls.key)
                .await
                .map_err(StartupError::Tls)?;
            info!(%addr, "Wallet link server listening on https (docs at /docs)");
            axum_server::bind_rustls(addr, tls_config)
                .handle(handle)
                .serve(app.into_make_service())
                .await
                .map_err(StartupError::Serve)?;
        }
        None => {
            info!(%addr, "Wallet link server listening on http (docs at /docs)");
            axum_server::bind(addr)
                .handle(handle)
                .serve(app.into_make_service())
                .await
                .map_err(StartupError::Serve)?;
        }
    }

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal(handle: Handle<std::net::SocketAddr>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
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
                warn!(error = %e, "Failed to listen for SIGTERM");
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

    info!("Shutdown signal received");
    handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
}
