//! Process entry point: loads configuration, binds the RTP and HTTP
//! listeners, and runs until a shutdown signal arrives.

use std::sync::Arc;

use tokio::net::{TcpListener, UdpSocket};

use voicebridge::{config::Config, control::http, rtp::demux, session::SessionRegistry};

/// Drains every live session before the process exits, awaiting each
/// shutdown so websockets close and buffers flush rather than being
/// abandoned mid-call.
async fn drain_sessions(registry: &SessionRegistry) {
    let sessions = registry.drain();
    if sessions.is_empty() {
        return;
    }
    tracing::info!(count = sessions.len(), "draining live sessions");
    for session in sessions {
        session.shutdown().await;
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = match Config::from_env() {
        Ok(c) => Arc::new(c),
        Err(e) => {
            tracing::error!(error = %e, "failed to load configuration");
            std::process::exit(1);
        }
    };

    let rtp_socket = match UdpSocket::bind(config.rtp_listen_addr).await {
        Ok(s) => Arc::new(s),
        Err(e) => {
            tracing::error!(error = %e, addr = %config.rtp_listen_addr, "failed to bind rtp socket");
            std::process::exit(1);
        }
    };
    tracing::info!(addr = %config.rtp_listen_addr, "rtp socket bound");

    let registry = Arc::new(SessionRegistry::new());

    let demux_handle = tokio::spawn(demux::run(rtp_socket.clone(), registry.clone(), config.clone()));

    let state = http::AppState {
        config: config.clone(),
        registry: registry.clone(),
        rtp_socket: rtp_socket.clone(),
    };
    let app = http::router(state);

    let http_listener = match TcpListener::bind(config.http_listen_addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(error = %e, addr = %config.http_listen_addr, "failed to bind http listener");
            std::process::exit(1);
        }
    };
    tracing::info!(addr = %config.http_listen_addr, "http control surface listening");

    let server = axum::serve(http_listener, app).with_graceful_shutdown(shutdown_signal());

    tokio::select! {
        res = server => {
            if let Err(e) = res {
                tracing::error!(error = %e, "http server exited with error");
            }
        }
        _ = demux_handle => {
            tracing::error!("rtp demultiplexer exited unexpectedly");
        }
    }

    tracing::info!(active_sessions = registry.active_count(), "voicebridge shutting down");
    drain_sessions(&registry).await;
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install sigterm handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
