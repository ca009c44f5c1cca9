//! Router assembly and listener binding

use std::io;

use axum::routing::{get, post};
use axum::Router;
use clevert_core::{ConfigStore, Error, Result};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use crate::api;
use crate::state::AppState;

/// Build the HTTP router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/install-extension", post(api::install_extension))
        .route("/cancel-install", post(api::cancel_install))
        .route("/remove-extension", post(api::remove_extension))
        .route("/list-extensions", get(api::list_extensions))
        .route("/extensions/{dir}/index.js", get(api::ui_module))
        .route("/run-action", post(api::run_action))
        .route("/stop-action", post(api::stop_action))
        .route("/get-status", get(api::get_status))
        .route("/health", get(api::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind the configured host and port, walking upwards while ports are taken.
///
/// The port actually bound is written back to the configuration.
pub async fn bind(config: &ConfigStore) -> Result<TcpListener> {
    let server = config.get().server;
    let attempts = server.port_attempts.max(1);

    let mut last_error = None;
    for offset in 0..attempts {
        let Some(port) = server.port.checked_add(offset) else {
            break;
        };
        match TcpListener::bind((server.host.as_str(), port)).await {
            Ok(listener) => {
                let bound = listener.local_addr()?.port();
                info!("Listening on {}:{}", server.host, bound);
                config.update(|c| c.server.port = bound);
                return Ok(listener);
            }
            Err(e) if e.kind() == io::ErrorKind::AddrInUse => {
                debug!("Port {} is taken", port);
                last_error = Some(e);
            }
            Err(e) => return Err(e.into()),
        }
    }

    Err(Error::Io(last_error.unwrap_or_else(|| {
        io::Error::new(io::ErrorKind::AddrInUse, "no port available")
    })))
}

/// Serve until the listener fails
pub async fn serve(listener: TcpListener, state: AppState) -> Result<()> {
    axum::serve(listener, router(state)).await?;
    Ok(())
}
