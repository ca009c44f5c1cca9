//! Serve command

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clevert_core::ConfigStore;
use clevert_host::AppState;
use tracing::info;

use crate::cli::ServeArgs;
use crate::output;

pub async fn run(args: ServeArgs, config_dir: Option<&Path>) -> Result<()> {
    let (loader, mut config) = super::load_config(config_dir)?;

    // Command-line flags take precedence over file and environment
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(host) = args.host {
        config.server.host = host;
    }

    let store = Arc::new(ConfigStore::new(loader.config_dir().to_path_buf(), config));
    let state = AppState::new(store.clone()).context("Failed to initialise host")?;

    let listener = clevert_host::bind(&store)
        .await
        .context("Failed to bind a port")?;
    let addr = listener.local_addr()?;
    output::success(&format!("Clevert listening on http://{}", addr));
    output::info(&format!("Extensions: {}", store.extensions_dir().display()));

    tokio::select! {
        result = clevert_host::serve(listener, state) => {
            result.context("Server failed")?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
        }
    }

    store.flush().await;
    Ok(())
}
