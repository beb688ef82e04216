//! Web server exposing the metrics endpoint.
//!
//! The server only reads the registry; the poll loop is the single writer.

pub mod config;
pub mod handlers;
pub mod router;

// Re-export commonly used items
pub use config::WebConfig;
pub use router::create_app;

use crate::error::{ExporterError, Result};
use prometheus::Registry;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Bind the listener described by `config`.
///
/// Split from [`serve`] so that binding failures surface before polling starts.
pub async fn bind(config: &WebConfig) -> Result<TcpListener> {
    let addr = config.bind_address()?;

    TcpListener::bind(&addr)
        .await
        .map_err(|e| ExporterError::web_server_error(format!("Failed to bind to address: {}", e)))
}

/// Serve `registry` on `listener` until `cancel` fires.
pub async fn serve(
    listener: TcpListener,
    registry: Registry,
    cancel: CancellationToken,
) -> Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("Metrics available at http://{}/metrics", addr);
    }

    axum::serve(listener, create_app(registry))
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await
        .map_err(|e| ExporterError::web_server_error(format!("Server error: {}", e)))
}
