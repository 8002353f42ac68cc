#[macro_use]
extern crate tracing;

mod error;
pub mod router;

pub use error::AppError;
use eyre::Result;
use prometheus::Registry;
pub use router::create_router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// Serves `registry` until `cancel` fires, letting open requests finish.
pub async fn serve(listener: TcpListener, registry: Registry, cancel: CancellationToken) -> Result<()> {
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, create_router(registry))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await?;
    info!("server stopped");
    Ok(())
}
