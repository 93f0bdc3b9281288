//! Static HTTP serving of the rendition tree.

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;

use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Serve `dir` on `addr` until the token is cancelled.
///
/// The router is a single fallback `ServeDir`: every request path maps
/// directly onto the rendition tree, index pages included.
pub async fn serve(addr: SocketAddr, dir: PathBuf, shutdown: CancellationToken) -> io::Result<()> {
    let app = Router::new()
        .fallback_service(ServeDir::new(&dir))
        .layer(TraceLayer::new_for_http());

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, dir = %dir.display(), "serving renditions");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}
