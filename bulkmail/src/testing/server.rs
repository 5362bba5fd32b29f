//! Router served over real TCP

use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// A router listening on `127.0.0.1` with an ephemeral port
///
/// The server task is aborted when this value is dropped.
#[derive(Debug)]
pub struct SpawnedServer {
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl SpawnedServer {
    /// Bind an ephemeral port and serve `router` in the background
    ///
    /// # Errors
    ///
    /// Returns an error if the port cannot be bound
    pub async fn start(router: Router) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let handle = tokio::spawn(async move {
            if let Err(err) = axum::serve(listener, router).await {
                tracing::error!(%err, "test server stopped");
            }
        });
        Ok(Self { addr, handle })
    }

    /// Bound address
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// `http://` base URL of the server
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

impl Drop for SpawnedServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
