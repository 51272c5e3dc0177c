//! Development server implementation.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use tower_http::services::ServeDir;

use lacquer_pipeline::ServerOptions;

use crate::livereload::{client_script, ReloadHub, ReloadMessage};

/// Errors that can occur with the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Invalid server address {0}")]
    InvalidAddress(String),

    #[error("Failed to bind to {0}: {1}")]
    BindError(SocketAddr, String),
}

/// Shared server state.
struct ServerState {
    hub: ReloadHub,
}

/// A running dev server.
#[derive(Debug)]
pub struct ServerHandle {
    addr: SocketAddr,
    task: tokio::task::JoinHandle<()>,
}

impl ServerHandle {
    /// The address the listener bound.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop serving.
    pub fn shutdown(&self) {
        self.task.abort();
    }
}

/// Development server over the destination directory.
pub struct DevServer {
    options: ServerOptions,
    hub: ReloadHub,
}

impl DevServer {
    /// Create a new development server broadcasting through the given hub.
    pub fn new(options: ServerOptions, hub: ReloadHub) -> Self {
        Self { options, hub }
    }

    /// Bind the listener and start serving in the background.
    ///
    /// The returned handle's address is live by the time this resolves, so
    /// callers may register watch rules immediately after.
    pub async fn start(self) -> Result<ServerHandle, ServerError> {
        let addr: SocketAddr = format!("{}:{}", self.options.host, self.options.port)
            .parse()
            .map_err(|_| {
                ServerError::InvalidAddress(format!(
                    "{}:{}",
                    self.options.host, self.options.port
                ))
            })?;

        let state = Arc::new(ServerState { hub: self.hub });

        let app = Router::new()
            .route("/__livereload", get(ws_handler))
            .route("/__livereload.js", get(script_handler))
            .fallback_service(ServeDir::new(&self.options.base_dir))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindError(addr, e.to_string()))?;

        let addr = listener
            .local_addr()
            .map_err(|e| ServerError::BindError(addr, e.to_string()))?;

        tracing::info!(
            "Serving {} at http://{}",
            self.options.base_dir.display(),
            addr
        );

        if self.options.open {
            let url = format!("http://{}", addr);
            let _ = open::that(&url);
        }

        let task = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("Dev server stopped: {}", e);
            }
        });

        Ok(ServerHandle { addr, task })
    }
}

/// Handler for the reload WebSocket endpoint.
async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ServerState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, state))
}

/// Handle a WebSocket connection.
async fn handle_ws(mut socket: WebSocket, state: Arc<ServerState>) {
    let mut rx = state.hub.subscribe();

    // Send connected message
    let msg = serde_json::to_string(&ReloadMessage::Connected).unwrap();
    if socket.send(Message::Text(msg.into())).await.is_err() {
        return;
    }

    // Forward reload messages to the client
    while let Ok(reload_msg) = rx.recv().await {
        let json = serde_json::to_string(&reload_msg).unwrap();
        if socket.send(Message::Text(json.into())).await.is_err() {
            break;
        }
    }
}

/// Handler for the reload client script.
async fn script_handler() -> impl IntoResponse {
    let script = client_script("/__livereload");
    ([("content-type", "application/javascript")], script)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ephemeral_options(base_dir: &std::path::Path) -> ServerOptions {
        ServerOptions {
            base_dir: base_dir.to_path_buf(),
            host: "127.0.0.1".to_string(),
            port: 0,
            open: false,
        }
    }

    #[tokio::test]
    async fn start_binds_an_ephemeral_port() {
        let temp = tempfile::tempdir().unwrap();
        let hub = ReloadHub::new();

        let handle = DevServer::new(ephemeral_options(temp.path()), hub)
            .start()
            .await
            .unwrap();

        assert_ne!(handle.addr().port(), 0);

        handle.shutdown();
    }

    #[tokio::test]
    async fn two_servers_do_not_share_a_hub() {
        let temp = tempfile::tempdir().unwrap();

        let hub_a = ReloadHub::new();
        let hub_b = ReloadHub::new();

        let a = DevServer::new(ephemeral_options(temp.path()), hub_a.clone())
            .start()
            .await
            .unwrap();
        let b = DevServer::new(ephemeral_options(temp.path()), hub_b.clone())
            .start()
            .await
            .unwrap();

        let mut rx = hub_b.subscribe();
        hub_a.reload();

        assert!(rx.try_recv().is_err());

        a.shutdown();
        b.shutdown();
    }

    #[test]
    fn rejects_an_unparseable_address() {
        let options = ServerOptions {
            base_dir: std::path::PathBuf::from("dist"),
            host: "not an address".to_string(),
            port: 0,
            open: false,
        };

        let err = tokio_test::block_on(DevServer::new(options, ReloadHub::new()).start());

        assert!(matches!(err, Err(ServerError::InvalidAddress(_))));
    }
}
