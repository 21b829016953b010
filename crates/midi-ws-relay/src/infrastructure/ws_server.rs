//! HTTP/WebSocket listener built on axum.
//!
//! | Path        | Description                                        |
//! |-------------|----------------------------------------------------|
//! | `/`         | Viewer page (built-in, or the `--page` file)       |
//! | ws path     | WebSocket upgrade, attached to a [`ViewerSession`] |
//!
//! A plain `GET` on the ws path gets `426 Upgrade Required`.  Unknown paths
//! get `404` and other methods on known paths get `405` from the router.
//! Malformed or oversized request heads are rejected by hyper.
//!
//! [`serve`] stops accepting once the `running` flag is cleared.  Sessions
//! already attached keep running until their viewer or the feed goes away.

use std::future::IntoFuture;
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, WebSocket, WebSocketUpgrade},
        ConnectInfo, State,
    },
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, get_service},
    Router,
};
use futures_util::StreamExt;
use tokio::net::TcpListener;
use tokio::time::sleep;
use tower_http::{services::ServeFile, trace::TraceLayer};
use tracing::{debug, error, info, warn};

use crate::application::EventHub;
use crate::domain::RelayConfig;
use crate::infrastructure::viewer_session::ViewerSession;

/// Built-in viewer page served at `/`.
pub const VIEWER_PAGE: &str = include_str!("../../static/viewer.html");

/// Replaced with the configured WebSocket path when serving [`VIEWER_PAGE`].
const WS_PATH_PLACEHOLDER: &str = "__WS_PATH__";

/// How often [`serve`] checks the `running` flag.
const SHUTDOWN_POLL: Duration = Duration::from_millis(200);

/// Router state shared by every request.
pub struct ServerContext {
    pub hub: EventHub,
    pub ws_path: String,
    pub page: Option<PathBuf>,
    pub max_message_size: usize,
}

impl ServerContext {
    pub fn new(config: &RelayConfig, hub: EventHub) -> Self {
        Self {
            hub,
            ws_path: config.ws_path.clone(),
            page: config.page.clone(),
            max_message_size: config.max_message_size,
        }
    }
}

/// Binds the listener.
///
/// # Errors
///
/// Returns the OS error if the address is in use or not bindable.
pub async fn bind_listener(addr: SocketAddr) -> io::Result<TcpListener> {
    let listener = TcpListener::bind(addr).await?;
    info!("listening on {}", listener.local_addr().unwrap_or(addr));
    Ok(listener)
}

/// Builds the router for the viewer page and the WebSocket endpoint.
pub fn router(ctx: Arc<ServerContext>) -> Router {
    let page = match &ctx.page {
        Some(path) => {
            if !path.is_file() {
                warn!("viewer page {} not found; / will answer 404", path.display());
            }
            get_service(ServeFile::new(path))
        }
        None => get(builtin_page),
    };
    let ws_path = ctx.ws_path.clone();

    Router::new()
        .route("/", page)
        .route(&ws_path, get(upgrade_viewer))
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

/// Serves `app` on `listener` until `running` is set to `false`.
///
/// Each connection is handled on its own task, so a slow viewer never delays
/// the next accept.
pub async fn serve(listener: TcpListener, app: Router, running: Arc<AtomicBool>) {
    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    );

    tokio::select! {
        result = server.into_future() => {
            if let Err(e) = result {
                error!("listener failed: {e}");
            }
        }
        () = shutdown_requested(&running) => {
            info!("shutdown flag set; no longer accepting viewers");
        }
    }
}

async fn shutdown_requested(running: &AtomicBool) {
    while running.load(Ordering::Relaxed) {
        sleep(SHUTDOWN_POLL).await;
    }
}

async fn builtin_page(State(ctx): State<Arc<ServerContext>>) -> Html<String> {
    Html(VIEWER_PAGE.replace(WS_PATH_PLACEHOLDER, &ctx.ws_path))
}

/// Upgrades the request and hands the socket to a [`ViewerSession`].
async fn upgrade_viewer(
    State(ctx): State<Arc<ServerContext>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    match upgrade {
        Ok(ws) => ws
            .max_message_size(ctx.max_message_size)
            .max_frame_size(ctx.max_message_size)
            .on_upgrade(move |socket| run_viewer(socket, peer, ctx)),
        Err(rejection) => {
            debug!("{peer}: not a WebSocket upgrade ({rejection})");
            StatusCode::UPGRADE_REQUIRED.into_response()
        }
    }
}

async fn run_viewer(socket: WebSocket, peer: SocketAddr, ctx: Arc<ServerContext>) {
    let (sink, stream) = socket.split();
    let session = ViewerSession::new(peer, ctx.hub.subscribe());
    info!(
        "session {} started for {peer} ({} viewer(s) attached)",
        session.id(),
        ctx.hub.viewer_count()
    );
    session.run(sink, stream).await;
}
