//! Local development server.
//!
//! Accepts real HTTP traffic, turns each request into the same
//! [`InvocationEvent`] the platform would deliver, and runs it through the
//! [`App`]. Handlers cannot tell the difference, so routes can be exercised
//! with `curl` before deploying.
//!
//! # Graceful shutdown
//!
//! On SIGTERM or Ctrl-C the server:
//! 1. Immediately stops `listener.accept()`, so no new connections are made.
//! 2. Lets every in-flight connection task run to completion.
//! 3. Returns from [`Server::serve`], which lets `main` exit cleanly.

use std::collections::HashMap;
use std::convert::Infallible;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::{BodyExt, Full};
use hyper::body::{Body, Incoming};
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use serde_json::json;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::app::App;
use crate::config::{Config, ConfigError};
use crate::error::Error;
use crate::event::InvocationEvent;
use crate::method::Method;
use crate::response::ResponseEnvelope;

type HttpResponse = http::Response<Full<Bytes>>;

/// The local HTTP server.
pub struct Server {
    addr: SocketAddr,
}

impl Server {
    /// Configures the server to bind to `addr` when [`serve`](Server::serve)
    /// is called.
    pub fn bind(addr: SocketAddr) -> Self {
        Self { addr }
    }

    /// Binds to `server.addr` from the configuration.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Ok(Self::bind(config.server_addr()?))
    }

    /// Starts accepting connections and dispatching them through `app`.
    ///
    /// Returns only after a full graceful shutdown.
    pub async fn serve(self, app: App) -> Result<(), Error> {
        let listener = TcpListener::bind(self.addr).await?;
        let app = Arc::new(app);

        info!(addr = %self.addr, routes = app.router().len(), "mindless local server listening");

        let mut tasks = tokio::task::JoinSet::new();

        let shutdown = shutdown_signal();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                // Check shutdown first so a SIGTERM stops accepting at once,
                // even with connections queued.
                biased;

                () = &mut shutdown => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    break;
                }

                res = listener.accept() => {
                    let (stream, remote_addr) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let app = Arc::clone(&app);
                    let io = TokioIo::new(stream);

                    tasks.spawn(async move {
                        // Called once per request on the connection.
                        let svc = service_fn(move |req| {
                            let app = Arc::clone(&app);
                            async move { dispatch(app, req, remote_addr).await }
                        });

                        if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                            .serve_connection(io, svc)
                            .await
                        {
                            error!(peer = %remote_addr, "connection error: {e}");
                        }
                    });
                }

                // Reap finished connection tasks so the set stays bounded.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        while tasks.join_next().await.is_some() {}

        info!("mindless local server stopped");
        Ok(())
    }
}

// ── Request dispatch ──────────────────────────────────────────────────────────

/// Emulates the trigger for one HTTP request. Never fails: transport-level
/// problems are answered directly.
async fn dispatch(
    app: Arc<App>,
    req: hyper::Request<Incoming>,
    remote_addr: SocketAddr,
) -> Result<HttpResponse, Infallible> {
    let event = match to_event(req, remote_addr).await {
        Ok(event) => event,
        Err(status) => return Ok(plain(status)),
    };
    Ok(into_http(app.handle(event).await))
}

/// Builds the event the platform would deliver for `req`.
async fn to_event<B>(req: hyper::Request<B>, remote_addr: SocketAddr) -> Result<InvocationEvent, StatusCode>
where
    B: Body,
    B::Error: fmt::Display,
{
    let (parts, body) = req.into_parts();

    let method: Method = parts.method.as_str().parse().map_err(|e| {
        warn!(error = %e, "rejecting request");
        StatusCode::METHOD_NOT_ALLOWED
    })?;

    let headers: HashMap<String, String> = parts
        .headers
        .iter()
        .filter_map(|(name, value)| Some((name.as_str().to_owned(), value.to_str().ok()?.to_owned())))
        .collect();

    let query: HashMap<String, String> = parts
        .uri
        .query()
        .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
        .unwrap_or_default();

    let bytes = body
        .collect()
        .await
        .map_err(|e| {
            warn!(error = %e, "failed reading request body");
            StatusCode::BAD_REQUEST
        })?
        .to_bytes();
    let body = String::from_utf8(bytes.to_vec()).map_err(|_| StatusCode::BAD_REQUEST)?;

    let path = parts.uri.path().to_owned();
    Ok(InvocationEvent {
        http_method: method,
        resource: path.clone(),
        path,
        headers: Some(headers),
        path_parameters: None,
        query_string_parameters: (!query.is_empty()).then_some(query),
        stage_variables: None,
        request_context: Some(json!({
            "stage": "local",
            "identity": { "sourceIp": remote_addr.ip().to_string() },
        })),
        body: (!body.is_empty()).then_some(body),
        is_base64_encoded: false,
    })
}

fn into_http(envelope: ResponseEnvelope) -> HttpResponse {
    let mut builder = http::Response::builder().status(envelope.status_code);
    for (name, value) in &envelope.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
        .body(Full::new(Bytes::from(envelope.body)))
        .unwrap_or_else(|e| {
            error!(error = %e, "handler produced an invalid response");
            plain(StatusCode::INTERNAL_SERVER_ERROR)
        })
}

fn plain(status: StatusCode) -> HttpResponse {
    let mut res = http::Response::new(Full::new(Bytes::new()));
    *res.status_mut() = status;
    res
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first SIGTERM or Ctrl-C. A signal that cannot be hooked
/// is logged and ignored.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to install Ctrl-C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}
