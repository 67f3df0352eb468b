//! The dispatch boundary.
//!
//! [`App`] takes one platform event through the whole cycle:
//!
//! ```text
//! InvocationEvent → Request → Router::resolve → middleware… → handler → Response → ResponseEnvelope
//! ```
//!
//! Errors never cross this boundary: a routing miss becomes `404 Not Found`,
//! anything else becomes the internal error response.

use std::time::Instant;

use tracing::{Instrument, info, info_span, warn};

use crate::error::{Error, Result};
use crate::event::InvocationEvent;
use crate::request::Request;
use crate::response::{IntoResponse, Response, ResponseEnvelope};
use crate::router::Router;

/// A routed application, ready to serve invocations.
pub struct App {
    router: Router,
}

impl App {
    pub fn new(router: Router) -> Self {
        Self { router }
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Handles one event and returns the envelope the trigger expects.
    pub async fn handle(&self, event: InvocationEvent) -> ResponseEnvelope {
        self.dispatch(event).await.into_envelope()
    }

    /// Handles one event, stopping short of envelope conversion.
    pub async fn dispatch(&self, event: InvocationEvent) -> Response {
        let span = info_span!("invocation", method = %event.http_method, path = %event.path);
        async move {
            let started = Instant::now();
            let response = match self.run(event).await {
                Ok(response) => response,
                Err(e @ Error::RouteNotFound { .. }) => {
                    warn!(error = %e, "no matching route");
                    e.into_response()
                }
                Err(e) => e.into_response(),
            };
            info!(
                status = response.status_code(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "invocation complete"
            );
            response
        }
        .instrument(span)
        .await
    }

    async fn run(&self, event: InvocationEvent) -> Result<Response> {
        let mut req = Request::from_event(event)?;
        let resolved = self.router.resolve(req.method(), req.path())?;
        req.bind_path_parameters(resolved.params.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        Ok(resolved.route.run(req).await)
    }
}

impl From<Router> for App {
    fn from(router: Router) -> Self {
        Self::new(router)
    }
}
