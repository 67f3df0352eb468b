//! Middleware layer.
//!
//! A middleware stage receives the [`Request`] by value and either hands it
//! on with [`Next::Continue`] or ends the chain with [`Next::Respond`].
//! Stages run in registration order, each seeing whatever earlier stages
//! injected through [`Request::add`]:
//!
//! ```rust
//! use mindless::middleware::Next;
//! use mindless::{Error, Request, Response, StatusCode};
//!
//! async fn authenticate(mut req: Request) -> Result<Next, Error> {
//!     let Ok(token) = req.header("authorization") else {
//!         return Ok(Next::Respond(Response::status(StatusCode::UNAUTHORIZED)));
//!     };
//!     let user = token.trim_start_matches("Bearer ").to_owned();
//!     req.add("user", user)?;
//!     Ok(Next::Continue(req))
//! }
//! ```
//!
//! An `Err` also ends the chain; it is rendered through the error boundary.

use std::future::Future;
use std::sync::Arc;

use crate::error::Error;
use crate::handler::BoxFuture;
use crate::request::Request;
use crate::response::{IntoResponse, Response};

/// Outcome of one middleware stage.
pub enum Next {
    /// Pass the (possibly modified) request to the next stage.
    Continue(Request),
    /// Stop the chain and answer with this response.
    Respond(Response),
}

#[doc(hidden)]
pub trait ErasedMiddleware {
    fn call(&self, req: Request) -> BoxFuture<Next>;
}

#[doc(hidden)]
pub type BoxedMiddleware = Arc<dyn ErasedMiddleware + Send + Sync + 'static>;

/// Implemented for every valid middleware stage:
///
/// ```text
/// async fn name(req: Request) -> Result<Next, mindless::Error>
/// ```
pub trait Middleware: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_middleware(self) -> BoxedMiddleware;
}

mod private {
    pub trait Sealed {}
}

impl<F, Fut> private::Sealed for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Next, Error>> + Send + 'static,
{
}

impl<F, Fut> Middleware for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Next, Error>> + Send + 'static,
{
    fn into_boxed_middleware(self) -> BoxedMiddleware {
        Arc::new(FnMiddleware(self))
    }
}

struct FnMiddleware<F>(F);

impl<F, Fut> ErasedMiddleware for FnMiddleware<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Next, Error>> + Send + 'static,
{
    fn call(&self, req: Request) -> BoxFuture<Next> {
        let fut = (self.0)(req);
        Box::pin(async move {
            match fut.await {
                Ok(next) => next,
                Err(e) => Next::Respond(e.into_response()),
            }
        })
    }
}
