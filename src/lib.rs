//! # mindless
//!
//! A minimal serverless web framework. A platform event comes in, a
//! response envelope goes out; in between sit a router, a middleware chain,
//! and your handler.
//!
//! ## The contract
//!
//! API Gateway and Lambda own the transport: TLS, throttling, scaling,
//! payload limits. mindless does not touch any of it. What is left:
//!
//! - Event parsing: one [`Request`] per invocation, with a single parameter
//!   lookup over body, query string and path (`body > query > path`)
//! - Routing: radix-tree lookup via [`matchit`], literal segments beating
//!   parameters when both match
//! - Middleware: ordered stages that may inject parameters or answer early
//! - Data: [`data::Table`] CRUD handles over an explicit
//!   [`data::TableStore`] client
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use mindless::middleware::Next;
//! use mindless::{App, Error, Method, Request, Response, Route, Router, StatusCode};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), lambda_runtime::Error> {
//!     let router = Router::new()
//!         .route(Route::new(Method::Get, "/users/{id}", get_user).middleware(require_key))?
//!         .on(Method::Post, "/users", create_user)?;
//!
//!     mindless::lambda::run(App::new(router)).await
//! }
//!
//! async fn require_key(req: Request) -> Result<Next, Error> {
//!     if req.header("x-api-key").is_err() {
//!         return Ok(Next::Respond(Response::status(StatusCode::UNAUTHORIZED)));
//!     }
//!     Ok(Next::Continue(req))
//! }
//!
//! async fn get_user(req: Request) -> Result<Response, Error> {
//!     let id = req.get_or_fail("id")?;
//!     Ok(Response::json(json!({ "id": id })))
//! }
//!
//! async fn create_user(req: Request) -> Result<Response, Error> {
//!     let name = req.get_or_fail("name")?.clone();
//!     Ok(Response::builder()
//!         .status(StatusCode::CREATED)
//!         .json(json!({ "name": name })))
//! }
//! ```

mod app;
mod error;
mod event;
mod handler;
mod method;
mod request;
mod response;
mod router;
mod server;

pub mod config;
pub mod data;
pub mod lambda;
pub mod logging;
pub mod middleware;

pub use app::App;
pub use error::{Error, Result};
pub use event::InvocationEvent;
pub use handler::Handler;
pub use http::StatusCode;
pub use method::{Method, UnknownMethod};
pub use request::Request;
pub use response::{Body, ContentType, IntoResponse, Json, Response, ResponseBuilder, ResponseEnvelope};
pub use router::{Resolved, Route, Router};
pub use server::Server;
