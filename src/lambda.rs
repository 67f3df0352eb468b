//! AWS Lambda binding.
//!
//! ```rust,no_run
//! use mindless::{App, Method, Request, Response, Router};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), lambda_runtime::Error> {
//!     let router = Router::new().on(Method::Get, "/hello", hello)?;
//!     mindless::lambda::run(App::new(router)).await
//! }
//!
//! async fn hello(_req: Request) -> Response {
//!     Response::text("hello")
//! }
//! ```

use std::sync::Arc;

use lambda_runtime::{Error, LambdaEvent, service_fn};
use tracing::info;

use crate::app::App;
use crate::event::InvocationEvent;

/// Serves `app` on the Lambda runtime until the runtime shuts the process
/// down. Each invocation payload is decoded as an [`InvocationEvent`] and
/// answered with its [`ResponseEnvelope`](crate::ResponseEnvelope).
pub async fn run(app: App) -> Result<(), Error> {
    let app = Arc::new(app);
    info!(routes = app.router().len(), "starting lambda runtime");

    lambda_runtime::run(service_fn(move |event: LambdaEvent<InvocationEvent>| {
        let app = Arc::clone(&app);
        async move { Ok::<_, Error>(app.handle(event.payload).await) }
    }))
    .await
}
