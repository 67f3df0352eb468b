//! Radix-tree request router.
//!
//! One tree per HTTP method, O(path-length) lookup. A [`Route`] bundles the
//! pattern with its ordered middleware and the terminal handler; the router
//! only decides which route an invocation belongs to.
//!
//! Patterns use the API Gateway resource syntax: `{name}` binds one
//! segment, a trailing `{*name}` binds the rest of the path. When two
//! patterns could both match, the more specific one wins: a literal segment
//! beats a parameter at the same position, so `/users/me` is preferred over
//! `/users/{id}` for the path `/users/me` regardless of registration order.

use std::collections::{HashMap, HashSet};

use matchit::Router as MatchitRouter;
use tracing::debug;

use crate::error::{Error, Result};
use crate::handler::{BoxedHandler, Handler};
use crate::method::Method;
use crate::middleware::{BoxedMiddleware, Middleware, Next};
use crate::request::Request;
use crate::response::Response;

/// A method + pattern bound to a middleware chain and a terminal handler.
///
/// ```rust
/// # use mindless::{Method, Request, Response, Route};
/// # use mindless::middleware::Next;
/// # async fn load_user(req: Request) -> Result<Next, mindless::Error> { Ok(Next::Continue(req)) }
/// # async fn show(_: Request) -> Response { Response::text("") }
/// let route = Route::new(Method::Get, "/users/{id}", show).middleware(load_user);
/// ```
pub struct Route {
    method: Method,
    path: String,
    middleware: Vec<BoxedMiddleware>,
    handler: BoxedHandler,
}

impl Route {
    pub fn new(method: Method, path: impl Into<String>, handler: impl Handler) -> Self {
        Self {
            method,
            path: path.into(),
            middleware: Vec::new(),
            handler: handler.into_boxed_handler(),
        }
    }

    /// Appends a middleware stage. Stages run in the order they are added.
    pub fn middleware(mut self, stage: impl Middleware) -> Self {
        self.middleware.push(stage.into_boxed_middleware());
        self
    }

    pub fn method(&self) -> Method { self.method }
    pub fn path(&self) -> &str { &self.path }

    /// Runs the middleware chain, then the handler unless a stage answered.
    pub async fn run(&self, mut req: Request) -> Response {
        for stage in &self.middleware {
            match stage.call(req).await {
                Next::Continue(next) => req = next,
                Next::Respond(res) => return res,
            }
        }
        self.handler.call(req).await
    }
}

/// A route picked by [`Router::resolve`], with the path parameters its
/// pattern bound.
pub struct Resolved<'r> {
    pub route: &'r Route,
    pub params: Vec<(String, String)>,
}

/// The application router.
///
/// Build it once at startup; it is read-only afterward.
pub struct Router {
    routes: HashMap<Method, MatchitRouter<Route>>,
    registered: HashSet<(Method, String)>,
}

impl Router {
    pub fn new() -> Self {
        Self { routes: HashMap::new(), registered: HashSet::new() }
    }

    /// Registers a route.
    ///
    /// Fails with [`Error::DuplicateRoute`] if the exact method + pattern is
    /// taken, or [`Error::InvalidRoute`] if the pattern is malformed or
    /// ambiguous against an existing one.
    pub fn register(&mut self, route: Route) -> Result<()> {
        let key = (route.method, route.path.clone());
        if self.registered.contains(&key) {
            return Err(Error::DuplicateRoute { method: key.0, path: key.1 });
        }

        let (method, path) = key;
        self.routes
            .entry(method)
            .or_default()
            .insert(path.clone(), route)
            .map_err(|e| Error::InvalidRoute { path: path.clone(), reason: e.to_string() })?;

        debug!(%method, %path, "route registered");
        self.registered.insert((method, path));
        Ok(())
    }

    /// Chaining form of [`register`](Self::register).
    pub fn route(mut self, route: Route) -> Result<Self> {
        self.register(route)?;
        Ok(self)
    }

    /// Registers a handler with no middleware. Returns `self` for chaining:
    ///
    /// ```rust
    /// # use mindless::{Method, Request, Response, Router};
    /// # async fn show(_: Request) -> Response { Response::text("") }
    /// # async fn create(_: Request) -> Response { Response::text("") }
    /// # fn build() -> Result<Router, mindless::Error> {
    /// let router = Router::new()
    ///     .on(Method::Get,  "/users/{id}", show)?
    ///     .on(Method::Post, "/users",      create)?;
    /// # Ok(router)
    /// # }
    /// ```
    pub fn on(self, method: Method, path: &str, handler: impl Handler) -> Result<Self> {
        self.route(Route::new(method, path, handler))
    }

    /// Finds the route for `method` + `path`, or fails with
    /// [`Error::RouteNotFound`].
    pub fn resolve(&self, method: Method, path: &str) -> Result<Resolved<'_>> {
        let not_found = || Error::RouteNotFound { method, path: path.to_owned() };

        let tree = self.routes.get(&method).ok_or_else(not_found)?;
        let matched = tree.at(path).map_err(|_| not_found())?;
        let params = matched.params.iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Ok(Resolved { route: matched.value, params })
    }

    /// Every registered method + pattern pair.
    pub fn routes(&self) -> impl Iterator<Item = (Method, &str)> {
        self.registered.iter().map(|(m, p)| (*m, p.as_str()))
    }

    pub fn len(&self) -> usize { self.registered.len() }

    pub fn is_empty(&self) -> bool { self.registered.is_empty() }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::event::InvocationEvent;

    async fn ok(_: Request) -> Response {
        Response::text("ok")
    }

    fn request(method: Method, path: &str) -> Request {
        Request::from_event(InvocationEvent::new(method, path)).unwrap()
    }

    #[test]
    fn duplicate_route_is_rejected() {
        let mut router = Router::new();
        router.register(Route::new(Method::Get, "/users", ok)).unwrap();

        let err = router.register(Route::new(Method::Get, "/users", ok)).unwrap_err();
        assert!(matches!(err, Error::DuplicateRoute { method: Method::Get, ref path } if path == "/users"));

        // Same pattern, other verb is fine.
        router.register(Route::new(Method::Post, "/users", ok)).unwrap();
        assert_eq!(router.len(), 2);
    }

    #[test]
    fn conflicting_parameter_names_are_invalid() {
        let mut router = Router::new();
        router.register(Route::new(Method::Get, "/users/{id}", ok)).unwrap();
        let err = router.register(Route::new(Method::Get, "/users/{name}", ok)).unwrap_err();
        assert!(matches!(err, Error::InvalidRoute { .. }));
    }

    #[test]
    fn unregistered_route_is_not_found() {
        let router = Router::new().on(Method::Get, "/users", ok).unwrap();

        assert!(matches!(
            router.resolve(Method::Post, "/users"),
            Err(Error::RouteNotFound { method: Method::Post, .. })
        ));
        assert!(matches!(
            router.resolve(Method::Get, "/users/1/extra"),
            Err(Error::RouteNotFound { .. })
        ));
    }

    #[test]
    fn binds_named_segments() {
        let router = Router::new().on(Method::Get, "/orgs/{org}/users/{id}", ok).unwrap();
        let resolved = router.resolve(Method::Get, "/orgs/acme/users/42").unwrap();

        assert_eq!(resolved.route.path(), "/orgs/{org}/users/{id}");
        let mut params = resolved.params;
        params.sort();
        assert_eq!(params, vec![
            ("id".to_owned(), "42".to_owned()),
            ("org".to_owned(), "acme".to_owned()),
        ]);
    }

    #[test]
    fn literal_segment_beats_parameter() {
        for order in [["/users/{id}", "/users/me"], ["/users/me", "/users/{id}"]] {
            let mut router = Router::new();
            for path in order {
                router.register(Route::new(Method::Get, path, ok)).unwrap();
            }
            assert_eq!(router.resolve(Method::Get, "/users/me").unwrap().route.path(), "/users/me");
            assert_eq!(router.resolve(Method::Get, "/users/7").unwrap().route.path(), "/users/{id}");
        }
    }

    #[tokio::test]
    async fn middleware_runs_in_order_and_injects() {
        async fn first(mut req: Request) -> Result<Next> {
            req.add("trail", "first")?;
            Ok(Next::Continue(req))
        }
        async fn second(mut req: Request) -> Result<Next> {
            let trail = format!("{}>second", req.get_or_fail("trail")?.as_str().unwrap_or_default());
            req.add_overwrite("trail", trail);
            Ok(Next::Continue(req))
        }
        async fn handler(req: Request) -> Result<Response> {
            Ok(Response::json(req.get_or_fail("trail")?.clone()))
        }

        let route = Route::new(Method::Get, "/", handler).middleware(first).middleware(second);
        let res = route.run(request(Method::Get, "/")).await;
        assert_eq!(res.into_envelope().body, json!("first>second").to_string());
    }

    #[tokio::test]
    async fn middleware_can_short_circuit() {
        async fn deny(_: Request) -> Result<Next> {
            Ok(Next::Respond(Response::status(http::StatusCode::FORBIDDEN)))
        }
        async fn never(_: Request) -> Response {
            panic!("handler must not run after a short-circuit")
        }

        let route = Route::new(Method::Get, "/", never).middleware(deny);
        assert_eq!(route.run(request(Method::Get, "/")).await.status_code(), 403);
    }

    #[tokio::test]
    async fn middleware_error_ends_chain() {
        async fn needs_token(req: Request) -> Result<Next> {
            req.header("x-token")?;
            Ok(Next::Continue(req))
        }

        let route = Route::new(Method::Get, "/", ok).middleware(needs_token);
        assert_eq!(route.run(request(Method::Get, "/")).await.status_code(), 500);
    }
}
