//! Outgoing response type, the [`IntoResponse`] conversion trait, and the
//! platform envelope.
//!
//! Handlers build a [`Response`]; only the dispatch boundary turns it into a
//! [`ResponseEnvelope`], the `{ statusCode, headers, body }` shape the
//! trigger expects.

use std::collections::HashMap;

use http::StatusCode;
use serde::Serialize;
use serde_json::Value;

use crate::error::Error;

// ── ContentType ───────────────────────────────────────────────────────────────

/// Common content-type values for use with [`ResponseBuilder::body`].
pub enum ContentType {
    Csv,   // text/csv
    Html,  // text/html; charset=utf-8
    Json,  // application/json
    Text,  // text/plain; charset=utf-8
    Xml,   // application/xml
}

impl ContentType {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Csv  => "text/csv",
            Self::Html => "text/html; charset=utf-8",
            Self::Json => "application/json",
            Self::Text => "text/plain; charset=utf-8",
            Self::Xml  => "application/xml",
        }
    }
}

// ── Body ──────────────────────────────────────────────────────────────────────

/// Response payload. JSON values are stringified at the boundary; text is
/// sent verbatim.
#[derive(Clone, Debug, PartialEq)]
pub enum Body {
    Empty,
    Text(String),
    Json(Value),
}

impl Body {
    fn into_text(self) -> String {
        match self {
            Self::Empty => String::new(),
            Self::Text(text) => text,
            Self::Json(value) => value.to_string(),
        }
    }
}

// ── Response ──────────────────────────────────────────────────────────────────

/// An outgoing response.
///
/// ```rust
/// use mindless::{Response, StatusCode};
/// use serde_json::json;
///
/// Response::json(json!({ "id": 1 }));
/// Response::text("hello");
/// Response::status(StatusCode::NO_CONTENT);
///
/// Response::builder()
///     .status(StatusCode::CREATED)
///     .header("location", "/users/42")
///     .json(json!({ "id": 42 }));
/// ```
#[derive(Clone, Debug)]
pub struct Response {
    status: StatusCode,
    headers: HashMap<String, String>,
    body: Body,
}

impl Response {
    /// `200 OK`, `application/json`.
    pub fn json(body: impl Into<Value>) -> Self {
        Self::builder().json(body)
    }

    /// `200 OK`, `text/plain; charset=utf-8`.
    pub fn text(body: impl Into<String>) -> Self {
        Self::builder().text(body)
    }

    /// Response with no body.
    pub fn status(code: StatusCode) -> Self {
        Self::builder().status(code).no_body()
    }

    /// Builder for responses that need a custom status or extra headers.
    pub fn builder() -> ResponseBuilder {
        ResponseBuilder { headers: HashMap::new(), status: StatusCode::OK }
    }

    pub fn status_code(&self) -> u16 { self.status.as_u16() }
    pub fn headers(&self) -> &HashMap<String, String> { &self.headers }
    pub fn body(&self) -> &Body { &self.body }

    /// Converts into the platform envelope, serializing the body to text.
    pub fn into_envelope(self) -> ResponseEnvelope {
        ResponseEnvelope {
            status_code: self.status.as_u16(),
            headers: self.headers,
            body: self.body.into_text(),
            is_base64_encoded: false,
        }
    }
}

// ── ResponseBuilder ───────────────────────────────────────────────────────────

/// Fluent builder for [`Response`].
///
/// Obtain via [`Response::builder()`]. Defaults to `200 OK`. Terminated by a
/// typed body method.
pub struct ResponseBuilder {
    headers: HashMap<String, String>,
    status: StatusCode,
}

impl ResponseBuilder {
    pub fn status(mut self, code: StatusCode) -> Self {
        self.status = code;
        self
    }

    /// Sets a header. A repeated name replaces the earlier value.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_owned(), value.to_owned());
        self
    }

    /// Terminate with a JSON body (`application/json`).
    pub fn json(self, body: impl Into<Value>) -> Response {
        self.finish(ContentType::Json, Body::Json(body.into()))
    }

    /// Terminate with a plain-text body (`text/plain; charset=utf-8`).
    pub fn text(self, body: impl Into<String>) -> Response {
        self.finish(ContentType::Text, Body::Text(body.into()))
    }

    /// Terminate with a pre-rendered body of the given type.
    pub fn body(self, content_type: ContentType, body: impl Into<String>) -> Response {
        self.finish(content_type, Body::Text(body.into()))
    }

    /// Terminate with no body (e.g. `204 No Content`).
    pub fn no_body(self) -> Response {
        Response { status: self.status, headers: self.headers, body: Body::Empty }
    }

    fn finish(mut self, content_type: ContentType, body: Body) -> Response {
        self.headers
            .entry("content-type".to_owned())
            .or_insert_with(|| content_type.as_str().to_owned());
        Response { status: self.status, headers: self.headers, body }
    }
}

// ── Envelope ──────────────────────────────────────────────────────────────────

/// The response shape returned to the trigger.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    pub status_code: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
    pub is_base64_encoded: bool,
}

// ── IntoResponse ──────────────────────────────────────────────────────────────

/// Conversion into a [`Response`].
///
/// Implement on your own types to return them directly from handlers.
pub trait IntoResponse {
    fn into_response(self) -> Response;
}

impl IntoResponse for Response {
    fn into_response(self) -> Response { self }
}

impl IntoResponse for &'static str {
    fn into_response(self) -> Response { Response::text(self) }
}

impl IntoResponse for String {
    fn into_response(self) -> Response { Response::text(self) }
}

impl IntoResponse for Value {
    fn into_response(self) -> Response { Response::json(self) }
}

/// Return a status directly from a handler: `return StatusCode::NOT_FOUND`
impl IntoResponse for StatusCode {
    fn into_response(self) -> Response { Response::status(self) }
}

/// Lets handlers use `?`: the error side renders its own response.
impl<T, E> IntoResponse for Result<T, E>
where
    T: IntoResponse,
    E: IntoResponse,
{
    fn into_response(self) -> Response {
        match self {
            Ok(ok) => ok.into_response(),
            Err(err) => err.into_response(),
        }
    }
}

/// Serializes any `T: Serialize` as a `200 OK` JSON response.
///
/// ```rust
/// use mindless::{Json, Request};
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct User { id: u32, name: String }
///
/// async fn get_user(_req: Request) -> Json<User> {
///     Json(User { id: 1, name: "alice".into() })
/// }
/// ```
pub struct Json<T>(pub T);

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        match serde_json::to_value(&self.0) {
            Ok(value) => Response::json(value),
            Err(e) => Error::Serialize(e).into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn json_envelope() {
        let env = Response::builder()
            .status(StatusCode::CREATED)
            .header("location", "/users/42")
            .json(json!({ "id": 42 }))
            .into_envelope();

        assert_eq!(env.status_code, 201);
        assert_eq!(env.body, r#"{"id":42}"#);
        assert_eq!(env.headers["content-type"], "application/json");
        assert_eq!(env.headers["location"], "/users/42");
    }

    #[test]
    fn text_is_verbatim_and_empty_is_blank() {
        assert_eq!(Response::text("hi").into_envelope().body, "hi");
        let env = Response::status(StatusCode::NO_CONTENT).into_envelope();
        assert_eq!(env.status_code, 204);
        assert_eq!(env.body, "");
        assert!(env.headers.is_empty());
    }

    #[test]
    fn explicit_content_type_wins() {
        let res = Response::builder()
            .header("content-type", "application/problem+json")
            .json(json!({}));
        assert_eq!(res.headers()["content-type"], "application/problem+json");
    }

    #[test]
    fn envelope_serializes_camel_case() {
        let env = Response::text("ok").into_envelope();
        let value = serde_json::to_value(&env).unwrap();
        assert_eq!(value["statusCode"], 200);
        assert_eq!(value["body"], "ok");
        assert_eq!(value["isBase64Encoded"], false);
    }

    #[test]
    fn result_converts_both_sides() {
        let ok: Result<&'static str, Error> = Ok("fine");
        assert_eq!(ok.into_response().status_code(), 200);

        let err: Result<&'static str, Error> = Err(Error::key_not_found("id"));
        assert_eq!(err.into_response().status_code(), 500);
    }

    #[test]
    fn json_wrapper_serializes() {
        #[derive(Serialize)]
        struct User { id: u32 }
        let res = Json(User { id: 7 }).into_response();
        assert_eq!(res.body(), &Body::Json(json!({ "id": 7 })));
    }
}
