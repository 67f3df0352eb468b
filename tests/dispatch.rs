//! End-to-end dispatch: platform event in, response envelope out.

use std::sync::Arc;

use mindless::data::{CreateOptions, KeySchema, MemoryStore, Table, TableDefinition, TableStore};
use mindless::middleware::Next;
use mindless::{App, Error, InvocationEvent, Method, Request, Response, Route, Router, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

fn event(raw: Value) -> InvocationEvent {
    serde_json::from_value(raw).expect("valid event")
}

fn body(envelope: &mindless::ResponseEnvelope) -> Value {
    serde_json::from_str(&envelope.body).expect("json body")
}

async fn echo(req: Request) -> Result<Response, Error> {
    Ok(Response::json(json!({
        "id": req.get_or_fail("id")?,
        "sort": req.get("sort"),
    })))
}

#[tokio::test]
async fn event_with_null_maps_is_routed() {
    let app = App::new(Router::new().on(Method::Get, "/ping", |_req: Request| async { "pong" }).unwrap());

    let envelope = app
        .handle(event(json!({
            "headers": null,
            "path": "/ping",
            "pathParameters": null,
            "requestContext": {},
            "resource": "/ping",
            "httpMethod": "GET",
            "queryStringParameters": null,
            "stageVariables": null,
            "body": null
        })))
        .await;

    assert_eq!(envelope.status_code, 200);
    assert_eq!(envelope.body, "pong");
}

#[tokio::test]
async fn path_parameters_come_from_event_or_router() {
    let app = App::new(Router::new().on(Method::Get, "/items/{id}", echo).unwrap());

    // Platform-supplied parameters.
    let envelope = app
        .handle(event(json!({
            "httpMethod": "GET",
            "path": "/items/42",
            "resource": "/items/{id}",
            "pathParameters": { "id": "42" },
            "queryStringParameters": { "sort": "asc" }
        })))
        .await;
    assert_eq!(body(&envelope), json!({ "id": "42", "sort": "asc" }));

    // Bound by the router when the event carries none.
    let envelope = app.handle(InvocationEvent::new(Method::Get, "/items/7")).await;
    assert_eq!(body(&envelope), json!({ "id": "7", "sort": null }));
}

#[tokio::test]
async fn body_wins_over_path_parameter() {
    let app = App::new(Router::new().on(Method::Put, "/items/{id}", echo).unwrap());
    let envelope = app
        .handle(InvocationEvent::new(Method::Put, "/items/7").with_body(r#"{"id":"from-body"}"#))
        .await;
    assert_eq!(body(&envelope)["id"], "from-body");
}

#[tokio::test]
async fn unknown_route_is_404() {
    let app = App::new(Router::new().on(Method::Get, "/items/{id}", echo).unwrap());

    let envelope = app.handle(InvocationEvent::new(Method::Delete, "/items/7")).await;
    assert_eq!(envelope.status_code, 404);
    assert_eq!(body(&envelope), json!({ "message": "Not Found" }));
}

#[tokio::test]
async fn internal_failures_are_500_without_details() {
    let app = App::new(Router::new().on(Method::Get, "/items/{id}", echo).unwrap());

    let malformed = app
        .handle(InvocationEvent::new(Method::Get, "/items/7").with_body("{oops"))
        .await;
    assert_eq!(malformed.status_code, 500);
    assert_eq!(body(&malformed), json!({ "message": "Internal Server Error" }));

    let app = App::new(
        Router::new()
            .on(Method::Get, "/needs-name", |req: Request| async move {
                req.get_or_fail("name").map(|v| Response::json(v.clone()))
            })
            .unwrap(),
    );
    let missing = app.handle(InvocationEvent::new(Method::Get, "/needs-name")).await;
    assert_eq!(missing.status_code, 500);
}

#[tokio::test]
async fn middleware_injects_for_the_handler() {
    async fn authenticate(mut req: Request) -> Result<Next, Error> {
        let Ok(token) = req.header("Authorization") else {
            return Ok(Next::Respond(Response::status(StatusCode::UNAUTHORIZED)));
        };
        let user = token.trim_start_matches("Bearer ").to_owned();
        req.add("user", user)?;
        Ok(Next::Continue(req))
    }

    async fn whoami(req: Request) -> Result<Response, Error> {
        Ok(Response::json(req.get_or_fail("user")?.clone()))
    }

    let router = Router::new()
        .route(Route::new(Method::Get, "/me", whoami).middleware(authenticate))
        .unwrap();
    let app = App::new(router);

    let denied = app.handle(InvocationEvent::new(Method::Get, "/me")).await;
    assert_eq!(denied.status_code, 401);

    let allowed = app
        .handle(InvocationEvent::new(Method::Get, "/me").with_header("authorization", "Bearer zach"))
        .await;
    assert_eq!(allowed.status_code, 200);
    assert_eq!(body(&allowed), json!("zach"));
}

#[derive(Debug, Deserialize, Serialize)]
struct Note {
    id: String,
    text: String,
}

#[tokio::test]
async fn controllers_persist_through_a_table() {
    let store: Arc<dyn TableStore> = Arc::new(MemoryStore::new());
    let notes: Table<Note> =
        Table::serde("notes", TableDefinition::new(KeySchema::string("id")), store.clone()).unwrap();
    store.create_tables().await.unwrap();

    let create = {
        let notes = notes.clone();
        move |req: Request| {
            let notes = notes.clone();
            async move {
                let note: Note = req.json()?;
                let saved = notes.create(&note, CreateOptions::default()).await?;
                Ok::<_, Error>(
                    Response::builder()
                        .status(StatusCode::CREATED)
                        .json(serde_json::to_value(saved)?),
                )
            }
        }
    };
    let list = move |_req: Request| {
        let notes = notes.clone();
        async move {
            let all = notes.get_all().await?;
            Ok::<_, Error>(mindless::Json(all))
        }
    };

    let app = App::new(
        Router::new()
            .on(Method::Post, "/notes", create)
            .and_then(|r| r.on(Method::Get, "/notes", list))
            .unwrap(),
    );

    let created = app
        .handle(InvocationEvent::new(Method::Post, "/notes").with_body(r#"{"id":"n1","text":"hello"}"#))
        .await;
    assert_eq!(created.status_code, 201);

    let listed = app.handle(InvocationEvent::new(Method::Get, "/notes")).await;
    assert_eq!(body(&listed), json!([{ "id": "n1", "text": "hello" }]));
}
