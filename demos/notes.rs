//! Notes API on the local server, backed by the in-memory table store.
//!
//! Run with:
//!   MINDLESS_LOG_LEVEL=debug cargo run --example notes
//!
//! Try:
//!   curl -X POST http://localhost:3000/notes \
//!        -H 'x-api-key: demo' \
//!        -d '{"id":"n1","text":"hello"}'
//!   curl http://localhost:3000/notes
//!   curl http://localhost:3000/notes/n1
//!   curl -X DELETE http://localhost:3000/notes/n1 -H 'x-api-key: demo'

use std::sync::Arc;

use mindless::config::Config;
use mindless::data::{CreateOptions, DeleteOptions, KeySchema, MemoryStore, Table, TableDefinition, TableStore};
use mindless::middleware::Next;
use mindless::{App, Error, Json, Method, Request, Response, Route, Router, Server, StatusCode};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize)]
struct Note {
    id: String,
    text: String,
    #[serde(rename = "createdAt", default, skip_serializing_if = "Option::is_none")]
    created_at: Option<String>,
}

#[tokio::main]
async fn main() {
    let config = Config::from_env().expect("invalid configuration");
    mindless::logging::init(&config.log).expect("logging already initialised");

    let store: Arc<dyn TableStore> = Arc::new(MemoryStore::new());
    let notes: Table<Note> = Table::serde(
        "notes",
        TableDefinition::new(KeySchema::string("id")).timestamps(true),
        store.clone(),
    )
    .expect("table definition rejected");
    store.create_tables().await.expect("table creation failed");

    let router = Router::new()
        .on(Method::Get, "/notes", {
            let notes = notes.clone();
            move |_req: Request| {
                let notes = notes.clone();
                async move { notes.get_all().await.map(Json) }
            }
        })
        .and_then(|r| {
            r.on(Method::Get, "/notes/{id}", {
                let notes = notes.clone();
                move |req: Request| {
                    let notes = notes.clone();
                    async move { show(&notes, req).await }
                }
            })
        })
        .and_then(|r| {
            let notes = notes.clone();
            r.route(
                Route::new(Method::Post, "/notes", move |req: Request| {
                    let notes = notes.clone();
                    async move { create(&notes, req).await }
                })
                .middleware(require_key),
            )
        })
        .and_then(|r| {
            let notes = notes.clone();
            r.route(
                Route::new(Method::Delete, "/notes/{id}", move |req: Request| {
                    let notes = notes.clone();
                    async move { remove(&notes, req).await }
                })
                .middleware(require_key),
            )
        })
        .expect("route table rejected");

    Server::from_config(&config)
        .expect("invalid server address")
        .serve(App::new(router))
        .await
        .expect("server error");
}

async fn require_key(req: Request) -> Result<Next, Error> {
    if req.header("x-api-key").is_err() {
        return Ok(Next::Respond(Response::status(StatusCode::UNAUTHORIZED)));
    }
    Ok(Next::Continue(req))
}

async fn show(notes: &Table<Note>, req: Request) -> Result<Response, Error> {
    let id = req.get_or_fail("id")?.clone();
    match notes.get(id, None).await? {
        Some(note) => Ok(Response::json(serde_json::to_value(note)?)),
        None => Ok(Response::status(StatusCode::NOT_FOUND)),
    }
}

async fn create(notes: &Table<Note>, req: Request) -> Result<Response, Error> {
    let note: Note = req.json()?;
    let saved = notes.create(&note, CreateOptions { overwrite: false }).await?;
    Ok(Response::builder()
        .status(StatusCode::CREATED)
        .header("location", &format!("/notes/{}", saved.id))
        .json(serde_json::to_value(saved)?))
}

// DELETE /notes/{id} → 204 No Content
async fn remove(notes: &Table<Note>, req: Request) -> Result<Response, Error> {
    let id = req.get_or_fail("id")?.clone();
    notes.delete(id, None, DeleteOptions::default()).await?;
    Ok(Response::status(StatusCode::NO_CONTENT))
}
