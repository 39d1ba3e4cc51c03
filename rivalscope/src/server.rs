use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use rocket::fairing::{Fairing, Info, Kind};
use rocket::http::{Header, Status};
use rocket::serde::json::Json;
use rocket::{delete, get, options, post, put, routes, Build, Request, Response, Rocket, State};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use common::ServerConfig;

use crate::models::Digest;
use crate::pipeline::DigestPipeline;
use crate::storage::{self, SourceRecord};
use crate::tasks::{self, Task, TaskUpdate};

/// Application state stored inside Rocket managed state.
#[derive(Clone)]
pub struct AppState {
    pub started_at: DateTime<Utc>,
    pub db: SqlitePool,
    pub pipeline: Arc<DigestPipeline>,
    /// Name of the configured inference adapter, reported by `/api/status`
    pub llm_adapter: String,
    pub llm_model: String,
}

/// Response structure for `/api/status`.
#[derive(Serialize)]
struct StatusResponse {
    status: &'static str,
    uptime_seconds: i64,
    sources_count: usize,
    llm_adapter: String,
    llm_model: String,
}

#[derive(Deserialize)]
struct SourceCreate {
    url: String,
}

#[derive(Deserialize)]
struct TaskCreate {
    task: String,
}

fn internal_error(context: &str, e: anyhow::Error) -> Status {
    tracing::error!("{}: {:#}", context, e);
    Status::InternalServerError
}

#[get("/health")]
async fn health() -> &'static str {
    "OK"
}

#[get("/api/status")]
async fn status(state: &State<AppState>) -> Result<Json<StatusResponse>, Status> {
    let sources = storage::list_sources(&state.db)
        .await
        .map_err(|e| internal_error("failed to count sources", e))?;

    Ok(Json(StatusResponse {
        status: "ok",
        uptime_seconds: (Utc::now() - state.started_at).num_seconds(),
        sources_count: sources.len(),
        llm_adapter: state.llm_adapter.clone(),
        llm_model: state.llm_model.clone(),
    }))
}

async fn run_digest(state: &AppState, requested: usize) -> Result<Json<Digest>, Status> {
    let sources: Vec<String> = storage::list_sources(&state.db)
        .await
        .map_err(|e| internal_error("failed to read source registry", e))?
        .into_iter()
        .map(|s| s.url)
        .collect();

    Ok(Json(state.pipeline.run(&sources, requested).await))
}

/// Digest with the configured default number of summaries.
#[get("/api/digest")]
async fn digest_default(state: &State<AppState>) -> Result<Json<Digest>, Status> {
    let requested = state.pipeline.settings().default_count;
    run_digest(state, requested).await
}

#[get("/api/digest/<n>")]
async fn digest_count(state: &State<AppState>, n: usize) -> Result<Json<Digest>, Status> {
    run_digest(state, n).await
}

#[get("/api/keywords")]
async fn list_sources(state: &State<AppState>) -> Result<Json<Vec<SourceRecord>>, Status> {
    storage::list_sources(&state.db)
        .await
        .map(Json)
        .map_err(|e| internal_error("failed to list sources", e))
}

#[post("/api/keywords", data = "<body>")]
async fn add_source(
    state: &State<AppState>,
    body: Json<SourceCreate>,
) -> Result<(Status, Json<SourceRecord>), Status> {
    if let Err(e) = storage::normalize_source_url(&body.url) {
        tracing::warn!("rejected source: {:#}", e);
        return Err(Status::BadRequest);
    }

    let record = storage::add_source(&state.db, &body.url)
        .await
        .map_err(|e| internal_error("failed to add source", e))?;
    tracing::info!("source registered: {} (id {})", record.url, record.id);
    Ok((Status::Created, Json(record)))
}

#[delete("/api/keywords/<id>")]
async fn remove_source(state: &State<AppState>, id: i64) -> Status {
    match storage::remove_source(&state.db, id).await {
        Ok(true) => Status::NoContent,
        Ok(false) => Status::NotFound,
        Err(e) => internal_error("failed to remove source", e),
    }
}

#[get("/api/tasks")]
async fn list_tasks(state: &State<AppState>) -> Result<Json<Vec<Task>>, Status> {
    tasks::list_tasks(&state.db)
        .await
        .map(Json)
        .map_err(|e| internal_error("failed to list tasks", e))
}

#[post("/api/tasks", data = "<body>")]
async fn create_task(
    state: &State<AppState>,
    body: Json<TaskCreate>,
) -> Result<(Status, Json<Task>), Status> {
    if body.task.trim().is_empty() {
        return Err(Status::BadRequest);
    }

    let task = tasks::create_task(&state.db, &body.task)
        .await
        .map_err(|e| internal_error("failed to create task", e))?;
    Ok((Status::Created, Json(task)))
}

#[put("/api/tasks/<id>", data = "<body>")]
async fn update_task(
    state: &State<AppState>,
    id: i64,
    body: Json<TaskUpdate>,
) -> Result<Json<Task>, Status> {
    match tasks::update_task(&state.db, id, &body).await {
        Ok(Some(task)) => Ok(Json(task)),
        Ok(None) => Err(Status::NotFound),
        Err(e) => Err(internal_error("failed to update task", e)),
    }
}

#[delete("/api/tasks/<id>")]
async fn delete_task(state: &State<AppState>, id: i64) -> Status {
    match tasks::delete_task(&state.db, id).await {
        Ok(true) => Status::NoContent,
        Ok(false) => Status::NotFound,
        Err(e) => internal_error("failed to delete task", e),
    }
}

/// Preflight requests for any path.
#[options("/<_..>")]
async fn preflight() -> Status {
    Status::NoContent
}

/// Adds permissive CORS headers to every response.
pub struct Cors;

#[rocket::async_trait]
impl Fairing for Cors {
    fn info(&self) -> Info {
        Info {
            name: "CORS headers",
            kind: Kind::Response,
        }
    }

    async fn on_response<'r>(&self, _req: &'r Request<'_>, res: &mut Response<'r>) {
        res.set_header(Header::new("Access-Control-Allow-Origin", "*"));
        res.set_header(Header::new(
            "Access-Control-Allow-Methods",
            "GET, POST, PUT, DELETE, OPTIONS",
        ));
        res.set_header(Header::new("Access-Control-Allow-Headers", "Content-Type"));
    }
}

/// Assemble the Rocket instance: managed state, routes and the CORS fairing.
pub fn build_rocket(state: AppState, server: Option<&ServerConfig>) -> Rocket<Build> {
    let mut fig = rocket::Config::figment();
    if let Some(server) = server {
        if let Some(bind) = &server.bind {
            fig = fig.merge(("address", bind.clone()));
        }
        if let Some(port) = server.port {
            fig = fig.merge(("port", port));
        }
    }

    rocket::custom(fig).manage(state).attach(Cors).mount(
        "/",
        routes![
            health,
            status,
            digest_default,
            digest_count,
            list_sources,
            add_source,
            remove_source,
            list_tasks,
            create_task,
            update_task,
            delete_task,
            preflight,
        ],
    )
}

/// Run the HTTP server until Rocket shuts down.
pub async fn launch_rocket(state: AppState, server: Option<&ServerConfig>) -> Result<()> {
    tracing::info!("Starting Rocket HTTP server");
    build_rocket(state, server)
        .launch()
        .await
        .map_err(|e| anyhow!("Rocket failed: {}", e))?;

    tracing::info!("Rocket HTTP server has shut down");
    Ok(())
}
