//! HTTP handlers

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use clevert_actions::{enumerate, Action, RunJob};
use clevert_core::types::{Entry, ExtensionSummary};
use clevert_core::utils::is_plain_component;
use clevert_core::Error;
use futures_util::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::state::AppState;
use crate::status::observe;

/// API error type
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
            ApiError::Internal(m) => (StatusCode::INTERNAL_SERVER_ERROR, m.clone()),
        };

        let body = Json(ErrorResponse { error: message });
        (status, body).into_response()
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::ExtensionNotFound { .. } => ApiError::NotFound(err.to_string()),
            Error::InvalidManifest { .. } => ApiError::BadRequest(err.to_string()),
            other => {
                tracing::error!("Request failed: {}", other);
                ApiError::Internal(other.to_string())
            }
        }
    }
}

/// `{id}` of a newly registered job
#[derive(Debug, Serialize, Deserialize)]
pub struct JobCreated {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct JobRef {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct InstallRequest {
    pub title: String,
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct ExtensionRef {
    pub id: String,
    pub version: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunActionRequest {
    pub title: String,
    pub extension_id: String,
    pub extension_version: String,
    pub action_id: String,
    /// Profile object, or the id of a profile declared by the extension
    #[serde(default)]
    pub profile: Value,
    pub entries: Value,
    #[serde(default)]
    pub parallel: Option<usize>,
}

pub async fn health() -> &'static str {
    "OK"
}

/// Register an install job
pub async fn install_extension(
    State(state): State<AppState>,
    Json(request): Json<InstallRequest>,
) -> (StatusCode, Json<JobCreated>) {
    let id = state.ids.next_id();
    info!("Install {} requested from {}", id, request.url);
    let job = state
        .installer
        .install(id.clone(), request.title, request.url);
    state.jobs.insert_install(job);
    (StatusCode::ACCEPTED, Json(JobCreated { id }))
}

/// Hard-cancel an install job
pub async fn cancel_install(
    State(state): State<AppState>,
    Json(request): Json<JobRef>,
) -> Result<StatusCode, ApiError> {
    let job = state
        .jobs
        .install(&request.id)
        .ok_or_else(|| ApiError::NotFound(format!("install job {}", request.id)))?;
    job.cancel();
    Ok(StatusCode::OK)
}

pub async fn remove_extension(
    State(state): State<AppState>,
    Json(request): Json<ExtensionRef>,
) -> Result<StatusCode, ApiError> {
    if !is_plain_component(&request.id) || !is_plain_component(&request.version) {
        return Err(ApiError::BadRequest(format!(
            "invalid extension {}_{}",
            request.id, request.version
        )));
    }
    state.store.remove(&request.id, &request.version).await?;
    Ok(StatusCode::OK)
}

pub async fn list_extensions(
    State(state): State<AppState>,
) -> Result<Json<Vec<ExtensionSummary>>, ApiError> {
    Ok(Json(state.store.summaries().await?))
}

/// `GET /extensions/{id}_{version}/index.js`
pub async fn ui_module(
    State(state): State<AppState>,
    Path(dir): Path<String>,
) -> Result<Response, ApiError> {
    let not_found = || ApiError::NotFound(format!("{}/index.js", dir));
    let (id, version) = dir.rsplit_once('_').ok_or_else(not_found)?;
    if !is_plain_component(id) || !is_plain_component(version) {
        return Err(not_found());
    }
    let module = state
        .store
        .ui_module(id, version)
        .await?
        .ok_or_else(not_found)?;
    Ok(([(header::CONTENT_TYPE, "text/javascript")], module).into_response())
}

/// Register a run job. Lookup and enumeration failures still register a
/// job, one that has already failed, so they surface on the status stream.
pub async fn run_action(
    State(state): State<AppState>,
    Json(request): Json<RunActionRequest>,
) -> (StatusCode, Json<JobCreated>) {
    let id = state.ids.next_id();
    let job = match prepare_run(&state, &request).await {
        Ok(prepared) => {
            let parallel = request
                .parallel
                .unwrap_or_else(|| state.config.get().scheduler.default_parallel);
            state.scheduler.run(
                id.clone(),
                request.title,
                prepared.action,
                prepared.profile,
                prepared.entries,
                parallel,
            )
        }
        Err(e) => {
            warn!("Run {} rejected: {}", id, e);
            RunJob::failed(id.clone(), request.title, e)
        }
    };
    state.jobs.insert_run(job);
    (StatusCode::ACCEPTED, Json(JobCreated { id }))
}

struct PreparedRun {
    action: Arc<dyn Action>,
    profile: Value,
    entries: Vec<Entry>,
}

async fn prepare_run(
    state: &AppState,
    request: &RunActionRequest,
) -> clevert_core::Result<PreparedRun> {
    let manifest = state
        .store
        .load(&request.extension_id, &request.extension_version)
        .await?;
    let declared = manifest
        .action(&request.action_id)
        .ok_or_else(|| Error::ActionNotFound {
            extension: manifest.dir_name(),
            action: request.action_id.clone(),
        })?;

    let profile = match &request.profile {
        Value::String(profile_id) => {
            let profile = manifest
                .profile(profile_id)
                .ok_or_else(|| Error::ProfileNotFound {
                    profile: profile_id.clone(),
                })?;
            serde_json::to_value(profile)?
        }
        other => other.clone(),
    };

    let spec = request.entries.clone();
    let entries = tokio::task::spawn_blocking(move || enumerate(&spec))
        .await
        .map_err(|e| Error::execution(format!("entry enumeration failed: {}", e)))??;

    let ext_dir = state
        .store
        .extension_dir(&request.extension_id, &request.extension_version)?;
    let action = state.resolver.resolve(&ext_dir, &manifest, declared)?;

    Ok(PreparedRun {
        action,
        profile,
        entries,
    })
}

/// Stop every in-flight execute of a run job
pub async fn stop_action(
    State(state): State<AppState>,
    Json(request): Json<JobRef>,
) -> Result<StatusCode, ApiError> {
    let job = state
        .jobs
        .run(&request.id)
        .ok_or_else(|| ApiError::NotFound(format!("run job {}", request.id)))?;
    job.stop();
    Ok(StatusCode::OK)
}

/// Server-sent status stream, one observer per connection
pub async fn get_status(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let events = observe(state.jobs.clone(), state.status_interval());
    let stream = stream::unfold(events, |mut events| async move {
        loop {
            let event = events.recv().await?;
            match Event::default().json_data(&event) {
                Ok(sse) => return Some((Ok(sse), events)),
                Err(e) => warn!("Dropping unserializable status event: {}", e),
            }
        }
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}
