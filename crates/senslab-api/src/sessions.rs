//! Handlers for `/sessions` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/sessions` | Newest first |
//! | `POST` | `/sessions` | Body: `{"domain":"product","title":"..."}` |
//! | `GET`  | `/sessions/{id}` | 404 if not found |
//! | `GET`  | `/sessions/by-code/{code}` | Case-insensitive |
//! | `PUT`  | `/sessions/{id}/status` | Body: `{"status":"ready"}` |
//! | `GET`  | `/sessions/{id}/progress` | `?panelistId=` required |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use senslab_core::{
  gateway::DocumentStore,
  session::{Domain, Session, SessionStatus},
  submission::SampleProgress,
};
use serde::Deserialize;

use crate::{AppState, error::ApiError};

// ─── List ─────────────────────────────────────────────────────────────────────

/// `GET /sessions`
pub async fn list<D: DocumentStore>(
  State(state): State<AppState<D>>,
) -> Result<Json<Vec<Session>>, ApiError> {
  Ok(Json(state.repo.list_sessions().await?))
}

// ─── Create ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub domain: Domain,
  #[serde(default)]
  pub title:  Option<String>,
}

/// `POST /sessions`
pub async fn create<D: DocumentStore>(
  State(state): State<AppState<D>>,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError> {
  let session = state
    .repo
    .create_session(body.domain, body.title.as_deref())
    .await?;
  Ok((StatusCode::CREATED, Json(session)))
}

// ─── Lookup ───────────────────────────────────────────────────────────────────

/// `GET /sessions/{id}`
pub async fn get_one<D: DocumentStore>(
  State(state): State<AppState<D>>,
  Path(id): Path<String>,
) -> Result<Json<Session>, ApiError> {
  Ok(Json(state.repo.require_session(&id).await?))
}

/// `GET /sessions/by-code/{code}`
pub async fn by_code<D: DocumentStore>(
  State(state): State<AppState<D>>,
  Path(code): Path<String>,
) -> Result<Json<Session>, ApiError> {
  let session = state
    .repo
    .session_by_code(&code)
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("no session with code {code:?}")))?;
  Ok(Json(session))
}

// ─── Status ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct StatusBody {
  pub status: SessionStatus,
}

/// `PUT /sessions/{id}/status`
pub async fn set_status<D: DocumentStore>(
  State(state): State<AppState<D>>,
  Path(id): Path<String>,
  Json(body): Json<StatusBody>,
) -> Result<Json<Session>, ApiError> {
  Ok(Json(state.repo.set_session_status(&id, body.status).await?))
}

// ─── Progress ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressParams {
  pub panelist_id: String,
}

/// `GET /sessions/{id}/progress?panelistId=<id>`
pub async fn progress<D: DocumentStore>(
  State(state): State<AppState<D>>,
  Path(id): Path<String>,
  Query(params): Query<ProgressParams>,
) -> Result<Json<Vec<SampleProgress>>, ApiError> {
  Ok(Json(
    state.repo.panelist_progress(&id, &params.panelist_id).await?,
  ))
}
