//! Handlers for sample results.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/samples/{id}/results` | Triangle aggregate; 400 for other methods |
//! | `GET`  | `/samples/{id}/results.csv` | Triangle responses as CSV, newest first |
//! | `GET`  | `/samples/{id}/profile` | Mean intensity per descriptor |

use axum::{
  Json,
  extract::{Path, State},
  http::header,
  response::IntoResponse,
};
use senslab_core::{
  aggregate::{ProfileSummary, TriangleSummary},
  export::responses_to_csv,
  gateway::DocumentStore,
};

use crate::{AppState, error::ApiError};

/// `GET /samples/{id}/results`
pub async fn triangle<D: DocumentStore>(
  State(state): State<AppState<D>>,
  Path(id): Path<String>,
) -> Result<Json<TriangleSummary>, ApiError> {
  Ok(Json(state.repo.triangle_summary(&id).await?))
}

/// `GET /samples/{id}/results.csv`
pub async fn csv<D: DocumentStore>(
  State(state): State<AppState<D>>,
  Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
  let summary = state.repo.triangle_summary(&id).await?;
  let body = responses_to_csv(&summary.responses);
  let disposition = format!("attachment; filename=\"{id}.csv\"");
  Ok((
    [
      (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_owned()),
      (header::CONTENT_DISPOSITION, disposition),
    ],
    body,
  ))
}

/// `GET /samples/{id}/profile`
pub async fn profile<D: DocumentStore>(
  State(state): State<AppState<D>>,
  Path(id): Path<String>,
) -> Result<Json<ProfileSummary>, ApiError> {
  Ok(Json(state.repo.profile_summary(&id).await?))
}
