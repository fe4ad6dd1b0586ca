//! Handlers for invite tokens and the panelist join flow.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/sessions/{id}/tokens` | Body: `{}`, `{"expiresAt":"..."}` or `{"ttlHours":4}` |
//! | `GET`  | `/tokens/{token}` | Preview; does not spend the token |
//! | `POST` | `/join` | Body: [`JoinRequest`]; spends the token if one is given |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::{DateTime, Duration, Utc};
use senslab_core::{
  gateway::DocumentStore,
  invite::{InviteToken, JoinRequest, JoinTicket, TokenPreview, join_url},
  timestamp,
};
use serde::{Deserialize, Serialize};

use crate::{AppState, error::ApiError};

// ─── Issue ────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueBody {
  #[serde(default)]
  pub expires_at: Option<DateTime<Utc>>,
  /// Overrides the configured token lifetime.
  #[serde(default)]
  pub ttl_hours:  Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedToken {
  #[serde(flatten)]
  pub invite:   InviteToken,
  pub join_url: String,
}

/// `POST /sessions/{id}/tokens`
pub async fn issue<D: DocumentStore>(
  State(state): State<AppState<D>>,
  Path(session_id): Path<String>,
  Json(body): Json<IssueBody>,
) -> Result<impl IntoResponse, ApiError> {
  let expires_at = match (body.expires_at, body.ttl_hours.or(state.config.token_ttl_hours)) {
    (Some(at), _) => Some(at),
    (None, Some(hours)) if hours > 0 => Some(timestamp::now() + Duration::hours(hours)),
    (None, Some(hours)) => {
      return Err(ApiError::BadRequest(format!(
        "token lifetime must be positive, got {hours} hours"
      )));
    }
    (None, None) => None,
  };

  let invite = state.repo.issue_token(&session_id, expires_at).await?;
  let join_url = join_url(&state.config.base_url, &invite.token);
  Ok((StatusCode::CREATED, Json(IssuedToken { invite, join_url })))
}

// ─── Preview / join ───────────────────────────────────────────────────────────

/// `GET /tokens/{token}`
pub async fn preview<D: DocumentStore>(
  State(state): State<AppState<D>>,
  Path(token): Path<String>,
) -> Result<Json<TokenPreview>, ApiError> {
  Ok(Json(state.repo.preview_token(&token).await?))
}

/// `POST /join`
pub async fn join<D: DocumentStore>(
  State(state): State<AppState<D>>,
  Json(request): Json<JoinRequest>,
) -> Result<Json<JoinTicket>, ApiError> {
  Ok(Json(state.repo.join(request).await?))
}
