//! Handlers for sample configuration and response submission.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/sessions/{id}/samples` | In the session's sample order |
//! | `POST` | `/sessions/{id}/samples` | Body: [`CreateBody`]; returns 201 |
//! | `GET`  | `/samples/{id}` | Full sample including triplets |
//! | `PUT`  | `/samples/{id}/descriptors` | Body: `{"descriptorIds":[...]}` |
//! | `PUT`  | `/samples/{id}/seats` | Body: `{"seatCount":3}` |
//! | `POST` | `/samples/{id}/triplets` | Body: `{}` or `{"codes":["A","B","C"]}` |
//! | `GET`  | `/samples/{id}/triplets/{seat}` | Codes only; the odd index stays hidden |
//! | `POST` | `/samples/{id}/responses` | Body: [`ResponseBody`] |
//! | `GET`  | `/descriptors/leaves` | Selectable descriptors |

use std::collections::BTreeMap;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use senslab_core::{
  Error as CoreError,
  catalog::{Descriptor, DescriptorCatalog as _},
  gateway::DocumentStore,
  response::{Panelist, ProfileSubmission, Response, TriangleSubmission},
  sample::{Method, Sample},
  triangle::CodeSource,
};
use serde::{Deserialize, Serialize};

use crate::{AppState, error::ApiError};

// ─── List / get ───────────────────────────────────────────────────────────────

/// `GET /sessions/{id}/samples`
pub async fn list<D: DocumentStore>(
  State(state): State<AppState<D>>,
  Path(session_id): Path<String>,
) -> Result<Json<Vec<Sample>>, ApiError> {
  state.repo.require_session(&session_id).await?;
  Ok(Json(state.repo.samples_for_session(&session_id).await?))
}

/// `GET /samples/{id}`
pub async fn get_one<D: DocumentStore>(
  State(state): State<AppState<D>>,
  Path(id): Path<String>,
) -> Result<Json<Sample>, ApiError> {
  Ok(Json(state.repo.require_sample(&id).await?))
}

// ─── Create ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBody {
  pub method:     Method,
  #[serde(default)]
  pub label:      Option<String>,
  /// Triangle only. Defaults to one seat.
  #[serde(default)]
  pub seat_count: Option<u32>,
}

/// `POST /sessions/{id}/samples`
pub async fn create<D: DocumentStore>(
  State(state): State<AppState<D>>,
  Path(session_id): Path<String>,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError> {
  let label = body.label.as_deref();
  let sample = match body.method {
    Method::Profile => state.repo.create_profile_sample(&session_id, label).await?,
    Method::Triangle => {
      let seats = body.seat_count.unwrap_or(1);
      state
        .repo
        .create_triangle_sample(&session_id, label, seats)
        .await?
    }
    Method::Threshold => {
      return Err(ApiError::BadRequest(
        "threshold samples are not supported yet".into(),
      ));
    }
  };
  Ok((StatusCode::CREATED, Json(sample)))
}

// ─── Configuration ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescriptorsBody {
  pub descriptor_ids: Vec<String>,
}

/// `PUT /samples/{id}/descriptors`
pub async fn set_descriptors<D: DocumentStore>(
  State(state): State<AppState<D>>,
  Path(id): Path<String>,
  Json(body): Json<DescriptorsBody>,
) -> Result<Json<Sample>, ApiError> {
  let sample = state
    .repo
    .update_profile_selection(&id, &body.descriptor_ids, state.catalog.as_ref())
    .await?;
  Ok(Json(sample))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatsBody {
  pub seat_count: i64,
}

/// `PUT /samples/{id}/seats`
pub async fn set_seats<D: DocumentStore>(
  State(state): State<AppState<D>>,
  Path(id): Path<String>,
  Json(body): Json<SeatsBody>,
) -> Result<Json<Sample>, ApiError> {
  Ok(Json(state.repo.set_seat_count(&id, body.seat_count).await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct TripletsBody {
  /// Labels shuffled into every seat; random three-digit codes if absent.
  #[serde(default)]
  pub codes: Option<[String; 3]>,
}

/// `POST /samples/{id}/triplets`
pub async fn generate_triplets<D: DocumentStore>(
  State(state): State<AppState<D>>,
  Path(id): Path<String>,
  Json(body): Json<TripletsBody>,
) -> Result<Json<Sample>, ApiError> {
  let source = body.codes.map_or(CodeSource::Placeholder, CodeSource::Fixed);
  Ok(Json(state.repo.generate_triplets(&id, &source).await?))
}

/// What a panelist is shown at one seat.
#[derive(Debug, Serialize)]
pub struct PresentedTriplet {
  pub seat:  u32,
  pub codes: [String; 3],
}

/// `GET /samples/{id}/triplets/{seat}`
pub async fn triplet<D: DocumentStore>(
  State(state): State<AppState<D>>,
  Path((id, seat)): Path<(String, i64)>,
) -> Result<Json<PresentedTriplet>, ApiError> {
  let sample = state.repo.require_sample(&id).await?;
  let cfg = sample.triangle()?;
  let triplet = cfg
    .triplet(Some(seat))
    .ok_or_else(|| CoreError::TripletsNotGenerated(id.clone()))?;
  Ok(Json(PresentedTriplet {
    seat:  cfg.clamp_seat(Some(seat)),
    codes: triplet.codes.clone(),
  }))
}

// ─── Submission ───────────────────────────────────────────────────────────────

/// Body of `POST /samples/{id}/responses`. Which answer fields are read
/// depends on the sample's method.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseBody {
  /// Defaults to the sample's own session.
  #[serde(default)]
  pub session_id:  Option<String>,
  #[serde(flatten)]
  pub panelist:    Panelist,
  #[serde(default)]
  pub choice_code: Option<String>,
  #[serde(default)]
  pub intensities: BTreeMap<String, u8>,
  #[serde(default)]
  pub free_text:   Option<String>,
}

/// `POST /samples/{id}/responses`
pub async fn submit<D: DocumentStore>(
  State(state): State<AppState<D>>,
  Path(id): Path<String>,
  Json(body): Json<ResponseBody>,
) -> Result<impl IntoResponse, ApiError> {
  let sample = state.repo.require_sample(&id).await?;
  let session_id = body.session_id.unwrap_or(sample.session_id);

  let response: Response = match sample.method_core.method() {
    Method::Triangle => {
      let choice_code = body
        .choice_code
        .ok_or_else(|| ApiError::BadRequest("choiceCode is required".into()))?;
      state
        .repo
        .submit_triangle(TriangleSubmission {
          session_id,
          sample_id: id,
          panelist: body.panelist,
          choice_code,
          free_text: body.free_text,
        })
        .await?
    }
    Method::Profile => {
      state
        .repo
        .submit_profile(ProfileSubmission {
          session_id,
          sample_id: id,
          panelist: body.panelist,
          intensities: body.intensities,
          free_text: body.free_text,
        })
        .await?
    }
    found @ Method::Threshold => {
      return Err(
        CoreError::MethodMismatch { expected: Method::Triangle, found }.into(),
      );
    }
  };
  Ok((StatusCode::CREATED, Json(response)))
}

// ─── Reference data ───────────────────────────────────────────────────────────

/// `GET /descriptors/leaves`
pub async fn descriptor_leaves<D: DocumentStore>(
  State(state): State<AppState<D>>,
) -> Json<Vec<Descriptor>> {
  Json(state.catalog.leaves())
}
