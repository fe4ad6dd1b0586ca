//! Response: one panelist's answer to one sample.
//!
//! At most one response exists per `(sample_id, panelist_id)`; resubmitting
//! overwrites the earlier response under its original id.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Result, sample::Method};

// ─── Answer payloads ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileAnswer {
  /// Leaf id → intensity in `0..=100`.
  pub intensities: BTreeMap<String, u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriangleAnswer {
  pub choice_code: String,
  /// Scored once at submission; never recomputed.
  pub correct:     bool,
}

/// The method-specific part of a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", content = "methodCoreAnswer", rename_all = "lowercase")]
pub enum Answer {
  Profile(ProfileAnswer),
  Triangle(TriangleAnswer),
  /// Stored verbatim; threshold responses are never scored.
  Threshold(serde_json::Value),
}

impl Answer {
  pub fn method(&self) -> Method {
    match self {
      Self::Profile(_) => Method::Profile,
      Self::Triangle(_) => Method::Triangle,
      Self::Threshold(_) => Method::Threshold,
    }
  }

  /// Serialise the inner payload (without the method tag).
  pub fn to_json(&self) -> Result<serde_json::Value> {
    let full = serde_json::to_value(self)?;
    Ok(
      full
        .get("methodCoreAnswer")
        .cloned()
        .unwrap_or(serde_json::Value::Null),
    )
  }

  /// Rebuild from the stored method discriminant and payload.
  pub fn from_parts(method: Method, data: serde_json::Value) -> Result<Self> {
    let wrapped =
      serde_json::json!({ "method": method, "methodCoreAnswer": data });
    Ok(serde_json::from_value(wrapped)?)
  }
}

// ─── Response ────────────────────────────────────────────────────────────────

/// Persisted with `method` and `methodCoreAnswer` as sibling fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawResponse", into = "RawResponse")]
pub struct Response {
  pub id:            String,
  pub session_id:    String,
  pub sample_id:     String,
  pub panelist_id:   String,
  pub panelist_name: Option<String>,
  pub seat_number:   Option<i64>,
  pub answer:        Answer,
  pub free_text:     Option<String>,
  pub addons_answers: Option<serde_json::Value>,
  pub submitted_at:  DateTime<Utc>,
}

impl Response {
  pub fn method(&self) -> Method { self.answer.method() }

  pub fn triangle(&self) -> Option<&TriangleAnswer> {
    match &self.answer {
      Answer::Triangle(a) => Some(a),
      Answer::Profile(_) | Answer::Threshold(_) => None,
    }
  }

  pub fn profile(&self) -> Option<&ProfileAnswer> {
    match &self.answer {
      Answer::Profile(a) => Some(a),
      Answer::Triangle(_) | Answer::Threshold(_) => None,
    }
  }
}

/// Wire shape of a [`Response`].
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawResponse {
  id:                 String,
  session_id:         String,
  sample_id:          String,
  panelist_id:        String,
  #[serde(default)]
  panelist_name:      Option<String>,
  #[serde(default)]
  seat_number:        Option<i64>,
  method:             Method,
  #[serde(default)]
  method_core_answer: serde_json::Value,
  #[serde(default)]
  free_text:          Option<String>,
  #[serde(default)]
  addons_answers:     Option<serde_json::Value>,
  #[serde(with = "crate::timestamp")]
  submitted_at:       DateTime<Utc>,
}

impl TryFrom<RawResponse> for Response {
  type Error = crate::Error;

  fn try_from(raw: RawResponse) -> Result<Self> {
    Ok(Self {
      answer:         Answer::from_parts(raw.method, raw.method_core_answer)?,
      id:             raw.id,
      session_id:     raw.session_id,
      sample_id:      raw.sample_id,
      panelist_id:    raw.panelist_id,
      panelist_name:  raw.panelist_name,
      seat_number:    raw.seat_number,
      free_text:      raw.free_text,
      addons_answers: raw.addons_answers,
      submitted_at:   raw.submitted_at,
    })
  }
}

impl From<Response> for RawResponse {
  fn from(r: Response) -> Self {
    let method = r.answer.method();
    let method_core_answer = match r.answer {
      Answer::Profile(a) => serde_json::json!(a),
      Answer::Triangle(a) => serde_json::json!(a),
      Answer::Threshold(v) => v,
    };
    Self {
      id: r.id,
      session_id: r.session_id,
      sample_id: r.sample_id,
      panelist_id: r.panelist_id,
      panelist_name: r.panelist_name,
      seat_number: r.seat_number,
      method,
      method_core_answer,
      free_text: r.free_text,
      addons_answers: r.addons_answers,
      submitted_at: r.submitted_at,
    }
  }
}

// ─── Submissions ─────────────────────────────────────────────────────────────

/// Fields common to every submission.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Panelist {
  pub panelist_id:   String,
  #[serde(default)]
  pub panelist_name: Option<String>,
  #[serde(default)]
  pub seat_number:   Option<i64>,
}

impl Panelist {
  pub fn new(panelist_id: impl Into<String>) -> Self {
    Self { panelist_id: panelist_id.into(), ..Default::default() }
  }

  pub fn seated(mut self, seat: i64) -> Self {
    self.seat_number = Some(seat);
    self
  }
}

/// Input to [`crate::repository::Repository::submit_profile`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSubmission {
  pub session_id:  String,
  pub sample_id:   String,
  #[serde(flatten)]
  pub panelist:    Panelist,
  pub intensities: BTreeMap<String, u8>,
  #[serde(default)]
  pub free_text:   Option<String>,
}

/// Input to [`crate::repository::Repository::submit_triangle`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriangleSubmission {
  pub session_id:  String,
  pub sample_id:   String,
  #[serde(flatten)]
  pub panelist:    Panelist,
  pub choice_code: String,
  #[serde(default)]
  pub free_text:   Option<String>,
}
