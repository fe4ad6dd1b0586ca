//! Session: a testing campaign that owns an ordered list of samples.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The context a session is run in.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Domain {
  Product,
  Panel,
  Field,
}

/// Lifecycle status. Any status may be set from any other.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SessionStatus {
  #[default]
  Draft,
  /// Panelists may submit responses.
  Ready,
  Closed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
  pub id:           String,
  /// Six symbols from [`crate::ids::SESSION_CODE_ALPHABET`]; matched
  /// case-insensitively.
  pub session_code: String,
  pub domain:       Domain,
  pub status:       SessionStatus,
  pub title:        String,
  #[serde(with = "crate::timestamp")]
  pub created_at:   DateTime<Utc>,
  #[serde(with = "crate::timestamp")]
  pub updated_at:   DateTime<Utc>,
  #[serde(default, with = "crate::timestamp::option")]
  pub opens_at:     Option<DateTime<Utc>>,
  #[serde(default)]
  pub sample_ids:   Vec<String>,
}

impl Session {
  pub fn is_ready(&self) -> bool { self.status == SessionStatus::Ready }

  /// Case-insensitive comparison against a user-typed code.
  pub fn matches_code(&self, code: &str) -> bool {
    self.session_code.eq_ignore_ascii_case(code.trim())
  }
}

/// The title used when a session is created without one.
pub fn default_title(domain: Domain) -> String {
  format!("{} Session", domain.to_string().to_uppercase())
}
