//! Sample: one evaluable item within a session, governed by exactly one
//! [`MethodCore`].

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result, catalog::Descriptor};

/// Descriptor set used by new profile samples.
pub const DEFAULT_DESCRIPTOR_SET: &str = "beer_wheel_v1";

// ─── Method ──────────────────────────────────────────────────────────────────

/// The discriminant of a [`MethodCore`] and of a response answer.
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
pub enum Method {
  Profile,
  Triangle,
  Threshold,
}

// ─── Profile ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileConfig {
  pub descriptor_set_id:   String,
  /// Selected leaf ids, in selection order, without duplicates.
  #[serde(default)]
  pub descriptor_leaf_ids: Vec<String>,
  /// Descriptor names captured when the selection was saved, so that older
  /// responses stay readable after the taxonomy changes.
  #[serde(default)]
  pub snapshot:            Vec<Descriptor>,
}

impl Default for ProfileConfig {
  fn default() -> Self {
    Self {
      descriptor_set_id:   DEFAULT_DESCRIPTOR_SET.to_owned(),
      descriptor_leaf_ids: Vec::new(),
      snapshot:            Vec::new(),
    }
  }
}

impl ProfileConfig {
  /// The items a panelist rates: the snapshot when present, otherwise the
  /// bare leaf ids.
  pub fn items(&self) -> Vec<Descriptor> {
    if !self.snapshot.is_empty() {
      return self.snapshot.clone();
    }
    self
      .descriptor_leaf_ids
      .iter()
      .map(|id| Descriptor { id: id.clone(), name: id.clone(), description: None })
      .collect()
  }
}

// ─── Triangle ────────────────────────────────────────────────────────────────

/// Three display codes shown together; `codes[odd_index]` is the odd sample.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Triplet {
  pub codes:     [String; 3],
  pub odd_index: u8,
}

impl Triplet {
  pub fn odd_code(&self) -> &str {
    &self.codes[usize::from(self.odd_index.min(2))]
  }

  pub fn contains(&self, code: &str) -> bool {
    self.codes.iter().any(|c| c == code)
  }
}

fn one() -> u32 { 1 }

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriangleConfig {
  #[serde(default = "one")]
  pub seat_count:       u32,
  /// Keyed by the seat number rendered as a decimal string.
  #[serde(default)]
  pub triplets_by_seat: BTreeMap<String, Triplet>,
  #[serde(default, with = "crate::timestamp::option")]
  pub generated_at:     Option<DateTime<Utc>>,
}

impl Default for TriangleConfig {
  fn default() -> Self {
    Self {
      seat_count:       1,
      triplets_by_seat: BTreeMap::new(),
      generated_at:     None,
    }
  }
}

impl TriangleConfig {
  /// The stored seat count, never less than one.
  pub fn seats(&self) -> u32 { self.seat_count.max(1) }

  pub fn seat_required(&self) -> bool { self.seats() > 1 }

  /// Clamp an arbitrary seat number into `1..=seats()`.
  pub fn clamp_seat(&self, seat: Option<i64>) -> u32 {
    let max = i64::from(self.seats());
    // Fits in u32: the result lies within 1..=seats().
    seat.unwrap_or(1).clamp(1, max) as u32
  }

  pub fn triplet(&self, seat: Option<i64>) -> Option<&Triplet> {
    let seat = self.clamp_seat(seat);
    self.triplets_by_seat.get(&seat.to_string())
  }

  pub fn is_generated(&self) -> bool { !self.triplets_by_seat.is_empty() }
}

// ─── Threshold ───────────────────────────────────────────────────────────────

/// Modelled but unused: no operation generates, scores, or aggregates
/// threshold samples.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdConfig {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub compound_id: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub levels:      Option<Vec<f64>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub seat_count:  Option<u32>,
}

// ─── MethodCore ──────────────────────────────────────────────────────────────

/// Method-specific configuration, tagged by `method` in its JSON form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", content = "config", rename_all = "lowercase")]
pub enum MethodCore {
  Profile(ProfileConfig),
  Triangle(TriangleConfig),
  Threshold(ThresholdConfig),
}

impl MethodCore {
  pub fn method(&self) -> Method {
    match self {
      Self::Profile(_) => Method::Profile,
      Self::Triangle(_) => Method::Triangle,
      Self::Threshold(_) => Method::Threshold,
    }
  }
}

// ─── Sample ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sample {
  pub id:          String,
  pub session_id:  String,
  pub label:       String,
  #[serde(with = "crate::timestamp")]
  pub created_at:  DateTime<Utc>,
  #[serde(with = "crate::timestamp")]
  pub updated_at:  DateTime<Utc>,
  pub method_core: MethodCore,
  /// Opaque extension payload; ignored by every core operation.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub addons:      Option<serde_json::Value>,
}

impl Sample {
  pub fn method(&self) -> Method { self.method_core.method() }

  fn mismatch(&self, expected: Method) -> Error {
    Error::MethodMismatch { expected, found: self.method() }
  }

  pub fn profile(&self) -> Result<&ProfileConfig> {
    match &self.method_core {
      MethodCore::Profile(cfg) => Ok(cfg),
      MethodCore::Triangle(_) | MethodCore::Threshold(_) => {
        Err(self.mismatch(Method::Profile))
      }
    }
  }

  pub fn profile_mut(&mut self) -> Result<&mut ProfileConfig> {
    let err = self.mismatch(Method::Profile);
    match &mut self.method_core {
      MethodCore::Profile(cfg) => Ok(cfg),
      MethodCore::Triangle(_) | MethodCore::Threshold(_) => Err(err),
    }
  }

  pub fn triangle(&self) -> Result<&TriangleConfig> {
    match &self.method_core {
      MethodCore::Triangle(cfg) => Ok(cfg),
      MethodCore::Profile(_) | MethodCore::Threshold(_) => {
        Err(self.mismatch(Method::Triangle))
      }
    }
  }

  pub fn triangle_mut(&mut self) -> Result<&mut TriangleConfig> {
    let err = self.mismatch(Method::Triangle);
    match &mut self.method_core {
      MethodCore::Triangle(cfg) => Ok(cfg),
      MethodCore::Profile(_) | MethodCore::Threshold(_) => Err(err),
    }
  }
}

/// The label used when a sample is created without one.
pub fn default_label(method: Method) -> &'static str {
  match method {
    Method::Profile => "Profile",
    Method::Triangle => "Triangle",
    Method::Threshold => "Threshold",
  }
}
