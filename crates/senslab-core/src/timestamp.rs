//! Timestamp helpers.
//!
//! Every persisted timestamp is an RFC 3339 UTC string with exactly three
//! fractional digits and a `Z` suffix, so string order and chronological
//! order agree.

use chrono::{DateTime, SecondsFormat, SubsecRound as _, Utc};
use serde::{Deserialize, Deserializer, Serializer};

/// The current time, truncated to millisecond precision.
pub fn now() -> DateTime<Utc> { Utc::now().trunc_subsecs(3) }

pub fn format(dt: &DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
  DateTime::parse_from_rfc3339(s).map(|dt| dt.with_timezone(&Utc))
}

pub fn serialize<S: Serializer>(
  dt: &DateTime<Utc>,
  serializer: S,
) -> Result<S::Ok, S::Error> {
  serializer.serialize_str(&format(dt))
}

pub fn deserialize<'de, D: Deserializer<'de>>(
  deserializer: D,
) -> Result<DateTime<Utc>, D::Error> {
  let s = String::deserialize(deserializer)?;
  parse(&s).map_err(serde::de::Error::custom)
}

/// Same encoding for `Option<DateTime<Utc>>`; `None` is `null`.
pub mod option {
  use chrono::{DateTime, Utc};
  use serde::{Deserialize, Deserializer, Serializer};

  pub fn serialize<S: Serializer>(
    dt: &Option<DateTime<Utc>>,
    serializer: S,
  ) -> Result<S::Ok, S::Error> {
    match dt {
      Some(dt) => serializer.serialize_str(&super::format(dt)),
      None => serializer.serialize_none(),
    }
  }

  pub fn deserialize<'de, D: Deserializer<'de>>(
    deserializer: D,
  ) -> Result<Option<DateTime<Utc>>, D::Error> {
    Option::<String>::deserialize(deserializer)?
      .filter(|s| !s.trim().is_empty())
      .map(|s| super::parse(&s).map_err(serde::de::Error::custom))
      .transpose()
  }
}
