//! Response aggregation. Read-only: nothing here writes to the gateway.

use std::cmp::Ordering;

use serde::Serialize;

use crate::{
  Result,
  gateway::DocumentStore,
  repository::Repository,
  response::Response,
  sample::TriangleConfig,
};

/// Correctness over a group of triangle responses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tally {
  pub n:             usize,
  pub correct_count: usize,
  /// `correct_count / n`, or `0.0` when `n == 0`.
  #[serde(rename = "correctRate")]
  pub rate:          f64,
}

impl Tally {
  fn add(&mut self, correct: bool) {
    self.n += 1;
    if correct {
      self.correct_count += 1;
    }
    self.rate = self.correct_count as f64 / self.n as f64;
  }

  /// Compare by exact fraction, avoiding float rounding.
  fn cmp_rate(&self, other: &Self) -> Ordering {
    (self.correct_count * other.n).cmp(&(other.correct_count * self.n))
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatRow {
  pub seat:  u32,
  #[serde(flatten)]
  pub tally: Tally,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelistRow {
  pub panelist_id:   String,
  pub panelist_name: Option<String>,
  #[serde(flatten)]
  pub tally:         Tally,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TriangleSummary {
  pub seat_count:  u32,
  #[serde(flatten)]
  pub overall:     Tally,
  /// One row per seat `1..=seat_count`, including empty seats.
  pub by_seat:     Vec<SeatRow>,
  /// Rate descending, then `n` descending, then panelist id ascending.
  pub by_panelist: Vec<PanelistRow>,
  /// The triangle responses, newest first.
  pub responses:   Vec<Response>,
}

/// Aggregate triangle responses for a sample configured as `config`.
/// Non-triangle responses are ignored.
pub fn summarize_triangle(config: &TriangleConfig, responses: Vec<Response>) -> TriangleSummary {
  let seat_count = config.seats();
  let mut responses: Vec<Response> =
    responses.into_iter().filter(|r| r.triangle().is_some()).collect();
  responses.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));

  let mut overall = Tally::default();
  let mut by_seat: Vec<SeatRow> = (1..=seat_count)
    .map(|seat| SeatRow { seat, tally: Tally::default() })
    .collect();
  let mut by_panelist: Vec<PanelistRow> = Vec::new();

  for r in &responses {
    let Some(answer) = r.triangle() else { continue };
    overall.add(answer.correct);

    let seat = config.clamp_seat(r.seat_number);
    by_seat[(seat - 1) as usize].tally.add(answer.correct);

    match by_panelist.iter_mut().find(|p| p.panelist_id == r.panelist_id) {
      Some(row) => row.tally.add(answer.correct),
      None => {
        let mut tally = Tally::default();
        tally.add(answer.correct);
        by_panelist.push(PanelistRow {
          panelist_id: r.panelist_id.clone(),
          panelist_name: r.panelist_name.clone(),
          tally,
        });
      }
    }
  }

  by_panelist.sort_by(|a, b| {
    b.tally
      .cmp_rate(&a.tally)
      .then_with(|| b.tally.n.cmp(&a.tally.n))
      .then_with(|| a.panelist_id.cmp(&b.panelist_id))
  });

  TriangleSummary { seat_count, overall, by_seat, by_panelist, responses }
}

// ─── Profile ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DescriptorMean {
  pub descriptor_id: String,
  pub name:          String,
  pub n:             usize,
  /// Mean intensity, or `0.0` when nobody rated the descriptor.
  pub mean:          f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSummary {
  pub n:           usize,
  pub descriptors: Vec<DescriptorMean>,
}

// ─── Repository operations ───────────────────────────────────────────────────

impl<D: DocumentStore> Repository<D> {
  /// Correctness statistics for a triangle sample.
  pub async fn triangle_summary(&self, sample_id: &str) -> Result<TriangleSummary> {
    let sample = self.require_sample(sample_id).await?;
    let config = sample.triangle()?;
    let responses = self.responses_for_sample(sample_id).await?;
    Ok(summarize_triangle(config, responses))
  }

  /// Mean intensity per selected descriptor of a profile sample.
  pub async fn profile_summary(&self, sample_id: &str) -> Result<ProfileSummary> {
    let sample = self.require_sample(sample_id).await?;
    let items = sample.profile()?.items();
    let answers: Vec<_> = self
      .responses_for_sample(sample_id)
      .await?
      .into_iter()
      .filter_map(|r| r.profile().cloned())
      .collect();

    let descriptors = items
      .into_iter()
      .map(|d| {
        let values: Vec<u32> = answers
          .iter()
          .filter_map(|a| a.intensities.get(&d.id))
          .map(|v| u32::from(*v))
          .collect();
        let n = values.len();
        let mean = if n == 0 {
          0.0
        } else {
          f64::from(values.iter().sum::<u32>()) / n as f64
        };
        DescriptorMean { descriptor_id: d.id, name: d.name, n, mean }
      })
      .collect();

    Ok(ProfileSummary { n: answers.len(), descriptors })
  }
}
