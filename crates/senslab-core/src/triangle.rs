//! Triangle method engine.
//!
//! Each seat of a triangle sample is assigned three pairwise-distinct display
//! codes, one of which (chosen uniformly) marks the odd sample. A panelist
//! answers correctly by picking the odd code for their seat.

use std::collections::BTreeMap;

use rand::{Rng, seq::SliceRandom as _};

use crate::{
  Error, Result,
  gateway::DocumentStore,
  repository::{Repository, check_seat_count},
  sample::{Sample, Triplet},
  timestamp,
};

/// Where the three display codes of each seat come from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CodeSource {
  /// Three distinct random three-digit codes (`100..=999`) per seat.
  #[default]
  Placeholder,
  /// Caller-supplied labels, shuffled independently for every seat.
  Fixed([String; 3]),
}

impl CodeSource {
  fn validate(&self) -> Result<()> {
    match self {
      Self::Placeholder => Ok(()),
      Self::Fixed(labels) => {
        if labels.iter().any(|l| l.trim().is_empty()) {
          return Err(Error::invalid("triplet codes must not be blank"));
        }
        let [a, b, c] = labels;
        if a == b || b == c || a == c {
          return Err(Error::invalid("triplet codes must be pairwise distinct"));
        }
        Ok(())
      }
    }
  }

  fn codes<R: Rng + ?Sized>(&self, rng: &mut R) -> [String; 3] {
    match self {
      Self::Placeholder => {
        let picked = rand::seq::index::sample(rng, 900, 3).into_vec();
        [0, 1, 2].map(|i| (100 + picked[i]).to_string())
      }
      Self::Fixed(labels) => {
        let mut codes = labels.clone();
        codes.shuffle(rng);
        codes
      }
    }
  }
}

/// Build a complete seat → triplet assignment for `1..=seat_count`.
pub fn generate_assignment<R: Rng + ?Sized>(
  seat_count: u32,
  source: &CodeSource,
  rng: &mut R,
) -> Result<BTreeMap<String, Triplet>> {
  source.validate()?;
  let seat_count = seat_count.max(1);
  check_seat_count(seat_count)?;

  Ok(
    (1..=seat_count)
      .map(|seat| {
        let codes = source.codes(rng);
        let odd_index = rng.gen_range(0..3u8);
        (seat.to_string(), Triplet { codes, odd_index })
      })
      .collect(),
  )
}

/// Whether `choice_code` is the odd code of `triplet`.
pub fn evaluate_choice(triplet: &Triplet, choice_code: &str) -> bool {
  triplet.odd_code() == choice_code
}

// ─── Repository operations ───────────────────────────────────────────────────

impl<D: DocumentStore> Repository<D> {
  /// Persist a new seat count (values below one become one). Existing
  /// triplets are left untouched.
  pub async fn set_seat_count(&self, sample_id: &str, count: i64) -> Result<Sample> {
    let count = u32::try_from(count.max(1))
      .map_err(|_| Error::invalid(format!("seat count {count} is out of range")))?;
    check_seat_count(count)?;

    let _gate = self.lock().await;
    let mut sample = self.require_sample(sample_id).await?;
    sample.triangle_mut()?.seat_count = count;
    sample.updated_at = timestamp::now();
    self.upsert_locked(sample.clone()).await?;
    Ok(sample)
  }

  /// Regenerate the triplets of every seat, replacing any previous
  /// assignment. Responses already stored keep their original `correct`
  /// flag.
  pub async fn generate_triplets(
    &self,
    sample_id: &str,
    source: &CodeSource,
  ) -> Result<Sample> {
    let _gate = self.lock().await;
    let mut sample = self.require_sample(sample_id).await?;
    let seats = sample.triangle()?.seats();

    let assignment =
      self.ids().with_rng(|rng| generate_assignment(seats, source, rng))?;

    let answered = self
      .responses_for_sample(sample_id)
      .await?
      .iter()
      .filter(|r| r.triangle().is_some())
      .count();
    if answered > 0 {
      tracing::warn!(
        sample_id,
        answered,
        "regenerating triplets for a sample that already has responses"
      );
    }

    let now = timestamp::now();
    let cfg = sample.triangle_mut()?;
    cfg.triplets_by_seat = assignment;
    cfg.generated_at = Some(now);
    sample.updated_at = now;
    self.upsert_locked(sample.clone()).await?;

    tracing::info!(sample_id, seats, "triplets generated");
    Ok(sample)
  }

  /// The triplet for `seat` (clamped into range), or `None` if none have
  /// been generated.
  pub async fn triplet(&self, sample_id: &str, seat: Option<i64>) -> Result<Option<Triplet>> {
    let sample = self.require_sample(sample_id).await?;
    Ok(sample.triangle()?.triplet(seat).cloned())
  }

  /// Score `choice_code` against the current triplet of `seat`.
  pub async fn evaluate_choice(
    &self,
    sample_id: &str,
    seat: Option<i64>,
    choice_code: &str,
  ) -> Result<bool> {
    let triplet = self
      .triplet(sample_id, seat)
      .await?
      .ok_or_else(|| Error::TripletsNotGenerated(sample_id.to_owned()))?;
    Ok(evaluate_choice(&triplet, choice_code))
  }
}

#[cfg(test)]
mod tests {
  use rand::{SeedableRng as _, rngs::{StdRng, mock::StepRng}};

  use super::*;

  fn fixed() -> CodeSource {
    CodeSource::Fixed(["A".into(), "B".into(), "C".into()])
  }

  #[test]
  fn every_seat_gets_distinct_codes_and_valid_odd_index() {
    let mut rng = StdRng::seed_from_u64(3);
    let map = generate_assignment(12, &CodeSource::Placeholder, &mut rng).unwrap();
    assert_eq!(map.len(), 12);
    for seat in 1..=12u32 {
      let t = &map[&seat.to_string()];
      let [a, b, c] = &t.codes;
      assert!(a != b && b != c && a != c, "seat {seat}: {:?}", t.codes);
      assert!(t.odd_index <= 2);
      assert!(t.codes.iter().all(|c| (100..=999).contains(&c.parse::<u32>().unwrap())));
    }
  }

  #[test]
  fn same_seed_same_assignment() {
    let a = generate_assignment(5, &fixed(), &mut StdRng::seed_from_u64(9)).unwrap();
    let b = generate_assignment(5, &fixed(), &mut StdRng::seed_from_u64(9)).unwrap();
    assert_eq!(a, b);
  }

  #[test]
  fn constant_rng_always_picks_first_index() {
    let mut rng = StepRng::new(0, 0);
    let map = generate_assignment(3, &fixed(), &mut rng).unwrap();
    for t in map.values() {
      assert_eq!(t.odd_index, 0);
      let mut sorted = t.codes.clone();
      sorted.sort();
      assert_eq!(sorted, ["A", "B", "C"]);
    }
  }

  #[test]
  fn zero_seats_still_yields_one() {
    let map = generate_assignment(0, &fixed(), &mut StdRng::seed_from_u64(1)).unwrap();
    assert_eq!(map.keys().collect::<Vec<_>>(), ["1"]);
  }

  #[test]
  fn duplicate_fixed_codes_are_rejected() {
    let source = CodeSource::Fixed(["A".into(), "A".into(), "C".into()]);
    let err = generate_assignment(2, &source, &mut StdRng::seed_from_u64(1)).unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
  }

  #[test]
  fn evaluate_compares_against_odd_code() {
    let t = Triplet { codes: ["A".into(), "B".into(), "C".into()], odd_index: 1 };
    assert!(evaluate_choice(&t, "B"));
    assert!(!evaluate_choice(&t, "A"));
    assert!(!evaluate_choice(&t, "Z"));
  }
}
