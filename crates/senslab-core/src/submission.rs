//! Response submission and panelist progress.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::{
  Error, Result,
  gateway::DocumentStore,
  repository::{Repository, expect_method},
  response::{
    Answer, Panelist, ProfileAnswer, ProfileSubmission, Response, TriangleAnswer,
    TriangleSubmission,
  },
  sample::{Method, Sample},
  session::Session,
  timestamp,
  triangle::evaluate_choice,
};

pub const MAX_INTENSITY: u8 = 100;

/// Whether a panelist has answered one sample of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleProgress {
  pub sample_id: String,
  pub label:     String,
  pub method:    Method,
  pub answered:  bool,
}

fn clean_text(text: Option<&str>) -> Option<String> {
  text.map(str::trim).filter(|t| !t.is_empty()).map(str::to_owned)
}

impl<D: DocumentStore> Repository<D> {
  /// Load and check the session/sample pair a submission targets.
  async fn submission_target(
    &self,
    session_id: &str,
    sample_id: &str,
    method: Method,
  ) -> Result<(Session, Sample)> {
    let session = self.require_session(session_id).await?;
    if !session.is_ready() {
      return Err(Error::SessionNotReady(session.id));
    }
    let sample = self.require_sample(sample_id).await?;
    if sample.session_id != session.id {
      return Err(Error::invalid(format!(
        "sample {sample_id} does not belong to session {session_id}"
      )));
    }
    expect_method(&sample, method)?;
    Ok((session, sample))
  }

  async fn build_response(
    &self,
    sample: &Sample,
    panelist: &Panelist,
    panelist_id: String,
    answer: Answer,
    free_text: Option<&str>,
  ) -> Result<Response> {
    let existing = self.response_for_panelist(&sample.id, &panelist_id).await?;
    let panelist_name = clean_text(panelist.panelist_name.as_deref())
      .unwrap_or_else(|| panelist_id.clone());
    Ok(Response {
      id: existing.map_or_else(|| self.ids().id("senslab_resp"), |r| r.id),
      session_id: sample.session_id.clone(),
      sample_id: sample.id.clone(),
      panelist_id,
      panelist_name: Some(panelist_name),
      seat_number: panelist.seat_number,
      answer,
      free_text: clean_text(free_text),
      addons_answers: None,
      submitted_at: timestamp::now(),
    })
  }

  /// Record (or overwrite) a panelist's profile ratings. Descriptors the
  /// panelist did not rate are stored as zero.
  pub async fn submit_profile(&self, submission: ProfileSubmission) -> Result<Response> {
    let panelist_id = require_panelist(&submission.panelist)?;

    let _gate = self.lock().await;
    let (_, sample) = self
      .submission_target(&submission.session_id, &submission.sample_id, Method::Profile)
      .await?;

    let items = sample.profile()?.items();
    let mut intensities: BTreeMap<String, u8> =
      items.iter().map(|d| (d.id.clone(), 0)).collect();
    for (leaf, value) in &submission.intensities {
      if *value > MAX_INTENSITY {
        return Err(Error::invalid(format!(
          "intensity {value} for {leaf} exceeds {MAX_INTENSITY}"
        )));
      }
      match intensities.get_mut(leaf) {
        Some(slot) => *slot = *value,
        None => {
          return Err(Error::invalid(format!(
            "descriptor {leaf} is not selected for sample {}",
            sample.id
          )));
        }
      }
    }

    let response = self
      .build_response(
        &sample,
        &submission.panelist,
        panelist_id,
        Answer::Profile(ProfileAnswer { intensities }),
        submission.free_text.as_deref(),
      )
      .await?;
    let stored = self.upsert_response_locked(response).await?;
    tracing::info!(
      sample_id = %stored.sample_id,
      panelist_id = %stored.panelist_id,
      "profile response submitted"
    );
    Ok(stored)
  }

  /// Record (or overwrite) a panelist's triangle choice, scoring it against
  /// the current triplet of their seat.
  pub async fn submit_triangle(&self, submission: TriangleSubmission) -> Result<Response> {
    let panelist_id = require_panelist(&submission.panelist)?;
    let choice_code = submission.choice_code.trim().to_owned();
    if choice_code.is_empty() {
      return Err(Error::invalid("a choice code is required"));
    }

    let _gate = self.lock().await;
    let (session, sample) = self
      .submission_target(&submission.session_id, &submission.sample_id, Method::Triangle)
      .await?;

    // A seat below one counts as no seat at all.
    let seat = submission.panelist.seat_number;
    if seat.is_none_or(|s| s < 1) && self.seat_required(&session.id).await? {
      return Err(Error::SeatRequired);
    }

    let triplet = sample
      .triangle()?
      .triplet(seat)
      .cloned()
      .ok_or_else(|| Error::TripletsNotGenerated(sample.id.clone()))?;
    if !triplet.contains(&choice_code) {
      return Err(Error::invalid(format!(
        "{choice_code:?} is not one of the codes presented at this seat"
      )));
    }
    let correct = evaluate_choice(&triplet, &choice_code);

    let response = self
      .build_response(
        &sample,
        &submission.panelist,
        panelist_id,
        Answer::Triangle(TriangleAnswer { choice_code, correct }),
        submission.free_text.as_deref(),
      )
      .await?;
    let stored = self.upsert_response_locked(response).await?;
    tracing::info!(
      sample_id = %stored.sample_id,
      panelist_id = %stored.panelist_id,
      correct,
      "triangle response submitted"
    );
    Ok(stored)
  }

  /// For each sample of the session, whether `panelist_id` has answered it.
  pub async fn panelist_progress(
    &self,
    session_id: &str,
    panelist_id: &str,
  ) -> Result<Vec<SampleProgress>> {
    self.require_session(session_id).await?;
    let pid = panelist_id.trim();
    let responses = self.responses_for_session(session_id).await?;
    let samples = self.samples_for_session(session_id).await?;

    Ok(
      samples
        .into_iter()
        .map(|s| SampleProgress {
          answered: !pid.is_empty()
            && responses
              .iter()
              .any(|r| r.sample_id == s.id && r.panelist_id == pid),
          method: s.method(),
          sample_id: s.id,
          label: s.label,
        })
        .collect(),
    )
  }
}

fn require_panelist(panelist: &Panelist) -> Result<String> {
  let id = panelist.panelist_id.trim();
  if id.is_empty() {
    return Err(Error::invalid("a panelist id is required"));
  }
  Ok(id.to_owned())
}
