//! Repository tests against the in-memory gateway.

use std::{
  collections::{BTreeMap, HashSet},
  sync::Arc,
};

use chrono::Duration;

use crate::{
  Error, Repository,
  catalog::{NodeCatalog, aroma_wheel_seed},
  gateway::{DocumentStore as _, MemoryDocumentStore},
  ids::{IdGenerator, is_session_code},
  invite::JoinRequest,
  repository::SAMPLES_KEY,
  response::{Panelist, ProfileSubmission, TriangleSubmission},
  sample::{Method, Sample, Triplet},
  session::{Domain, SessionStatus},
  timestamp,
  triangle::CodeSource,
};

fn repo() -> Repository<MemoryDocumentStore> {
  Repository::new(MemoryDocumentStore::new()).with_generator(IdGenerator::seeded(11))
}

async fn ready_session(r: &Repository<MemoryDocumentStore>) -> String {
  let s = r.create_session(Domain::Product, Some("Lager")).await.unwrap();
  r.set_session_status(&s.id, SessionStatus::Ready).await.unwrap();
  s.id
}

fn triplet(odd: u8) -> Triplet {
  Triplet { codes: ["A".into(), "B".into(), "C".into()], odd_index: odd }
}

/// Overwrite the seat-1 triplet of a triangle sample directly.
async fn set_seat_one(r: &Repository<MemoryDocumentStore>, sample: &Sample, odd: u8) {
  let mut sample = r.require_sample(&sample.id).await.unwrap();
  let cfg = sample.triangle_mut().unwrap();
  cfg.triplets_by_seat = BTreeMap::from([("1".to_owned(), triplet(odd))]);
  r.upsert_sample(sample).await.unwrap();
}

fn choose(session_id: &str, sample_id: &str, panelist: Panelist, code: &str) -> TriangleSubmission {
  TriangleSubmission {
    session_id: session_id.into(),
    sample_id: sample_id.into(),
    panelist,
    choice_code: code.into(),
    free_text: None,
  }
}

// ─── Sessions ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn session_codes_are_well_formed_and_unique() {
  let r = repo();
  for _ in 0..40 {
    r.create_session(Domain::Panel, None).await.unwrap();
  }
  let sessions = r.list_sessions().await.unwrap();
  let codes: HashSet<_> = sessions.iter().map(|s| s.session_code.clone()).collect();
  assert_eq!(codes.len(), 40);
  assert!(codes.iter().all(|c| is_session_code(c)));
}

#[tokio::test]
async fn new_session_defaults() {
  let r = repo();
  let s = r.create_session(Domain::Field, Some("   ")).await.unwrap();
  assert_eq!(s.status, SessionStatus::Draft);
  assert_eq!(s.title, "FIELD Session");
  assert!(s.sample_ids.is_empty());
}

#[tokio::test]
async fn code_lookup_is_case_insensitive() {
  let r = repo();
  let s = r.create_session(Domain::Product, None).await.unwrap();
  let lower = format!("  {}  ", s.session_code.to_lowercase());
  let found = r.session_by_code(&lower).await.unwrap().unwrap();
  assert_eq!(found.id, s.id);
  assert!(r.session_by_code("").await.unwrap().is_none());
}

#[tokio::test]
async fn any_status_reachable_from_any_status() {
  let r = repo();
  let s = r.create_session(Domain::Product, None).await.unwrap();
  for status in [SessionStatus::Closed, SessionStatus::Draft, SessionStatus::Ready, SessionStatus::Draft] {
    let updated = r.set_session_status(&s.id, status).await.unwrap();
    assert_eq!(updated.status, status);
  }
  let err = r.set_session_status("missing", SessionStatus::Ready).await.unwrap_err();
  assert!(err.is_not_found());
}

// ─── Samples ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn sample_creation_appends_to_session() {
  let r = repo();
  let sid = ready_session(&r).await;
  let a = r.create_profile_sample(&sid, None).await.unwrap();
  let b = r.create_triangle_sample(&sid, Some("Tri"), 2).await.unwrap();

  let session = r.require_session(&sid).await.unwrap();
  assert_eq!(session.sample_ids, [a.id.clone(), b.id.clone()]);
  assert_eq!(a.label, "Profile");

  let ordered: Vec<_> = r
    .samples_for_session(&sid)
    .await
    .unwrap()
    .into_iter()
    .map(|s| s.id)
    .collect();
  assert_eq!(ordered, [a.id, b.id]);
}

#[tokio::test]
async fn sample_for_unknown_session_writes_nothing() {
  let r = repo();
  let err = r.create_profile_sample("nope", None).await.unwrap_err();
  assert!(matches!(err, Error::SessionNotFound(_)));
  assert!(r.store().read(SAMPLES_KEY).await.unwrap().is_none());
}

#[tokio::test]
async fn profile_selection_captures_snapshot() {
  let r = repo();
  let sid = ready_session(&r).await;
  let sample = r.create_profile_sample(&sid, None).await.unwrap();
  let catalog = NodeCatalog::new(aroma_wheel_seed().nodes);

  let ids = vec!["orange".to_owned(), "zitrone".to_owned(), "orange".to_owned()];
  let updated = r.update_profile_selection(&sample.id, &ids, &catalog).await.unwrap();
  let cfg = updated.profile().unwrap();
  assert_eq!(cfg.descriptor_leaf_ids, ["orange", "zitrone"]);
  assert_eq!(cfg.snapshot[0].name, "Orange");

  let tri = r.create_triangle_sample(&sid, None, 1).await.unwrap();
  let err = r.update_profile_selection(&tri.id, &ids, &catalog).await.unwrap_err();
  assert!(matches!(err, Error::MethodMismatch { expected: Method::Profile, .. }));
}

#[tokio::test]
async fn session_seat_count_is_max_over_triangle_samples() {
  let r = repo();
  let sid = ready_session(&r).await;
  assert_eq!(r.seat_count_for_session(&sid).await.unwrap(), 1);
  r.create_triangle_sample(&sid, None, 2).await.unwrap();
  r.create_triangle_sample(&sid, None, 4).await.unwrap();
  r.create_profile_sample(&sid, None).await.unwrap();
  assert_eq!(r.seat_count_for_session(&sid).await.unwrap(), 4);
  assert!(r.seat_required(&sid).await.unwrap());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_sample_creation_keeps_every_sample() {
  const N: usize = 50;
  let r = Arc::new(repo());
  let sid = ready_session(&r).await;

  let mut handles = Vec::with_capacity(N);
  for i in 0..N {
    let r = Arc::clone(&r);
    let sid = sid.clone();
    handles.push(tokio::spawn(async move {
      r.create_triangle_sample(&sid, None, (i % 3 + 1) as u32).await
    }));
  }
  let mut created = HashSet::new();
  for handle in handles {
    created.insert(handle.await.unwrap().unwrap().id);
  }
  assert_eq!(created.len(), N);

  let session = r.require_session(&sid).await.unwrap();
  assert_eq!(session.sample_ids.len(), N);
  assert_eq!(session.sample_ids.iter().collect::<HashSet<_>>().len(), N);
  assert_eq!(r.samples_for_session(&sid).await.unwrap().len(), N);
}

#[tokio::test]
async fn upsert_rejects_oversized_seat_count() {
  let r = repo();
  let sid = ready_session(&r).await;
  let sample = r.create_triangle_sample(&sid, None, 2).await.unwrap();

  let mut oversized = sample.clone();
  oversized.triangle_mut().unwrap().seat_count = 5000;
  let err = r.upsert_sample(oversized).await.unwrap_err();
  assert!(matches!(err, Error::InvalidInput(_)));

  let stored = r.require_sample(&sample.id).await.unwrap();
  assert_eq!(stored.triangle().unwrap().seat_count, 2);
}

// ─── Triangle ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn generated_triplets_cover_every_seat() {
  let r = repo();
  let sid = ready_session(&r).await;
  let sample = r.create_triangle_sample(&sid, None, 4).await.unwrap();
  r.generate_triplets(&sample.id, &CodeSource::Placeholder).await.unwrap();

  for seat in 1..=4 {
    let t = r.triplet(&sample.id, Some(seat)).await.unwrap().unwrap();
    let [a, b, c] = &t.codes;
    assert!(a != b && b != c && a != c);
    assert!(t.odd_index <= 2);
  }
  // Out-of-range seats are clamped rather than failing.
  let last = r.triplet(&sample.id, Some(4)).await.unwrap();
  assert_eq!(r.triplet(&sample.id, Some(40)).await.unwrap(), last);
}

#[tokio::test]
async fn triplet_is_absent_until_generated() {
  let r = repo();
  let sid = ready_session(&r).await;
  let sample = r.create_triangle_sample(&sid, None, 1).await.unwrap();
  assert!(r.triplet(&sample.id, None).await.unwrap().is_none());
  let err = r.evaluate_choice(&sample.id, None, "A").await.unwrap_err();
  assert!(matches!(err, Error::TripletsNotGenerated(_)));
}

#[tokio::test]
async fn seat_count_is_clamped_and_keeps_triplets() {
  let r = repo();
  let sid = ready_session(&r).await;
  let sample = r.create_triangle_sample(&sid, None, 2).await.unwrap();
  r.generate_triplets(&sample.id, &CodeSource::Placeholder).await.unwrap();

  let updated = r.set_seat_count(&sample.id, 0).await.unwrap();
  let cfg = updated.triangle().unwrap();
  assert_eq!(cfg.seat_count, 1);
  assert_eq!(cfg.triplets_by_seat.len(), 2);

  assert!(matches!(
    r.set_seat_count(&sample.id, 10_000).await,
    Err(Error::InvalidInput(_))
  ));
}

#[tokio::test]
async fn stored_correctness_survives_regeneration() {
  let r = repo();
  let sid = ready_session(&r).await;
  let sample = r.create_triangle_sample(&sid, None, 1).await.unwrap();

  set_seat_one(&r, &sample, 1).await; // odd = "B"
  let first = r
    .submit_triangle(choose(&sid, &sample.id, Panelist::new("P1"), "B"))
    .await
    .unwrap();
  assert!(first.triangle().unwrap().correct);

  set_seat_one(&r, &sample, 0).await; // odd = "A"
  assert!(!r.evaluate_choice(&sample.id, Some(1), "B").await.unwrap());

  let stored = r.response(&first.id).await.unwrap().unwrap();
  assert!(stored.triangle().unwrap().correct);

  r.generate_triplets(&sample.id, &CodeSource::Placeholder).await.unwrap();
  let stored = r.response(&first.id).await.unwrap().unwrap();
  assert!(stored.triangle().unwrap().correct);
}

// ─── Responses ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn resubmission_overwrites_under_first_id() {
  let r = repo();
  let sid = ready_session(&r).await;
  let sample = r.create_triangle_sample(&sid, None, 1).await.unwrap();
  set_seat_one(&r, &sample, 2).await; // odd = "C"

  let first = r
    .submit_triangle(choose(&sid, &sample.id, Panelist::new("P1"), "A"))
    .await
    .unwrap();
  let second = r
    .submit_triangle(choose(&sid, &sample.id, Panelist::new(" P1 "), "C"))
    .await
    .unwrap();

  assert_eq!(second.id, first.id);
  let all = r.responses_for_sample(&sample.id).await.unwrap();
  assert_eq!(all.len(), 1);
  assert_eq!(all[0].id, first.id);
  assert!(all[0].triangle().unwrap().correct);
  assert_eq!(all[0].panelist_name.as_deref(), Some("P1"));
}

#[tokio::test]
async fn raw_upsert_keeps_one_response_per_panelist() {
  let r = repo();
  let sid = ready_session(&r).await;
  let sample = r.create_triangle_sample(&sid, None, 1).await.unwrap();
  set_seat_one(&r, &sample, 0).await;
  let first = r
    .submit_triangle(choose(&sid, &sample.id, Panelist::new("P1"), "A"))
    .await
    .unwrap();

  let mut copy = first.clone();
  copy.id = "senslab_resp_other".into();
  let stored = r.upsert_response(copy).await.unwrap();
  assert_eq!(stored.id, first.id);
  assert_eq!(r.list_responses().await.unwrap().len(), 1);
}

#[tokio::test]
async fn submissions_require_a_ready_session() {
  let r = repo();
  let s = r.create_session(Domain::Product, None).await.unwrap();
  let sample = r.create_triangle_sample(&s.id, None, 1).await.unwrap();
  set_seat_one(&r, &sample, 0).await;

  let err = r
    .submit_triangle(choose(&s.id, &sample.id, Panelist::new("P1"), "A"))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::SessionNotReady(_)));
}

#[tokio::test]
async fn triangle_submission_validation() {
  let r = repo();
  let sid = ready_session(&r).await;
  let sample = r.create_triangle_sample(&sid, None, 3).await.unwrap();

  let err = r
    .submit_triangle(choose(&sid, &sample.id, Panelist::new("P1").seated(2), "A"))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::TripletsNotGenerated(_)));

  r.generate_triplets(
    &sample.id,
    &CodeSource::Fixed(["A".into(), "B".into(), "C".into()]),
  )
  .await
  .unwrap();

  let err = r
    .submit_triangle(choose(&sid, &sample.id, Panelist::new("P1"), "A"))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::SeatRequired));

  let err = r
    .submit_triangle(choose(&sid, &sample.id, Panelist::new("P1").seated(2), "Z"))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::InvalidInput(_)));

  let err = r
    .submit_triangle(choose(&sid, &sample.id, Panelist::new("  "), "A"))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::InvalidInput(_)));

  let ok = r
    .submit_triangle(choose(&sid, &sample.id, Panelist::new("P1").seated(2), "A"))
    .await
    .unwrap();
  let expected = r.evaluate_choice(&sample.id, Some(2), "A").await.unwrap();
  assert_eq!(ok.triangle().unwrap().correct, expected);
}

#[tokio::test]
async fn non_positive_seat_counts_as_missing() {
  let r = repo();
  let sid = ready_session(&r).await;
  let sample = r.create_triangle_sample(&sid, None, 3).await.unwrap();
  r.generate_triplets(
    &sample.id,
    &CodeSource::Fixed(["A".into(), "B".into(), "C".into()]),
  )
  .await
  .unwrap();

  for seat in [0, -1, -40] {
    let err = r
      .submit_triangle(choose(&sid, &sample.id, Panelist::new("P1").seated(seat), "A"))
      .await
      .unwrap_err();
    assert!(matches!(err, Error::SeatRequired), "seat {seat}: {err:?}");
  }
  assert!(r.responses_for_sample(&sample.id).await.unwrap().is_empty());

  // Single-seat sessions accept a zero seat and file it under seat 1.
  let lone_sid = ready_session(&r).await;
  let lone = r.create_triangle_sample(&lone_sid, None, 1).await.unwrap();
  set_seat_one(&r, &lone, 0).await;
  let ok = r
    .submit_triangle(choose(&lone_sid, &lone.id, Panelist::new("P1").seated(0), "A"))
    .await
    .unwrap();
  assert!(ok.triangle().unwrap().correct);
}

#[tokio::test]
async fn profile_submission_fills_unrated_descriptors() {
  let r = repo();
  let sid = ready_session(&r).await;
  let sample = r.create_profile_sample(&sid, None).await.unwrap();
  let catalog = NodeCatalog::new(aroma_wheel_seed().nodes);
  let ids = vec!["zitrone".to_owned(), "orange".to_owned()];
  r.update_profile_selection(&sample.id, &ids, &catalog).await.unwrap();

  let submit = |intensities: BTreeMap<String, u8>| ProfileSubmission {
    session_id: sid.clone(),
    sample_id: sample.id.clone(),
    panelist: Panelist::new("P1"),
    intensities,
    free_text: Some("  hoppy  ".into()),
  };

  let resp = r
    .submit_profile(submit(BTreeMap::from([("zitrone".to_owned(), 70)])))
    .await
    .unwrap();
  let answer = resp.profile().unwrap();
  assert_eq!(answer.intensities["zitrone"], 70);
  assert_eq!(answer.intensities["orange"], 0);
  assert_eq!(resp.free_text.as_deref(), Some("hoppy"));

  let err = r
    .submit_profile(submit(BTreeMap::from([("zitrone".to_owned(), 101)])))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::InvalidInput(_)));

  let err = r
    .submit_profile(submit(BTreeMap::from([("pine".to_owned(), 5)])))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::InvalidInput(_)));

  let summary = r.profile_summary(&sample.id).await.unwrap();
  assert_eq!(summary.n, 1);
  assert_eq!(summary.descriptors[0].mean, 70.0);
}

#[tokio::test]
async fn progress_tracks_answered_samples() {
  let r = repo();
  let sid = ready_session(&r).await;
  let tri = r.create_triangle_sample(&sid, None, 1).await.unwrap();
  let prof = r.create_profile_sample(&sid, None).await.unwrap();
  set_seat_one(&r, &tri, 0).await;
  r.submit_triangle(choose(&sid, &tri.id, Panelist::new("P1"), "B"))
    .await
    .unwrap();

  let progress = r.panelist_progress(&sid, "P1").await.unwrap();
  assert_eq!(progress.len(), 2);
  assert_eq!((progress[0].sample_id.as_str(), progress[0].answered), (tri.id.as_str(), true));
  assert_eq!((progress[1].sample_id.as_str(), progress[1].answered), (prof.id.as_str(), false));
}

#[tokio::test]
async fn aggregate_clamps_recorded_seats() {
  let r = repo();
  let sid = ready_session(&r).await;
  let sample = r.create_triangle_sample(&sid, None, 7).await.unwrap();
  r.generate_triplets(&sample.id, &CodeSource::Placeholder).await.unwrap();
  let t = r.triplet(&sample.id, Some(7)).await.unwrap().unwrap();
  r.submit_triangle(choose(&sid, &sample.id, Panelist::new("P1").seated(7), t.odd_code()))
    .await
    .unwrap();

  r.set_seat_count(&sample.id, 3).await.unwrap();
  let summary = r.triangle_summary(&sample.id).await.unwrap();
  assert_eq!(summary.by_seat.len(), 3);
  assert_eq!(summary.by_seat[2].tally.n, 1);
  assert_eq!(summary.overall.correct_count, 1);
  assert_eq!(summary.overall.rate, 1.0);
}

// ─── Invite tokens ───────────────────────────────────────────────────────────

#[tokio::test]
async fn token_lifecycle() {
  let r = repo();
  let sid = ready_session(&r).await;
  let invite = r.issue_token(&sid, None).await.unwrap();
  assert!(invite.token.len() >= 24);

  let resolved = r.resolve_token(&invite.token).await.unwrap();
  assert_eq!(resolved.session_id, sid);
  // Resolving does not spend the token.
  r.resolve_token(&invite.token).await.unwrap();

  assert!(r.consume_token(&invite.token).await.unwrap());
  let err = r.resolve_token(&invite.token).await.unwrap_err();
  assert!(matches!(err, Error::TokenExpiredOrUsed));

  assert!(!r.consume_token(&invite.token).await.unwrap());
  let stored = r.tokens_for_session(&sid).await.unwrap();
  assert_eq!(stored.len(), 1);
  assert!(stored[0].used_at.is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_consumers_spend_a_token_once() {
  let r = Arc::new(repo());
  let sid = ready_session(&r).await;
  let invite = r.issue_token(&sid, None).await.unwrap();

  let mut handles = Vec::new();
  for _ in 0..32 {
    let r = Arc::clone(&r);
    let token = invite.token.clone();
    handles.push(tokio::spawn(async move { r.consume_token(&token).await }));
  }
  let mut spent = 0;
  for handle in handles {
    if handle.await.unwrap().unwrap() {
      spent += 1;
    }
  }
  assert_eq!(spent, 1);
  assert!(matches!(
    r.resolve_token(&invite.token).await,
    Err(Error::TokenExpiredOrUsed)
  ));
}

#[tokio::test]
async fn unknown_and_expired_tokens_do_not_resolve() {
  let r = repo();
  let sid = ready_session(&r).await;
  assert!(matches!(r.resolve_token("nope").await, Err(Error::TokenNotFound)));
  assert!(matches!(r.resolve_token("  ").await, Err(Error::TokenNotFound)));

  let past = timestamp::now() - Duration::hours(1);
  let expired = r.issue_token(&sid, Some(past)).await.unwrap();
  assert!(matches!(
    r.resolve_token(&expired.token).await,
    Err(Error::TokenExpiredOrUsed)
  ));
  assert!(!r.consume_token(&expired.token).await.unwrap());

  assert!(r.issue_token("missing", None).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn join_spends_token_only_on_success() {
  let r = repo();
  let sid = ready_session(&r).await;
  let session = r.require_session(&sid).await.unwrap();
  let other = r.create_session(Domain::Panel, None).await.unwrap();
  let invite = r.issue_token(&sid, None).await.unwrap();

  let preview = r.preview_token(&invite.token).await.unwrap();
  assert_eq!(preview.session_code, session.session_code);

  let wrong = JoinRequest {
    session_code: other.session_code.clone(),
    panelist_id: "P1".into(),
    token: Some(invite.token.clone()),
    ..Default::default()
  };
  assert!(matches!(r.join(wrong).await, Err(Error::InvalidInput(_))));
  r.resolve_token(&invite.token).await.unwrap();

  let request = JoinRequest {
    session_code: session.session_code.to_lowercase(),
    panelist_id: " P1 ".into(),
    token: Some(invite.token.clone()),
    ..Default::default()
  };
  let ticket = r.join(request.clone()).await.unwrap();
  assert_eq!(ticket.session.id, sid);
  assert_eq!(ticket.panelist_id, "P1");
  assert_eq!(ticket.panelist_name, "P1");
  assert!(!ticket.seat_required);

  assert!(matches!(r.join(request).await, Err(Error::TokenExpiredOrUsed)));
}

#[tokio::test]
async fn manual_join_validates_code_and_panelist() {
  let r = repo();
  let sid = ready_session(&r).await;
  let code = r.require_session(&sid).await.unwrap().session_code;

  let missing = JoinRequest { session_code: code.clone(), ..Default::default() };
  assert!(matches!(r.join(missing).await, Err(Error::InvalidInput(_))));

  let unknown = JoinRequest {
    session_code: "ZZZZZZ".into(),
    panelist_id: "P1".into(),
    ..Default::default()
  };
  let err = r.join(unknown).await.unwrap_err();
  assert!(matches!(err, Error::SessionCodeNotFound(_)));

  let ok = JoinRequest {
    session_code: code,
    panelist_id: "P9".into(),
    panelist_name: Some("Nine".into()),
    ..Default::default()
  };
  assert_eq!(r.join(ok).await.unwrap().panelist_name, "Nine");
}
