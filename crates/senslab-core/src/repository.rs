//! [`Repository`]: CRUD and queries over the four persisted collections.
//!
//! Each collection is one JSON array stored under a fixed key in the
//! persistence gateway. Every mutation is a read-modify-write of the whole
//! array, performed while holding the repository's writer gate so that
//! writers within one process never interleave.

use serde::{Serialize, de::DeserializeOwned};
use tokio::sync::{Mutex, MutexGuard};

use crate::{
  Error, Result,
  catalog::DescriptorCatalog,
  gateway::DocumentStore,
  ids::{IdGenerator, TokenPolicy},
  invite::InviteToken,
  response::Response,
  sample::{Method, MethodCore, ProfileConfig, Sample, TriangleConfig, default_label},
  session::{Domain, Session, SessionStatus, default_title},
  timestamp,
};

pub const SESSIONS_KEY: &str = "senslab_sessions";
pub const SAMPLES_KEY: &str = "senslab_samples";
pub const RESPONSES_KEY: &str = "senslab_responses";
pub const TOKENS_KEY: &str = "senslab_inviteTokens";

/// Upper bound accepted for a triangle sample's seat count.
pub const MAX_SEAT_COUNT: u32 = 999;

// ─── Documents ───────────────────────────────────────────────────────────────

/// An entity stored as one element of a collection document.
pub trait Document: Serialize + DeserializeOwned + Clone + Send + Sync {
  /// Gateway key of the collection.
  const KEY: &'static str;

  /// The lookup key of this element within its collection.
  fn doc_id(&self) -> &str;
}

impl Document for Session {
  const KEY: &'static str = SESSIONS_KEY;

  fn doc_id(&self) -> &str { &self.id }
}

impl Document for Sample {
  const KEY: &'static str = SAMPLES_KEY;

  fn doc_id(&self) -> &str { &self.id }
}

impl Document for Response {
  const KEY: &'static str = RESPONSES_KEY;

  fn doc_id(&self) -> &str { &self.id }
}

impl Document for InviteToken {
  const KEY: &'static str = TOKENS_KEY;

  fn doc_id(&self) -> &str { &self.token }
}

// ─── Repository ──────────────────────────────────────────────────────────────

/// Entity repository over a [`DocumentStore`].
pub struct Repository<D> {
  store:      D,
  ids:        IdGenerator,
  tokens:     TokenPolicy,
  write_gate: Mutex<()>,
}

impl<D: DocumentStore> Repository<D> {
  pub fn new(store: D) -> Self {
    Self {
      store,
      ids: IdGenerator::from_entropy(),
      tokens: TokenPolicy::default(),
      write_gate: Mutex::new(()),
    }
  }

  /// Replace the random source used for ids, codes, tokens, and triplets.
  pub fn with_generator(mut self, ids: IdGenerator) -> Self {
    self.ids = ids;
    self
  }

  pub fn with_token_policy(mut self, policy: TokenPolicy) -> Self {
    self.tokens = policy;
    self
  }

  pub fn store(&self) -> &D { &self.store }

  pub fn ids(&self) -> &IdGenerator { &self.ids }

  pub fn token_policy(&self) -> &TokenPolicy { &self.tokens }

  // ── Collection plumbing ───────────────────────────────────────────────

  /// Acquire the writer gate. Held for the whole read-modify-write.
  pub(crate) async fn lock(&self) -> MutexGuard<'_, ()> {
    self.write_gate.lock().await
  }

  pub(crate) async fn load<T: Document>(&self) -> Result<Vec<T>> {
    let doc = self
      .store
      .read(T::KEY)
      .await
      .map_err(|e| Error::Gateway(Box::new(e)))?;
    match doc {
      None | Some(serde_json::Value::Null) => Ok(Vec::new()),
      Some(doc) => Ok(serde_json::from_value(doc)?),
    }
  }

  pub(crate) async fn save<T: Document>(&self, items: &[T]) -> Result<()> {
    let doc = serde_json::to_value(items)?;
    self
      .store
      .write(T::KEY, doc)
      .await
      .map_err(|e| Error::Gateway(Box::new(e)))?;
    tracing::debug!(key = T::KEY, len = items.len(), "collection written");
    Ok(())
  }

  /// Insert `item` at the front if its id is unseen, else replace in place.
  /// The caller must hold the writer gate.
  pub(crate) async fn upsert_locked<T: Document>(&self, item: T) -> Result<()> {
    let mut all = self.load::<T>().await?;
    match all.iter().position(|x| x.doc_id() == item.doc_id()) {
      Some(idx) => all[idx] = item,
      None => all.insert(0, item),
    }
    self.save(&all).await
  }

  async fn find<T: Document>(&self, id: &str) -> Result<Option<T>> {
    Ok(self.load::<T>().await?.into_iter().find(|x| x.doc_id() == id))
  }

  // ── Sessions ──────────────────────────────────────────────────────────

  pub async fn list_sessions(&self) -> Result<Vec<Session>> { self.load().await }

  pub async fn session(&self, id: &str) -> Result<Option<Session>> {
    self.find(id).await
  }

  pub async fn require_session(&self, id: &str) -> Result<Session> {
    self
      .session(id)
      .await?
      .ok_or_else(|| Error::SessionNotFound(id.to_owned()))
  }

  /// Case-insensitive lookup; a blank code never matches.
  pub async fn session_by_code(&self, code: &str) -> Result<Option<Session>> {
    let code = code.trim();
    if code.is_empty() {
      return Ok(None);
    }
    Ok(
      self
        .list_sessions()
        .await?
        .into_iter()
        .find(|s| s.matches_code(code)),
    )
  }

  pub async fn upsert_session(&self, session: Session) -> Result<()> {
    let _gate = self.lock().await;
    self.upsert_locked(session).await
  }

  /// Create a `draft` session with a fresh, currently unused session code.
  pub async fn create_session(
    &self,
    domain: Domain,
    title: Option<&str>,
  ) -> Result<Session> {
    let _gate = self.lock().await;
    let mut all = self.load::<Session>().await?;

    let mut code = self.ids.session_code();
    while all.iter().any(|s| s.matches_code(&code)) {
      code = self.ids.session_code();
    }

    let now = timestamp::now();
    let title = title
      .map(str::trim)
      .filter(|t| !t.is_empty())
      .map_or_else(|| default_title(domain), str::to_owned);

    let session = Session {
      id: self.ids.id("senslab_session"),
      session_code: code,
      domain,
      status: SessionStatus::Draft,
      title,
      created_at: now,
      updated_at: now,
      opens_at: None,
      sample_ids: Vec::new(),
    };

    all.insert(0, session.clone());
    self.save(&all).await?;
    tracing::info!(
      session_id = %session.id,
      code = %session.session_code,
      "session created"
    );
    Ok(session)
  }

  pub async fn set_session_status(
    &self,
    session_id: &str,
    status: SessionStatus,
  ) -> Result<Session> {
    let _gate = self.lock().await;
    let mut session = self.require_session(session_id).await?;
    session.status = status;
    session.updated_at = timestamp::now();
    self.upsert_locked(session.clone()).await?;
    tracing::info!(session_id, %status, "session status changed");
    Ok(session)
  }

  // ── Samples ───────────────────────────────────────────────────────────

  pub async fn list_samples(&self) -> Result<Vec<Sample>> { self.load().await }

  pub async fn sample(&self, id: &str) -> Result<Option<Sample>> {
    self.find(id).await
  }

  pub async fn require_sample(&self, id: &str) -> Result<Sample> {
    self
      .sample(id)
      .await?
      .ok_or_else(|| Error::SampleNotFound(id.to_owned()))
  }

  /// Samples of a session, in the session's `sample_ids` order.
  pub async fn samples_for_session(&self, session_id: &str) -> Result<Vec<Sample>> {
    let mut samples: Vec<Sample> = self
      .list_samples()
      .await?
      .into_iter()
      .filter(|s| s.session_id == session_id)
      .collect();
    if let Some(session) = self.session(session_id).await? {
      let rank = |id: &str| {
        session
          .sample_ids
          .iter()
          .position(|x| x == id)
          .unwrap_or(usize::MAX)
      };
      samples.sort_by_key(|s| rank(&s.id));
    }
    Ok(samples)
  }

  pub async fn upsert_sample(&self, sample: Sample) -> Result<()> {
    if let MethodCore::Triangle(cfg) = &sample.method_core {
      check_seat_count(cfg.seat_count)?;
    }
    let _gate = self.lock().await;
    self.upsert_locked(sample).await
  }

  /// Create a sample attached to `session_id`. Fails with
  /// [`Error::SessionNotFound`] before writing anything if the session is
  /// unknown.
  pub async fn create_sample(
    &self,
    session_id: &str,
    label: Option<&str>,
    method_core: MethodCore,
  ) -> Result<Sample> {
    if let MethodCore::Triangle(cfg) = &method_core {
      check_seat_count(cfg.seat_count)?;
    }

    let _gate = self.lock().await;
    let mut session = self.require_session(session_id).await?;
    let mut samples = self.load::<Sample>().await?;

    let now = timestamp::now();
    let label = label
      .map(str::trim)
      .filter(|l| !l.is_empty())
      .unwrap_or_else(|| default_label(method_core.method()))
      .to_owned();

    let sample = Sample {
      id: self.ids.id("senslab_sample"),
      session_id: session.id.clone(),
      label,
      created_at: now,
      updated_at: now,
      method_core,
      addons: Some(serde_json::json!({ "schema": { "widgets": [] } })),
    };

    session.sample_ids.push(sample.id.clone());
    session.updated_at = now;

    samples.insert(0, sample.clone());
    self.save(&samples).await?;
    self.upsert_locked(session).await?;

    tracing::info!(
      session_id,
      sample_id = %sample.id,
      method = %sample.method(),
      "sample created"
    );
    Ok(sample)
  }

  pub async fn create_profile_sample(
    &self,
    session_id: &str,
    label: Option<&str>,
  ) -> Result<Sample> {
    self
      .create_sample(session_id, label, MethodCore::Profile(ProfileConfig::default()))
      .await
  }

  pub async fn create_triangle_sample(
    &self,
    session_id: &str,
    label: Option<&str>,
    seat_count: u32,
  ) -> Result<Sample> {
    let cfg = TriangleConfig { seat_count: seat_count.max(1), ..Default::default() };
    self
      .create_sample(session_id, label, MethodCore::Triangle(cfg))
      .await
  }

  /// Store the selected descriptor leaves of a profile sample together with
  /// a snapshot resolved through `catalog`.
  pub async fn update_profile_selection(
    &self,
    sample_id: &str,
    leaf_ids: &[String],
    catalog: &impl DescriptorCatalog,
  ) -> Result<Sample> {
    let mut selected: Vec<String> = Vec::with_capacity(leaf_ids.len());
    for id in leaf_ids.iter().map(|s| s.trim()).filter(|s| !s.is_empty()) {
      if !selected.iter().any(|x| x == id) {
        selected.push(id.to_owned());
      }
    }
    let snapshot = catalog.resolve_ids(&selected);

    let _gate = self.lock().await;
    let mut sample = self.require_sample(sample_id).await?;
    let cfg = sample.profile_mut()?;
    cfg.descriptor_leaf_ids = selected;
    cfg.snapshot = snapshot;
    sample.updated_at = timestamp::now();
    self.upsert_locked(sample.clone()).await?;
    Ok(sample)
  }

  /// The largest seat count among the session's triangle samples (1 if it
  /// has none).
  pub async fn seat_count_for_session(&self, session_id: &str) -> Result<u32> {
    let samples = self.samples_for_session(session_id).await?;
    Ok(
      samples
        .iter()
        .filter_map(|s| match &s.method_core {
          MethodCore::Triangle(cfg) => Some(cfg.seats()),
          MethodCore::Profile(_) | MethodCore::Threshold(_) => None,
        })
        .max()
        .unwrap_or(1),
    )
  }

  pub async fn seat_required(&self, session_id: &str) -> Result<bool> {
    Ok(self.seat_count_for_session(session_id).await? > 1)
  }

  // ── Responses ─────────────────────────────────────────────────────────

  pub async fn list_responses(&self) -> Result<Vec<Response>> { self.load().await }

  pub async fn response(&self, id: &str) -> Result<Option<Response>> {
    self.find(id).await
  }

  pub async fn responses_for_session(&self, session_id: &str) -> Result<Vec<Response>> {
    Ok(
      self
        .list_responses()
        .await?
        .into_iter()
        .filter(|r| r.session_id == session_id)
        .collect(),
    )
  }

  pub async fn responses_for_sample(&self, sample_id: &str) -> Result<Vec<Response>> {
    Ok(
      self
        .list_responses()
        .await?
        .into_iter()
        .filter(|r| r.sample_id == sample_id)
        .collect(),
    )
  }

  /// The panelist's response to a sample, if any. Blank ids never match.
  pub async fn response_for_panelist(
    &self,
    sample_id: &str,
    panelist_id: &str,
  ) -> Result<Option<Response>> {
    let pid = panelist_id.trim();
    if pid.is_empty() {
      return Ok(None);
    }
    Ok(
      self
        .list_responses()
        .await?
        .into_iter()
        .find(|r| r.sample_id == sample_id && r.panelist_id == pid),
    )
  }

  /// Upsert a response, keeping at most one per `(sample_id, panelist_id)`:
  /// if the panelist already answered the sample, the stored id is reused.
  pub async fn upsert_response(&self, response: Response) -> Result<Response> {
    let _gate = self.lock().await;
    self.upsert_response_locked(response).await
  }

  pub(crate) async fn upsert_response_locked(
    &self,
    mut response: Response,
  ) -> Result<Response> {
    let mut all = self.load::<Response>().await?;
    let existing = all.iter().position(|r| {
      r.id == response.id
        || (r.sample_id == response.sample_id
          && r.panelist_id == response.panelist_id)
    });
    match existing {
      Some(idx) => {
        response.id = all[idx].id.clone();
        all[idx] = response.clone();
      }
      None => all.insert(0, response.clone()),
    }
    self.save(&all).await?;
    Ok(response)
  }
}

pub(crate) fn check_seat_count(count: u32) -> Result<()> {
  if count > MAX_SEAT_COUNT {
    return Err(Error::invalid(format!(
      "seat count {count} exceeds the maximum of {MAX_SEAT_COUNT}"
    )));
  }
  Ok(())
}

/// Require that `method` matches the sample's method.
pub(crate) fn expect_method(sample: &Sample, method: Method) -> Result<()> {
  if sample.method() != method {
    return Err(Error::MethodMismatch { expected: method, found: sample.method() });
  }
  Ok(())
}
