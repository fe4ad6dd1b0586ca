//! One-time invite tokens and the panelist join flow.
//!
//! Resolving a token is a side-effect-free preview; consuming it is the
//! single write that spends it. The join flow resolves, accepts the
//! panelist, and only then consumes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  gateway::DocumentStore,
  repository::Repository,
  session::Session,
  timestamp,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteToken {
  pub token:      String,
  pub session_id: String,
  #[serde(with = "crate::timestamp")]
  pub created_at: DateTime<Utc>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub created_by: Option<String>,
  #[serde(default, with = "crate::timestamp::option")]
  pub expires_at: Option<DateTime<Utc>>,
  /// Set once, when the token is redeemed.
  #[serde(default, with = "crate::timestamp::option")]
  pub used_at:    Option<DateTime<Utc>>,
}

impl InviteToken {
  pub fn is_used(&self) -> bool { self.used_at.is_some() }

  pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
    self.expires_at.is_some_and(|exp| exp < now)
  }

  /// Whether the token may still be redeemed at `now`.
  pub fn is_redeemable(&self, now: DateTime<Utc>) -> bool {
    !self.is_used() && !self.is_expired(now)
  }
}

/// What the join form can be prefilled with after resolving a token.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPreview {
  pub token:        String,
  pub session_id:   String,
  pub session_code: String,
  pub title:        String,
}

/// A panelist's request to join a session.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
  pub session_code:  String,
  pub panelist_id:   String,
  #[serde(default)]
  pub panelist_name: Option<String>,
  #[serde(default)]
  pub seat_number:   Option<i64>,
  /// The invite token the panelist arrived with, if any.
  #[serde(default)]
  pub token:         Option<String>,
}

/// The outcome of a successful join.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinTicket {
  pub session:       Session,
  pub panelist_id:   String,
  pub panelist_name: String,
  pub seat_number:   Option<i64>,
  /// Whether the panelist must pick a seat before answering triangle
  /// samples.
  pub seat_required: bool,
}

/// The link a panelist follows to join with `token`.
pub fn join_url(base_url: &str, token: &str) -> String {
  let mut encoded = String::with_capacity(token.len());
  for b in token.bytes() {
    match b {
      b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
        encoded.push(b as char)
      }
      _ => encoded.push_str(&format!("%{b:02X}")),
    }
  }
  format!("{}/panel/join?token={encoded}", base_url.trim_end_matches('/'))
}

// ─── Repository operations ───────────────────────────────────────────────────

impl<D: DocumentStore> Repository<D> {
  pub async fn list_tokens(&self) -> Result<Vec<InviteToken>> { self.load().await }

  pub async fn tokens_for_session(&self, session_id: &str) -> Result<Vec<InviteToken>> {
    Ok(
      self
        .list_tokens()
        .await?
        .into_iter()
        .filter(|t| t.session_id == session_id)
        .collect(),
    )
  }

  /// Issue a fresh, unused token for `session_id`.
  pub async fn issue_token(
    &self,
    session_id: &str,
    expires_at: Option<DateTime<Utc>>,
  ) -> Result<InviteToken> {
    let _gate = self.lock().await;
    self.require_session(session_id).await?;

    let mut all = self.load::<InviteToken>().await?;
    let mut token = self.ids().token(self.token_policy());
    while all.iter().any(|t| t.token == token) {
      token = self.ids().token(self.token_policy());
    }

    let invite = InviteToken {
      token,
      session_id: session_id.to_owned(),
      created_at: timestamp::now(),
      created_by: None,
      expires_at,
      used_at: None,
    };
    all.insert(0, invite.clone());
    self.save(&all).await?;
    tracing::info!(session_id, expires_at = ?invite.expires_at, "invite token issued");
    Ok(invite)
  }

  /// Look up a redeemable token without spending it.
  ///
  /// Unknown or blank tokens yield [`Error::TokenNotFound`]; used or expired
  /// ones yield [`Error::TokenExpiredOrUsed`].
  pub async fn resolve_token(&self, token: &str) -> Result<InviteToken> {
    let token = token.trim();
    if token.is_empty() {
      return Err(Error::TokenNotFound);
    }
    let found = self
      .list_tokens()
      .await?
      .into_iter()
      .find(|t| t.token == token)
      .ok_or(Error::TokenNotFound)?;
    if !found.is_redeemable(timestamp::now()) {
      return Err(Error::TokenExpiredOrUsed);
    }
    Ok(found)
  }

  /// Mark `token` used if it is currently redeemable. Consuming an unknown,
  /// used, or expired token is a no-op. Returns whether this call spent it.
  pub async fn consume_token(&self, token: &str) -> Result<bool> {
    let _gate = self.lock().await;
    self.consume_token_locked(token).await
  }

  async fn consume_token_locked(&self, token: &str) -> Result<bool> {
    let token = token.trim();
    if token.is_empty() {
      return Ok(false);
    }
    let mut all = self.load::<InviteToken>().await?;
    let now = timestamp::now();
    let Some(entry) = all.iter_mut().find(|t| t.token == token) else {
      return Ok(false);
    };
    if !entry.is_redeemable(now) {
      return Ok(false);
    }
    entry.used_at = Some(now);
    let session_id = entry.session_id.clone();
    self.save(&all).await?;
    tracing::info!(%session_id, "invite token consumed");
    Ok(true)
  }

  /// Resolve a token and the session it is bound to.
  pub async fn preview_token(&self, token: &str) -> Result<TokenPreview> {
    let invite = self.resolve_token(token).await?;
    let session = self.require_session(&invite.session_id).await?;
    Ok(TokenPreview {
      token:        invite.token,
      session_id:   session.id,
      session_code: session.session_code,
      title:        session.title,
    })
  }

  /// Accept a panelist into a session, spending their invite token if they
  /// brought one.
  pub async fn join(&self, request: JoinRequest) -> Result<JoinTicket> {
    let code = request.session_code.trim().to_uppercase();
    let panelist_id = request.panelist_id.trim().to_owned();
    if code.is_empty() || panelist_id.is_empty() {
      return Err(Error::invalid("session code and panelist id are required"));
    }

    let session = self
      .session_by_code(&code)
      .await?
      .ok_or_else(|| Error::SessionCodeNotFound(code.clone()))?;

    let token = request
      .token
      .as_deref()
      .map(str::trim)
      .filter(|t| !t.is_empty());

    if let Some(token) = token {
      let _gate = self.lock().await;
      let invite = self.resolve_token(token).await?;
      if invite.session_id != session.id {
        return Err(Error::invalid("invite token belongs to a different session"));
      }
      if !self.consume_token_locked(token).await? {
        return Err(Error::TokenExpiredOrUsed);
      }
    }

    let seat_required = self.seat_required(&session.id).await?;
    let panelist_name = request
      .panelist_name
      .as_deref()
      .map(str::trim)
      .filter(|n| !n.is_empty())
      .unwrap_or(panelist_id.as_str())
      .to_owned();

    tracing::info!(session_id = %session.id, %panelist_id, "panelist joined");
    Ok(JoinTicket {
      session,
      panelist_id,
      panelist_name,
      seat_number: request.seat_number,
      seat_required,
    })
  }
}
