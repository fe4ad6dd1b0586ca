//! Identifier, session-code, and invite-token generation.
//!
//! All generators draw from an injected [`Rng`] so callers (and tests) can
//! supply a seeded source.

use std::sync::{Mutex, PoisonError};

use rand::{Rng, SeedableRng as _, rngs::StdRng};

use crate::{Error, Result};

/// Session-code symbols: base32 without the look-alikes `O`, `0`, `I`, `1`.
pub const SESSION_CODE_ALPHABET: &str = "23456789ABCDEFGHJKLMNPQRSTUVWXYZ";
pub const SESSION_CODE_LEN: usize = 6;

/// URL-safe 64-symbol alphabet for invite tokens.
pub const TOKEN_ALPHABET: &str =
  "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789-_";
pub const MIN_TOKEN_LEN: usize = 24;
pub const DEFAULT_TOKEN_LEN: usize = 28;

// ─── Token policy ────────────────────────────────────────────────────────────

/// Length and alphabet used when issuing invite tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPolicy {
  length:   usize,
  alphabet: Vec<char>,
}

impl TokenPolicy {
  /// Validates that tokens are at least [`MIN_TOKEN_LEN`] long and that the
  /// alphabet has at least two distinct symbols.
  pub fn new(length: usize, alphabet: &str) -> Result<Self> {
    if length < MIN_TOKEN_LEN {
      return Err(Error::invalid(format!(
        "token length {length} is below the minimum of {MIN_TOKEN_LEN}"
      )));
    }
    let mut symbols: Vec<char> = alphabet.chars().collect();
    symbols.sort_unstable();
    symbols.dedup();
    if symbols.len() < 2 {
      return Err(Error::invalid("token alphabet needs at least two symbols"));
    }
    Ok(Self { length, alphabet: alphabet.chars().collect() })
  }

  pub fn with_length(length: usize) -> Result<Self> {
    Self::new(length, TOKEN_ALPHABET)
  }

  pub fn length(&self) -> usize { self.length }
}

impl Default for TokenPolicy {
  fn default() -> Self {
    Self {
      length:   DEFAULT_TOKEN_LEN,
      alphabet: TOKEN_ALPHABET.chars().collect(),
    }
  }
}

// ─── Free functions ──────────────────────────────────────────────────────────

/// An opaque identifier: `<prefix>_<32 hex digits>`.
pub fn make_id<R: Rng + ?Sized>(rng: &mut R, prefix: &str) -> String {
  let mut bytes = [0u8; 16];
  rng.fill_bytes(&mut bytes);
  let id = uuid::Builder::from_random_bytes(bytes).into_uuid();
  format!("{prefix}_{}", id.simple())
}

pub fn make_short_code<R: Rng + ?Sized>(rng: &mut R, len: usize) -> String {
  let symbols = SESSION_CODE_ALPHABET.as_bytes();
  (0..len)
    .map(|_| symbols[rng.gen_range(0..symbols.len())] as char)
    .collect()
}

pub fn make_token<R: Rng + ?Sized>(rng: &mut R, policy: &TokenPolicy) -> String {
  (0..policy.length)
    .map(|_| policy.alphabet[rng.gen_range(0..policy.alphabet.len())])
    .collect()
}

/// Whether `code` is a well-formed session code.
pub fn is_session_code(code: &str) -> bool {
  code.len() == SESSION_CODE_LEN
    && code.chars().all(|c| SESSION_CODE_ALPHABET.contains(c))
}

// ─── Shared generator ────────────────────────────────────────────────────────

/// A thread-safe random source shared by a repository.
pub struct IdGenerator {
  rng: Mutex<StdRng>,
}

impl IdGenerator {
  pub fn from_entropy() -> Self {
    Self { rng: Mutex::new(StdRng::from_entropy()) }
  }

  /// A deterministic generator; identical seeds yield identical output.
  pub fn seeded(seed: u64) -> Self {
    Self { rng: Mutex::new(StdRng::seed_from_u64(seed)) }
  }

  /// Run `f` with exclusive access to the underlying random source.
  pub fn with_rng<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
    let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
    f(&mut rng)
  }

  pub fn id(&self, prefix: &str) -> String {
    self.with_rng(|rng| make_id(rng, prefix))
  }

  pub fn session_code(&self) -> String {
    self.with_rng(|rng| make_short_code(rng, SESSION_CODE_LEN))
  }

  pub fn token(&self, policy: &TokenPolicy) -> String {
    self.with_rng(|rng| make_token(rng, policy))
  }
}

impl Default for IdGenerator {
  fn default() -> Self { Self::from_entropy() }
}

impl std::fmt::Debug for IdGenerator {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("IdGenerator").finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn session_codes_use_the_restricted_alphabet() {
    let ids = IdGenerator::seeded(7);
    for _ in 0..200 {
      let code = ids.session_code();
      assert!(is_session_code(&code), "bad code {code}");
    }
  }

  #[test]
  fn tokens_follow_policy() {
    let ids = IdGenerator::seeded(7);
    let policy = TokenPolicy::default();
    let token = ids.token(&policy);
    assert_eq!(token.len(), DEFAULT_TOKEN_LEN);
    assert!(token.chars().all(|c| TOKEN_ALPHABET.contains(c)));
  }

  #[test]
  fn short_token_policy_is_rejected() {
    assert!(matches!(
      TokenPolicy::with_length(MIN_TOKEN_LEN - 1),
      Err(Error::InvalidInput(_))
    ));
    assert!(TokenPolicy::new(32, "aaaa").is_err());
    assert_eq!(TokenPolicy::new(32, "ab").unwrap().length(), 32);
  }

  #[test]
  fn ids_carry_prefix_and_hex_suffix() {
    let ids = IdGenerator::seeded(1);
    let id = ids.id("senslab_session");
    assert!(id.starts_with("senslab_session_"));
    let (_, hex) = id.rsplit_once('_').unwrap();
    assert_eq!(hex.len(), 32);
    assert!(hex.chars().all(|c| c.is_ascii_hexdigit()));
  }

  #[test]
  fn seeded_generators_are_reproducible() {
    let a = IdGenerator::seeded(42);
    let b = IdGenerator::seeded(42);
    assert_eq!(a.id("x"), b.id("x"));
    assert_eq!(a.session_code(), b.session_code());
  }
}
