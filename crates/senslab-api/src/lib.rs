//! JSON REST API for Senslab.
//!
//! Exposes an axum [`Router`] backed by a [`Repository`] over any
//! [`DocumentStore`]. Auth, TLS, and transport concerns are the caller's
//! responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", senslab_api::api_router(state))
//! ```

pub mod error;
pub mod results;
pub mod samples;
pub mod sessions;
pub mod tokens;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Router,
  routing::{get, post, put},
};
use senslab_core::{
  Repository, catalog::NodeCatalog, gateway::DocumentStore, ids::DEFAULT_TOKEN_LEN,
};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

pub use error::ApiError;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `SENSLAB_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  pub host:            String,
  pub port:            u16,
  /// Public origin used to build join links.
  pub base_url:        String,
  pub store_path:      PathBuf,
  #[serde(default = "default_token_length")]
  pub token_length:    usize,
  /// Lifetime of newly issued invite tokens. Tokens never expire if unset.
  #[serde(default)]
  pub token_ttl_hours: Option<i64>,
}

fn default_token_length() -> usize { DEFAULT_TOKEN_LEN }

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<D> {
  pub repo:    Arc<Repository<D>>,
  pub catalog: Arc<NodeCatalog>,
  pub config:  Arc<ServerConfig>,
}

impl<D> AppState<D> {
  pub fn new(repo: Repository<D>, catalog: NodeCatalog, config: ServerConfig) -> Self {
    Self {
      repo:    Arc::new(repo),
      catalog: Arc::new(catalog),
      config:  Arc::new(config),
    }
  }
}

impl<D> Clone for AppState<D> {
  fn clone(&self) -> Self {
    Self {
      repo:    Arc::clone(&self.repo),
      catalog: Arc::clone(&self.catalog),
      config:  Arc::clone(&self.config),
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router for `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<D>(state: AppState<D>) -> Router<()>
where
  D: DocumentStore + 'static,
{
  Router::new()
    // Sessions
    .route("/sessions", get(sessions::list::<D>).post(sessions::create::<D>))
    .route("/sessions/by-code/{code}", get(sessions::by_code::<D>))
    .route("/sessions/{id}", get(sessions::get_one::<D>))
    .route("/sessions/{id}/status", put(sessions::set_status::<D>))
    .route(
      "/sessions/{id}/samples",
      get(samples::list::<D>).post(samples::create::<D>),
    )
    .route("/sessions/{id}/progress", get(sessions::progress::<D>))
    .route("/sessions/{id}/tokens", post(tokens::issue::<D>))
    // Samples
    .route("/samples/{id}", get(samples::get_one::<D>))
    .route("/samples/{id}/descriptors", put(samples::set_descriptors::<D>))
    .route("/samples/{id}/seats", put(samples::set_seats::<D>))
    .route("/samples/{id}/triplets", post(samples::generate_triplets::<D>))
    .route("/samples/{id}/triplets/{seat}", get(samples::triplet::<D>))
    .route("/samples/{id}/responses", post(samples::submit::<D>))
    // Results
    .route("/samples/{id}/results", get(results::triangle::<D>))
    .route("/samples/{id}/results.csv", get(results::csv::<D>))
    .route("/samples/{id}/profile", get(results::profile::<D>))
    // Invites
    .route("/tokens/{token}", get(tokens::preview::<D>))
    .route("/join", post(tokens::join::<D>))
    // Reference data
    .route("/descriptors/leaves", get(samples::descriptor_leaves::<D>))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}
