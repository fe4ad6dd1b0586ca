//! senslab server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`) layered with
//! `SENSLAB_*` environment variables, opens an in-process SQLite store, and
//! serves the JSON API over HTTP.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::Parser;
use senslab_api::{AppState, ServerConfig};
use senslab_core::{
  Repository,
  catalog::{NodeCatalog, aroma_wheel_seed},
  ids::TokenPolicy,
};
use senslab_store_sqlite::SqliteDocumentStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Senslab sensory evaluation server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Rewrite the descriptor taxonomy from the built-in seed and exit.
  #[arg(long)]
  reseed: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Load configuration.
  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("SENSLAB"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  let store_path = expand_tilde(&server_cfg.store_path);
  let store = SqliteDocumentStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  let seed = aroma_wheel_seed();
  if cli.reseed {
    senslab_core::catalog::ensure_seeded(&store, &seed, true)
      .await
      .context("failed to reseed descriptor taxonomy")?;
    return Ok(());
  }
  let catalog = NodeCatalog::load(&store, &seed)
    .await
    .context("failed to load descriptor taxonomy")?;

  let policy = TokenPolicy::with_length(server_cfg.token_length)
    .context("invalid token_length")?;
  let repo = Repository::new(store).with_token_policy(policy);

  let address = format!("{}:{}", server_cfg.host, server_cfg.port);
  let app = senslab_api::api_router(AppState::new(repo, catalog, server_cfg));

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
