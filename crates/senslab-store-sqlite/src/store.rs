//! [`SqliteDocumentStore`]: the SQLite implementation of [`DocumentStore`].

use std::path::Path;

use chrono::{SecondsFormat, Utc};
use rusqlite::OptionalExtension as _;
use serde_json::Value;

use senslab_core::gateway::DocumentStore;

use crate::{Error, Result, schema::SCHEMA};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A document gateway backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteDocumentStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteDocumentStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref().to_owned();
    let conn = tokio_rusqlite::Connection::open(&path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    tracing::info!(path = %path.display(), "sqlite document store opened");
    Ok(store)
  }

  /// Open an in-memory store, used by tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Every stored key, in ascending order.
  pub async fn keys(&self) -> Result<Vec<String>> {
    let keys = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare("SELECT key FROM documents ORDER BY key")?;
        let keys = stmt
          .query_map([], |row| row.get::<_, String>(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(keys)
      })
      .await?;
    Ok(keys)
  }

  #[cfg(test)]
  pub(crate) fn conn_for_tests(&self) -> &tokio_rusqlite::Connection { &self.conn }

  async fn read_document(&self, key: &str) -> Result<Option<Value>> {
    let key = key.to_owned();
    let key_param = key.clone();

    let raw: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT value_json FROM documents WHERE key = ?1",
              rusqlite::params![key_param],
              |row| row.get(0),
            )
            .optional()?,
        )
      })
      .await?;

    raw
      .map(|s| serde_json::from_str(&s))
      .transpose()
      .map_err(|source| Error::Corrupt { key, source })
  }

  async fn write_document(&self, key: &str, document: Value) -> Result<()> {
    let key = key.to_owned();
    let value_json = document.to_string();
    let updated_at = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO documents (key, value_json, updated_at) VALUES (?1, ?2, ?3)
           ON CONFLICT(key) DO UPDATE SET
             value_json = excluded.value_json,
             updated_at = excluded.updated_at",
          rusqlite::params![key, value_json, updated_at],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── DocumentStore impl ──────────────────────────────────────────────────────

impl DocumentStore for SqliteDocumentStore {
  type Error = Error;

  async fn read(&self, key: &str) -> Result<Option<Value>> {
    self.read_document(key).await
  }

  async fn write(&self, key: &str, document: Value) -> Result<()> {
    self.write_document(key, document).await
  }
}
