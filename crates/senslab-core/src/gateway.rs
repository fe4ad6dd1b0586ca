//! The persistence gateway: an abstract key → JSON document store.
//!
//! Storage backends (e.g. `senslab-store-sqlite`) implement
//! [`DocumentStore`]; the repository depends only on this trait.
//! [`MemoryDocumentStore`] is the in-process implementation used by tests and
//! ephemeral deployments.

use std::{
  collections::HashMap,
  convert::Infallible,
  future::Future,
  sync::{PoisonError, RwLock},
};

use serde_json::Value;

/// Whole-document reads and writes by key. A write replaces the stored
/// document entirely; there is no partial update.
pub trait DocumentStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Fetch the document stored under `key`, or `None` if absent.
  fn read<'a>(
    &'a self,
    key: &'a str,
  ) -> impl Future<Output = Result<Option<Value>, Self::Error>> + Send + 'a;

  /// Replace the document stored under `key`.
  fn write<'a>(
    &'a self,
    key: &'a str,
    document: Value,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}

/// A [`DocumentStore`] held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
  documents: RwLock<HashMap<String, Value>>,
}

impl MemoryDocumentStore {
  pub fn new() -> Self { Self::default() }

  /// Number of stored documents.
  pub fn len(&self) -> usize {
    self
      .documents
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .len()
  }

  pub fn is_empty(&self) -> bool { self.len() == 0 }
}

impl DocumentStore for MemoryDocumentStore {
  type Error = Infallible;

  async fn read(&self, key: &str) -> Result<Option<Value>, Infallible> {
    let docs = self.documents.read().unwrap_or_else(PoisonError::into_inner);
    Ok(docs.get(key).cloned())
  }

  async fn write(&self, key: &str, document: Value) -> Result<(), Infallible> {
    let mut docs =
      self.documents.write().unwrap_or_else(PoisonError::into_inner);
    docs.insert(key.to_owned(), document);
    Ok(())
  }
}

impl<D: DocumentStore> DocumentStore for std::sync::Arc<D> {
  type Error = D::Error;

  fn read<'a>(
    &'a self,
    key: &'a str,
  ) -> impl Future<Output = Result<Option<Value>, Self::Error>> + Send + 'a {
    (**self).read(key)
  }

  fn write<'a>(
    &'a self,
    key: &'a str,
    document: Value,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a {
    (**self).write(key, document)
  }
}
