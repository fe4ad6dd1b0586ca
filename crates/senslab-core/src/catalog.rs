//! Descriptor taxonomy access.
//!
//! Profile samples select leaves from an external descriptor taxonomy. The
//! core only needs two lookups, expressed by [`DescriptorCatalog`]. The
//! taxonomy itself is kept in the persistence gateway and reseeded whenever
//! the stored seed version differs from the compiled one.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{Error, Result, gateway::DocumentStore};

pub const NODES_KEY: &str = "senslab_aromaWheel_nodes";
pub const SEED_VERSION_KEY: &str = "senslab_aromaWheel_seedVersion";

/// A descriptor as presented to panelists and captured in sample snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Descriptor {
  pub id:          String,
  pub name:        String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
  Group,
  Leaf,
}

/// One node of the taxonomy tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescriptorNode {
  pub id:          String,
  pub name:        String,
  pub kind:        NodeKind,
  /// `None` only for the root.
  pub parent_id:   Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
}

impl DescriptorNode {
  fn descriptor(&self) -> Descriptor {
    Descriptor {
      id:          self.id.clone(),
      name:        self.name.clone(),
      description: self.description.clone(),
    }
  }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// The lookups the core performs against the descriptor taxonomy.
pub trait DescriptorCatalog {
  /// Resolve `ids` in order, silently skipping unknown ids.
  fn resolve_ids(&self, ids: &[String]) -> Vec<Descriptor>;

  /// All selectable leaves.
  fn leaves(&self) -> Vec<Descriptor>;
}

/// An in-memory catalog over a flat node list.
#[derive(Debug, Clone, Default)]
pub struct NodeCatalog {
  nodes: Vec<DescriptorNode>,
}

impl NodeCatalog {
  pub fn new(nodes: Vec<DescriptorNode>) -> Self { Self { nodes } }

  pub fn nodes(&self) -> &[DescriptorNode] { &self.nodes }

  /// Load the catalog from `store`, reseeding it first if necessary.
  pub async fn load<D: DocumentStore>(store: &D, seed: &Seed) -> Result<Self> {
    ensure_seeded(store, seed, false).await?;
    let nodes = match read(store, NODES_KEY).await? {
      Some(doc) => serde_json::from_value(doc)?,
      None => Vec::new(),
    };
    Ok(Self { nodes })
  }
}

impl DescriptorCatalog for NodeCatalog {
  fn resolve_ids(&self, ids: &[String]) -> Vec<Descriptor> {
    ids
      .iter()
      .filter_map(|id| self.nodes.iter().find(|n| &n.id == id))
      .map(DescriptorNode::descriptor)
      .collect()
  }

  fn leaves(&self) -> Vec<Descriptor> {
    self
      .nodes
      .iter()
      .filter(|n| n.kind == NodeKind::Leaf)
      .map(DescriptorNode::descriptor)
      .collect()
  }
}

// ─── Seeding ─────────────────────────────────────────────────────────────────

/// A versioned reference dataset.
#[derive(Debug, Clone)]
pub struct Seed {
  pub version: u32,
  pub nodes:   Vec<DescriptorNode>,
}

async fn read<D: DocumentStore>(
  store: &D,
  key: &str,
) -> Result<Option<serde_json::Value>> {
  store.read(key).await.map_err(|e| Error::Gateway(Box::new(e)))
}

/// Write `seed` into `store` when forced, when no nodes are stored, or when
/// the stored seed version differs. Returns whether a reseed happened.
pub async fn ensure_seeded<D: DocumentStore>(
  store: &D,
  seed: &Seed,
  force: bool,
) -> Result<bool> {
  let existing: Vec<DescriptorNode> = match read(store, NODES_KEY).await? {
    Some(doc) => serde_json::from_value(doc).unwrap_or_default(),
    None => Vec::new(),
  };
  let stored_version = read(store, SEED_VERSION_KEY)
    .await?
    .and_then(|v| v.as_u64());

  let needs_seed = force
    || existing.is_empty()
    || stored_version != Some(u64::from(seed.version));
  if !needs_seed {
    return Ok(false);
  }

  tracing::info!(
    from = ?stored_version,
    to = seed.version,
    "reseeding descriptor taxonomy"
  );
  store
    .write(NODES_KEY, serde_json::to_value(&seed.nodes)?)
    .await
    .map_err(|e| Error::Gateway(Box::new(e)))?;
  store
    .write(SEED_VERSION_KEY, json!(seed.version))
    .await
    .map_err(|e| Error::Gateway(Box::new(e)))?;
  Ok(true)
}

fn node(id: &str, name: &str, kind: NodeKind, parent: Option<&str>) -> DescriptorNode {
  DescriptorNode {
    id: id.to_owned(),
    name: name.to_owned(),
    kind,
    parent_id: parent.map(str::to_owned),
    description: None,
  }
}

/// The built-in aroma wheel.
pub fn aroma_wheel_seed() -> Seed {
  use NodeKind::{Group, Leaf};
  Seed {
    version: 1,
    nodes:   vec![
      node("wheel", "Aroma Wheel", Group, None),
      node("fruchtig", "Fruity", Group, Some("wheel")),
      node("fruchtig_zitrus", "Citrus", Group, Some("fruchtig")),
      node("zitrone", "Lemon", Leaf, Some("fruchtig_zitrus")),
      node("grapefruit", "Grapefruit", Leaf, Some("fruchtig_zitrus")),
      node("orange", "Orange", Leaf, Some("fruchtig_zitrus")),
    ],
  }
}
