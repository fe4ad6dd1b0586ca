//! SQL schema for the Senslab SQLite store.
//!
//! Executed once at connection startup. `PRAGMA user_version` records the
//! layout so later migrations can be gated on it.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

-- One row per gateway key. Each value is a whole JSON document that is
-- replaced on every write.
CREATE TABLE IF NOT EXISTS documents (
    key         TEXT PRIMARY KEY,
    value_json  TEXT NOT NULL,
    updated_at  TEXT NOT NULL    -- ISO 8601 UTC
);

PRAGMA user_version = 1;
";
