//! SQL schema for the draglog SQLite ledger.
//!
//! Executed once at connection startup. The schema version is recorded in
//! `PRAGMA user_version` for future migrations.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

-- One row per key ever written. A deleted key keeps its row with a NULL
-- value so the version counter never goes backwards.
CREATE TABLE IF NOT EXISTS world_state (
    key      TEXT PRIMARY KEY,
    value    TEXT,
    version  INTEGER NOT NULL
);

-- Every committed modification, strictly append-only.
CREATE TABLE IF NOT EXISTS history (
    seq        INTEGER PRIMARY KEY AUTOINCREMENT,
    key        TEXT    NOT NULL,
    value      TEXT,               -- NULL for deletions
    tx_id      TEXT    NOT NULL,
    seconds    INTEGER NOT NULL,
    nanos      INTEGER NOT NULL,
    is_delete  INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS history_key_idx ON history(key, seq);

PRAGMA user_version = 1;
";
