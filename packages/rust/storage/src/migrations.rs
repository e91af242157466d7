//! SQL migration definitions for the index database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a set of SQL statements executed as one batch.
//!
//! `projectindex` is the live generation of the index; a rebuild replaces it
//! wholesale by renaming the staging table over it, so the migration only
//! guarantees the table exists (empty) before the first rebuild.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: projectindex, rebuild_runs",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Live generation of the project index
CREATE TABLE IF NOT EXISTS projectindex (
    pi_id      INTEGER PRIMARY KEY AUTOINCREMENT,
    pi_page    TEXT NOT NULL,
    pi_project TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_projectindex_page ON projectindex(pi_page);

-- Rebuild run history
CREATE TABLE IF NOT EXISTS rebuild_runs (
    id          TEXT PRIMARY KEY,
    started_at  TEXT NOT NULL,
    finished_at TEXT,
    stats_json  TEXT
);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
