//! SQL migration definitions for the warehouse catalog database.
//!
//! Migrations are applied in order on warehouse open. Dataset databases are
//! attached to the catalog connection and carry no migrations of their own.

/// A catalog migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial catalog: datasets, load_jobs",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Registered datasets; each one is a database file attached under its name
CREATE TABLE IF NOT EXISTS datasets (
    name       TEXT PRIMARY KEY,
    location   TEXT,
    created_at TEXT NOT NULL
);

-- Append audit log, one row per successful write_rows call
CREATE TABLE IF NOT EXISTS load_jobs (
    id         TEXT PRIMARY KEY,
    run_id     TEXT NOT NULL,
    dataset    TEXT NOT NULL,
    table_name TEXT NOT NULL,
    row_count  INTEGER NOT NULL,
    loaded_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_load_jobs_target ON load_jobs(dataset, table_name);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
