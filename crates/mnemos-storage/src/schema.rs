// SPDX-FileCopyrightText: 2026 Mnemos Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Schema definition and version gating.
//!
//! The schema is applied in code rather than static migration files
//! because the sidecar vector tables carry no DDL-level dimension: the
//! deployment dimension D lives in `meta` and is enforced on every
//! vector attach. `meta.schema_version` gates opens; an unknown
//! version is refused with `Conflict`.

use rusqlite::Connection;

/// Version written to `meta.schema_version`; opens refuse anything else.
pub const SCHEMA_VERSION: &str = "1";

/// Apply the full schema to a fresh or existing database. Idempotent.
pub fn apply_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS sessions (
            session_id INTEGER PRIMARY KEY AUTOINCREMENT,
            start_ts INTEGER NOT NULL,
            end_ts INTEGER,
            status TEXT NOT NULL CHECK(status IN ('active', 'archived')) DEFAULT 'active'
        );
        CREATE INDEX IF NOT EXISTS idx_sessions_status ON sessions(status);

        CREATE TABLE IF NOT EXISTS turns (
            turn_id INTEGER PRIMARY KEY AUTOINCREMENT,
            session_id INTEGER NOT NULL REFERENCES sessions(session_id),
            ts INTEGER NOT NULL,
            role TEXT NOT NULL CHECK(role IN ('user', 'assistant')),
            text TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_turns_session ON turns(session_id);
        CREATE INDEX IF NOT EXISTS idx_turns_ts ON turns(ts DESC);

        CREATE TABLE IF NOT EXISTS summaries (
            summary_id INTEGER PRIMARY KEY AUTOINCREMENT,
            session_id INTEGER NOT NULL REFERENCES sessions(session_id),
            text TEXT NOT NULL,
            first_ts INTEGER NOT NULL,
            last_ts INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_summaries_session ON summaries(session_id);
        CREATE INDEX IF NOT EXISTS idx_summaries_last_ts ON summaries(last_ts DESC);

        CREATE TABLE IF NOT EXISTS turn_vectors (
            turn_id INTEGER PRIMARY KEY REFERENCES turns(turn_id),
            embedding BLOB NOT NULL
        );

        CREATE TABLE IF NOT EXISTS summary_vectors (
            summary_id INTEGER PRIMARY KEY REFERENCES summaries(summary_id),
            embedding BLOB NOT NULL
        );

        CREATE VIRTUAL TABLE IF NOT EXISTS turns_fts USING fts5(
            text,
            content='turns',
            content_rowid='turn_id'
        );

        CREATE TRIGGER IF NOT EXISTS turns_ai AFTER INSERT ON turns BEGIN
            INSERT INTO turns_fts(rowid, text) VALUES (new.turn_id, new.text);
        END;
        CREATE TRIGGER IF NOT EXISTS turns_ad AFTER DELETE ON turns BEGIN
            INSERT INTO turns_fts(turns_fts, rowid, text)
                VALUES('delete', old.turn_id, old.text);
        END;
        CREATE TRIGGER IF NOT EXISTS turns_au AFTER UPDATE ON turns BEGIN
            INSERT INTO turns_fts(turns_fts, rowid, text)
                VALUES('delete', old.turn_id, old.text);
            INSERT INTO turns_fts(rowid, text) VALUES (new.turn_id, new.text);
        END;

        CREATE VIRTUAL TABLE IF NOT EXISTS summaries_fts USING fts5(
            text,
            content='summaries',
            content_rowid='summary_id'
        );

        CREATE TRIGGER IF NOT EXISTS summaries_ai AFTER INSERT ON summaries BEGIN
            INSERT INTO summaries_fts(rowid, text) VALUES (new.summary_id, new.text);
        END;
        CREATE TRIGGER IF NOT EXISTS summaries_ad AFTER DELETE ON summaries BEGIN
            INSERT INTO summaries_fts(summaries_fts, rowid, text)
                VALUES('delete', old.summary_id, old.text);
        END;
        CREATE TRIGGER IF NOT EXISTS summaries_au AFTER UPDATE ON summaries BEGIN
            INSERT INTO summaries_fts(summaries_fts, rowid, text)
                VALUES('delete', old.summary_id, old.text);
            INSERT INTO summaries_fts(rowid, text) VALUES (new.summary_id, new.text);
        END;

        CREATE TABLE IF NOT EXISTS scheduled_tasks (
            task_id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            trigger_type TEXT NOT NULL CHECK(trigger_type IN ('once', 'interval')),
            trigger_config TEXT NOT NULL,
            message TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            next_run_at INTEGER NOT NULL,
            last_run_at INTEGER,
            status TEXT NOT NULL CHECK(status IN ('active', 'paused', 'completed')) DEFAULT 'active'
        );
        CREATE INDEX IF NOT EXISTS idx_scheduled_tasks_next_run
            ON scheduled_tasks(next_run_at, status);
        ",
    )
}
