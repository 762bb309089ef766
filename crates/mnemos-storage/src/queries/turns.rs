// SPDX-FileCopyrightText: 2026 Mnemos Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Turn persistence and retrieval.

use rusqlite::params;
use tracing::debug;

use mnemos_core::types::{Role, Turn};
use mnemos_core::Error;

use crate::database::{map_store_err, Store};
use crate::queries::row_to_turn;
use crate::vector::vec_to_blob;

const TURN_COLUMNS: &str = "turn_id, session_id, ts, role, text";

impl Store {
    /// Append a turn to a session; returns the monotonically increasing
    /// turn id. Text must be non-empty.
    pub async fn append_turn(
        &self,
        session_id: i64,
        role: Role,
        text: &str,
        ts: i64,
    ) -> Result<i64, Error> {
        if text.is_empty() {
            return Err(Error::BadArgument("turn text must be non-empty".into()));
        }
        let text = text.to_string();
        let role = role.to_string();
        let turn_id = self
            .connection()
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO turns (session_id, ts, role, text) VALUES (?1, ?2, ?3, ?4)",
                    params![session_id, ts, role, text],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await
            .map_err(map_store_err)?;
        debug!(turn_id, session_id, "turn appended");
        Ok(turn_id)
    }

    /// Attach the embedding for a turn. Dimension-checked.
    pub async fn attach_turn_vector(&self, turn_id: i64, vec: &[f32]) -> Result<(), Error> {
        self.check_dimension(vec)?;
        let blob = vec_to_blob(vec);
        self.connection()
            .call(move |conn| {
                conn.execute(
                    "INSERT OR REPLACE INTO turn_vectors (turn_id, embedding) VALUES (?1, ?2)",
                    params![turn_id, blob],
                )?;
                Ok(())
            })
            .await
            .map_err(map_store_err)
    }

    /// The last `n` turns of a session in ascending timestamp order.
    pub async fn recent_turns(&self, session_id: i64, n: usize) -> Result<Vec<Turn>, Error> {
        self.connection()
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {TURN_COLUMNS} FROM (
                         SELECT {TURN_COLUMNS} FROM turns
                         WHERE session_id = ?1
                         ORDER BY turn_id DESC LIMIT ?2
                     ) ORDER BY turn_id ASC"
                ))?;
                let turns = stmt
                    .query_map(params![session_id, n as i64], row_to_turn)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(turns)
            })
            .await
            .map_err(map_store_err)
    }

    /// Every turn of a session in append order.
    pub async fn session_turns(&self, session_id: i64) -> Result<Vec<Turn>, Error> {
        self.connection()
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {TURN_COLUMNS} FROM turns WHERE session_id = ?1 ORDER BY turn_id ASC"
                ))?;
                let turns = stmt
                    .query_map(params![session_id], row_to_turn)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(turns)
            })
            .await
            .map_err(map_store_err)
    }

    /// Turns newer than the session's most recent summary (all turns
    /// when no summary exists), in append order. Used for session
    /// restore and `/new` finalisation.
    pub async fn unsummarized_turns(&self, session_id: i64) -> Result<Vec<Turn>, Error> {
        self.connection()
            .call(move |conn| {
                let last_summary_ts: Option<i64> = conn
                    .query_row(
                        "SELECT last_ts FROM summaries WHERE session_id = ?1
                         ORDER BY last_ts DESC LIMIT 1",
                        params![session_id],
                        |row| row.get(0),
                    )
                    .map(Some)
                    .or_else(|e| match e {
                        rusqlite::Error::QueryReturnedNoRows => Ok(None),
                        other => Err(other),
                    })?;

                let mut turns = Vec::new();
                match last_summary_ts {
                    Some(cutoff) => {
                        let mut stmt = conn.prepare(&format!(
                            "SELECT {TURN_COLUMNS} FROM turns
                             WHERE session_id = ?1 AND ts > ?2 ORDER BY turn_id ASC"
                        ))?;
                        for row in stmt.query_map(params![session_id, cutoff], row_to_turn)? {
                            turns.push(row?);
                        }
                    }
                    None => {
                        let mut stmt = conn.prepare(&format!(
                            "SELECT {TURN_COLUMNS} FROM turns
                             WHERE session_id = ?1 ORDER BY turn_id ASC"
                        ))?;
                        for row in stmt.query_map(params![session_id], row_to_turn)? {
                            turns.push(row?);
                        }
                    }
                }
                Ok(turns)
            })
            .await
            .map_err(map_store_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn open_store() -> (Store, tempfile::TempDir, i64) {
        let dir = tempdir().unwrap();
        let store = Store::open(&dir.path().join("test.db"), 4).await.unwrap();
        let session = store.create_session(100).await.unwrap();
        (store, dir, session)
    }

    #[tokio::test]
    async fn append_then_recent_includes_turn() {
        let (store, _dir, session) = open_store().await;
        let id = store
            .append_turn(session, Role::User, "hello there", 100)
            .await
            .unwrap();

        let turns = store.recent_turns(session, 5).await.unwrap();
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].turn_id, id);
        assert_eq!(turns[0].role, Role::User);
        assert_eq!(turns[0].text, "hello there");
        assert_eq!(turns[0].ts, 100);
    }

    #[tokio::test]
    async fn empty_text_rejected() {
        let (store, _dir, session) = open_store().await;
        let err = store
            .append_turn(session, Role::User, "", 100)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "bad_argument");
    }

    #[tokio::test]
    async fn recent_turns_returns_tail_in_order() {
        let (store, _dir, session) = open_store().await;
        for i in 0..5 {
            let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
            store
                .append_turn(session, role, &format!("turn {i}"), 100 + i)
                .await
                .unwrap();
        }

        let turns = store.recent_turns(session, 3).await.unwrap();
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[0].text, "turn 2");
        assert_eq!(turns[2].text, "turn 4");
        assert!(turns[0].turn_id < turns[1].turn_id);
    }

    #[tokio::test]
    async fn vector_dimension_enforced() {
        let (store, _dir, session) = open_store().await;
        let id = store
            .append_turn(session, Role::User, "embed me", 100)
            .await
            .unwrap();

        store.attach_turn_vector(id, &[0.1, 0.2, 0.3, 0.4]).await.unwrap();

        let err = store
            .attach_turn_vector(id, &[0.1, 0.2])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "conflict");
    }

    #[tokio::test]
    async fn unsummarized_turns_respect_summary_cutoff() {
        let (store, _dir, session) = open_store().await;
        for i in 0..4 {
            store
                .append_turn(session, Role::User, &format!("t{i}"), 100 + i)
                .await
                .unwrap();
        }
        // Summary covering ts 100..=101 leaves the last two unsummarized.
        store
            .insert_summary(session, "covers first two", 100, 101)
            .await
            .unwrap();

        let remaining = store.unsummarized_turns(session).await.unwrap();
        assert_eq!(remaining.len(), 2);
        assert_eq!(remaining[0].text, "t2");
        assert_eq!(remaining[1].text, "t3");
    }

    #[tokio::test]
    async fn unsummarized_turns_without_summary_returns_all() {
        let (store, _dir, session) = open_store().await;
        store.append_turn(session, Role::User, "a", 1).await.unwrap();
        store.append_turn(session, Role::Assistant, "b", 2).await.unwrap();
        let all = store.unsummarized_turns(session).await.unwrap();
        assert_eq!(all.len(), 2);
    }
}
