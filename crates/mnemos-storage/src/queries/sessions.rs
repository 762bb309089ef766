// SPDX-FileCopyrightText: 2026 Mnemos Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session lifecycle operations.

use rusqlite::params;
use tracing::debug;

use mnemos_core::types::{Session, SessionStatus};
use mnemos_core::Error;

use crate::database::{map_store_err, Store};

impl Store {
    /// Create a new active session and return its id.
    pub async fn create_session(&self, start_ts: i64) -> Result<i64, Error> {
        self.connection()
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO sessions (start_ts, status) VALUES (?1, 'active')",
                    params![start_ts],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await
            .map_err(map_store_err)
    }

    /// The currently active session, if any. At most one session is
    /// active at a time.
    pub async fn active_session(&self) -> Result<Option<Session>, Error> {
        self.connection()
            .call(|conn| {
                let result = conn.query_row(
                    "SELECT session_id, start_ts, end_ts, status FROM sessions
                     WHERE status = 'active' ORDER BY session_id DESC LIMIT 1",
                    [],
                    row_to_session,
                );
                match result {
                    Ok(session) => Ok(Some(session)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(map_store_err)
    }

    /// Archive a session, stamping its end time.
    pub async fn archive_session(&self, session_id: i64, end_ts: i64) -> Result<(), Error> {
        let changed = self
            .connection()
            .call(move |conn| {
                let n = conn.execute(
                    "UPDATE sessions SET end_ts = ?1, status = 'archived' WHERE session_id = ?2",
                    params![end_ts, session_id],
                )?;
                Ok(n)
            })
            .await
            .map_err(map_store_err)?;
        if changed == 0 {
            return Err(Error::NotFound(format!("session {session_id}")));
        }
        debug!(session_id, "session archived");
        Ok(())
    }

    /// Hard-delete a session and everything linked to it: turns,
    /// summaries, both vector sidecars, and (via triggers) the FTS rows.
    /// One transaction; no partial deletes.
    pub async fn delete_session(&self, session_id: i64) -> Result<(), Error> {
        let found = self
            .connection()
            .call(move |conn| {
                let tx = conn.transaction()?;
                let exists: bool = tx
                    .query_row(
                        "SELECT 1 FROM sessions WHERE session_id = ?1",
                        params![session_id],
                        |_| Ok(true),
                    )
                    .unwrap_or(false);
                if exists {
                    tx.execute(
                        "DELETE FROM turn_vectors WHERE turn_id IN
                             (SELECT turn_id FROM turns WHERE session_id = ?1)",
                        params![session_id],
                    )?;
                    tx.execute(
                        "DELETE FROM summary_vectors WHERE summary_id IN
                             (SELECT summary_id FROM summaries WHERE session_id = ?1)",
                        params![session_id],
                    )?;
                    tx.execute("DELETE FROM turns WHERE session_id = ?1", params![session_id])?;
                    tx.execute(
                        "DELETE FROM summaries WHERE session_id = ?1",
                        params![session_id],
                    )?;
                    tx.execute(
                        "DELETE FROM sessions WHERE session_id = ?1",
                        params![session_id],
                    )?;
                }
                tx.commit()?;
                Ok(exists)
            })
            .await
            .map_err(map_store_err)?;
        if !found {
            return Err(Error::NotFound(format!("session {session_id}")));
        }
        debug!(session_id, "session deleted");
        Ok(())
    }
}

fn row_to_session(row: &rusqlite::Row) -> rusqlite::Result<Session> {
    let status: String = row.get(3)?;
    Ok(Session {
        session_id: row.get(0)?,
        start_ts: row.get(1)?,
        end_ts: row.get(2)?,
        status: if status == "archived" {
            SessionStatus::Archived
        } else {
            SessionStatus::Active
        },
    })
}
