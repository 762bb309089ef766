// SPDX-FileCopyrightText: 2026 Mnemos Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Summary persistence and retrieval. Summaries are append-only and
//! never mutated in place.

use rusqlite::params;
use tracing::debug;

use mnemos_core::types::Summary;
use mnemos_core::Error;

use crate::database::{map_store_err, Store};
use crate::queries::row_to_summary;
use crate::vector::vec_to_blob;

const SUMMARY_COLUMNS: &str = "summary_id, session_id, text, first_ts, last_ts";

impl Store {
    /// Insert a summary covering `[first_ts, last_ts]`; returns its id.
    pub async fn insert_summary(
        &self,
        session_id: i64,
        text: &str,
        first_ts: i64,
        last_ts: i64,
    ) -> Result<i64, Error> {
        if text.is_empty() {
            return Err(Error::BadArgument("summary text must be non-empty".into()));
        }
        let text = text.to_string();
        let summary_id = self
            .connection()
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO summaries (session_id, text, first_ts, last_ts)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![session_id, text, first_ts, last_ts],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await
            .map_err(map_store_err)?;
        debug!(summary_id, session_id, "summary inserted");
        Ok(summary_id)
    }

    /// Attach the embedding for a summary. Dimension-checked.
    pub async fn attach_summary_vector(
        &self,
        summary_id: i64,
        vec: &[f32],
    ) -> Result<(), Error> {
        self.check_dimension(vec)?;
        let blob = vec_to_blob(vec);
        self.connection()
            .call(move |conn| {
                conn.execute(
                    "INSERT OR REPLACE INTO summary_vectors (summary_id, embedding)
                     VALUES (?1, ?2)",
                    params![summary_id, blob],
                )?;
                Ok(())
            })
            .await
            .map_err(map_store_err)
    }

    /// The `n` summaries of a session with the greatest `last_ts`,
    /// returned in ascending `last_ts` order.
    pub async fn recent_summaries(
        &self,
        session_id: i64,
        n: usize,
    ) -> Result<Vec<Summary>, Error> {
        self.connection()
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {SUMMARY_COLUMNS} FROM (
                         SELECT {SUMMARY_COLUMNS} FROM summaries
                         WHERE session_id = ?1
                         ORDER BY last_ts DESC, summary_id DESC LIMIT ?2
                     ) ORDER BY last_ts ASC, summary_id ASC"
                ))?;
                let summaries = stmt
                    .query_map(params![session_id, n as i64], row_to_summary)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(summaries)
            })
            .await
            .map_err(map_store_err)
    }

    /// Fetch one summary by id.
    pub async fn summary_by_id(&self, summary_id: i64) -> Result<Option<Summary>, Error> {
        self.connection()
            .call(move |conn| {
                let result = conn.query_row(
                    &format!("SELECT {SUMMARY_COLUMNS} FROM summaries WHERE summary_id = ?1"),
                    params![summary_id],
                    row_to_summary,
                );
                match result {
                    Ok(summary) => Ok(Some(summary)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(map_store_err)
    }
}
