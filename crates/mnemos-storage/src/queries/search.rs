// SPDX-FileCopyrightText: 2026 Mnemos Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Recall queries: cosine ranking over the vector sidecars and FTS5
//! boolean search over the shadow tables.
//!
//! Vector search inner-joins the sidecar, so rows whose embedding was
//! never attached (embedder outage at persist time) are simply skipped.

use rusqlite::params;
use rusqlite::types::Value;

use mnemos_core::types::{Summary, Turn};
use mnemos_core::Error;

use crate::database::{map_store_err, Store};
use crate::queries::{row_to_summary, row_to_turn};
use crate::vector::{blob_to_vec, cosine_similarity};

/// Filters shared by the FTS search operations.
#[derive(Debug, Clone, Default)]
pub struct SearchFilter {
    /// Session to exclude; recall must never surface the active one.
    pub exclude_session: Option<i64>,
    /// Restrict turns to one speaker ("user" / "assistant").
    pub role: Option<String>,
    /// Inclusive lower bound, UTC epoch seconds.
    pub start_ts: Option<i64>,
    /// Inclusive upper bound, UTC epoch seconds.
    pub end_ts: Option<i64>,
}

/// Validate an FTS5 boolean query before handing it to SQLite.
///
/// Rejects unbalanced double quotes, unbalanced parentheses, and a
/// boolean operator at either edge of the query.
pub fn validate_fts_query(query: &str) -> Result<(), Error> {
    if query.trim().is_empty() {
        return Err(Error::BadQuery("empty query".into()));
    }
    if query.matches('"').count() % 2 != 0 {
        return Err(Error::BadQuery("unbalanced quotes in query".into()));
    }
    if query.matches('(').count() != query.matches(')').count() {
        return Err(Error::BadQuery("unbalanced parentheses in query".into()));
    }
    let words: Vec<&str> = query.split_whitespace().collect();
    const OPERATORS: [&str; 3] = ["AND", "OR", "NOT"];
    if let Some(first) = words.first() {
        let bare = first.trim_start_matches('(');
        if OPERATORS.contains(&bare) {
            return Err(Error::BadQuery(format!(
                "query cannot start with operator '{bare}'"
            )));
        }
    }
    if let Some(last) = words.last() {
        let bare = last.trim_end_matches(')');
        if OPERATORS.contains(&bare) {
            return Err(Error::BadQuery(format!(
                "query cannot end with operator '{bare}'"
            )));
        }
    }
    Ok(())
}

fn map_fts_err(e: tokio_rusqlite::Error) -> Error {
    let text = e.to_string();
    if text.contains("fts5") || text.to_lowercase().contains("syntax") {
        Error::BadQuery(text)
    } else {
        map_store_err(e)
    }
}

impl Store {
    /// Rank summaries against `q_vec` by cosine similarity, best first.
    ///
    /// `exclude_session` drops the active session's summaries;
    /// `exclude_ids` drops summaries already present in the context
    /// window. Ties break toward the more recent `last_ts`.
    pub async fn vector_search_summaries(
        &self,
        q_vec: &[f32],
        k: usize,
        exclude_session: Option<i64>,
        exclude_ids: &[i64],
    ) -> Result<Vec<(Summary, f32)>, Error> {
        self.check_dimension(q_vec)?;
        let q_vec = q_vec.to_vec();
        let exclude_ids = exclude_ids.to_vec();
        let dim = self.dimension();

        let mut scored = self
            .connection()
            .call(move |conn| {
                let mut sql = String::from(
                    "SELECT s.summary_id, s.session_id, s.text, s.first_ts, s.last_ts, v.embedding
                     FROM summaries s JOIN summary_vectors v ON v.summary_id = s.summary_id",
                );
                let mut clauses = Vec::new();
                let mut args: Vec<Value> = Vec::new();
                if let Some(session) = exclude_session {
                    clauses.push(format!("s.session_id != ?{}", args.len() + 1));
                    args.push(Value::Integer(session));
                }
                for id in &exclude_ids {
                    clauses.push(format!("s.summary_id != ?{}", args.len() + 1));
                    args.push(Value::Integer(*id));
                }
                if !clauses.is_empty() {
                    sql.push_str(" WHERE ");
                    sql.push_str(&clauses.join(" AND "));
                }

                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(rusqlite::params_from_iter(args), |row| {
                    let summary = row_to_summary(row)?;
                    let blob: Vec<u8> = row.get(5)?;
                    Ok((summary, blob))
                })?;

                let mut scored = Vec::new();
                for row in rows {
                    let (summary, blob) = row?;
                    let embedding = blob_to_vec(&blob);
                    if embedding.len() != dim {
                        continue;
                    }
                    let score = cosine_similarity(&q_vec, &embedding);
                    scored.push((summary, score));
                }
                Ok(scored)
            })
            .await
            .map_err(map_store_err)?;

        sort_scored(&mut scored, |s: &Summary| s.last_ts);
        scored.truncate(k);
        Ok(scored)
    }

    /// Rank one session's turns against `q_vec`, best first.
    pub async fn vector_search_turns(
        &self,
        q_vec: &[f32],
        k: usize,
        session_id: i64,
    ) -> Result<Vec<(Turn, f32)>, Error> {
        self.check_dimension(q_vec)?;
        let q_vec = q_vec.to_vec();
        let dim = self.dimension();

        let mut scored = self
            .connection()
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT t.turn_id, t.session_id, t.ts, t.role, t.text, v.embedding
                     FROM turns t JOIN turn_vectors v ON v.turn_id = t.turn_id
                     WHERE t.session_id = ?1",
                )?;
                let rows = stmt.query_map(params![session_id], |row| {
                    let turn = row_to_turn(row)?;
                    let blob: Vec<u8> = row.get(5)?;
                    Ok((turn, blob))
                })?;

                let mut scored = Vec::new();
                for row in rows {
                    let (turn, blob) = row?;
                    let embedding = blob_to_vec(&blob);
                    if embedding.len() != dim {
                        continue;
                    }
                    let score = cosine_similarity(&q_vec, &embedding);
                    scored.push((turn, score));
                }
                Ok(scored)
            })
            .await
            .map_err(map_store_err)?;

        sort_scored(&mut scored, |t: &Turn| t.ts);
        scored.truncate(k);
        Ok(scored)
    }

    /// FTS5 boolean search over turns, best rank first. A `None` query
    /// returns filter-only results ordered by recency.
    pub async fn fts_search_turns(
        &self,
        query: Option<&str>,
        filter: SearchFilter,
        k: usize,
    ) -> Result<Vec<(Turn, f64)>, Error> {
        if let Some(q) = query {
            validate_fts_query(q)?;
        }
        let query = query.map(|q| q.to_string());

        self.connection()
            .call(move |conn| {
                let mut clauses = Vec::new();
                let mut args: Vec<Value> = Vec::new();

                let base = if let Some(ref q) = query {
                    clauses.push(format!("turns_fts MATCH ?{}", args.len() + 1));
                    args.push(Value::Text(q.clone()));
                    "SELECT t.turn_id, t.session_id, t.ts, t.role, t.text, turns_fts.rank
                     FROM turns_fts JOIN turns t ON t.turn_id = turns_fts.rowid"
                } else {
                    "SELECT t.turn_id, t.session_id, t.ts, t.role, t.text, 0.0 AS rank
                     FROM turns t"
                };

                if let Some(session) = filter.exclude_session {
                    clauses.push(format!("t.session_id != ?{}", args.len() + 1));
                    args.push(Value::Integer(session));
                }
                if let Some(ref role) = filter.role {
                    clauses.push(format!("t.role = ?{}", args.len() + 1));
                    args.push(Value::Text(role.clone()));
                }
                if let Some(start) = filter.start_ts {
                    clauses.push(format!("t.ts >= ?{}", args.len() + 1));
                    args.push(Value::Integer(start));
                }
                if let Some(end) = filter.end_ts {
                    clauses.push(format!("t.ts <= ?{}", args.len() + 1));
                    args.push(Value::Integer(end));
                }

                let where_clause = if clauses.is_empty() {
                    String::new()
                } else {
                    format!(" WHERE {}", clauses.join(" AND "))
                };
                let order = if query.is_some() {
                    " ORDER BY turns_fts.rank"
                } else {
                    " ORDER BY t.ts DESC"
                };
                let sql = format!("{base}{where_clause}{order} LIMIT ?{}", args.len() + 1);
                args.push(Value::Integer(k as i64));

                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(rusqlite::params_from_iter(args), |row| {
                    let turn = row_to_turn(row)?;
                    let rank: f64 = row.get(5)?;
                    Ok((turn, rank))
                })?;
                let results = rows.collect::<Result<Vec<_>, _>>()?;
                Ok(results)
            })
            .await
            .map_err(map_fts_err)
    }

    /// FTS5 boolean search over summaries, best rank first. Time bounds
    /// match summaries whose covered range intersects the filter window.
    pub async fn fts_search_summaries(
        &self,
        query: Option<&str>,
        filter: SearchFilter,
        k: usize,
    ) -> Result<Vec<(Summary, f64)>, Error> {
        if let Some(q) = query {
            validate_fts_query(q)?;
        }
        let query = query.map(|q| q.to_string());

        self.connection()
            .call(move |conn| {
                let mut clauses = Vec::new();
                let mut args: Vec<Value> = Vec::new();

                let base = if let Some(ref q) = query {
                    clauses.push(format!("summaries_fts MATCH ?{}", args.len() + 1));
                    args.push(Value::Text(q.clone()));
                    "SELECT s.summary_id, s.session_id, s.text, s.first_ts, s.last_ts,
                            summaries_fts.rank
                     FROM summaries_fts JOIN summaries s ON s.summary_id = summaries_fts.rowid"
                } else {
                    "SELECT s.summary_id, s.session_id, s.text, s.first_ts, s.last_ts, 0.0 AS rank
                     FROM summaries s"
                };

                if let Some(session) = filter.exclude_session {
                    clauses.push(format!("s.session_id != ?{}", args.len() + 1));
                    args.push(Value::Integer(session));
                }
                if let Some(start) = filter.start_ts {
                    clauses.push(format!("s.last_ts >= ?{}", args.len() + 1));
                    args.push(Value::Integer(start));
                }
                if let Some(end) = filter.end_ts {
                    clauses.push(format!("s.first_ts <= ?{}", args.len() + 1));
                    args.push(Value::Integer(end));
                }

                let where_clause = if clauses.is_empty() {
                    String::new()
                } else {
                    format!(" WHERE {}", clauses.join(" AND "))
                };
                let order = if query.is_some() {
                    " ORDER BY summaries_fts.rank"
                } else {
                    " ORDER BY s.last_ts DESC"
                };
                let sql = format!("{base}{where_clause}{order} LIMIT ?{}", args.len() + 1);
                args.push(Value::Integer(k as i64));

                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(rusqlite::params_from_iter(args), |row| {
                    let summary = row_to_summary(row)?;
                    let rank: f64 = row.get(5)?;
                    Ok((summary, rank))
                })?;
                let results = rows.collect::<Result<Vec<_>, _>>()?;
                Ok(results)
            })
            .await
            .map_err(map_fts_err)
    }
}

/// Sort by score descending; equal scores break toward the more recent
/// timestamp (the deployment's stated tie-break).
fn sort_scored<T>(scored: &mut [(T, f32)], ts_of: impl Fn(&T) -> i64) {
    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| ts_of(&b.0).cmp(&ts_of(&a.0)))
    });
}
