// SPDX-FileCopyrightText: 2026 Mnemos Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Built-in `search_memories` tool: keyword search over past turns and
//! summaries with role and time filters. The active session is always
//! excluded.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, TimeZone};
use chrono_tz::Tz;
use serde::Deserialize;
use tracing::debug;

use mnemos_core::time::{human_time, now_ts};
use mnemos_core::types::Role;
use mnemos_core::Error;
use mnemos_storage::{SearchFilter, Store};

use crate::tool::Tool;

pub const SEARCH_MEMORIES_TOOL_NAME: &str = "search_memories";

const DAY: i64 = 86_400;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SearchArgs {
    query: Option<String>,
    limit: Option<usize>,
    role: Option<String>,
    time_period: Option<String>,
    start_date: Option<String>,
    end_date: Option<String>,
}

/// Keyword search over long-term memory, exposed to the model.
pub struct MemorySearchTool {
    store: Store,
    /// The session to exclude; updated by session control on `/new`
    /// and `/reset`.
    active_session: Arc<AtomicI64>,
    tz: Tz,
}

impl MemorySearchTool {
    pub fn new(store: Store, active_session: Arc<AtomicI64>, tz: Tz) -> MemorySearchTool {
        MemorySearchTool {
            store,
            active_session,
            tz,
        }
    }

    fn parse_date(&self, value: &str, end_of_day: bool) -> Result<i64, Error> {
        let naive = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
            .ok()
            .or_else(|| {
                NaiveDate::parse_from_str(value, "%Y-%m-%d").ok().map(|d| {
                    if end_of_day {
                        d.and_hms_opt(23, 59, 59).expect("valid time")
                    } else {
                        d.and_hms_opt(0, 0, 0).expect("valid time")
                    }
                })
            })
            .ok_or_else(|| {
                Error::BadArgument(format!(
                    "invalid date '{value}', use YYYY-MM-DD or YYYY-MM-DD HH:MM:SS"
                ))
            })?;
        self.tz
            .from_local_datetime(&naive)
            .earliest()
            .map(|dt| dt.timestamp())
            .ok_or_else(|| Error::BadArgument(format!("date does not exist in zone: {value}")))
    }

    fn time_bounds(&self, args: &SearchArgs) -> Result<(Option<i64>, Option<i64>), Error> {
        let mut start = match args.time_period.as_deref() {
            None => None,
            Some("last_day") => Some(now_ts() - DAY),
            Some("last_week") => Some(now_ts() - 7 * DAY),
            Some("last_month") => Some(now_ts() - 30 * DAY),
            Some("last_year") => Some(now_ts() - 365 * DAY),
            Some(other) => {
                return Err(Error::BadArgument(format!(
                    "unknown time_period '{other}'"
                )))
            }
        };
        let mut end = None;

        // Explicit dates override the preset.
        if let Some(ref date) = args.start_date {
            start = Some(self.parse_date(date, false)?);
        }
        if let Some(ref date) = args.end_date {
            end = Some(self.parse_date(date, true)?);
        }
        Ok((start, end))
    }
}

#[async_trait]
impl Tool for MemorySearchTool {
    fn name(&self) -> &str {
        SEARCH_MEMORIES_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Search your long-term memory (past conversations and summaries) \
         using keywords and filters. Use when the user references earlier \
         sessions, asks \"do you remember...\", or when past context would \
         make the answer more accurate. Query syntax (FTS5): a single \
         keyword, AND / OR / NOT combinations, \"exact phrase\" in double \
         quotes, prefix* matching, and (parenthesised) grouping. Search in \
         the same language the user speaks."
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "FTS5 boolean query, e.g. 'coffee AND morning', '(tea OR coffee) NOT decaf', '\"morning routine\"'. Leave empty to search with filters only."
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum results to return (default 10)."
                },
                "role": {
                    "type": "string",
                    "enum": ["user", "assistant"],
                    "description": "Restrict conversation results to one speaker."
                },
                "time_period": {
                    "type": "string",
                    "enum": ["last_day", "last_week", "last_month", "last_year"],
                    "description": "Quick filter for vague timeframes like 'recently'."
                },
                "start_date": {
                    "type": "string",
                    "description": "Lower bound, YYYY-MM-DD or YYYY-MM-DD HH:MM:SS."
                },
                "end_date": {
                    "type": "string",
                    "description": "Upper bound, YYYY-MM-DD or YYYY-MM-DD HH:MM:SS."
                }
            },
            "required": []
        })
    }

    async fn invoke(&self, args: serde_json::Value) -> Result<String, Error> {
        let args: SearchArgs = serde_json::from_value(args)
            .map_err(|e| Error::BadArgument(format!("invalid search_memories arguments: {e}")))?;

        let query = args.query.as_deref().filter(|q| !q.trim().is_empty());
        let (start_ts, end_ts) = self.time_bounds(&args)?;

        if let Some(ref role) = args.role {
            role.parse::<Role>().map_err(|_| {
                Error::BadArgument(format!("role must be 'user' or 'assistant', got '{role}'"))
            })?;
        }

        if query.is_none() && args.role.is_none() && start_ts.is_none() && end_ts.is_none() {
            return Ok(
                "Provide at least one search criterion (query, role, or time filter)."
                    .to_string(),
            );
        }

        let limit = args.limit.unwrap_or(10).max(2);
        let exclude = self.active_session.load(Ordering::SeqCst);
        debug!(query = ?query, exclude_session = exclude, "memory search");

        let summary_filter = SearchFilter {
            exclude_session: Some(exclude),
            role: None,
            start_ts,
            end_ts,
        };
        let summaries = self
            .store
            .fts_search_summaries(query, summary_filter, limit / 2)
            .await?;

        let turn_filter = SearchFilter {
            exclude_session: Some(exclude),
            role: args.role.clone(),
            start_ts,
            end_ts,
        };
        let turns = self.store.fts_search_turns(query, turn_filter, limit / 2).await?;

        if summaries.is_empty() && turns.is_empty() {
            return Ok("No relevant memories found matching the search criteria.".to_string());
        }

        let mut lines = Vec::new();
        if let Some(q) = query {
            lines.push(format!("Search criteria: '{q}'\n"));
        }
        if !summaries.is_empty() {
            lines.push("== Related Summaries ==".to_string());
            for (summary, _) in &summaries {
                lines.push(format!(
                    "[{}] {}",
                    human_time(summary.last_ts, self.tz),
                    summary.text
                ));
            }
        }
        if !turns.is_empty() {
            if !lines.is_empty() {
                lines.push(String::new());
            }
            lines.push("== Related Conversations ==".to_string());
            for (turn, _) in &turns {
                let speaker = match turn.role {
                    Role::User => "User",
                    Role::Assistant => "Assistant",
                };
                lines.push(format!(
                    "[{}] {}: {}",
                    human_time(turn.ts, self.tz),
                    speaker,
                    turn.text
                ));
            }
        }
        Ok(lines.join("\n"))
    }
}
