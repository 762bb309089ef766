// SPDX-FileCopyrightText: 2026 Mnemos Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain model: sessions, turns, summaries, and scheduled tasks.
//!
//! All persisted timestamps are UTC epoch seconds (`i64`). Wall-clock
//! local time never reaches storage; rendering happens at the edges via
//! [`crate::time`].

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::Error;

/// Speaker of a turn.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Archived,
}

/// A contiguous conversation period bounded by `/new` or `/reset`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: i64,
    /// UTC epoch seconds.
    pub start_ts: i64,
    /// Set when the session is archived.
    pub end_ts: Option<i64>,
    pub status: SessionStatus,
}

/// A single user or assistant utterance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub turn_id: i64,
    pub session_id: i64,
    /// UTC epoch seconds.
    pub ts: i64,
    pub role: Role,
    pub text: String,
}

/// An LLM-produced condensation of a contiguous slice of turns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub summary_id: i64,
    pub session_id: i64,
    pub text: String,
    /// UTC epoch seconds of the earliest summarised turn.
    pub first_ts: i64,
    /// UTC epoch seconds of the latest summarised turn.
    pub last_ts: i64,
}

/// When a scheduled task fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trigger {
    /// Fire once at the given UTC epoch second.
    Once { timestamp: i64 },
    /// Fire repeatedly every `interval_secs` seconds.
    Interval { interval_secs: i64 },
}

impl Trigger {
    /// Storage discriminator, matching the `trigger_type` column.
    pub fn type_str(&self) -> &'static str {
        match self {
            Trigger::Once { .. } => "once",
            Trigger::Interval { .. } => "interval",
        }
    }

    /// Storage payload, matching the `trigger_config` JSON column.
    pub fn config_json(&self) -> String {
        match self {
            Trigger::Once { timestamp } => format!("{{\"timestamp\":{timestamp}}}"),
            Trigger::Interval { interval_secs } => {
                format!("{{\"interval\":{interval_secs}}}")
            }
        }
    }

    /// Reassemble from the stored `(trigger_type, trigger_config)` pair.
    pub fn from_parts(trigger_type: &str, config_json: &str) -> Result<Self, Error> {
        let config: serde_json::Value = serde_json::from_str(config_json)
            .map_err(|e| Error::BadArgument(format!("invalid trigger_config: {e}")))?;
        match trigger_type {
            "once" => {
                let timestamp = config
                    .get("timestamp")
                    .and_then(|v| v.as_i64())
                    .ok_or_else(|| {
                        Error::BadArgument("once trigger requires a timestamp".into())
                    })?;
                Ok(Trigger::Once { timestamp })
            }
            "interval" => {
                let interval_secs = config
                    .get("interval")
                    .and_then(|v| v.as_i64())
                    .filter(|i| *i > 0)
                    .ok_or_else(|| {
                        Error::BadArgument(
                            "interval trigger requires a positive interval".into(),
                        )
                    })?;
                Ok(Trigger::Interval { interval_secs })
            }
            other => Err(Error::BadArgument(format!(
                "unknown trigger_type: {other}"
            ))),
        }
    }
}

/// Lifecycle state of a scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Active,
    Paused,
    Completed,
}

/// A persistent timer whose firing synthesises a user-role prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledTask {
    /// Opaque identifier (UUID v4 for tasks created at runtime).
    pub task_id: String,
    pub name: String,
    pub trigger: Trigger,
    /// Briefing handed to the LLM when the task fires.
    pub message: String,
    pub created_at: i64,
    pub next_run_at: i64,
    pub last_run_at: Option<i64>,
    pub status: TaskStatus,
}
