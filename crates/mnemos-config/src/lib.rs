// SPDX-FileCopyrightText: 2026 Mnemos Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for the Mnemos agent.
//!
//! All keys are read from the environment (a `.env` file is honoured),
//! merged over compiled defaults via Figment. Key names match the
//! deployment contract exactly: `TIMEZONE`, `CONTEXT_WINDOW_KEEP_MIN`,
//! `CHAT_MODEL`, and so on. `DEBUG_*` keys only change log verbosity,
//! never behaviour.

use std::path::PathBuf;

use figment::providers::{Env, Serialized};
use figment::Figment;
use serde::{Deserialize, Serialize};

use mnemos_core::time::parse_timezone;
use mnemos_core::Error;

/// Runtime configuration, one value per recognised environment key.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Profile name selecting the state directory `data/<profile>/`.
    #[serde(default = "default_profile")]
    pub profile: String,

    /// Root of all persistent state.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// IANA zone for human-readable renderings; never affects storage.
    #[serde(default = "default_timezone")]
    pub timezone: String,

    // -- context window --
    #[serde(default = "default_keep_min")]
    pub context_window_keep_min: usize,
    #[serde(default = "default_trigger_summary")]
    pub context_window_trigger_summary: usize,
    #[serde(default = "default_recent_summaries_max")]
    pub recent_summaries_max: usize,

    // -- retrieval --
    #[serde(default = "default_recall_summary_per_query")]
    pub recall_summary_per_query: usize,
    #[serde(default = "default_recall_conv_per_summary")]
    pub recall_conv_per_summary: usize,
    #[serde(default = "default_rerank_top_summaries")]
    pub rerank_top_summaries: usize,
    #[serde(default = "default_rerank_top_convs")]
    pub rerank_top_convs: usize,

    // -- models --
    #[serde(default = "default_chat_model")]
    pub chat_model: String,
    #[serde(default = "default_chat_model")]
    pub tool_model: String,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(default = "default_embedding_dimension")]
    pub embedding_dimension: usize,
    #[serde(default)]
    pub rerank_model: Option<String>,

    // -- provider endpoints --
    #[serde(default = "default_openai_api_base")]
    pub openai_api_base: String,
    #[serde(default)]
    pub openai_api_key: Option<String>,
    /// Defaults to the chat endpoint family when unset.
    #[serde(default)]
    pub embedding_api_base: Option<String>,
    #[serde(default)]
    pub embedding_api_key: Option<String>,
    #[serde(default)]
    pub rerank_api_base: Option<String>,
    #[serde(default)]
    pub rerank_api_key: Option<String>,

    /// Deadline for every outbound network call, in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    // -- scheduler & orchestrator --
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_max_tool_iterations")]
    pub max_tool_iterations: usize,

    // -- transport (single authorised correspondent) --
    #[serde(default)]
    pub telegram_bot_token: Option<String>,
    #[serde(default)]
    pub telegram_user_id: Option<i64>,

    // -- external tool servers --
    #[serde(default)]
    pub enable_mcp: bool,
    #[serde(default)]
    pub mcp_config_path: Option<PathBuf>,

    /// Optional seed-task JSON file merged at startup.
    #[serde(default)]
    pub scheduled_tasks_config_path: Option<PathBuf>,

    // -- debug verbosity (MUST NOT alter behaviour) --
    #[serde(default)]
    pub debug_show_full_prompt: bool,
    #[serde(default)]
    pub debug_log_database_ops: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            profile: default_profile(),
            data_dir: default_data_dir(),
            timezone: default_timezone(),
            context_window_keep_min: default_keep_min(),
            context_window_trigger_summary: default_trigger_summary(),
            recent_summaries_max: default_recent_summaries_max(),
            recall_summary_per_query: default_recall_summary_per_query(),
            recall_conv_per_summary: default_recall_conv_per_summary(),
            rerank_top_summaries: default_rerank_top_summaries(),
            rerank_top_convs: default_rerank_top_convs(),
            chat_model: default_chat_model(),
            tool_model: default_chat_model(),
            embedding_model: default_embedding_model(),
            embedding_dimension: default_embedding_dimension(),
            rerank_model: None,
            openai_api_base: default_openai_api_base(),
            openai_api_key: None,
            embedding_api_base: None,
            embedding_api_key: None,
            rerank_api_base: None,
            rerank_api_key: None,
            request_timeout_secs: default_request_timeout(),
            poll_interval_secs: default_poll_interval(),
            max_tool_iterations: default_max_tool_iterations(),
            telegram_bot_token: None,
            telegram_user_id: None,
            enable_mcp: false,
            mcp_config_path: None,
            scheduled_tasks_config_path: None,
            debug_show_full_prompt: false,
            debug_log_database_ops: false,
        }
    }
}

const ENV_KEYS: &[&str] = &[
    "profile",
    "data_dir",
    "timezone",
    "context_window_keep_min",
    "context_window_trigger_summary",
    "recent_summaries_max",
    "recall_summary_per_query",
    "recall_conv_per_summary",
    "rerank_top_summaries",
    "rerank_top_convs",
    "chat_model",
    "tool_model",
    "embedding_model",
    "embedding_dimension",
    "rerank_model",
    "openai_api_base",
    "openai_api_key",
    "embedding_api_base",
    "embedding_api_key",
    "rerank_api_base",
    "rerank_api_key",
    "request_timeout_secs",
    "poll_interval_secs",
    "max_tool_iterations",
    "telegram_bot_token",
    "telegram_user_id",
    "enable_mcp",
    "mcp_config_path",
    "scheduled_tasks_config_path",
    "debug_show_full_prompt",
    "debug_log_database_ops",
];

impl Config {
    /// Load configuration: `.env` file, then process environment, over
    /// compiled defaults.
    pub fn load() -> Result<Config, Error> {
        let _ = dotenvy::dotenv();
        Self::from_figment(Figment::from(Serialized::defaults(Config::default()))
            .merge(Env::raw().only(ENV_KEYS)))
    }

    /// Extract from an explicit figment (used by tests).
    pub fn from_figment(figment: Figment) -> Result<Config, Error> {
        let config: Config = figment
            .extract()
            .map_err(|e| Error::BadArgument(format!("invalid configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), Error> {
        parse_timezone(&self.timezone)?;
        if self.embedding_dimension == 0 {
            return Err(Error::BadArgument(
                "EMBEDDING_DIMENSION must be positive".into(),
            ));
        }
        if self.context_window_keep_min >= self.context_window_trigger_summary {
            return Err(Error::BadArgument(format!(
                "CONTEXT_WINDOW_KEEP_MIN ({}) must be below CONTEXT_WINDOW_TRIGGER_SUMMARY ({})",
                self.context_window_keep_min, self.context_window_trigger_summary
            )));
        }
        Ok(())
    }

    /// Resolved IANA zone. The name was validated at load time.
    pub fn tz(&self) -> chrono_tz::Tz {
        parse_timezone(&self.timezone).unwrap_or(chrono_tz::UTC)
    }

    /// `data/<profile>/`, the root of all persistent state.
    pub fn state_dir(&self) -> PathBuf {
        self.data_dir.join(&self.profile)
    }

    /// Path of the SQLite store.
    pub fn db_path(&self) -> PathBuf {
        self.state_dir().join("chatbot.db")
    }

    /// Path of the long-term profile document.
    pub fn profile_path(&self) -> PathBuf {
        self.state_dir().join("seele.json")
    }

    /// Path of the optional seed-task file.
    pub fn seed_tasks_path(&self) -> PathBuf {
        self.scheduled_tasks_config_path
            .clone()
            .unwrap_or_else(|| self.state_dir().join("scheduled_tasks.json"))
    }
}

fn default_profile() -> String {
    "default".into()
}
fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}
fn default_timezone() -> String {
    "UTC".into()
}
fn default_keep_min() -> usize {
    12
}
fn default_trigger_summary() -> usize {
    24
}
fn default_recent_summaries_max() -> usize {
    3
}
fn default_recall_summary_per_query() -> usize {
    3
}
fn default_recall_conv_per_summary() -> usize {
    4
}
fn default_rerank_top_summaries() -> usize {
    3
}
fn default_rerank_top_convs() -> usize {
    6
}
fn default_chat_model() -> String {
    "gpt-4o-mini".into()
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".into()
}
fn default_embedding_dimension() -> usize {
    1536
}
fn default_openai_api_base() -> String {
    "https://api.openai.com/v1".into()
}
fn default_request_timeout() -> u64 {
    120
}
fn default_poll_interval() -> u64 {
    10
}
fn default_max_tool_iterations() -> usize {
    8
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn defaults_match_contract() {
        let config = Config::default();
        assert_eq!(config.context_window_keep_min, 12);
        assert_eq!(config.context_window_trigger_summary, 24);
        assert_eq!(config.recent_summaries_max, 3);
        assert_eq!(config.recall_summary_per_query, 3);
        assert_eq!(config.recall_conv_per_summary, 4);
        assert_eq!(config.rerank_top_summaries, 3);
        assert_eq!(config.rerank_top_convs, 6);
        assert_eq!(config.poll_interval_secs, 10);
        assert_eq!(config.max_tool_iterations, 8);
        assert_eq!(config.timezone, "UTC");
        assert!(config.rerank_model.is_none());
    }

    #[test]
    fn env_overrides_defaults() {
        Jail::expect_with(|jail| {
            jail.set_env("TIMEZONE", "Asia/Shanghai");
            jail.set_env("CONTEXT_WINDOW_KEEP_MIN", "2");
            jail.set_env("CONTEXT_WINDOW_TRIGGER_SUMMARY", "4");
            jail.set_env("EMBEDDING_DIMENSION", "8");
            jail.set_env("CHAT_MODEL", "my-model");

            let config = Config::from_figment(
                Figment::from(Serialized::defaults(Config::default()))
                    .merge(Env::raw().only(ENV_KEYS)),
            )
            .expect("valid config");

            assert_eq!(config.timezone, "Asia/Shanghai");
            assert_eq!(config.context_window_keep_min, 2);
            assert_eq!(config.context_window_trigger_summary, 4);
            assert_eq!(config.embedding_dimension, 8);
            assert_eq!(config.chat_model, "my-model");
            Ok(())
        });
    }

    #[test]
    fn invalid_timezone_rejected() {
        Jail::expect_with(|jail| {
            jail.set_env("TIMEZONE", "Mars/Olympus_Mons");
            let result = Config::from_figment(
                Figment::from(Serialized::defaults(Config::default()))
                    .merge(Env::raw().only(ENV_KEYS)),
            );
            assert!(result.is_err());
            Ok(())
        });
    }

    #[test]
    fn keep_min_must_stay_below_trigger() {
        Jail::expect_with(|jail| {
            jail.set_env("CONTEXT_WINDOW_KEEP_MIN", "24");
            jail.set_env("CONTEXT_WINDOW_TRIGGER_SUMMARY", "24");
            let result = Config::from_figment(
                Figment::from(Serialized::defaults(Config::default()))
                    .merge(Env::raw().only(ENV_KEYS)),
            );
            assert!(result.is_err());
            Ok(())
        });
    }

    #[test]
    fn state_paths_are_profile_scoped() {
        let mut config = Config::default();
        config.profile = "alice".into();
        config.data_dir = PathBuf::from("/var/mnemos");
        assert_eq!(config.db_path(), PathBuf::from("/var/mnemos/alice/chatbot.db"));
        assert_eq!(
            config.profile_path(),
            PathBuf::from("/var/mnemos/alice/seele.json")
        );
        assert_eq!(
            config.seed_tasks_path(),
            PathBuf::from("/var/mnemos/alice/scheduled_tasks.json")
        );
    }
}
