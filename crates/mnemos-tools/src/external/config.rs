// SPDX-FileCopyrightText: 2026 Mnemos Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tool-server configuration file.
//!
//! The file enumerates servers under `mcpServers`; each entry is either
//! a spawned child process (`command`/`args`/`env`) or an HTTP endpoint
//! (`type`/`url`/`bearerToken`/`headers`). `${NAME}` in any string
//! value substitutes the environment variable of that name.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use mnemos_core::Error;

#[derive(Debug, Deserialize)]
pub struct ServersFile {
    #[serde(rename = "mcpServers", default)]
    pub servers: HashMap<String, ServerConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ServerConfig {
    Http(HttpServerConfig),
    Stdio(StdioServerConfig),
}

#[derive(Debug, Clone, Deserialize)]
pub struct StdioServerConfig {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpServerConfig {
    /// "STREAMABLE_HTTP" or "SSE".
    #[serde(rename = "type")]
    pub transport: String,
    pub url: String,
    #[serde(rename = "bearerToken", default)]
    pub bearer_token: Option<String>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

impl ServersFile {
    /// Load and substitute environment variables.
    pub fn load(path: &Path) -> Result<ServersFile, Error> {
        let raw = std::fs::read_to_string(path).map_err(|e| Error::StoreUnavailable {
            source: Box::new(e),
        })?;
        let mut value: serde_json::Value = serde_json::from_str(&raw)
            .map_err(|e| Error::BadArgument(format!("invalid tool-server config: {e}")))?;
        substitute_env(&mut value, &|name| std::env::var(name).ok());
        serde_json::from_value(value)
            .map_err(|e| Error::BadArgument(format!("invalid tool-server config: {e}")))
    }
}

/// Replace `${NAME}` in every string value using `lookup`; unknown
/// names are left in place.
pub fn substitute_env(
    value: &mut serde_json::Value,
    lookup: &dyn Fn(&str) -> Option<String>,
) {
    match value {
        serde_json::Value::String(s) => {
            *s = substitute_in_str(s, lookup);
        }
        serde_json::Value::Array(items) => {
            for item in items {
                substitute_env(item, lookup);
            }
        }
        serde_json::Value::Object(map) => {
            for (_, item) in map.iter_mut() {
                substitute_env(item, lookup);
            }
        }
        _ => {}
    }
}

fn substitute_in_str(input: &str, lookup: &dyn Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        match rest[start + 2..].find('}') {
            Some(end) => {
                let name = &rest[start + 2..start + 2 + end];
                match lookup(name) {
                    Some(value) => out.push_str(&value),
                    None => {
                        out.push_str("${");
                        out.push_str(name);
                        out.push('}');
                    }
                }
                rest = &rest[start + 2 + end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}
