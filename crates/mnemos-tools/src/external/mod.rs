// SPDX-FileCopyrightText: 2026 Mnemos Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! External tool servers, reached over a line-delimited JSON-RPC
//! protocol (child process over stdio) or JSON-RPC over HTTP.
//!
//! On connect each server's tool schemas are fetched and cached; each
//! advertised tool becomes a [`Tool`] that forwards its arguments and
//! returns the server's textual result.

pub mod config;
pub mod http;
pub mod rpc;
pub mod stdio;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use mnemos_core::Error;

use crate::tool::Tool;

use config::{ServerConfig, ServersFile};
use rpc::ToolDescriptor;

/// A connected tool server: list once, call many times.
#[async_trait]
pub trait ToolServer: Send + Sync {
    fn server_name(&self) -> &str;

    /// The tool schemas cached at connect time.
    fn tools(&self) -> &[ToolDescriptor];

    /// Forward a call and return the textual result.
    async fn call(&self, tool: &str, args: serde_json::Value) -> Result<String, Error>;
}

/// A single remote tool bound to its server handle.
pub struct RemoteTool {
    server: Arc<dyn ToolServer>,
    descriptor: ToolDescriptor,
}

#[async_trait]
impl Tool for RemoteTool {
    fn name(&self) -> &str {
        &self.descriptor.name
    }

    fn description(&self) -> &str {
        &self.descriptor.description
    }

    fn parameters(&self) -> serde_json::Value {
        self.descriptor.input_schema.clone()
    }

    async fn invoke(&self, args: serde_json::Value) -> Result<String, Error> {
        self.server.call(&self.descriptor.name, args).await
    }
}

/// Connect every configured server and collect its tools. A server
/// that fails to connect is skipped with a warning; the rest still
/// load.
pub async fn load_external_tools(config_path: &Path) -> Result<Vec<Arc<dyn Tool>>, Error> {
    let servers = ServersFile::load(config_path)?;
    let mut tools: Vec<Arc<dyn Tool>> = Vec::new();

    for (name, server_config) in servers.servers {
        let connected: Result<Arc<dyn ToolServer>, Error> = match server_config {
            ServerConfig::Stdio(stdio_config) => {
                stdio::StdioServer::connect(&name, stdio_config)
                    .await
                    .map(|s| Arc::new(s) as Arc<dyn ToolServer>)
            }
            ServerConfig::Http(http_config) => http::HttpServer::connect(&name, http_config)
                .await
                .map(|s| Arc::new(s) as Arc<dyn ToolServer>),
        };

        match connected {
            Ok(server) => {
                info!(
                    server = name.as_str(),
                    tools = server.tools().len(),
                    "tool server connected"
                );
                for descriptor in server.tools().iter().cloned() {
                    tools.push(Arc::new(RemoteTool {
                        server: server.clone(),
                        descriptor,
                    }));
                }
            }
            Err(e) => {
                warn!(server = name.as_str(), error = %e, "tool server skipped");
            }
        }
    }

    Ok(tools)
}
