// SPDX-FileCopyrightText: 2026 Mnemos Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Stdio transport: the server is a child process speaking one JSON-RPC
//! message per line on stdin/stdout.

use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::debug;

use mnemos_core::Error;

use super::config::StdioServerConfig;
use super::rpc::{
    parse_call_result, parse_tool_list, rpc_error, RpcRequest, RpcResponse, ToolDescriptor,
};
use super::ToolServer;

/// A child-process tool server. The pipe pair is serialized behind one
/// lock; requests and responses are matched by id.
#[derive(Debug)]
pub struct StdioServer {
    name: String,
    pipes: Mutex<(ChildStdin, BufReader<ChildStdout>)>,
    // Held so the child is killed when the server is dropped.
    _child: Child,
    next_id: AtomicU64,
    tools: Vec<ToolDescriptor>,
}

impl StdioServer {
    /// Spawn the child, run the initialize handshake, and cache the
    /// tool list.
    pub async fn connect(name: &str, config: StdioServerConfig) -> Result<StdioServer, Error> {
        let mut child = Command::new(&config.command)
            .args(&config.args)
            .envs(&config.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::UpstreamFailure {
                message: format!("failed to spawn tool server '{name}': {e}"),
                source: Some(Box::new(e)),
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::upstream(format!("tool server '{name}' has no stdin")))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::upstream(format!("tool server '{name}' has no stdout")))?;

        let mut server = StdioServer {
            name: name.to_string(),
            pipes: Mutex::new((stdin, BufReader::new(stdout))),
            _child: child,
            next_id: AtomicU64::new(1),
            tools: Vec::new(),
        };

        let id = server.next_id.fetch_add(1, Ordering::SeqCst);
        server.roundtrip(RpcRequest::initialize(id)).await?;
        server
            .notify("notifications/initialized", serde_json::json!({}))
            .await?;

        let id = server.next_id.fetch_add(1, Ordering::SeqCst);
        let result = server
            .roundtrip(RpcRequest::new(id, "tools/list", None))
            .await?;
        server.tools = parse_tool_list(&result)?;
        debug!(server = name, tools = server.tools.len(), "stdio server ready");

        Ok(server)
    }

    async fn notify(&self, method: &str, params: serde_json::Value) -> Result<(), Error> {
        let line = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params
        })
        .to_string();
        let mut pipes = self.pipes.lock().await;
        self.write_line(&mut pipes.0, &line).await
    }

    async fn roundtrip(&self, request: RpcRequest) -> Result<serde_json::Value, Error> {
        let expect_id = request.id;
        let line = serde_json::to_string(&request).expect("request serializes");
        let mut pipes = self.pipes.lock().await;
        let (stdin, stdout) = &mut *pipes;
        self.write_line(stdin, &line).await?;

        // Skip notifications and unrelated messages until our id shows
        // up; a closed pipe is an upstream failure.
        loop {
            let mut buf = String::new();
            let read = stdout.read_line(&mut buf).await.map_err(|e| {
                Error::UpstreamFailure {
                    message: format!("tool server '{}' read failed: {e}", self.name),
                    source: Some(Box::new(e)),
                }
            })?;
            if read == 0 {
                return Err(Error::upstream(format!(
                    "tool server '{}' closed its stdout",
                    self.name
                )));
            }
            let trimmed = buf.trim();
            if trimmed.is_empty() {
                continue;
            }
            let response: RpcResponse = match serde_json::from_str(trimmed) {
                Ok(response) => response,
                Err(_) => continue,
            };
            if response.id != Some(expect_id) {
                continue;
            }
            if let Some(error) = response.error {
                return Err(rpc_error(&self.name, error));
            }
            return response
                .result
                .ok_or_else(|| Error::upstream(format!("tool server '{}' sent an empty result", self.name)));
        }
    }

    async fn write_line(&self, stdin: &mut ChildStdin, line: &str) -> Result<(), Error> {
        let io_err = |e: std::io::Error| Error::UpstreamFailure {
            message: format!("tool server '{}' write failed: {e}", self.name),
            source: Some(Box::new(e)),
        };
        stdin.write_all(line.as_bytes()).await.map_err(io_err)?;
        stdin.write_all(b"\n").await.map_err(io_err)?;
        stdin.flush().await.map_err(io_err)
    }
}

#[async_trait]
impl ToolServer for StdioServer {
    fn server_name(&self) -> &str {
        &self.name
    }

    fn tools(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    async fn call(&self, tool: &str, args: serde_json::Value) -> Result<String, Error> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let result = self
            .roundtrip(RpcRequest::new(
                id,
                "tools/call",
                Some(serde_json::json!({"name": tool, "arguments": args})),
            ))
            .await?;
        Ok(parse_call_result(&result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The protocol plumbing (handshake, id matching, result parsing) is
    // covered by the pure tests in rpc.rs; spawning a real server here
    // would need an executable fixture. This covers the spawn-failure
    // path.
    #[tokio::test]
    async fn spawn_failure_is_upstream_failure() {
        let config = StdioServerConfig {
            command: "/definitely/not/a/real/binary".into(),
            args: vec![],
            env: Default::default(),
        };
        let err = StdioServer::connect("ghost", config).await.unwrap_err();
        assert_eq!(err.kind(), "upstream_failure");
    }
}
