// SPDX-FileCopyrightText: 2026 Mnemos Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Registry of tools with call-site filtering.
//!
//! A scheduled firing hides the task-management tool so the model
//! cannot schedule further tasks from inside a scheduled turn; invoking
//! a hidden tool anyway is a policy violation, reported to the model as
//! a tool error.

use std::sync::Arc;

use tracing::{info, warn};

use mnemos_core::chat::ToolSpec;
use mnemos_core::Error;

use crate::task_tool::SCHEDULED_TASK_TOOL_NAME;
use crate::tool::Tool;

/// The call site a tool invocation originates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolContext {
    /// A regular user turn: everything is available.
    UserTurn,
    /// A scheduler-initiated turn: task management is hidden.
    ScheduledTurn,
}

/// Uniform view over the registered tools.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> ToolRegistry {
        ToolRegistry::default()
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        info!(tool = tool.name(), "tool registered");
        self.tools.push(tool);
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    fn hidden_in(name: &str, context: ToolContext) -> bool {
        context == ToolContext::ScheduledTurn && name == SCHEDULED_TASK_TOOL_NAME
    }

    /// Metadata advertised to the model for the given call site.
    pub fn specs(&self, context: ToolContext) -> Vec<ToolSpec> {
        self.tools
            .iter()
            .filter(|t| !Self::hidden_in(t.name(), context))
            .map(|t| t.spec())
            .collect()
    }

    /// Execute a tool by name. Failures are converted to an error text
    /// for the model by the orchestrator; this returns the raw result.
    pub async fn invoke(
        &self,
        name: &str,
        args: serde_json::Value,
        context: ToolContext,
    ) -> Result<String, Error> {
        if Self::hidden_in(name, context) {
            warn!(tool = name, "tool invoked from a context where it is disabled");
            return Err(Error::PolicyViolation(format!(
                "tool '{name}' is disabled during scheduled turns"
            )));
        }
        let tool = self
            .tools
            .iter()
            .find(|t| t.name() == name)
            .ok_or_else(|| Error::NotFound(format!("tool '{name}'")))?;
        tool.invoke(args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct EchoTool {
        name: String,
    }

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            &self.name
        }
        fn description(&self) -> &str {
            "echoes its arguments"
        }
        fn parameters(&self) -> serde_json::Value {
            serde_json::json!({"type": "object", "properties": {}})
        }
        async fn invoke(&self, args: serde_json::Value) -> Result<String, Error> {
            Ok(args.to_string())
        }
    }

    fn registry_with(names: &[&str]) -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        for name in names {
            registry.register(Arc::new(EchoTool {
                name: name.to_string(),
            }));
        }
        registry
    }

    #[tokio::test]
    async fn invoke_dispatches_by_name() {
        let registry = registry_with(&["echo"]);
        let result = registry
            .invoke("echo", serde_json::json!({"x": 1}), ToolContext::UserTurn)
            .await
            .unwrap();
        assert_eq!(result, r#"{"x":1}"#);
    }

    #[tokio::test]
    async fn unknown_tool_is_not_found() {
        let registry = registry_with(&["echo"]);
        let err = registry
            .invoke("missing", serde_json::json!({}), ToolContext::UserTurn)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[tokio::test]
    async fn scheduled_context_hides_task_tool() {
        let registry = registry_with(&["echo", SCHEDULED_TASK_TOOL_NAME]);

        let user_specs = registry.specs(ToolContext::UserTurn);
        assert_eq!(user_specs.len(), 2);

        let scheduled_specs = registry.specs(ToolContext::ScheduledTurn);
        assert_eq!(scheduled_specs.len(), 1);
        assert_eq!(scheduled_specs[0].name, "echo");

        let err = registry
            .invoke(
                SCHEDULED_TASK_TOOL_NAME,
                serde_json::json!({}),
                ToolContext::ScheduledTurn,
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "policy_violation");
    }
}
