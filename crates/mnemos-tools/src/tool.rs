// SPDX-FileCopyrightText: 2026 Mnemos Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The uniform tool capability: metadata plus `invoke`.

use async_trait::async_trait;

use mnemos_core::chat::ToolSpec;
use mnemos_core::Error;

/// A callable tool, in-process or remote.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique name advertised to the model.
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON Schema of the arguments object.
    fn parameters(&self) -> serde_json::Value;

    /// Execute with the model-supplied arguments, returning the text
    /// handed back to the model.
    async fn invoke(&self, args: serde_json::Value) -> Result<String, Error>;

    /// Function-calling metadata for the provider request.
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}
