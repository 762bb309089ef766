// SPDX-FileCopyrightText: 2026 Mnemos Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Top-level wiring: build the store, clients, profile, memory
//! subsystem, tool registry, orchestrator, and scheduler from
//! configuration. Handlers receive the [`App`] value; there is no
//! process-global state.

use std::sync::atomic::AtomicI64;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{info, warn};

use mnemos_config::Config;
use mnemos_core::{ChatProvider, Embedder, Error, Reranker};
use mnemos_llm::{ChatClient, EmbeddingClient, RerankClient};
use mnemos_memory::{RetrievalParams, Retriever, Summarizer};
use mnemos_profile::ProfileStore;
use mnemos_scheduler::{seed::load_seed_tasks, Scheduler};
use mnemos_storage::Store;
use mnemos_tools::external::load_external_tools;
use mnemos_tools::memory_search::MemorySearchTool;
use mnemos_tools::task_tool::ScheduledTaskTool;
use mnemos_tools::ToolRegistry;

use crate::assembler::PromptAssembler;
use crate::orchestrator::Orchestrator;
use crate::session::{SessionControl, WindowParams};

/// The assembled application.
pub struct App {
    pub orchestrator: Arc<Orchestrator>,
    pub scheduler: Scheduler,
    /// Assistant replies to scheduled firings, for the transport to
    /// deliver out of band.
    pub proactive_rx: mpsc::UnboundedReceiver<String>,
    pub store: Store,
}

impl App {
    /// Build every component from configuration and restore the active
    /// session.
    pub async fn build(config: &Config) -> Result<App, Error> {
        let tz = config.tz();
        let timeout = Duration::from_secs(config.request_timeout_secs);

        let store = Store::open(&config.db_path(), config.embedding_dimension).await?;
        let profile = Arc::new(ProfileStore::open(&config.profile_path())?);

        let chat_client = Arc::new(ChatClient::new(
            &config.openai_api_base,
            config.openai_api_key.as_deref(),
            timeout,
        )?);
        let provider: Arc<dyn ChatProvider> = chat_client;

        let embedding_base = config
            .embedding_api_base
            .as_deref()
            .unwrap_or(&config.openai_api_base);
        let embedding_key = config
            .embedding_api_key
            .as_deref()
            .or(config.openai_api_key.as_deref());
        let embedder: Arc<dyn Embedder> = Arc::new(EmbeddingClient::new(
            embedding_base,
            embedding_key,
            &config.embedding_model,
            config.embedding_dimension,
            timeout,
        )?);

        let reranker: Arc<dyn Reranker> = Arc::new(RerankClient::new(
            config.rerank_api_base.as_deref(),
            config.rerank_api_key.as_deref(),
            config.rerank_model.as_deref(),
            timeout,
        )?);

        let summarizer = Arc::new(Summarizer::new(
            provider.clone(),
            config.tool_model.clone(),
            store.clone(),
            profile.clone(),
            embedder.clone(),
            tz,
        ));

        let retriever = Retriever::new(
            store.clone(),
            embedder.clone(),
            reranker,
            RetrievalParams {
                recall_summary_per_query: config.recall_summary_per_query,
                recall_conv_per_summary: config.recall_conv_per_summary,
                rerank_top_summaries: config.rerank_top_summaries,
                rerank_top_convs: config.rerank_top_convs,
            },
            tz,
        );

        let active_session = Arc::new(AtomicI64::new(-1));
        let session = SessionControl::new(
            store.clone(),
            summarizer,
            active_session.clone(),
            WindowParams {
                keep_min: config.context_window_keep_min,
                trigger: config.context_window_trigger_summary,
                max_summaries: config.recent_summaries_max,
            },
        );

        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(MemorySearchTool::new(
            store.clone(),
            active_session,
            tz,
        )));
        registry.register(Arc::new(ScheduledTaskTool::new(store.clone(), tz)));
        if config.enable_mcp {
            match &config.mcp_config_path {
                Some(path) => match load_external_tools(path).await {
                    Ok(tools) => {
                        for tool in tools {
                            registry.register(tool);
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, kind = e.kind(), "external tools unavailable");
                    }
                },
                None => warn!("ENABLE_MCP set without MCP_CONFIG_PATH"),
            }
        }

        let (orchestrator, proactive_rx) = Orchestrator::new(
            store.clone(),
            profile,
            provider,
            embedder,
            retriever,
            Arc::new(registry),
            PromptAssembler::new(config.chat_model.clone(), tz),
            session,
            config.max_tool_iterations,
        );
        orchestrator.start().await?;

        let seeded = load_seed_tasks(&store, &config.seed_tasks_path()).await?;
        if seeded > 0 {
            info!(seeded, "seed tasks loaded");
        }

        let scheduler = Scheduler::new(
            store.clone(),
            orchestrator.clone(),
            Duration::from_secs(config.poll_interval_secs),
            tz,
        );

        Ok(App {
            orchestrator,
            scheduler,
            proactive_rx,
            store,
        })
    }
}
