// SPDX-FileCopyrightText: 2026 Mnemos Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The orchestrator: runs the tool-calling loop around the chat model
//! and owns turn persistence.
//!
//! Only the user text and the final assistant text are stored as turns;
//! intermediate tool traffic stays in the transcript of the single LLM
//! call. Scheduler-synthesised prompts are never persisted. A single
//! mutex serialises user turns and scheduled firings.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use mnemos_core::chat::{ChatMessage, ChatRequest, ChatRole};
use mnemos_core::time::now_ts;
use mnemos_core::types::{Role, Turn};
use mnemos_core::{ChatProvider, Embedder, Error};
use mnemos_memory::{ContextWindow, Retriever};
use mnemos_scheduler::FiringHandler;
use mnemos_storage::Store;
use mnemos_tools::{ToolContext, ToolRegistry};
use mnemos_profile::ProfileStore;

use crate::assembler::{CurrentRequest, PromptAssembler};
use crate::session::SessionControl;

/// Reply returned when the model keeps requesting tools past the bound.
pub const MAX_TOOL_ITERATIONS_REPLY: &str =
    "I hit the limit on tool calls while working on this; could you rephrase or simplify the request?";

/// Coordinates one turn end to end: persist, compact, retrieve,
/// assemble, loop with tools, persist the reply.
pub struct Orchestrator {
    store: Store,
    profile: Arc<ProfileStore>,
    provider: Arc<dyn ChatProvider>,
    embedder: Arc<dyn Embedder>,
    retriever: Retriever,
    registry: Arc<ToolRegistry>,
    assembler: PromptAssembler,
    session: SessionControl,
    window: Mutex<ContextWindow>,
    max_tool_iterations: usize,
    /// Assistant replies to scheduled firings, delivered out of band.
    proactive_tx: mpsc::UnboundedSender<String>,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Store,
        profile: Arc<ProfileStore>,
        provider: Arc<dyn ChatProvider>,
        embedder: Arc<dyn Embedder>,
        retriever: Retriever,
        registry: Arc<ToolRegistry>,
        assembler: PromptAssembler,
        session: SessionControl,
        max_tool_iterations: usize,
    ) -> (Arc<Orchestrator>, mpsc::UnboundedReceiver<String>) {
        let (proactive_tx, proactive_rx) = mpsc::unbounded_channel();
        let window = Mutex::new(session.new_window());
        let orchestrator = Arc::new(Orchestrator {
            store,
            profile,
            provider,
            embedder,
            retriever,
            registry,
            assembler,
            session,
            window,
            max_tool_iterations,
            proactive_tx,
        });
        (orchestrator, proactive_rx)
    }

    /// Restore or create the active session. Called once at startup.
    pub async fn start(&self) -> Result<i64, Error> {
        let mut window = self.window.lock().await;
        self.session.ensure_active(&mut window).await
    }

    /// Handle one user message and return the assistant's reply.
    ///
    /// Storage failure on the user turn propagates (the transport shows
    /// an apology and may retry); embedding failure does not.
    pub async fn handle_user_turn(&self, text: &str) -> Result<String, Error> {
        let mut window = self.window.lock().await;
        let session_id = self.session.current_or_create(&mut window).await?;

        // The previous assistant turn drives the retriever's dual
        // query; capture it before this turn lands in the window.
        let last_assistant = window.last_assistant_text().map(|t| t.to_string());

        self.persist_turn(&mut window, session_id, Role::User, text)
            .await?;
        self.session.compact_if_needed(&mut window, session_id).await;

        let retrieved = self
            .retriever
            .retrieve(
                text,
                last_assistant.as_deref(),
                session_id,
                &window.recent_summary_ids(),
            )
            .await;

        let history = window.tail();
        let request = self.assembler.assemble(
            &self.profile.snapshot(),
            &summary_texts(&window),
            &retrieved,
            &history[..history.len().saturating_sub(1)],
            CurrentRequest::User(text),
            self.registry.specs(ToolContext::UserTurn),
        );

        let reply = self.run_tool_loop(request, ToolContext::UserTurn).await?;

        self.persist_turn(&mut window, session_id, Role::Assistant, &reply)
            .await?;
        self.session.compact_if_needed(&mut window, session_id).await;

        info!(session_id, "user turn complete");
        Ok(reply)
    }

    /// `/new`: finalise and rotate the session.
    pub async fn new_session(&self) -> Result<i64, Error> {
        let mut window = self.window.lock().await;
        self.session.rotate(&mut window).await
    }

    /// `/reset`: discard the active session.
    pub async fn reset_session(&self) -> Result<i64, Error> {
        let mut window = self.window.lock().await;
        self.session.reset(&mut window).await
    }

    /// Persist a turn, attach its embedding (best effort), and append
    /// it to the window.
    async fn persist_turn(
        &self,
        window: &mut ContextWindow,
        session_id: i64,
        role: Role,
        text: &str,
    ) -> Result<(), Error> {
        let ts = now_ts();
        let turn_id = self.store.append_turn(session_id, role, text, ts).await?;

        // The vector is a side effect: a miss only hides this turn from
        // vector recall until a re-embed, never loses the text.
        match self.embedder.embed(text).await {
            Ok(vec) => {
                if let Err(e) = self.store.attach_turn_vector(turn_id, &vec).await {
                    warn!(turn_id, error = %e, "failed to attach turn vector");
                }
            }
            Err(e) => {
                warn!(turn_id, error = %e, kind = e.kind(), "turn embedding failed");
            }
        }

        window.push_turn(Turn {
            turn_id,
            session_id,
            ts,
            role,
            text: text.to_string(),
        });
        Ok(())
    }

    /// Alternate between the model and the tool registry until the
    /// model produces a final message or the iteration bound is hit.
    async fn run_tool_loop(
        &self,
        mut request: ChatRequest,
        context: ToolContext,
    ) -> Result<String, Error> {
        for iteration in 0..self.max_tool_iterations {
            let response = self.provider.complete(request.clone()).await?;

            if !response.wants_tools() {
                return Ok(response.content);
            }

            debug!(
                iteration,
                calls = response.tool_calls.len(),
                "model requested tools"
            );

            request.messages.push(ChatMessage {
                role: ChatRole::Assistant,
                content: response.content.clone(),
                tool_calls: response.tool_calls.clone(),
                tool_call_id: None,
            });

            for call in &response.tool_calls {
                let result = match serde_json::from_str::<serde_json::Value>(&call.arguments)
                {
                    Ok(args) => self.registry.invoke(&call.name, args, context).await,
                    Err(e) => Err(Error::BadArgument(format!(
                        "tool arguments are not valid JSON: {e}"
                    ))),
                };
                let text = match result {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(tool = call.name.as_str(), error = %e, kind = e.kind(), "tool failed");
                        format!("Error: {e}")
                    }
                };
                request
                    .messages
                    .push(ChatMessage::tool_result(call.id.clone(), text));
            }
        }

        warn!(
            limit = self.max_tool_iterations,
            "max tool iterations exceeded"
        );
        Ok(MAX_TOOL_ITERATIONS_REPLY.to_string())
    }
}

fn summary_texts(window: &ContextWindow) -> Vec<String> {
    window
        .recent_summaries()
        .iter()
        .map(|s| s.text.clone())
        .collect()
}

#[async_trait]
impl FiringHandler for Orchestrator {
    /// A scheduled firing: same pipeline, but the synthetic prompt is
    /// never persisted, the task tool is hidden, and the reply goes out
    /// through the proactive channel.
    async fn handle_scheduled(&self, prompt: String) -> Result<(), Error> {
        let mut window = self.window.lock().await;
        let session_id = self.session.current_or_create(&mut window).await?;

        let retrieved = self
            .retriever
            .retrieve(&prompt, None, session_id, &window.recent_summary_ids())
            .await;

        let request = self.assembler.assemble(
            &self.profile.snapshot(),
            &summary_texts(&window),
            &retrieved,
            window.tail(),
            CurrentRequest::Scheduled(&prompt),
            self.registry.specs(ToolContext::ScheduledTurn),
        );

        let reply = self
            .run_tool_loop(request, ToolContext::ScheduledTurn)
            .await?;

        self.persist_turn(&mut window, session_id, Role::Assistant, &reply)
            .await?;
        self.session.compact_if_needed(&mut window, session_id).await;

        if self.proactive_tx.send(reply).is_err() {
            warn!("proactive channel closed, scheduled reply dropped");
        }
        info!(session_id, "scheduled turn complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mnemos_core::chat::{ChatResponse, ToolCall};
    use mnemos_memory::{RetrievalParams, Summarizer};
    use mnemos_scheduler::synthetic_prompt;
    use mnemos_tools::task_tool::SCHEDULED_TASK_TOOL_NAME;
    use mnemos_tools::Tool;
    use std::sync::atomic::AtomicI64;
    use std::sync::Mutex as StdMutex;
    use tempfile::tempdir;

    /// Chat provider replaying a script of responses, recording every
    /// request it sees.
    struct ScriptedProvider {
        script: StdMutex<Vec<ChatResponse>>,
        requests: StdMutex<Vec<ChatRequest>>,
    }

    impl ScriptedProvider {
        fn new(responses: Vec<ChatResponse>) -> Arc<Self> {
            Arc::new(ScriptedProvider {
                script: StdMutex::new(responses),
                requests: StdMutex::new(Vec::new()),
            })
        }

        fn text(content: &str) -> ChatResponse {
            ChatResponse {
                content: content.into(),
                tool_calls: Vec::new(),
            }
        }

        fn tool_call(name: &str, args: &str) -> ChatResponse {
            ChatResponse {
                content: String::new(),
                tool_calls: vec![ToolCall {
                    id: "call_1".into(),
                    name: name.into(),
                    arguments: args.into(),
                }],
            }
        }

        fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ChatProvider for ScriptedProvider {
        async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, Error> {
            self.requests.lock().unwrap().push(request);
            let mut script = self.script.lock().unwrap();
            if script.is_empty() {
                // Keep returning the last-known shape: a plain reply.
                return Ok(ScriptedProvider::text("fallback"));
            }
            Ok(script.remove(0))
        }
    }

    /// Tool-model provider for the summariser.
    struct SummaryProvider;

    #[async_trait]
    impl ChatProvider for SummaryProvider {
        async fn complete(&self, _request: ChatRequest) -> Result<ChatResponse, Error> {
            Ok(ScriptedProvider::text(
                r#"{"summary": "condensed conversation slice",
                    "patch": [{"op": "replace", "path": "/user/name", "value": "Anna"}]}"#,
            ))
        }
    }

    struct FakeEmbedder;

    #[async_trait]
    impl Embedder for FakeEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, Error> {
            Ok(vec![1.0, 0.0, 0.0, 0.0])
        }
        fn dimension(&self) -> usize {
            4
        }
    }

    struct NoReranker;

    #[async_trait]
    impl mnemos_core::Reranker for NoReranker {
        fn is_enabled(&self) -> bool {
            false
        }
        async fn rerank(
            &self,
            _q: &str,
            docs: &[String],
            top_n: usize,
        ) -> Result<Vec<usize>, Error> {
            Ok((0..docs.len().min(top_n)).collect())
        }
    }

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "echoes"
        }
        fn parameters(&self) -> serde_json::Value {
            serde_json::json!({"type": "object"})
        }
        async fn invoke(&self, args: serde_json::Value) -> Result<String, Error> {
            Ok(format!("echoed: {args}"))
        }
    }

    struct NamedStub(&'static str);

    #[async_trait]
    impl Tool for NamedStub {
        fn name(&self) -> &str {
            self.0
        }
        fn description(&self) -> &str {
            "stub"
        }
        fn parameters(&self) -> serde_json::Value {
            serde_json::json!({"type": "object"})
        }
        async fn invoke(&self, _args: serde_json::Value) -> Result<String, Error> {
            Ok("stub ok".into())
        }
    }

    struct Harness {
        orchestrator: Arc<Orchestrator>,
        proactive_rx: mpsc::UnboundedReceiver<String>,
        provider: Arc<ScriptedProvider>,
        store: Store,
        profile: Arc<ProfileStore>,
        _dir: tempfile::TempDir,
    }

    async fn harness(responses: Vec<ChatResponse>, keep: usize, trigger: usize) -> Harness {
        let dir = tempdir().unwrap();
        let store = Store::open(&dir.path().join("test.db"), 4).await.unwrap();
        let profile = Arc::new(ProfileStore::open(&dir.path().join("seele.json")).unwrap());
        let embedder: Arc<dyn Embedder> = Arc::new(FakeEmbedder);
        let reranker: Arc<dyn mnemos_core::Reranker> = Arc::new(NoReranker);
        let provider = ScriptedProvider::new(responses);

        let summarizer = Arc::new(Summarizer::new(
            Arc::new(SummaryProvider),
            "tool-model",
            store.clone(),
            profile.clone(),
            embedder.clone(),
            chrono_tz::UTC,
        ));
        let active_session = Arc::new(AtomicI64::new(-1));
        let session = SessionControl::new(
            store.clone(),
            summarizer,
            active_session,
            crate::session::WindowParams {
                keep_min: keep,
                trigger,
                max_summaries: 3,
            },
        );
        let retriever = Retriever::new(
            store.clone(),
            embedder.clone(),
            reranker,
            RetrievalParams::default(),
            chrono_tz::UTC,
        );

        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        registry.register(Arc::new(NamedStub(SCHEDULED_TASK_TOOL_NAME)));

        let (orchestrator, proactive_rx) = Orchestrator::new(
            store.clone(),
            profile.clone(),
            provider.clone(),
            embedder,
            retriever,
            Arc::new(registry),
            PromptAssembler::new("chat-model", chrono_tz::UTC),
            session,
            8,
        );
        orchestrator.start().await.unwrap();

        Harness {
            orchestrator,
            proactive_rx,
            provider,
            store,
            profile,
            _dir: dir,
        }
    }

    #[tokio::test]
    async fn plain_turn_persists_both_sides() {
        let h = harness(vec![ScriptedProvider::text("hello back")], 4, 8).await;

        let reply = h.orchestrator.handle_user_turn("hello").await.unwrap();
        assert_eq!(reply, "hello back");

        let session = h.store.active_session().await.unwrap().unwrap();
        let turns = h.store.session_turns(session.session_id).await.unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, Role::User);
        assert_eq!(turns[0].text, "hello");
        assert_eq!(turns[1].role, Role::Assistant);
        assert_eq!(turns[1].text, "hello back");
    }

    #[tokio::test]
    async fn tool_loop_feeds_result_back() {
        let h = harness(
            vec![
                ScriptedProvider::tool_call("echo", r#"{"q": "ping"}"#),
                ScriptedProvider::text("done with tools"),
            ],
            4,
            8,
        )
        .await;

        let reply = h.orchestrator.handle_user_turn("use the tool").await.unwrap();
        assert_eq!(reply, "done with tools");
        assert_eq!(h.provider.request_count(), 2);

        // The second request carries the assistant tool call and the
        // tool result.
        let requests = h.provider.requests.lock().unwrap();
        let second = &requests[1];
        let tool_msg = second
            .messages
            .iter()
            .find(|m| m.role == ChatRole::Tool)
            .expect("tool result present");
        assert!(tool_msg.content.contains("echoed"));
        assert_eq!(tool_msg.tool_call_id.as_deref(), Some("call_1"));

        // Intermediate tool traffic is not persisted as turns.
        let session = h.store.active_session().await.unwrap().unwrap();
        let turns = h.store.session_turns(session.session_id).await.unwrap();
        assert_eq!(turns.len(), 2);
    }

    #[tokio::test]
    async fn failing_tool_becomes_error_result() {
        let h = harness(
            vec![
                ScriptedProvider::tool_call("no_such_tool", "{}"),
                ScriptedProvider::text("recovered"),
            ],
            4,
            8,
        )
        .await;

        let reply = h.orchestrator.handle_user_turn("try").await.unwrap();
        assert_eq!(reply, "recovered");

        let requests = h.provider.requests.lock().unwrap();
        let tool_msg = requests[1]
            .messages
            .iter()
            .find(|m| m.role == ChatRole::Tool)
            .unwrap();
        assert!(tool_msg.content.starts_with("Error:"));
    }

    #[tokio::test]
    async fn runaway_tool_loop_is_bounded() {
        let responses: Vec<ChatResponse> = (0..20)
            .map(|_| ScriptedProvider::tool_call("echo", "{}"))
            .collect();
        let h = harness(responses, 4, 8).await;

        let reply = h.orchestrator.handle_user_turn("loop forever").await.unwrap();
        assert_eq!(reply, MAX_TOOL_ITERATIONS_REPLY);
        assert_eq!(h.provider.request_count(), 8);
    }

    #[tokio::test]
    async fn compaction_fires_at_trigger_with_expected_shape() {
        // Four exchanges with trigger 8 / keep 4: one summary covering
        // the first two exchanges, tail holds the last two.
        let responses: Vec<ChatResponse> =
            (1..=4).map(|i| ScriptedProvider::text(&format!("a{i}"))).collect();
        let h = harness(responses, 4, 8).await;

        for i in 1..=4 {
            h.orchestrator
                .handle_user_turn(&format!("u{i}"))
                .await
                .unwrap();
        }

        let session = h.store.active_session().await.unwrap().unwrap();
        let summaries = h.store.recent_summaries(session.session_id, 10).await.unwrap();
        assert_eq!(summaries.len(), 1);

        let all = h.store.session_turns(session.session_id).await.unwrap();
        assert_eq!(all.len(), 8);
        // The summary covers u1..a2 by timestamp range.
        assert_eq!(summaries[0].first_ts, all[0].ts);
        assert_eq!(summaries[0].last_ts, all[3].ts);

        // The next prompt's tail holds exactly the last two exchanges:
        // the summarised turns are gone from the transcript.
        h.orchestrator.handle_user_turn("u5").await.unwrap();
        let requests = h.provider.requests.lock().unwrap();
        let last = requests.last().unwrap();
        let history: Vec<&str> = last
            .messages
            .iter()
            .filter(|m| m.role == ChatRole::User || m.role == ChatRole::Assistant)
            .map(|m| m.content.as_str())
            .collect();
        // Final element is the emphasised current request (u5).
        assert_eq!(history[..history.len() - 1], ["u3", "a3", "u4", "a4"]);
        assert!(history.last().unwrap().contains("u5"));
        assert!(!last.messages.iter().any(|m| m.content == "u1"));
    }

    #[tokio::test]
    async fn profile_patch_reaches_next_prompt_without_disk_read() {
        let responses = (1..=4).map(|i| ScriptedProvider::text(&format!("a{i}"))).collect();
        let h = harness(responses, 4, 8).await;

        for i in 1..=4 {
            h.orchestrator
                .handle_user_turn(&format!("u{i}"))
                .await
                .unwrap();
        }
        // Compaction ran and its patch set the user name.
        assert_eq!(h.profile.snapshot().user.name, "Anna");

        // The very next assembled prompt embeds the patched profile.
        h.orchestrator.handle_user_turn("u5").await.unwrap();
        let requests = h.provider.requests.lock().unwrap();
        let last = requests.last().unwrap();
        assert!(last.messages[0].content.contains("\"name\": \"Anna\""));
    }

    #[tokio::test]
    async fn scheduled_turn_hides_task_tool_and_goes_proactive() {
        let mut h = harness(vec![ScriptedProvider::text("proactive hello")], 4, 8).await;

        let task = mnemos_scheduler::build_task(
            "checkin",
            mnemos_core::types::Trigger::Once { timestamp: 1000 },
            "M",
            1,
        )
        .unwrap();
        let prompt = synthetic_prompt(&task, chrono_tz::UTC);
        h.orchestrator.handle_scheduled(prompt).await.unwrap();

        // The advertised tools exclude task management.
        let requests = h.provider.requests.lock().unwrap();
        let names: Vec<&str> = requests[0].tools.iter().map(|t| t.name.as_str()).collect();
        assert!(names.contains(&"echo"));
        assert!(!names.contains(&SCHEDULED_TASK_TOOL_NAME));

        // The synthetic prompt itself is not a stored turn; the reply is.
        let session = h.store.active_session().await.unwrap().unwrap();
        let turns = h.store.session_turns(session.session_id).await.unwrap();
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].role, Role::Assistant);
        assert_eq!(turns[0].text, "proactive hello");

        assert_eq!(h.proactive_rx.recv().await.unwrap(), "proactive hello");
    }

    #[tokio::test]
    async fn reset_discards_session_rows() {
        let h = harness(vec![ScriptedProvider::text("ok")], 4, 8).await;
        h.orchestrator.handle_user_turn("remember this").await.unwrap();

        let old_session = h.store.active_session().await.unwrap().unwrap().session_id;
        let new_session = h.orchestrator.reset_session().await.unwrap();
        assert_ne!(old_session, new_session);

        assert!(h.store.session_turns(old_session).await.unwrap().is_empty());
        let hits = h
            .store
            .vector_search_turns(&[1.0, 0.0, 0.0, 0.0], 10, old_session)
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn new_session_archives_and_summarises() {
        let h = harness(vec![ScriptedProvider::text("ok")], 4, 8).await;
        h.orchestrator.handle_user_turn("something memorable").await.unwrap();

        let old_session = h.store.active_session().await.unwrap().unwrap().session_id;
        let new_session = h.orchestrator.new_session().await.unwrap();
        assert_ne!(old_session, new_session);

        // The old session is archived with a finalising summary; turns
        // are preserved for retrieval.
        let summaries = h.store.recent_summaries(old_session, 10).await.unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(h.store.session_turns(old_session).await.unwrap().len(), 2);
        let active = h.store.active_session().await.unwrap().unwrap();
        assert_eq!(active.session_id, new_session);
    }
}
