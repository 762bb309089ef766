// SPDX-FileCopyrightText: 2026 Mnemos Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session control: ensuring an active session on startup (restoring
//! the window from the store), compaction, and the `/new` / `/reset`
//! transport commands.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use tracing::{info, warn};

use mnemos_core::time::now_ts;
use mnemos_core::Error;
use mnemos_memory::{ContextWindow, Summarizer};
use mnemos_storage::Store;

/// Window sizing, from configuration.
#[derive(Debug, Clone, Copy)]
pub struct WindowParams {
    pub keep_min: usize,
    pub trigger: usize,
    pub max_summaries: usize,
}

/// Manages the active session's lifecycle and its in-memory window.
pub struct SessionControl {
    store: Store,
    summarizer: Arc<Summarizer>,
    /// Shared with the memory-search tool so its exclusion filter
    /// always tracks the live session.
    active_session: Arc<AtomicI64>,
    params: WindowParams,
}

impl SessionControl {
    pub fn new(
        store: Store,
        summarizer: Arc<Summarizer>,
        active_session: Arc<AtomicI64>,
        params: WindowParams,
    ) -> SessionControl {
        SessionControl {
            store,
            summarizer,
            active_session,
            params,
        }
    }

    pub fn new_window(&self) -> ContextWindow {
        ContextWindow::new(
            self.params.keep_min,
            self.params.trigger,
            self.params.max_summaries,
        )
    }

    pub fn active_session_id(&self) -> i64 {
        self.active_session.load(Ordering::SeqCst)
    }

    /// The session a turn should land in: the one already tracked by
    /// this process, or (on first use) the restored/created one.
    pub async fn current_or_create(&self, window: &mut ContextWindow) -> Result<i64, Error> {
        let current = self.active_session_id();
        if current >= 0 {
            return Ok(current);
        }
        self.ensure_active(window).await
    }

    /// Ensure exactly one active session exists, restoring the window
    /// from the store when resuming.
    pub async fn ensure_active(&self, window: &mut ContextWindow) -> Result<i64, Error> {
        if let Some(session) = self.store.active_session().await? {
            self.restore(window, session.session_id).await?;
            self.active_session.store(session.session_id, Ordering::SeqCst);
            info!(session_id = session.session_id, "resumed active session");
            return Ok(session.session_id);
        }

        let session_id = self.store.create_session(now_ts()).await?;
        self.active_session.store(session_id, Ordering::SeqCst);
        info!(session_id, "created active session");
        Ok(session_id)
    }

    /// Rebuild the window from persisted state: recent summaries first,
    /// then the unsummarized tail; an oversized tail is compacted
    /// before the first prompt is served.
    async fn restore(&self, window: &mut ContextWindow, session_id: i64) -> Result<(), Error> {
        window.clear();

        let summaries = self
            .store
            .recent_summaries(session_id, self.params.max_summaries)
            .await?;
        for summary in summaries {
            window.push_summary(summary.summary_id, summary.text);
        }

        let turns = self.store.unsummarized_turns(session_id).await?;
        for turn in turns {
            window.push_turn(turn);
        }
        info!(
            session_id,
            turns = window.len(),
            summaries = window.recent_summaries().len(),
            "window restored"
        );

        // A long-idle shutdown can leave more unsummarized turns than
        // the trigger; condense them now rather than on the next turn.
        self.compact_if_needed(window, session_id).await;
        Ok(())
    }

    /// Compact when the tail has reached the trigger. Summariser
    /// failures leave the window untouched; compaction retries the next
    /// time the trigger is crossed.
    pub async fn compact_if_needed(&self, window: &mut ContextWindow, session_id: i64) -> bool {
        let mut compacted = false;
        while window.needs_compaction() {
            // One summariser call covers the whole overflow, leaving
            // exactly keep_min turns in the tail.
            let batch_len = window.compaction_batch_len();
            let batch: Vec<_> = window.oldest(batch_len).to_vec();

            match self.summarizer.summarize(session_id, &batch).await {
                Ok(outcome) => {
                    window.push_summary(outcome.summary_id, outcome.summary_text);
                    window.drop_oldest(batch_len);
                    compacted = true;
                }
                Err(e) => {
                    warn!(
                        session_id,
                        error = %e,
                        kind = e.kind(),
                        "compaction skipped, keeping tail"
                    );
                    break;
                }
            }
        }
        compacted
    }

    /// `/new`: finalise the active session (summarise the remaining
    /// tail, patch the profile), archive it, and open a fresh one.
    pub async fn rotate(&self, window: &mut ContextWindow) -> Result<i64, Error> {
        if let Some(session) = self.store.active_session().await? {
            if !window.is_empty() {
                let remaining: Vec<_> = window.tail().to_vec();
                if let Err(e) = self.summarizer.summarize(session.session_id, &remaining).await
                {
                    warn!(
                        session_id = session.session_id,
                        error = %e,
                        kind = e.kind(),
                        "final summary failed, archiving anyway"
                    );
                }
            }
            self.store
                .archive_session(session.session_id, now_ts())
                .await?;
            info!(session_id = session.session_id, "session finalised");
        }

        window.clear();
        let session_id = self.store.create_session(now_ts()).await?;
        self.active_session.store(session_id, Ordering::SeqCst);
        info!(session_id, "new session after /new");
        Ok(session_id)
    }

    /// `/reset`: hard-delete the active session and open a fresh one.
    pub async fn reset(&self, window: &mut ContextWindow) -> Result<i64, Error> {
        if let Some(session) = self.store.active_session().await? {
            self.store.delete_session(session.session_id).await?;
            info!(session_id = session.session_id, "session discarded");
        }

        window.clear();
        let session_id = self.store.create_session(now_ts()).await?;
        self.active_session.store(session_id, Ordering::SeqCst);
        info!(session_id, "new session after /reset");
        Ok(session_id)
    }
}
