// SPDX-FileCopyrightText: 2026 Mnemos Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory context window over the active session.
//!
//! Holds the unsummarized tail of turns plus the most recent summaries.
//! Summarised turns stay in the store (they remain retrievable) but are
//! excluded from the prompt tail.

use mnemos_core::types::Turn;

/// A summary kept in the window, by id so retrieval can exclude it.
#[derive(Debug, Clone)]
pub struct WindowSummary {
    pub summary_id: i64,
    pub text: String,
}

/// The live turn buffer and recent-summary list for the active session.
#[derive(Debug)]
pub struct ContextWindow {
    /// Compaction fires when the unsummarized tail reaches this length.
    trigger: usize,
    /// Number of turns left in the tail after compaction.
    keep_min: usize,
    /// Upper bound on retained recent summaries.
    max_summaries: usize,
    turns: Vec<Turn>,
    summaries: Vec<WindowSummary>,
}

impl ContextWindow {
    pub fn new(keep_min: usize, trigger: usize, max_summaries: usize) -> ContextWindow {
        debug_assert!(keep_min < trigger);
        ContextWindow {
            trigger,
            keep_min,
            max_summaries,
            turns: Vec::new(),
            summaries: Vec::new(),
        }
    }

    /// Append a persisted turn to the tail.
    pub fn push_turn(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// Record a summary; the oldest entry falls off past the limit.
    pub fn push_summary(&mut self, summary_id: i64, text: impl Into<String>) {
        self.summaries.push(WindowSummary {
            summary_id,
            text: text.into(),
        });
        if self.summaries.len() > self.max_summaries {
            let excess = self.summaries.len() - self.max_summaries;
            self.summaries.drain(..excess);
        }
    }

    /// True when the tail has reached the compaction trigger.
    pub fn needs_compaction(&self) -> bool {
        self.turns.len() >= self.trigger
    }

    /// Number of turns that a compaction would summarise right now
    /// (`len - keep_min`, zero below the trigger).
    pub fn compaction_batch_len(&self) -> usize {
        if self.needs_compaction() {
            self.turns.len() - self.keep_min
        } else {
            0
        }
    }

    /// The oldest `n` turns, without removing them.
    pub fn oldest(&self, n: usize) -> &[Turn] {
        &self.turns[..n.min(self.turns.len())]
    }

    /// Drop the oldest `n` turns after they have been summarised.
    pub fn drop_oldest(&mut self, n: usize) {
        let n = n.min(self.turns.len());
        self.turns.drain(..n);
    }

    /// The current prompt tail (all unsummarized turns).
    pub fn tail(&self) -> &[Turn] {
        &self.turns
    }

    /// Text of the most recent assistant turn in the tail, if any.
    pub fn last_assistant_text(&self) -> Option<&str> {
        self.turns
            .iter()
            .rev()
            .find(|t| t.role == mnemos_core::types::Role::Assistant)
            .map(|t| t.text.as_str())
    }

    /// Recent summaries, oldest first.
    pub fn recent_summaries(&self) -> &[WindowSummary] {
        &self.summaries
    }

    /// Ids of the recent summaries, for retrieval exclusion.
    pub fn recent_summary_ids(&self) -> Vec<i64> {
        self.summaries.iter().map(|s| s.summary_id).collect()
    }

    /// Reset for a new session.
    pub fn clear(&mut self) {
        self.turns.clear();
        self.summaries.clear();
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}
