// SPDX-FileCopyrightText: 2026 Mnemos Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deterministic prompt assembly.
//!
//! The transcript order is fixed: one large system block (persona
//! instructions, the profile document verbatim, recent summaries),
//! then the conversation tail between markers, then retrieved memories,
//! a current-time line, and finally the emphasised current request.
//! The profile comes from the in-memory snapshot, never from disk.

use chrono_tz::Tz;

use mnemos_core::chat::{ChatMessage, ChatRequest, ChatRole, ToolSpec};
use mnemos_core::time::current_time_str;
use mnemos_core::types::{Role, Turn};
use mnemos_memory::RetrievedMemories;
use mnemos_profile::ProfileDocument;

/// What the model is being asked to respond to.
#[derive(Debug, Clone, Copy)]
pub enum CurrentRequest<'a> {
    /// A message typed by the user.
    User(&'a str),
    /// A scheduler-synthesised briefing; never persisted as a turn.
    Scheduled(&'a str),
}

/// Stateless builder of provider requests.
pub struct PromptAssembler {
    chat_model: String,
    tz: Tz,
}

impl PromptAssembler {
    pub fn new(chat_model: impl Into<String>, tz: Tz) -> PromptAssembler {
        PromptAssembler {
            chat_model: chat_model.into(),
            tz,
        }
    }

    /// Compose the ordered transcript for one chat-model call.
    pub fn assemble(
        &self,
        profile: &ProfileDocument,
        recent_summaries: &[String],
        retrieved: &RetrievedMemories,
        history: &[Turn],
        request: CurrentRequest<'_>,
        tools: Vec<ToolSpec>,
    ) -> ChatRequest {
        let mut messages = Vec::new();

        messages.push(ChatMessage::system(self.system_block(
            profile,
            recent_summaries,
        )));

        if !history.is_empty() {
            messages.push(ChatMessage::system("BEGINNING OF THE CURRENT CONVERSATION."));
            for turn in history {
                let role = match turn.role {
                    Role::User => ChatRole::User,
                    Role::Assistant => ChatRole::Assistant,
                };
                messages.push(ChatMessage {
                    role,
                    content: turn.text.clone(),
                    tool_calls: Vec::new(),
                    tool_call_id: None,
                });
            }
            messages.push(ChatMessage::system("END OF THE CURRENT CONVERSATION."));
        }

        if !retrieved.summaries.is_empty() {
            messages.push(ChatMessage::system(format!(
                "## Related Historical Summaries\n\n{}",
                retrieved.summary_lines().join("\n\n")
            )));
        }
        if !retrieved.turns.is_empty() {
            messages.push(ChatMessage::system(format!(
                "## Related Historical Conversations\n\n{}",
                retrieved.turn_lines().join("\n\n")
            )));
        }

        messages.push(ChatMessage::system(format!(
            "END OF ALL CONTEXT.\n\n**Current Time**: {}",
            current_time_str(self.tz)
        )));

        let content = match request {
            CurrentRequest::User(text) => format!(
                "Please respond to the above request based on all context \
                 provided.\n\n[Current Request]\n{text}"
            ),
            CurrentRequest::Scheduled(prompt) => prompt.to_string(),
        };
        messages.push(ChatMessage::user(content));

        ChatRequest {
            model: self.chat_model.clone(),
            messages,
            tools,
        }
    }

    /// The cache-friendly leading system block: persona instructions,
    /// the profile document verbatim, and the recent summaries.
    fn system_block(&self, profile: &ProfileDocument, recent_summaries: &[String]) -> String {
        let bot_name = non_empty(&profile.bot.name, "the assistant");
        let user_name = non_empty(&profile.user.name, "the user");

        let mut block = format!(
            "You are \"{bot_name}\", an AI companion with long-term memory and a \
             distinct personality, conversing with \"{user_name}\".\n\
             \n\
             ## Core Instructions\n\
             \n\
             1. Stay in character: follow the personality, language style, and \
             preferences described in your profile document below; never hint \
             that you are reading a profile.\n\
             2. Keep replies conversational and brief; avoid the generic \
             assistant tone.\n\
             3. Treat \"Related Historical Summaries\" and \"Related Historical \
             Conversations\" as reliable memories; reference them when they \
             bear on the current topic.\n\
             4. Use the available tools when the request clearly calls for \
             them (recalling past conversations, managing reminders); wait for \
             tool results before answering.\n\
             \n\
             ## Profile Document\n\
             \n\
             The authoritative description of you and of {user_name}:\n\
             \n\
             <profile>\n{profile_json}\n</profile>\n",
            profile_json = profile.to_pretty_json()
        );

        if !recent_summaries.is_empty() {
            block.push_str("\n## Recent Conversation Summaries\n\n");
            for (i, summary) in recent_summaries.iter().enumerate() {
                block.push_str(&format!("**Summary {}:**\n{summary}\n\n", i + 1));
            }
        }
        block
    }
}

fn non_empty<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.trim().is_empty() {
        fallback
    } else {
        value
    }
}
