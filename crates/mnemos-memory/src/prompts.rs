// SPDX-FileCopyrightText: 2026 Mnemos Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prompt construction for the summariser's tool-model call.

use mnemos_core::types::Turn;

/// System prompt for the combined summary + profile-patch call.
pub const SUMMARIZER_SYSTEM_PROMPT: &str = "\
You are the memory curator for a conversational agent. You condense \
conversation slices into independent summaries and maintain the agent's \
long-term profile document via JSON Patch.";

/// Build the user prompt asking for both artefacts in one strict JSON
/// object. Each summary is independent: it covers only the turns shown
/// and is retrieved later by relevance, not in sequence.
pub fn summarize_prompt(turns: &[Turn], profile_json: &str, time_range: &str) -> String {
    let conversation: String = turns
        .iter()
        .map(|t| format!("{}: {}", t.role, t.text))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Condense the conversation below and derive profile updates.\n\
         \n\
         TIME CONTEXT: these turns occurred {time_range}.\n\
         \n\
         Requirements for \"summary\":\n\
         - Cover ONLY the turns shown here; this summary is stored \
         independently and retrieved by relevance later.\n\
         - At most 300 words, third person, chronological, noting \
         events, emotions, and attitudes.\n\
         - Write in the same language as the conversation.\n\
         \n\
         Requirements for \"patch\" (RFC 6902 JSON Patch array against \
         the profile document below):\n\
         - Only record meaningful changes; keep stable traits stable.\n\
         - Use \"add\" with path suffix \"/-\" to append to arrays, \
         \"replace\" for updated fields, \"remove\" for outdated facts.\n\
         - memorable_events holds at most 20 entries; remove older ones \
         before adding past the limit.\n\
         - Use an empty array when nothing changed.\n\
         \n\
         OUTPUT FORMAT: a single JSON object, no markdown fences, no \
         commentary:\n\
         {{\"summary\": \"...\", \"patch\": [ ... ]}}\n\
         \n\
         CURRENT PROFILE DOCUMENT:\n\
         {profile_json}\n\
         \n\
         CONVERSATION TO CONDENSE:\n\
         {conversation}\n"
    )
}

/// Strip markdown fences and surrounding chatter from a model response
/// that should have been a bare JSON object.
pub fn clean_json_response(response: &str) -> &str {
    let mut text = response.trim();
    if let Some(start) = text.find("```") {
        let after = &text[start + 3..];
        let after = after.strip_prefix("json").unwrap_or(after);
        if let Some(end) = after.find("```") {
            text = &after[..end];
        } else {
            text = after;
        }
        text = text.trim();
    }
    let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) else {
        return text;
    };
    if end > start {
        &text[start..=end]
    } else {
        text
    }
}
