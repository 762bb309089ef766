// SPDX-FileCopyrightText: 2026 Mnemos Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The profile document shape. Every field defaults to an empty value,
//! so the default document doubles as the first-open template.

use serde::{Deserialize, Serialize};

/// At most this many memorable events are retained; older entries are
/// dropped first when a patch pushes the list over the limit.
pub const MAX_MEMORABLE_EVENTS: usize = 20;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileDocument {
    pub bot: BotProfile,
    pub user: UserProfile,
    pub memorable_events: Vec<MemorableEvent>,
    pub commands_and_agreements: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotProfile {
    pub name: String,
    pub gender: String,
    pub birthday: String,
    pub role: String,
    pub appearance: String,
    pub likes: Vec<String>,
    pub dislikes: Vec<String>,
    pub language_style: LanguageStyle,
    pub personality: Personality,
    pub emotions_and_needs: EmotionsAndNeeds,
    pub relationship_with_user: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserProfile {
    pub name: String,
    pub gender: String,
    pub birthday: String,
    pub personal_facts: Vec<String>,
    pub abilities: Vec<String>,
    pub likes: Vec<String>,
    pub dislikes: Vec<String>,
    pub personality: Personality,
    pub emotions_and_needs: EmotionsAndNeeds,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LanguageStyle {
    pub description: String,
    pub examples: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Personality {
    pub mbti: String,
    pub description: String,
    pub worldview_and_values: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmotionsAndNeeds {
    pub long_term: String,
    pub short_term: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemorableEvent {
    pub time: String,
    pub details: String,
}

impl ProfileDocument {
    /// Pretty JSON rendering, as embedded verbatim in prompts and
    /// written to disk.
    pub fn to_pretty_json(&self) -> String {
        serde_json::to_string_pretty(self).expect("profile document serializes")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_has_empty_fields() {
        let doc = ProfileDocument::default();
        assert_eq!(doc.bot.name, "");
        assert!(doc.user.personal_facts.is_empty());
        assert!(doc.memorable_events.is_empty());
        assert!(doc.commands_and_agreements.is_empty());
    }

    #[test]
    fn json_roundtrip_preserves_document() {
        let mut doc = ProfileDocument::default();
        doc.bot.name = "Mnemo".into();
        doc.user.likes.push("piano".into());
        doc.memorable_events.push(MemorableEvent {
            time: "2026-05-01".into(),
            details: "first conversation".into(),
        });

        let json = doc.to_pretty_json();
        let back: ProfileDocument = serde_json::from_str(&json).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let doc: ProfileDocument =
            serde_json::from_str(r#"{"user": {"name": "Anna"}}"#).unwrap();
        assert_eq!(doc.user.name, "Anna");
        assert_eq!(doc.bot.name, "");
    }
}
