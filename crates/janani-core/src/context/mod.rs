//! Per-caller conversational state.
//!
//! A [`ConversationContext`] is created on first contact (a chat request or
//! the start of a call) and updated in place on every turn. Storage and
//! per-caller locking live in [`store`].

pub mod store;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::language::Language;

pub use store::{ContextLease, ContextStore, InMemoryContextStore};

/// Name used when the caller has not given one.
pub const DEFAULT_NAME: &str = "there";

/// Who said a message in a call transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
}

/// One turn of a voice call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub text: String,
    pub at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(role: MessageRole, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            at: Utc::now(),
        }
    }
}

/// Everything known about one caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationContext {
    /// Current week of pregnancy, once the caller has told us.
    pub pregnancy_week: Option<u32>,
    pub language: Language,
    pub name: String,
    /// Ordered transcript. Only voice calls record one.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<ChatMessage>,
}

impl Default for ConversationContext {
    fn default() -> Self {
        Self {
            pregnancy_week: None,
            language: Language::default(),
            name: DEFAULT_NAME.to_string(),
            history: Vec::new(),
        }
    }
}

impl ConversationContext {
    /// Merge the fields present in `patch`, leaving the rest untouched.
    pub fn apply(&mut self, patch: &ContextPatch) {
        if let Some(week) = patch.pregnancy_week {
            self.set_week(week);
        }
        if let Some(language) = patch.language {
            self.language = language;
        }
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
    }

    /// Record the pregnancy week. Week 0 means "not known yet".
    pub fn set_week(&mut self, week: u32) {
        self.pregnancy_week = (week > 0).then_some(week);
    }

    pub fn push_message(&mut self, role: MessageRole, text: impl Into<String>) {
        self.history.push(ChatMessage::new(role, text));
    }
}

/// A partial update to a [`ConversationContext`].
///
/// Every field is optional; absent fields are left as they are.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContextPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pregnancy_week: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<Language>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ContextPatch {
    pub fn is_empty(&self) -> bool {
        self.pregnancy_week.is_none() && self.language.is_none() && self.name.is_none()
    }
}
