//! The "which tests do I need?" use case.
//!
//! A conversation is in one of two states:
//!
//! ```text
//! AwaitingWeek --(any message that supplies a week)--> Answering { week }
//! ```
//!
//! While awaiting the week, every utterance gets a localized request for it.
//! Once the week is known, the schedule for that week is handed to a
//! [`Generator`] to phrase; if generation fails for any reason the caller
//! still gets a deterministic list of the most important tests.

pub mod fallback;
pub mod prompt;
pub mod week;

use std::sync::Arc;

use serde::Serialize;

use crate::context::ConversationContext;
use crate::llm::Generator;
use crate::schedule::tests_for;

pub use week::extract_week;

/// Where a conversation stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationState {
    AwaitingWeek,
    Answering { week: u32 },
}

impl ConversationState {
    pub fn of(ctx: &ConversationContext) -> Self {
        match ctx.pregnancy_week {
            Some(week) if week > 0 => Self::Answering { week },
            _ => Self::AwaitingWeek,
        }
    }
}

/// How a reply was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplySource {
    /// The week is unknown; the reply asks for it.
    AskedForWeek,
    /// Phrased by the text generator.
    Generated,
    /// The generator failed; the reply is the canned list.
    Fallback,
}

/// Text to send back to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub source: ReplySource,
}

/// Handler for questions about antenatal tests.
pub struct TestScreening {
    generator: Arc<dyn Generator>,
}

impl TestScreening {
    pub fn new(generator: Arc<dyn Generator>) -> Self {
        Self { generator }
    }

    /// Answer one utterance given what is known about the caller.
    ///
    /// Never fails: a generator error is logged and replaced by the
    /// fallback reply.
    pub async fn handle(&self, utterance: &str, ctx: &ConversationContext) -> Reply {
        let week = match ConversationState::of(ctx) {
            ConversationState::AwaitingWeek => {
                return Reply {
                    text: fallback::ask_for_week(ctx.language).to_string(),
                    source: ReplySource::AskedForWeek,
                };
            }
            ConversationState::Answering { week } => week,
        };

        let lookup = tests_for(week);
        let system = prompt::system_prompt(ctx.language);
        let instruction = prompt::turn_prompt(utterance, &ctx.name, &lookup, ctx.language);

        match self.generator.generate(&system, &instruction).await {
            Ok(text) => Reply {
                text,
                source: ReplySource::Generated,
            },
            Err(err) => {
                tracing::warn!(
                    generator = self.generator.name(),
                    kind = err.kind(),
                    error = %err,
                    week,
                    "generation failed, using fallback reply"
                );
                Reply {
                    text: fallback::fallback_reply(&lookup, ctx.language),
                    source: ReplySource::Fallback,
                }
            }
        }
    }
}

impl std::fmt::Debug for TestScreening {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestScreening")
            .field("generator", &self.generator.name())
            .finish()
    }
}
