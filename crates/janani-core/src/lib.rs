//! Core library for janani, an antenatal-care assistant reachable over a
//! JSON chat API and a Twilio voice line.
//!
//! ```text
//! request --> ContextStore::lease(caller) --> ConversationContext
//!                                               |
//!                                               v
//!             schedule::tests_for(week) --> TestScreening::handle --> Generator
//!                                               |                   (or fallback)
//!                                               v
//!                                      Reply --> JSON / VoiceAdapter (TwiML)
//! ```

pub mod config;
pub mod context;
pub mod language;
pub mod llm;
pub mod schedule;
pub mod screening;
pub mod voice;

pub use context::{ChatMessage, ContextPatch, ConversationContext, MessageRole};
pub use language::Language;
pub use schedule::{Trimester, classify, tests_for};
pub use screening::{Reply, ReplySource, TestScreening};
