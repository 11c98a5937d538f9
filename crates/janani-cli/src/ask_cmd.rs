//! `janani ask` command: answer one question locally, without the server.

use anyhow::{Context, Result};

use janani_core::context::{ContextPatch, ConversationContext};
use janani_core::language::Language;
use janani_core::llm;
use janani_core::screening::{Reply, ReplySource, TestScreening, extract_week};

use crate::config::JananiConfig;

/// Options for a one-off question.
#[derive(Debug, Clone, Default)]
pub struct AskOptions {
    pub week: Option<u32>,
    pub language: Option<Language>,
    pub name: Option<String>,
}

/// Build the caller context the way a first chat turn would.
pub fn context_for(question: &str, options: &AskOptions) -> ConversationContext {
    let mut ctx = ConversationContext::default();
    ctx.apply(&ContextPatch {
        pregnancy_week: options.week,
        language: options.language,
        name: options.name.clone(),
    });
    if ctx.pregnancy_week.is_none() {
        if let Some(week) = extract_week(question) {
            ctx.set_week(week);
        }
    }
    ctx
}

pub async fn ask(screening: &TestScreening, question: &str, options: &AskOptions) -> Reply {
    let ctx = context_for(question, options);
    screening.handle(question, &ctx).await
}

/// Run the ask command.
pub async fn run_ask(config: &JananiConfig, question: &str, options: &AskOptions) -> Result<()> {
    let generator = llm::from_config(&config.llm).context("failed to set up text generation")?;
    let screening = TestScreening::new(generator);

    let reply = ask(&screening, question, options).await;
    println!("{}", reply.text);
    if reply.source == ReplySource::Fallback {
        eprintln!();
        eprintln!("(offline answer: text generation was unavailable)");
    }
    Ok(())
}
