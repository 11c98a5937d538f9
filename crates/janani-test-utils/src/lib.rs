//! Shared test doubles for janani integration tests.
//!
//! [`ScriptedGenerator`] stands in for the hosted text-generation API. It
//! answers from a queue of canned results, records every prompt it was
//! given, and can be told to stall so timeout paths can be exercised
//! without a network.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use janani_core::context::{ContextStore, InMemoryContextStore};
use janani_core::llm::{GenerationError, Generator};
use janani_core::screening::TestScreening;

/// One recorded call to [`ScriptedGenerator::generate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub system: String,
    pub prompt: String,
}

#[derive(Debug, Default)]
struct Script {
    queue: VecDeque<Result<String, GenerationError>>,
    /// Returned once the queue is empty.
    default: Option<Result<String, GenerationError>>,
    calls: Vec<RecordedCall>,
}

/// A [`Generator`] that replays canned results.
#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    script: Mutex<Script>,
    delay: Option<Duration>,
}

impl ScriptedGenerator {
    /// Always answer with `text`.
    pub fn replying(text: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(Script {
                default: Some(Ok(text.into())),
                ..Default::default()
            }),
            delay: None,
        })
    }

    /// Always fail with `err`.
    pub fn failing(err: GenerationError) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(Script {
                default: Some(Err(err)),
                ..Default::default()
            }),
            delay: None,
        })
    }

    /// Answer with each result in turn, then fail with `EmptyResponse`.
    pub fn sequence(results: impl IntoIterator<Item = Result<String, GenerationError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(Script {
                queue: results.into_iter().collect(),
                ..Default::default()
            }),
            delay: None,
        })
    }

    /// Wait `delay` before every answer.
    pub fn stalling(text: impl Into<String>, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(Script {
                default: Some(Ok(text.into())),
                ..Default::default()
            }),
            delay: Some(delay),
        })
    }

    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.lock().calls.clone()
    }

    /// Prompt of the most recent call, if any.
    pub fn last_prompt(&self) -> Option<String> {
        self.lock().calls.last().map(|c| c.prompt.clone())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().expect("script lock poisoned")
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, system: &str, prompt: &str) -> Result<String, GenerationError> {
        let result = {
            let mut script = self.lock();
            script.calls.push(RecordedCall {
                system: system.to_string(),
                prompt: prompt.to_string(),
            });
            script
                .queue
                .pop_front()
                .or_else(|| script.default.clone())
                .unwrap_or(Err(GenerationError::EmptyResponse))
        };
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        result
    }
}

/// A [`TestScreening`] over `generator`.
pub fn screening_with(generator: Arc<ScriptedGenerator>) -> Arc<TestScreening> {
    Arc::new(TestScreening::new(generator))
}

/// A fresh context store with default settings.
pub fn memory_store() -> Arc<dyn ContextStore> {
    Arc::new(InMemoryContextStore::default())
}
