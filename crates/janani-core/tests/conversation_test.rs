//! Multi-turn conversations through the context store and the screening
//! handler, with the text generator scripted.

use std::time::Duration;

use janani_core::context::{ContextPatch, ContextStore, MessageRole};
use janani_core::llm::GenerationError;
use janani_core::screening::{ReplySource, extract_week};
use janani_core::{Language, Trimester, tests_for};

use janani_test_utils::{ScriptedGenerator, memory_store, screening_with};

/// One chat turn the way the HTTP layer runs it.
async fn turn(
    store: &dyn ContextStore,
    screening: &janani_core::TestScreening,
    user: &str,
    message: &str,
    patch: ContextPatch,
) -> janani_core::Reply {
    let mut ctx = store.lease(user).await;
    ctx.apply(&patch);
    if ctx.pregnancy_week.is_none() {
        if let Some(week) = extract_week(message) {
            ctx.set_week(week);
        }
    }
    let snapshot = ctx.snapshot();
    let reply = screening.handle(message, &snapshot).await;
    ctx.push_message(MessageRole::User, message);
    ctx.push_message(MessageRole::Assistant, reply.text.clone());
    reply
}

#[tokio::test]
async fn asks_for_week_then_answers() {
    let store = memory_store();
    let generator = ScriptedGenerator::replying("You need your anomaly scan.");
    let screening = screening_with(generator.clone());

    let first = turn(&*store, &screening, "asha", "What tests do I need?", ContextPatch::default()).await;
    assert_eq!(first.source, ReplySource::AskedForWeek);
    assert_eq!(generator.call_count(), 0);

    let second = turn(&*store, &screening, "asha", "I am 20 weeks", ContextPatch::default()).await;
    assert_eq!(second.source, ReplySource::Generated);
    assert_eq!(second.text, "You need your anomaly scan.");

    let ctx = store.get("asha").await.expect("context kept between turns");
    assert_eq!(ctx.pregnancy_week, Some(20));
    assert_eq!(ctx.history.len(), 4);
}

#[tokio::test]
async fn prompt_carries_the_weeks_tests_and_name() {
    let store = memory_store();
    let generator = ScriptedGenerator::replying("ok");
    let screening = screening_with(generator.clone());

    let patch = ContextPatch {
        pregnancy_week: Some(30),
        name: Some("Priya".to_string()),
        ..Default::default()
    };
    turn(&*store, &screening, "priya", "Which tests now?", patch).await;

    let calls = generator.calls();
    assert_eq!(calls.len(), 1);
    let prompt = &calls[0].prompt;
    assert!(prompt.contains("(name: Priya) is 30 weeks pregnant"));
    assert!(prompt.contains("She asked: \"Which tests now?\""));
    for test in tests_for(30).tests {
        assert!(prompt.contains(&format!("Test: {}", test.name)), "missing {}", test.name);
    }
    assert!(calls[0].system.contains("Answer language: english"));
}

#[tokio::test]
async fn explicit_week_overrides_spoken_week() {
    let store = memory_store();
    let generator = ScriptedGenerator::replying("ok");
    let screening = screening_with(generator.clone());

    let patch = ContextPatch {
        pregnancy_week: Some(10),
        ..Default::default()
    };
    turn(&*store, &screening, "u", "I am 30 weeks", patch).await;

    assert_eq!(store.get("u").await.and_then(|c| c.pregnancy_week), Some(10));
    let prompt = generator.last_prompt().expect("generator called");
    assert!(prompt.contains("is 10 weeks pregnant"));
}

#[tokio::test]
async fn failing_generator_falls_back_in_callers_language() {
    let store = memory_store();
    let generator = ScriptedGenerator::failing(GenerationError::Status {
        status: 529,
        message: "overloaded".to_string(),
    });
    let screening = screening_with(generator);

    let patch = ContextPatch {
        pregnancy_week: Some(16),
        language: Some(Language::Hindi),
        ..Default::default()
    };
    let reply = turn(&*store, &screening, "u", "कौन से परीक्षण?", patch).await;

    assert_eq!(reply.source, ReplySource::Fallback);
    assert!(reply.text.starts_with("आपके लिए"));
    assert_eq!(reply.text.lines().count(), 4);
}

#[tokio::test]
async fn recovers_after_a_failed_turn() {
    let store = memory_store();
    let generator = ScriptedGenerator::sequence([
        Err(GenerationError::Timeout),
        Ok("Second answer.".to_string()),
    ]);
    let screening = screening_with(generator.clone());
    let patch = || ContextPatch {
        pregnancy_week: Some(8),
        ..Default::default()
    };

    let first = turn(&*store, &screening, "u", "tests?", patch()).await;
    let second = turn(&*store, &screening, "u", "and now?", patch()).await;

    assert_eq!(first.source, ReplySource::Fallback);
    assert_eq!(second.source, ReplySource::Generated);
    assert_eq!(second.text, "Second answer.");
    assert_eq!(generator.call_count(), 2);
}

#[tokio::test]
async fn callers_do_not_share_context() {
    let store = memory_store();
    let screening = screening_with(ScriptedGenerator::replying("ok"));

    let patch = ContextPatch {
        pregnancy_week: Some(34),
        ..Default::default()
    };
    turn(&*store, &screening, "a", "tests?", patch).await;
    let other = turn(&*store, &screening, "b", "tests?", ContextPatch::default()).await;

    assert_eq!(other.source, ReplySource::AskedForWeek);
    assert_eq!(store.len().await, 2);
}

#[tokio::test(start_paused = true)]
async fn slow_generator_holds_the_callers_lease() {
    let store = memory_store();
    let generator = ScriptedGenerator::stalling("slow", Duration::from_secs(5));
    let screening = screening_with(generator.clone());
    let patch = ContextPatch {
        pregnancy_week: Some(22),
        ..Default::default()
    };

    let (a, b) = tokio::join!(
        turn(&*store, &screening, "u", "first", patch.clone()),
        turn(&*store, &screening, "u", "second", patch.clone()),
    );

    assert_eq!(a.text, "slow");
    assert_eq!(b.text, "slow");
    let ctx = store.get("u").await.expect("context exists");
    let users: Vec<_> = ctx
        .history
        .iter()
        .filter(|m| m.role == MessageRole::User)
        .map(|m| m.text.as_str())
        .collect();
    assert_eq!(users, vec!["first", "second"]);
}

#[test]
fn week_drives_trimester() {
    assert_eq!(tests_for(13).trimester, Trimester::FirstTrimester);
    assert_eq!(tests_for(14).trimester, Trimester::SecondTrimester);
    assert_eq!(tests_for(50).trimester, Trimester::ThirdTrimester);
}
