//! Prompt construction for the test-screening use case.

use crate::language::Language;
use crate::schedule::{ScheduleLookup, TestRecord};

/// Persona and tone rules, sent as the system prompt.
pub fn system_prompt(language: Language) -> String {
    format!(
        "You are a warm, helpful maternal health assistant for pregnant women in India.
You give clear, accurate information about antenatal tests in a caring, reassuring way.

Guidelines:
- Use simple words that are easy to understand
- Be warm and encouraging
- Explain why each test matters, not only what it is
- Address the woman by name when it feels natural
- When answering in Hindi, use simple everyday Hindi
- Keep answers short enough to be spoken aloud (two or three short paragraphs at most)
- Focus on what matters most at her current stage

Answer language: {language}
"
    )
}

/// Per-turn instruction carrying the question and the relevant tests.
pub fn turn_prompt(
    utterance: &str,
    name: &str,
    lookup: &ScheduleLookup,
    language: Language,
) -> String {
    format!(
        "The pregnant woman (name: {name}) is {week} weeks pregnant ({trimester}, weeks {range}).

She asked: \"{question}\"

Recommended tests for her current stage:
{tests}
Write a helpful, natural reply that:
1. Answers her question directly
2. Explains the 2-3 most important tests for her current week
3. Says briefly why each of those tests matters
4. Is warm and reassuring
5. Is written in {language}

Keep it conversational and short enough for a phone call.",
        week = lookup.pregnancy_week,
        trimester = lookup.trimester.label(),
        range = lookup.weeks,
        question = utterance.trim(),
        tests = format_tests(lookup.tests),
    )
}

/// Render the tests as a plain-text block for the model.
pub fn format_tests(tests: &[TestRecord]) -> String {
    let mut lines = Vec::new();
    for test in tests {
        lines.push(String::new());
        lines.push(format!("Test: {}", test.name));
        lines.push(format!("- Timing: {}", test.timing));
        lines.push(format!("- Why: {}", test.why));
        lines.push(format!(
            "- Normal range: {}",
            test.normal_range.as_deref().unwrap_or("N/A")
        ));
        if let Some(preparation) = &test.preparation {
            lines.push(format!("- Preparation: {preparation}"));
        }
        if let Some(hindi) = &test.hindi_name {
            lines.push(format!("- Hindi name: {hindi}"));
        }
    }
    lines.into_iter().map(|line| line + "\n").collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::tests_for;

    #[test]
    fn system_prompt_names_language() {
        assert!(system_prompt(Language::Hindi).contains("Answer language: hindi"));
        assert!(system_prompt(Language::English).contains("Answer language: english"));
    }

    #[test]
    fn turn_prompt_carries_context() {
        let lookup = tests_for(20);
        let prompt = turn_prompt("When is my ultrasound?", "Priya", &lookup, Language::English);
        assert!(prompt.contains("(name: Priya) is 20 weeks pregnant (second trimester, weeks 14-26)"));
        assert!(prompt.contains("She asked: \"When is my ultrasound?\""));
        assert!(prompt.contains("Test: Ultrasound (Anomaly Scan)"));
        assert!(prompt.contains("2-3 most important tests"));
        assert!(prompt.contains("Is written in english"));
    }

    #[test]
    fn format_tests_separates_each_test_by_a_blank_line() {
        let lookup = tests_for(20);
        let block = format_tests(&lookup.tests[..2]);
        assert!(block.starts_with("\nTest: "));
        assert!(block.ends_with('\n'));
        assert_eq!(block.matches("\n\nTest: ").count(), 1);
    }

    #[test]
    fn format_tests_marks_missing_normal_range() {
        let lookup = tests_for(20);
        let block = format_tests(&lookup.tests[..1]);
        assert!(block.contains("- Timing: 18-22 weeks (ideally 20 weeks)"));
        assert!(block.contains("- Normal range: N/A"));
        assert!(block.contains("- Hindi name: अल्ट्रासाउंड जांच"));
    }
}
