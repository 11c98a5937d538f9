//! Canned replies that need no text generation.

use crate::language::Language;
use crate::schedule::ScheduleLookup;

/// How many tests the offline answer lists.
pub const FALLBACK_TEST_COUNT: usize = 3;

/// Prompt asking the caller for her pregnancy week.
pub fn ask_for_week(language: Language) -> &'static str {
    match language {
        Language::Hindi => {
            "आप गर्भावस्था के कितने सप्ताह में हैं? यह जानकर मैं आपको सही जानकारी दे सकूंगी।"
        }
        Language::English => {
            "To help you better, could you tell me how many weeks pregnant you are?"
        }
    }
}

/// Deterministic answer listing the first tests of the trimester.
///
/// Table order is priority order, so the first entries are the ones that
/// matter most.
pub fn fallback_reply(lookup: &ScheduleLookup, language: Language) -> String {
    let hindi = language == Language::Hindi;
    let mut lines = Vec::with_capacity(FALLBACK_TEST_COUNT + 1);
    lines.push(if hindi {
        format!("आपके लिए {} महत्वपूर्ण परीक्षण हैं:", lookup.tests.len())
    } else {
        "Here are the important tests for you:".to_string()
    });
    for (i, test) in lookup.tests.iter().take(FALLBACK_TEST_COUNT).enumerate() {
        lines.push(format!(
            "{}. {} - {}",
            i + 1,
            test.localized_name(hindi),
            test.localized_timing(hindi)
        ));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::tests_for;

    #[test]
    fn english_fallback_lists_top_three() {
        let reply = fallback_reply(&tests_for(10), Language::English);
        let lines: Vec<&str> = reply.lines().collect();
        assert_eq!(
            lines,
            vec![
                "Here are the important tests for you:",
                "1. Blood Pressure - First visit (before 12 weeks)",
                "2. Blood Group & Rh Factor - First visit",
                "3. Hemoglobin (Anemia Test) - First visit",
            ]
        );
    }

    #[test]
    fn hindi_fallback_is_devanagari_only() {
        let reply = fallback_reply(&tests_for(20), Language::Hindi);
        assert!(reply.starts_with("आपके लिए 5 महत्वपूर्ण परीक्षण हैं:"));
        assert!(reply.contains("1. अल्ट्रासाउंड जांच - 18-22 सप्ताह"));
        assert!(reply.contains("2. ग्लूकोज सहनशीलता परीक्षण - 24-28 सप्ताह"));
        assert!(reply.contains("3. रक्तचाप जांच"));
        assert!(
            !reply.chars().any(|c| c.is_ascii_alphabetic()),
            "hindi fallback contains latin letters: {reply}"
        );
    }

    #[test]
    fn ask_for_week_is_localized() {
        assert!(ask_for_week(Language::English).contains("how many weeks pregnant"));
        assert!(ask_for_week(Language::Hindi).contains("सप्ताह"));
    }
}
