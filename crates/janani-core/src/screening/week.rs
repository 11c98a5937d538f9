//! Reading a pregnancy week out of free text.

/// Largest week accepted from free text. Bigger numbers in a sentence are
/// far more likely to be readings ("120/80") than weeks.
const MAX_SPOKEN_WEEK: u32 = 45;

const WEEK_WORDS: &[&str] = &[
    "week", "weeks", "wk", "wks", "सप्ताह", "हफ्ते", "हफ्ता", "हफ्तों", "हफ़्ते", "हफ़्ता",
];

fn is_week_word(token: &str) -> bool {
    WEEK_WORDS.iter().any(|w| token.starts_with(w))
}

/// Map Devanagari digits to ASCII and split digit runs from letters, so
/// "२०सप्ताह" and "20-weeks" both tokenize as `["20", "<week word>"]`.
fn tokenize(utterance: &str) -> Vec<String> {
    let mut normalized = String::with_capacity(utterance.len());
    let mut prev_digit = None;
    for c in utterance.chars() {
        let c = match c {
            '०'..='९' => char::from(b'0' + (c as u32 - '०' as u32) as u8),
            '।' => ' ',
            c if c.is_ascii_punctuation() => ' ',
            c => c,
        };
        let is_digit = c.is_ascii_digit();
        if !c.is_whitespace() && prev_digit.is_some_and(|d| d != is_digit) {
            normalized.push(' ');
        }
        prev_digit = (!c.is_whitespace()).then_some(is_digit);
        normalized.extend(c.to_lowercase());
    }
    normalized.split_whitespace().map(str::to_owned).collect()
}

/// Find the caller's pregnancy week in what she said.
///
/// Recognizes a number next to a week word ("I am 20 weeks", "week 32",
/// "२४ सप्ताह") or an utterance that is nothing but a number ("24").
/// Returns `None` when no plausible week is present.
pub fn extract_week(utterance: &str) -> Option<u32> {
    let tokens = tokenize(utterance);

    if let [only] = tokens.as_slice() {
        return only
            .parse::<u32>()
            .ok()
            .filter(|w| (1..=MAX_SPOKEN_WEEK).contains(w));
    }

    tokens.iter().enumerate().find_map(|(i, token)| {
        let week = token.parse::<u32>().ok()?;
        let before = i.checked_sub(1).and_then(|j| tokens.get(j));
        let after = tokens.get(i + 1);
        let near_week_word = before.is_some_and(|t| is_week_word(t))
            || after.is_some_and(|t| is_week_word(t));
        (near_week_word && (1..=MAX_SPOKEN_WEEK).contains(&week)).then_some(week)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn english_sentences() {
        assert_eq!(extract_week("I am 20 weeks pregnant"), Some(20));
        assert_eq!(extract_week("I'm in week 32 now."), Some(32));
        assert_eq!(extract_week("about 8wks"), Some(8));
        assert_eq!(extract_week("It's my 14-week checkup"), Some(14));
    }

    #[test]
    fn bare_number() {
        assert_eq!(extract_week("24"), Some(24));
        assert_eq!(extract_week(" 24. "), Some(24));
        assert_eq!(extract_week("0"), None);
        assert_eq!(extract_week("300"), None);
    }

    #[test]
    fn hindi_sentences() {
        assert_eq!(extract_week("मैं २० सप्ताह की गर्भवती हूं"), Some(20));
        assert_eq!(extract_week("26 हफ्ते"), Some(26));
        assert_eq!(extract_week("२४सप्ताह।"), Some(24));
    }

    #[test]
    fn no_week_present() {
        assert_eq!(extract_week("tests"), None);
        assert_eq!(extract_week("What tests do I need?"), None);
        assert_eq!(extract_week("my blood pressure was 120/80"), None);
        assert_eq!(extract_week(""), None);
    }
}
