//! Minimal TwiML document builder.
//!
//! Covers the verbs the voice line uses: `<Say>`, `<Gather>` (with nested
//! `<Say>`), `<Redirect>` and `<Hangup>`. Attribute order is fixed so
//! rendered documents are stable.

use std::fmt;

/// What a `<Gather>` listens for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatherInput {
    Speech,
    Dtmf,
}

impl GatherInput {
    fn as_str(self) -> &'static str {
        match self {
            Self::Speech => "speech",
            Self::Dtmf => "dtmf",
        }
    }
}

/// A `<Say>` verb.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Say {
    pub text: String,
    pub language: Option<String>,
    pub voice: Option<String>,
}

impl Say {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            language: None,
            voice: None,
        }
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = Some(voice.into());
        self
    }

    fn write_xml(&self, out: &mut String) {
        out.push_str("<Say");
        push_attr(out, "language", self.language.as_deref());
        push_attr(out, "voice", self.voice.as_deref());
        out.push('>');
        out.push_str(&escape(self.text.trim()));
        out.push_str("</Say>");
    }
}

/// A `<Gather>` verb: prompts nested inside it play while input is captured,
/// and the result is POSTed to `action`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gather {
    pub input: GatherInput,
    pub action: String,
    pub method: String,
    pub language: Option<String>,
    pub speech_timeout: Option<String>,
    pub hints: Option<String>,
    pub num_digits: Option<u8>,
    pub timeout: Option<u32>,
    pub prompts: Vec<Say>,
}

impl Gather {
    pub fn new(input: GatherInput, action: impl Into<String>) -> Self {
        Self {
            input,
            action: action.into(),
            method: "POST".to_string(),
            language: None,
            speech_timeout: None,
            hints: None,
            num_digits: None,
            timeout: None,
            prompts: Vec::new(),
        }
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn speech_timeout(mut self, timeout: impl Into<String>) -> Self {
        self.speech_timeout = Some(timeout.into());
        self
    }

    pub fn hints(mut self, hints: impl Into<String>) -> Self {
        self.hints = Some(hints.into());
        self
    }

    pub fn num_digits(mut self, digits: u8) -> Self {
        self.num_digits = Some(digits);
        self
    }

    pub fn timeout(mut self, secs: u32) -> Self {
        self.timeout = Some(secs);
        self
    }

    pub fn say(mut self, say: Say) -> Self {
        self.prompts.push(say);
        self
    }

    fn write_xml(&self, out: &mut String) {
        out.push_str("<Gather");
        push_attr(out, "input", Some(self.input.as_str()));
        push_attr(out, "action", Some(&self.action));
        push_attr(out, "method", Some(&self.method));
        push_attr(out, "language", self.language.as_deref());
        push_attr(out, "speechTimeout", self.speech_timeout.as_deref());
        push_attr(out, "hints", self.hints.as_deref());
        push_attr(out, "numDigits", self.num_digits.map(|d| d.to_string()).as_deref());
        push_attr(out, "timeout", self.timeout.map(|t| t.to_string()).as_deref());
        if self.prompts.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        for say in &self.prompts {
            say.write_xml(out);
        }
        out.push_str("</Gather>");
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Verb {
    Say(Say),
    Gather(Gather),
    Redirect { url: String, method: String },
    Hangup,
}

/// A complete `<Response>` document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoiceResponse {
    verbs: Vec<Verb>,
}

impl VoiceResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn say(mut self, say: Say) -> Self {
        self.verbs.push(Verb::Say(say));
        self
    }

    pub fn gather(mut self, gather: Gather) -> Self {
        self.verbs.push(Verb::Gather(gather));
        self
    }

    pub fn redirect(mut self, url: impl Into<String>) -> Self {
        self.verbs.push(Verb::Redirect {
            url: url.into(),
            method: "POST".to_string(),
        });
        self
    }

    pub fn hangup(mut self) -> Self {
        self.verbs.push(Verb::Hangup);
        self
    }

    /// Render as an XML document.
    pub fn to_xml(&self) -> String {
        let mut out = String::from(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
        if self.verbs.is_empty() {
            out.push_str("<Response/>");
            return out;
        }
        out.push_str("<Response>");
        for verb in &self.verbs {
            match verb {
                Verb::Say(say) => say.write_xml(&mut out),
                Verb::Gather(gather) => gather.write_xml(&mut out),
                Verb::Redirect { url, method } => {
                    out.push_str("<Redirect");
                    push_attr(&mut out, "method", Some(method));
                    out.push('>');
                    out.push_str(&escape(url));
                    out.push_str("</Redirect>");
                }
                Verb::Hangup => out.push_str("<Hangup/>"),
            }
        }
        out.push_str("</Response>");
        out
    }
}

impl fmt::Display for VoiceResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_xml())
    }
}

fn push_attr(out: &mut String, name: &str, value: Option<&str>) {
    if let Some(value) = value {
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        out.push_str(&escape(value));
        out.push('"');
    }
}

/// Escape text for use in XML content and attribute values.
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_response() {
        assert_eq!(
            VoiceResponse::new().to_xml(),
            r#"<?xml version="1.0" encoding="UTF-8"?><Response/>"#
        );
    }

    #[test]
    fn say_and_hangup() {
        let xml = VoiceResponse::new()
            .say(Say::new("  Goodbye.  ").language("en-IN"))
            .hangup()
            .to_xml();
        assert!(xml.ends_with(r#"<Response><Say language="en-IN">Goodbye.</Say><Hangup/></Response>"#));
    }

    #[test]
    fn gather_renders_attributes_in_order() {
        let xml = VoiceResponse::new()
            .gather(
                Gather::new(GatherInput::Dtmf, "/voice/set-language")
                    .num_digits(1)
                    .timeout(5)
                    .say(Say::new("Press 1")),
            )
            .to_xml();
        assert!(xml.contains(
            r#"<Gather input="dtmf" action="/voice/set-language" method="POST" numDigits="1" timeout="5"><Say>Press 1</Say></Gather>"#
        ));
    }

    #[test]
    fn text_and_attributes_are_escaped() {
        let xml = VoiceResponse::new()
            .say(Say::new("Blood Group & Rh <factor>"))
            .redirect("/voice/incoming?language=hindi&x=\"1\"")
            .to_xml();
        assert!(xml.contains("<Say>Blood Group &amp; Rh &lt;factor&gt;</Say>"));
        assert!(xml.contains(
            r#"<Redirect method="POST">/voice/incoming?language=hindi&amp;x=&quot;1&quot;</Redirect>"#
        ));
    }

    #[test]
    fn devanagari_passes_through() {
        let xml = VoiceResponse::new().say(Say::new("धन्यवाद।")).to_xml();
        assert!(xml.contains("<Say>धन्यवाद।</Say>"));
    }
}
