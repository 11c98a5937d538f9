//! Voice-call documents for the telephony provider.
//!
//! Each webhook answers with one TwiML document. Over a call the documents
//! move through these stages:
//!
//! ```text
//! Started --(optional)--> LanguageMenu --digit--> Started
//!    |
//!    v
//! Listening --speech--> Responding --speech--> Listening ...
//!    |  ^                   |
//!    |  +--low confidence---+ (repeat)
//!    v
//!  Ended (goodbye + hangup, or apology + hangup on error)
//! ```
//!
//! Building a document is pure: recognition and synthesis happen at the
//! provider.

pub mod twiml;

use crate::language::Language;

use twiml::{Gather, GatherInput, Say, VoiceResponse};

/// Transcripts below this confidence are treated as not heard.
pub const MIN_SPEECH_CONFIDENCE: f32 = 0.5;

pub const INCOMING_PATH: &str = "/voice/incoming";
pub const PROCESS_PATH: &str = "/voice/process";
pub const SET_LANGUAGE_PATH: &str = "/voice/set-language";
pub const CONTINUE_PATH: &str = "/voice/continue";

/// Words the recognizer should expect.
const SPEECH_HINTS: &str = "pregnancy, tests, ultrasound, blood test, ANC, antenatal";

const REPLY_VOICE: &str = "Polly.Aditi";

/// What to do with one recognized utterance.
#[derive(Debug, Clone, PartialEq)]
pub enum CallTurn {
    /// Nothing usable was heard; ask again.
    Repeat,
    /// Hand the transcript to the use case.
    Answer(String),
}

impl CallTurn {
    /// A missing confidence counts as zero.
    pub fn classify(transcript: Option<&str>, confidence: Option<f32>) -> Self {
        let transcript = transcript.map(str::trim).unwrap_or_default();
        let confidence = confidence.unwrap_or(0.0);
        if transcript.is_empty() || confidence < MIN_SPEECH_CONFIDENCE {
            Self::Repeat
        } else {
            Self::Answer(transcript.to_string())
        }
    }
}

/// Builds the documents for each stage of a call.
#[derive(Debug, Clone, Copy, Default)]
pub struct VoiceAdapter;

impl VoiceAdapter {
    pub fn new() -> Self {
        Self
    }

    fn say(text: &str, language: Language) -> Say {
        Say::new(text).language(language.voice_locale())
    }

    fn listen(language: Language) -> Gather {
        Gather::new(GatherInput::Speech, PROCESS_PATH)
            .language(language.voice_locale())
            .speech_timeout("auto")
    }

    /// Started: greet the caller and listen for a question.
    pub fn welcome(&self, language: Language) -> VoiceResponse {
        let (greeting, nothing_heard) = match language {
            Language::Hindi => (
                "स्वागत है। मैं आपकी गर्भावस्था स्वास्थ्य सहायक हूं। \
                 मैं आपको एएनसी परीक्षणों और स्वास्थ्य जानकारी के बारे में बता सकती हूं। \
                 कृपया अपना सवाल पूछें।",
                "मुझे कुछ सुनाई नहीं दिया। कृपया फिर से कॉल करें।",
            ),
            Language::English => (
                "Welcome to Maternal Health Support. \
                 I can help you with information about pregnancy tests and antenatal care. \
                 Please ask your question after the beep.",
                "I didn't hear anything. Please call back.",
            ),
        };
        VoiceResponse::new()
            .gather(
                Self::listen(language)
                    .hints(SPEECH_HINTS)
                    .say(Self::say(greeting, language)),
            )
            .say(Self::say(nothing_heard, language))
            .redirect(CONTINUE_PATH)
    }

    /// LanguageMenu: one keypress picks English or Hindi.
    pub fn language_menu(&self) -> VoiceResponse {
        let english = Language::English;
        VoiceResponse::new()
            .gather(
                Gather::new(GatherInput::Dtmf, SET_LANGUAGE_PATH)
                    .num_digits(1)
                    .timeout(5)
                    .say(Self::say(
                        "Press 1 for English. Press 2 for Hindi. \
                         अंग्रेजी के लिए 1 दबाएं। हिंदी के लिए 2 दबाएं।",
                        english,
                    )),
            )
            .say(Self::say("Continuing in English.", english))
            .redirect(incoming_url(english))
    }

    /// Restart the call in the chosen language.
    pub fn language_selected(&self, language: Language) -> VoiceResponse {
        VoiceResponse::new().redirect(incoming_url(language))
    }

    /// Listening: the last utterance was not understood.
    pub fn ask_to_repeat(&self, language: Language) -> VoiceResponse {
        let prompt = match language {
            Language::Hindi => "मुझे सुनाई नहीं दिया। कृपया दोबारा कहें।",
            Language::English => "I'm sorry, I didn't catch that. Please repeat your question.",
        };
        VoiceResponse::new()
            .gather(Self::listen(language).say(Self::say(prompt, language)))
            .redirect(CONTINUE_PATH)
    }

    /// Responding: speak the answer, then offer another question.
    pub fn speak_reply(&self, reply: &str, language: Language) -> VoiceResponse {
        let follow_up = match language {
            Language::Hindi => "क्या आपका कोई और सवाल है?",
            Language::English => "Do you have another question?",
        };
        VoiceResponse::new()
            .say(Self::say(reply, language).voice(REPLY_VOICE))
            .gather(Self::listen(language).say(Self::say(follow_up, language)))
            .redirect(CONTINUE_PATH)
    }

    /// Ended: thank the caller and hang up.
    pub fn goodbye(&self, language: Language) -> VoiceResponse {
        let text = match language {
            Language::Hindi => "धन्यवाद। अलविदा।",
            Language::English => "Thank you for calling. Goodbye!",
        };
        VoiceResponse::new().say(Self::say(text, language)).hangup()
    }

    /// Something went wrong building a reply; apologize and hang up.
    pub fn apology(&self, language: Language) -> VoiceResponse {
        let text = match language {
            Language::Hindi => "क्षमा करें, कुछ गलत हो गया। कृपया बाद में फिर से कॉल करें।",
            Language::English => "I'm sorry, something went wrong. Please try calling again later.",
        };
        VoiceResponse::new().say(Self::say(text, language)).hangup()
    }
}

fn incoming_url(language: Language) -> String {
    format!("{INCOMING_PATH}?language={language}")
}
