//! Payload Extractor: pulls the text delta out of a content event.
//!
//! Backends disagree on where the delta lives, so extraction walks a fixed
//! list of attempts over the parsed value and the first non-empty string
//! wins. Anything that is not JSON, or JSON without any of the known fields,
//! is treated as literal text.

use std::borrow::Cow;

use quill_core::RawFallback;
use serde_json::{Map, Value};

/// One named place a delta may live.
#[derive(Debug, Clone, Copy)]
enum Attempt {
    /// Top-level string field of an object.
    Field(&'static str),
    /// `choices[0].delta.content`
    ChoiceDelta,
    /// `choices[0].message.content`
    ChoiceMessage,
}

const PRECEDENCE: [Attempt; 7] = [
    Attempt::Field("content"),
    Attempt::Field("delta"),
    Attempt::Field("text"),
    Attempt::Field("answer"),
    Attempt::Field("message"),
    Attempt::ChoiceDelta,
    Attempt::ChoiceMessage,
];

/// Shape of a parsed payload as far as extraction is concerned.
enum Payload {
    Object(Map<String, Value>),
    /// Valid JSON that is not an object (array, string, number, …).
    OtherJson,
    Unparseable,
}

impl Payload {
    fn parse(raw: &str) -> Self {
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => Payload::Object(map),
            Ok(_) => Payload::OtherJson,
            Err(_) => Payload::Unparseable,
        }
    }
}

impl Attempt {
    fn apply<'a>(&self, object: &'a Map<String, Value>) -> Option<&'a str> {
        let found = match self {
            Attempt::Field(name) => object.get(*name)?.as_str(),
            Attempt::ChoiceDelta => first_choice(object)?
                .get("delta")?
                .get("content")?
                .as_str(),
            Attempt::ChoiceMessage => first_choice(object)?
                .get("message")?
                .get("content")?
                .as_str(),
        }?;
        (!found.is_empty()).then_some(found)
    }
}

fn first_choice(object: &Map<String, Value>) -> Option<&Value> {
    object.get("choices")?.as_array()?.first()
}

/// Extracts deltas from raw event data.
#[derive(Debug, Clone, Copy, Default)]
pub struct Extractor {
    fallback: RawFallback,
}

impl Extractor {
    pub fn new(fallback: RawFallback) -> Self {
        Self { fallback }
    }

    /// Extract the delta from `raw`. In plain mode no parsing is attempted.
    ///
    /// The result may be empty; an empty delta contributes nothing.
    pub fn extract<'a>(&self, raw: &'a str, plain: bool) -> Cow<'a, str> {
        if plain {
            return Cow::Borrowed(raw);
        }

        match Payload::parse(raw) {
            Payload::Object(object) => {
                if let Some(text) = PRECEDENCE.iter().find_map(|a| a.apply(&object)) {
                    return Cow::Owned(text.to_string());
                }
                match self.fallback {
                    RawFallback::Always => Cow::Borrowed(raw),
                    RawFallback::UnparseableOnly => Cow::Borrowed(""),
                }
            }
            Payload::OtherJson => match self.fallback {
                RawFallback::Always => Cow::Borrowed(raw),
                RawFallback::UnparseableOnly => Cow::Borrowed(""),
            },
            Payload::Unparseable => Cow::Borrowed(raw),
        }
    }
}

/// Extract with the default fallback (raw text whenever no field matches).
pub fn extract(raw: &str, plain: bool) -> Cow<'_, str> {
    Extractor::default().extract(raw, plain)
}
