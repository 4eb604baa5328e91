//! Trigger-event dispatch.
//!
//! A [`Transformer`] turns one kind of HL7 v2 message into normalized
//! records. Transformers are bound to a [`TriggerEvent`] code in a
//! [`TransformerRegistry`], which picks the handler for an incoming message.

pub mod registry;
pub mod v2_to_fhir;

use std::fmt;
use std::str::FromStr;

use crate::extraction::read_message_type;
use crate::hl7::Message;
use crate::resources::Resource;

pub use registry::{RegistryError, TransformerRegistry};

/// Two-part message code taken from MSH-9, e.g. `ADT^A01`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TriggerEvent {
    pub category: String,
    pub event: String,
}

impl TriggerEvent {
    pub fn new(category: impl Into<String>, event: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            event: event.into(),
        }
    }

    /// Read a trigger from header text, tolerating whitespace, non-ASCII
    /// noise and a trailing message-structure component
    /// (`ORU^R01^ORU_R01` reads as `ORU^R01`).
    pub fn from_header_text(text: &str) -> Option<Self> {
        let ascii: String = text.chars().filter(char::is_ascii).collect();
        let mut parts = ascii.trim().split('^').map(str::trim);
        let category = parts.next().filter(|s| !s.is_empty())?;
        let event = parts.next().filter(|s| !s.is_empty())?;
        Some(Self::new(category, event))
    }

    /// Same as [`TriggerEvent::from_header_text`] for undecoded bytes;
    /// non-ASCII bytes are dropped.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let text: String = bytes
            .iter()
            .filter(|b| b.is_ascii())
            .map(|&b| char::from(b))
            .collect();
        Self::from_header_text(&text)
    }
}

impl fmt::Display for TriggerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}^{}", self.category, self.event)
    }
}

impl FromStr for TriggerEvent {
    type Err = RegistryError;

    /// Strict parse of a registration code: exactly `XXX^YYY`, three
    /// uppercase alphanumerics on each side.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || RegistryError::MalformedCode(s.to_string());
        let (category, event) = s.split_once('^').ok_or_else(malformed)?;
        let valid = |part: &str| {
            part.len() == 3
                && part
                    .chars()
                    .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        };
        if !valid(category) || !valid(event) {
            return Err(malformed());
        }
        Ok(Self::new(category, event))
    }
}

/// A handler for one trigger event
pub trait Transformer: Send + Sync {
    /// The trigger event code this handler is bound to, e.g. `ADT^A01`
    fn event(&self) -> &'static str;

    /// Whether this handler accepts the message.
    ///
    /// The default compares the trimmed MSH-9 text with [`Transformer::event`]
    /// exactly. An unreadable header never applies.
    fn applies(&self, message: &Message) -> bool {
        read_message_type(message)
            .into_option()
            .is_some_and(|text| text.trim() == self.event())
    }

    /// Convert the message. Always yields at least a Patient, first.
    fn transform(&self, message: &Message) -> Vec<Resource>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_from_header_text() {
        let t = TriggerEvent::from_header_text(" ADT^A01^ADT_A01 ").unwrap();
        assert_eq!(t, TriggerEvent::new("ADT", "A01"));
        assert_eq!(t.to_string(), "ADT^A01");

        assert!(TriggerEvent::from_header_text("ADT").is_none());
        assert!(TriggerEvent::from_header_text("^A01").is_none());
        assert!(TriggerEvent::from_header_text("").is_none());
    }

    #[test]
    fn test_trigger_from_bytes_ignores_non_ascii() {
        let bytes = b"\xffORU^R01\xfe\r\n";
        let t = TriggerEvent::from_bytes(bytes).unwrap();
        assert_eq!(t.to_string(), "ORU^R01");
    }

    #[test]
    fn test_strict_parse() {
        assert_eq!(
            "ORM^O01".parse::<TriggerEvent>().unwrap(),
            TriggerEvent::new("ORM", "O01")
        );
        for bad in ["ORM", "ORM^", "orm^o01", "ORMX^O01", "ORM^O01^X", ""] {
            assert!(
                matches!(bad.parse::<TriggerEvent>(), Err(RegistryError::MalformedCode(_))),
                "{bad:?} should be rejected"
            );
        }
    }
}
