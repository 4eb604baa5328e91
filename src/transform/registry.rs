//! Registry binding trigger-event codes to transformers.
//!
//! Populated once at start-up and read-only afterwards, so a shared
//! reference can be used from any number of threads.

use std::collections::BTreeMap;
use std::fmt;

use tracing::debug;

use super::{Transformer, TriggerEvent};
use crate::extraction::read_message_type;
use crate::hl7::Message;

/// Error type for registration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// A transformer is already bound to the code
    DuplicateEvent(String),
    /// The code is not of the form `XXX^YYY`
    MalformedCode(String),
    /// The transformer declares a different event than it is registered under
    EventMismatch {
        registered: String,
        declared: String,
    },
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::DuplicateEvent(code) => {
                write!(f, "A transformer is already registered for {}", code)
            }
            RegistryError::MalformedCode(code) => {
                write!(f, "Malformed trigger event code '{}', expected XXX^YYY", code)
            }
            RegistryError::EventMismatch {
                registered,
                declared,
            } => write!(
                f,
                "Transformer registered under {} declares event {}",
                registered, declared
            ),
        }
    }
}

impl std::error::Error for RegistryError {}

/// Registry for looking up the transformer of a message
pub struct TransformerRegistry {
    transformers: BTreeMap<String, Box<dyn Transformer>>,
}

impl TransformerRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            transformers: BTreeMap::new(),
        }
    }

    /// Register the transformer built by `factory` under `code`.
    ///
    /// # Errors
    ///
    /// * [`RegistryError::MalformedCode`] - `code` is not `XXX^YYY`
    /// * [`RegistryError::DuplicateEvent`] - `code` is already bound
    /// * [`RegistryError::EventMismatch`] - the transformer's `event()` differs from `code`
    ///
    /// # Example
    ///
    /// ```
    /// use hl7_fhir::transform::v2_to_fhir::AdtA01Transformer;
    /// use hl7_fhir::transform::TransformerRegistry;
    ///
    /// let mut registry = TransformerRegistry::new();
    /// registry.register("ADT^A01", || Box::new(AdtA01Transformer)).unwrap();
    /// assert!(registry.register("ADT^A01", || Box::new(AdtA01Transformer)).is_err());
    /// ```
    pub fn register<F>(&mut self, code: &str, factory: F) -> Result<(), RegistryError>
    where
        F: FnOnce() -> Box<dyn Transformer>,
    {
        let code = code.parse::<TriggerEvent>()?.to_string();
        if self.transformers.contains_key(&code) {
            return Err(RegistryError::DuplicateEvent(code));
        }

        let transformer = factory();
        if transformer.event() != code {
            return Err(RegistryError::EventMismatch {
                registered: code,
                declared: transformer.event().to_string(),
            });
        }

        debug!(event = %code, "Registered transformer");
        self.transformers.insert(code, transformer);
        Ok(())
    }

    /// Transformer bound to exactly `code`.
    pub fn lookup_by_code(&self, code: &str) -> Option<&dyn Transformer> {
        self.transformers.get(code).map(|t| t.as_ref())
    }

    /// Transformer for a message, keyed on the first two components of MSH-9.
    ///
    /// Any header read problem yields `None`.
    pub fn lookup_by_message(&self, message: &Message) -> Option<&dyn Transformer> {
        let Some(message_type) = read_message_type(message).into_option() else {
            debug!("Message type could not be read from the header");
            return None;
        };
        let found = self.lookup_by_bytes(message_type.as_bytes());
        if found.is_none() {
            debug!(message_type = %message_type, "No transformer registered");
        }
        found
    }

    /// Transformer for an undecoded MSH-9 value.
    pub fn lookup_by_bytes(&self, message_type: &[u8]) -> Option<&dyn Transformer> {
        TriggerEvent::from_bytes(message_type)
            .and_then(|trigger| self.lookup_by_code(&trigger.to_string()))
    }

    /// Check if a code is bound
    pub fn contains(&self, code: &str) -> bool {
        self.transformers.contains_key(code)
    }

    /// Registered codes, sorted
    pub fn list_events(&self) -> Vec<String> {
        self.transformers.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.transformers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transformers.is_empty()
    }
}

impl Default for TransformerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TransformerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformerRegistry")
            .field("events", &self.list_events())
            .finish()
    }
}
