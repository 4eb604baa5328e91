//! Conversion entry point.
//!
//! Coordinates a conversion using:
//! - the tokenizer (raw text to [`Message`])
//! - the transformer registry (picks the handler for the message type)
//! - the handler itself (produces the records)

use std::fmt;
use std::path::PathBuf;

use tracing::{debug, warn};

use crate::config::{AppConfig, ConfigError};
use crate::extraction::{read_message_type, Extractor, FieldDescriptor};
use crate::hl7::{parse_message, Message, ParseError, ParseOptions};
use crate::resources::Resource;
use crate::serialization::SerializationError;
use crate::transform::v2_to_fhir::builtin_registry;
use crate::transform::{RegistryError, TransformerRegistry};

/// Error type for a conversion run
#[derive(Debug)]
pub enum ConvertError {
    Parse(ParseError),
    /// No transformer is registered for the message type
    NoTransformer { message_type: Option<String> },
    Registry(RegistryError),
    Config(ConfigError),
    Serialization(SerializationError),
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl fmt::Display for ConvertError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConvertError::Parse(e) => write!(f, "Failed to parse HL7 v2 message: {}", e),
            ConvertError::NoTransformer {
                message_type: Some(t),
            } => write!(f, "No transformer registered for message type {}", t),
            ConvertError::NoTransformer { message_type: None } => {
                write!(f, "No transformer registered for this HL7 message type")
            }
            ConvertError::Registry(e) => write!(f, "Registry error: {}", e),
            ConvertError::Config(e) => write!(f, "{}", e),
            ConvertError::Serialization(e) => write!(f, "{}", e),
            ConvertError::Io { path, source } => {
                write!(f, "Failed to read {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for ConvertError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConvertError::Parse(e) => Some(e),
            ConvertError::Registry(e) => Some(e),
            ConvertError::Config(e) => Some(e),
            ConvertError::Serialization(e) => Some(e),
            ConvertError::Io { source, .. } => Some(source),
            ConvertError::NoTransformer { .. } => None,
        }
    }
}

impl From<ParseError> for ConvertError {
    fn from(err: ParseError) -> Self {
        ConvertError::Parse(err)
    }
}

impl From<RegistryError> for ConvertError {
    fn from(err: RegistryError) -> Self {
        ConvertError::Registry(err)
    }
}

impl From<ConfigError> for ConvertError {
    fn from(err: ConfigError) -> Self {
        ConvertError::Config(err)
    }
}

impl From<SerializationError> for ConvertError {
    fn from(err: SerializationError) -> Self {
        ConvertError::Serialization(err)
    }
}

/// Converts messages with a fixed, fully populated registry.
///
/// # Example
///
/// ```
/// use hl7_fhir::config::AppConfig;
/// use hl7_fhir::orchestrator::Converter;
///
/// let converter = Converter::with_builtin().unwrap();
/// let records = converter
///     .convert_text(
///         "MSH|^~\\&|A|B|C|D|2025||ADT^A01|1|P|2.5\rPID|1||12345||Doe^John",
///         &AppConfig::default(),
///     )
///     .unwrap();
/// assert_eq!(records[0].resource_type(), "Patient");
/// ```
#[derive(Debug)]
pub struct Converter {
    registry: TransformerRegistry,
}

impl Converter {
    pub fn new(registry: TransformerRegistry) -> Self {
        Self { registry }
    }

    /// A converter over the built-in handlers.
    pub fn with_builtin() -> Result<Self, RegistryError> {
        builtin_registry().map(Self::new)
    }

    pub fn registry(&self) -> &TransformerRegistry {
        &self.registry
    }

    /// Registered event codes, sorted.
    pub fn events(&self) -> Vec<String> {
        self.registry.list_events()
    }

    /// Tokenize raw text.
    ///
    /// A strict parse failure is retried leniently (with group inference)
    /// when the configuration allows it.
    pub fn parse(&self, raw: &str, config: &AppConfig) -> Result<Message, ConvertError> {
        let options = ParseOptions {
            strict: config.strict,
            find_groups: false,
        };
        match parse_message(raw, &options) {
            Ok(message) => Ok(message),
            Err(err @ (ParseError::Empty | ParseError::MissingHeader { .. })) => Err(err.into()),
            Err(err) if config.strict && config.lenient_fallback => {
                warn!("Strict parse failed ({}), retrying leniently", err);
                Ok(parse_message(raw, &ParseOptions::lenient().with_groups())?)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Convert a parsed message.
    pub fn convert(&self, message: &Message) -> Result<Vec<Resource>, ConvertError> {
        let Some(transformer) = self.registry.lookup_by_message(message) else {
            return Err(ConvertError::NoTransformer {
                message_type: read_message_type(message).into_option(),
            });
        };
        if !transformer.applies(message) {
            debug!(
                event = transformer.event(),
                "Selected by trigger prefix; header is not an exact match"
            );
        }
        let resources = transformer.transform(message);
        let control_id = message
            .extract(&FieldDescriptor::new("MSH", 10, 1))
            .into_option()
            .unwrap_or_default();
        debug!(
            event = transformer.event(),
            control_id = %control_id,
            count = resources.len(),
            "Converted message"
        );
        Ok(resources)
    }

    /// Parse and convert raw text.
    pub fn convert_text(
        &self,
        raw: &str,
        config: &AppConfig,
    ) -> Result<Vec<Resource>, ConvertError> {
        let message = self.parse(raw, config)?;
        self.convert(&message)
    }
}
