//! # hl7-fhir: HL7 v2 to FHIR-shaped record conversion
//!
//! Parses pipe-delimited HL7 v2 messages and converts the supported trigger
//! events into normalized, FHIR-shaped JSON records.
//!
//! ## Features
//!
//! - **Tokenizer**: MSH-driven delimiters, strict and lenient modes, optional group inference
//! - **Dual-path extraction**: every field read consults the structured tree, then the raw segment text
//! - **Trigger-event registry**: one handler per `CATEGORY^EVENT` code
//! - **Handlers**: ADT^A01, ADT^A03, ADT^A08, ORM^O01, ORU^R01
//! - **Writers**: NDJSON, JSON array, pretty output and one file per record
//! - **FHIR input**: load and check a single FHIR JSON resource
//!
//! ## Example
//!
//! ```
//! use hl7_fhir::{AppConfig, Converter};
//!
//! let raw = "MSH|^~\\&|LAB|HOSP|EHR|HOSP|20250102||ORU^R01|42|P|2.5\r\
//!            PID|1||555||Roe^Jane\r\
//!            OBR|1|ORD1||CBC^Blood count|||20250102123045\r\
//!            OBX|1|NM|HGB^Hemoglobin||13.5|g/dL";
//!
//! let converter = Converter::with_builtin().unwrap();
//! let records = converter.convert_text(raw, &AppConfig::default()).unwrap();
//! let types: Vec<&str> = records.iter().map(|r| r.resource_type()).collect();
//! assert_eq!(types, vec!["Patient", "Observation"]);
//! ```

// Tokenizer and message tree
pub mod hl7;

// Field access
pub mod coercion;
pub mod extraction;
pub mod locator;

// Records and dispatch
pub mod fhir;
pub mod resources;
pub mod transform;

// Running a conversion
pub mod config;
pub mod logging;
pub mod orchestrator;
pub mod serialization;

// Re-export key types
pub use config::{load_config, AppConfig, ConfigError};
pub use extraction::{Extractor, FieldDescriptor, Lookup};
pub use fhir::{load_fhir_json, FhirInputError, FhirResource};
pub use hl7::{parse_message, Message, ParseError, ParseOptions, Segment};
pub use orchestrator::{ConvertError, Converter};
pub use resources::{
    NormalizedEncounter, NormalizedObservation, NormalizedPatient, NormalizedServiceRequest,
    Record, Resource,
};
pub use serialization::{JsonArrayWriter, NdjsonWriter, SerializationError};
pub use transform::v2_to_fhir::{builtin_registry, populate_builtin};
pub use transform::{RegistryError, Transformer, TransformerRegistry, TriggerEvent};
