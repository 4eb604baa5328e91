//! FHIR JSON input.
//!
//! Loads a single FHIR resource from JSON. The document must be an object
//! with a string `resourceType`; Patient, Observation and Bundle also get a
//! cardinality check on the elements this crate produces or relies on. Any
//! other resource type is accepted as-is. XML input is not supported.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

/// Error type for FHIR input
#[derive(Debug)]
pub enum FhirInputError {
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    /// The document is valid JSON but not an object
    NotAnObject { path: PathBuf, found: &'static str },
    MissingResourceType { path: PathBuf },
    /// A known resource type breaks a cardinality rule
    Invalid {
        path: PathBuf,
        resource_type: String,
        reason: String,
    },
    UnsupportedFormat { path: PathBuf },
}

impl fmt::Display for FhirInputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FhirInputError::Read { path, source } => {
                write!(f, "Failed to read {}: {}", path.display(), source)
            }
            FhirInputError::Json { path, source } => {
                write!(f, "Invalid JSON in {}: {}", path.display(), source)
            }
            FhirInputError::NotAnObject { path, found } => write!(
                f,
                "FHIR JSON must be an object at the top level, got {} ({})",
                found,
                path.display()
            ),
            FhirInputError::MissingResourceType { path } => {
                write!(f, "Missing string resourceType in {}", path.display())
            }
            FhirInputError::Invalid {
                path,
                resource_type,
                reason,
            } => write!(
                f,
                "Invalid {} in {}: {}",
                resource_type,
                path.display(),
                reason
            ),
            FhirInputError::UnsupportedFormat { path } => write!(
                f,
                "Only FHIR JSON input is supported: {}",
                path.display()
            ),
        }
    }
}

impl std::error::Error for FhirInputError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FhirInputError::Read { source, .. } => Some(source),
            FhirInputError::Json { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// A FHIR resource read from JSON, kept as its original object
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FhirResource(Map<String, Value>);

impl FhirResource {
    pub fn resource_type(&self) -> &str {
        self.0
            .get("resourceType")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    pub fn id(&self) -> Option<&str> {
        self.0.get("id").and_then(Value::as_str)
    }

    /// Top-level element by name
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Convert to pretty-printed JSON
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.0)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Cardinality rules for the resource types this crate knows.
fn check_known(resource_type: &str, body: &Map<String, Value>) -> Result<(), String> {
    let require = |key: &str| {
        if body.contains_key(key) {
            Ok(())
        } else {
            Err(format!("'{}' is required", key))
        }
    };
    let array = |key: &str| match body.get(key) {
        None | Some(Value::Array(_)) => Ok(()),
        Some(other) => Err(format!("'{}' must be an array, got {}", key, json_kind(other))),
    };

    match resource_type {
        "Patient" => {
            array("identifier")?;
            array("name")
        }
        "Observation" => {
            require("status")?;
            require("code")?;
            array("identifier")
        }
        "Bundle" => {
            require("type")?;
            array("entry")
        }
        _ => Ok(()),
    }
}

/// Parse a FHIR resource from JSON text. `path` is only used in errors.
///
/// # Example
///
/// ```
/// use std::path::Path;
/// use hl7_fhir::fhir::parse_fhir_json;
///
/// let resource = parse_fhir_json(
///     r#"{"resourceType": "Patient", "id": "p1"}"#,
///     Path::new("patient.json"),
/// )
/// .unwrap();
/// assert_eq!(resource.resource_type(), "Patient");
/// assert_eq!(resource.id(), Some("p1"));
/// ```
pub fn parse_fhir_json(text: &str, path: &Path) -> Result<FhirResource, FhirInputError> {
    let value: Value = serde_json::from_str(text).map_err(|source| FhirInputError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    let body = match value {
        Value::Object(body) => body,
        other => {
            return Err(FhirInputError::NotAnObject {
                path: path.to_path_buf(),
                found: json_kind(&other),
            })
        }
    };

    let Some(resource_type) = body.get("resourceType").and_then(Value::as_str) else {
        return Err(FhirInputError::MissingResourceType {
            path: path.to_path_buf(),
        });
    };
    if resource_type.trim().is_empty() {
        return Err(FhirInputError::MissingResourceType {
            path: path.to_path_buf(),
        });
    }

    check_known(resource_type, &body).map_err(|reason| FhirInputError::Invalid {
        path: path.to_path_buf(),
        resource_type: resource_type.to_string(),
        reason,
    })?;
    debug!(resource_type, "Loaded FHIR resource");

    Ok(FhirResource(body))
}

/// Load a FHIR resource from a JSON file.
///
/// # Errors
/// Returns [`FhirInputError`] for `.xml` files, unreadable files, invalid
/// JSON, a non-object top level, a missing `resourceType`, or a known
/// resource type that breaks a cardinality rule.
pub fn load_fhir_json(path: &Path) -> Result<FhirResource, FhirInputError> {
    let is_xml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("xml"));
    if is_xml {
        return Err(FhirInputError::UnsupportedFormat {
            path: path.to_path_buf(),
        });
    }

    let text = fs::read_to_string(path).map_err(|source| FhirInputError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_fhir_json(&text, path)
}
