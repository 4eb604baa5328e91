//! Output writers for converted records.
//!
//! NDJSON and JSON-array streams, blank-line separated pretty output, and a
//! one-file-per-record directory writer.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::resources::Resource;

/// Error type for serialization operations
#[derive(Debug)]
pub enum SerializationError {
    JsonError(serde_json::Error),
    IoError(std::io::Error),
    /// A file or directory under the output directory could not be written
    WriteFailed {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl From<serde_json::Error> for SerializationError {
    fn from(err: serde_json::Error) -> Self {
        SerializationError::JsonError(err)
    }
}

impl From<std::io::Error> for SerializationError {
    fn from(err: std::io::Error) -> Self {
        SerializationError::IoError(err)
    }
}

impl std::fmt::Display for SerializationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SerializationError::JsonError(e) => write!(f, "JSON error: {}", e),
            SerializationError::IoError(e) => write!(f, "IO error: {}", e),
            SerializationError::WriteFailed { path, source } => {
                write!(f, "Failed to write {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for SerializationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SerializationError::JsonError(e) => Some(e),
            SerializationError::IoError(e) => Some(e),
            SerializationError::WriteFailed { source, .. } => Some(source),
        }
    }
}

/// NDJSON (Newline Delimited JSON) writer
///
/// Writes records as NDJSON, one compact JSON object per line.
pub struct NdjsonWriter<W: Write> {
    writer: W,
}

impl<W: Write> NdjsonWriter<W> {
    /// Create a new NDJSON writer
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Write a single record as an NDJSON line
    pub fn write(&mut self, resource: &Resource) -> Result<(), SerializationError> {
        self.writer.write_all(resource.to_ndjson_line()?.as_bytes())?;
        Ok(())
    }

    /// Write multiple records
    pub fn write_all(&mut self, resources: &[Resource]) -> Result<(), SerializationError> {
        for resource in resources {
            self.write(resource)?;
        }
        Ok(())
    }

    /// Flush the underlying writer
    pub fn flush(&mut self) -> Result<(), SerializationError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// JSON array writer
///
/// Writes records as a single JSON array.
pub struct JsonArrayWriter<W: Write> {
    writer: W,
    first: bool,
}

impl<W: Write> JsonArrayWriter<W> {
    /// Create a new JSON array writer and write the opening bracket
    pub fn new(mut writer: W) -> Result<Self, SerializationError> {
        write!(writer, "[")?;
        Ok(Self {
            writer,
            first: true,
        })
    }

    /// Write a single record to the JSON array
    pub fn write(&mut self, resource: &Resource) -> Result<(), SerializationError> {
        if !self.first {
            write!(self.writer, ",")?;
        }
        self.first = false;
        write!(self.writer, "{}", resource.to_json()?)?;
        Ok(())
    }

    /// Finish writing the array and close the bracket
    pub fn finish(mut self) -> Result<(), SerializationError> {
        write!(self.writer, "]")?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Write indented JSON objects separated by a blank line.
pub fn write_pretty<W: Write>(
    mut writer: W,
    resources: &[Resource],
) -> Result<(), SerializationError> {
    for (i, resource) in resources.iter().enumerate() {
        if i > 0 {
            writeln!(writer)?;
        }
        writeln!(writer, "{}", resource.to_json_pretty()?)?;
    }
    writer.flush()?;
    Ok(())
}

/// File name for the `index`-th (1-based) record: `01_Patient.json`.
pub fn resource_file_name(index: usize, resource: &Resource) -> String {
    format!("{:02}_{}.json", index, resource.resource_type())
}

/// Write each record to its own file under `dir`, creating `dir` as needed.
///
/// # Returns
///
/// The written paths, in record order.
pub fn write_resources_to_dir(
    resources: &[Resource],
    dir: &Path,
    pretty: bool,
) -> Result<Vec<PathBuf>, SerializationError> {
    fs::create_dir_all(dir).map_err(|source| SerializationError::WriteFailed {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut written = Vec::with_capacity(resources.len());
    for (i, resource) in resources.iter().enumerate() {
        let path = dir.join(resource_file_name(i + 1, resource));
        let json = if pretty {
            resource.to_json_pretty()?
        } else {
            resource.to_json()?
        };
        fs::write(&path, json).map_err(|source| SerializationError::WriteFailed {
            path: path.clone(),
            source,
        })?;
        info!("Wrote {}", path.display());
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::{
        CodeableConcept, EncounterStatus, NormalizedEncounter, NormalizedPatient, Reference,
    };

    fn sample() -> Vec<Resource> {
        vec![
            NormalizedPatient {
                id: Some("1".to_string()),
                ..Default::default()
            }
            .into(),
            NormalizedEncounter {
                id: "enc-1".to_string(),
                status: Some(EncounterStatus::Finished),
                class: CodeableConcept::unspecified(),
                subject: Reference::patient(Some("1")),
                period: None,
            }
            .into(),
        ]
    }

    #[test]
    fn test_ndjson_writer() {
        let mut buf = Vec::new();
        let mut writer = NdjsonWriter::new(&mut buf);
        writer.write_all(&sample()).unwrap();
        writer.flush().unwrap();

        let output = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = output.lines().collect();

        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("\"resourceType\":\"Patient\""));
        assert!(lines[1].contains("\"resourceType\":\"Encounter\""));
    }

    #[test]
    fn test_json_array_writer() {
        let mut buf = Vec::new();
        let mut writer = JsonArrayWriter::new(&mut buf).unwrap();
        for r in sample() {
            writer.write(&r).unwrap();
        }
        writer.finish().unwrap();

        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(value.as_array().map(Vec::len), Some(2));
    }

    #[test]
    fn test_pretty_output_blank_line_separated() {
        let mut buf = Vec::new();
        write_pretty(&mut buf, &sample()).unwrap();
        let output = String::from_utf8(buf).unwrap();

        let chunks: Vec<&str> = output.trim_end().split("\n\n").collect();
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].starts_with("{\n"));
        assert!(chunks[1].contains("\"Encounter\""));
    }

    #[test]
    fn test_resource_file_name() {
        let r = &sample()[1];
        assert_eq!(resource_file_name(2, r), "02_Encounter.json");
        assert_eq!(resource_file_name(12, r), "12_Encounter.json");
    }
}
