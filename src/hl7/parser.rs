//! Tokenizer turning raw HL7 v2 text into a [`Message`] tree.
//!
//! Accepts CR, LF or CRLF segment terminators (and stray MLLP framing
//! bytes), honours the encoding characters declared in MSH-2, and optionally
//! nests order/observation segments into groups.

use std::fmt;

use indexmap::IndexMap;
use tracing::warn;

use crate::hl7::message::{Component, Delimiters, Field, Group, Message, Node, Repetition, Segment};

/// MLLP start/end block characters occasionally left in captured messages
const MLLP_FRAMING: [char; 2] = ['\u{0b}', '\u{1c}'];

/// Error type for tokenizer failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Input was empty or whitespace only
    Empty,
    /// The first segment is not `MSH`
    MissingHeader { found: String },
    /// A segment line could not be tokenized (strict mode)
    InvalidSegment { line: usize, reason: String },
    /// MSH-9 is empty (strict mode)
    MissingMessageType,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Empty => write!(f, "HL7 v2 input is empty"),
            ParseError::MissingHeader { found } => {
                write!(f, "First segment must be MSH, found '{}'", found)
            }
            ParseError::InvalidSegment { line, reason } => {
                write!(f, "Invalid segment on line {}: {}", line, reason)
            }
            ParseError::MissingMessageType => {
                write!(f, "Message type (MSH-9) is missing")
            }
        }
    }
}

impl std::error::Error for ParseError {}

/// Tokenizer options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    /// Reject malformed segments and a missing MSH-9 instead of skipping them
    pub strict: bool,
    /// Nest order/observation segments into named groups
    pub find_groups: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            strict: true,
            find_groups: false,
        }
    }
}

impl ParseOptions {
    pub fn lenient() -> Self {
        Self {
            strict: false,
            ..Self::default()
        }
    }

    pub fn with_groups(mut self) -> Self {
        self.find_groups = true;
        self
    }
}

/// Normalize CRLF and LF terminators to the canonical `\r`.
pub fn normalize_line_endings(raw: &str) -> String {
    raw.replace("\r\n", "\r").replace('\n', "\r")
}

/// Parse an HL7 v2 message.
///
/// # Errors
/// Returns [`ParseError`] for empty input, a missing `MSH` header, and in
/// strict mode for malformed segment lines or an empty MSH-9.
///
/// # Example
/// ```
/// use hl7_fhir::hl7::{parse_message, ParseOptions};
///
/// let msg = parse_message(
///     "MSH|^~\\&|APP|FAC|||20250101||ADT^A01|1|P|2.5\nPID|1||12345||Doe^John",
///     &ParseOptions::default(),
/// ).unwrap();
/// assert!(msg.segment_named("PID").is_some());
/// ```
pub fn parse_message(raw: &str, options: &ParseOptions) -> Result<Message, ParseError> {
    if raw.trim().is_empty() {
        return Err(ParseError::Empty);
    }

    let normalized = normalize_line_endings(raw);
    let lines: Vec<&str> = normalized
        .split('\r')
        .map(|l| l.trim_matches(|c| MLLP_FRAMING.contains(&c)))
        .filter(|l| !l.trim().is_empty())
        .collect();

    let header_line = lines.first().copied().unwrap_or_default();
    if !header_line.starts_with("MSH") {
        return Err(ParseError::MissingHeader {
            found: header_line.chars().take(3).collect(),
        });
    }
    let delimiters = delimiters_from_header(header_line);

    let mut segments = Vec::with_capacity(lines.len());
    let mut kept = Vec::with_capacity(lines.len());
    for (i, line) in lines.iter().enumerate() {
        match parse_segment(line, &delimiters) {
            Ok(seg) => {
                segments.push(seg);
                kept.push(*line);
            }
            Err(reason) if options.strict => {
                return Err(ParseError::InvalidSegment { line: i + 1, reason });
            }
            Err(reason) => {
                warn!(line = i + 1, "Skipping malformed segment: {}", reason);
            }
        }
    }

    let message_type = segments
        .first()
        .and_then(|msh| msh.field(9))
        .and_then(Field::first_repetition)
        .map(|rep| {
            let part = |i| rep.component(i).map(Component::to_er7).unwrap_or_default();
            format!("{}^{}", part(1), part(2))
        })
        .unwrap_or_default();
    if options.strict && message_type.trim_matches('^').trim().is_empty() {
        return Err(ParseError::MissingMessageType);
    }

    let nodes = if options.find_groups {
        infer_groups(segments, &message_type)
    } else {
        segments.into_iter().map(Node::Segment).collect()
    };

    // Raw fallback reads the source text, not a re-rendering.
    let raw = kept.join("\r");
    Ok(Message::from_parts(raw, nodes).with_delimiters(delimiters))
}

/// Read the delimiters declared by the header line, defaulting any that are
/// not present.
fn delimiters_from_header(line: &str) -> Delimiters {
    let mut delimiters = Delimiters::default();
    let mut chars = line.chars().skip(3);
    let Some(field) = chars.next() else {
        return delimiters;
    };
    delimiters.field = field;
    let encoding: Vec<char> = chars.take_while(|&c| c != field).collect();
    if let Some(&c) = encoding.first() {
        delimiters.component = c;
    }
    if let Some(&c) = encoding.get(1) {
        delimiters.repetition = c;
    }
    if let Some(&c) = encoding.get(2) {
        delimiters.escape = c;
    }
    if let Some(&c) = encoding.get(3) {
        delimiters.subcomponent = c;
    }
    delimiters
}

/// Tokenize one segment line.
fn parse_segment(line: &str, delimiters: &Delimiters) -> Result<Segment, String> {
    let mut parts = line.split(delimiters.field);
    let name = parts.next().unwrap_or_default();
    if !is_valid_segment_name(name) {
        return Err(format!("'{}' is not a valid segment name", name));
    }

    let mut fields = Vec::new();
    if name == "MSH" {
        // MSH-1 is the separator itself; MSH-2 is kept verbatim.
        fields.push(Field::literal(delimiters.field.to_string()));
        fields.push(Field::literal(parts.next().unwrap_or_default()));
    }
    fields.extend(parts.map(|raw| parse_field(raw, delimiters)));

    Ok(Segment::new(name, fields))
}

fn is_valid_segment_name(name: &str) -> bool {
    name.len() == 3
        && name
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
}

fn parse_field(raw: &str, delimiters: &Delimiters) -> Field {
    if raw.is_empty() {
        return Field::default();
    }
    let repetitions = raw
        .split(delimiters.repetition)
        .map(|rep| Repetition {
            components: rep
                .split(delimiters.component)
                .map(|comp| Component {
                    subcomponents: comp
                        .split(delimiters.subcomponent)
                        .map(str::to_string)
                        .collect(),
                })
                .collect(),
        })
        .collect();
    Field { repetitions }
}

/// Nest segments into the groups the order/result messages define.
fn infer_groups(segments: Vec<Segment>, message_type: &str) -> Vec<Node> {
    let (opener, group_name, members): (&str, &str, &[&str]) = match message_type {
        "ORU^R01" => ("OBR", "ORDER_OBSERVATION", &["OBX", "NTE"]),
        "ORM^O01" => ("ORC", "ORDER", &["OBR", "NTE", "OBX"]),
        _ => return segments.into_iter().map(Node::Segment).collect(),
    };

    let mut nodes = Vec::new();
    let mut current: Option<Group> = None;
    for seg in segments {
        if seg.name == opener {
            if let Some(group) = current.take() {
                nodes.push(Node::Group(group));
            }
            current = Some(Group::new(group_name, vec![Node::Segment(seg)]));
            continue;
        }
        match current.as_mut() {
            Some(group) if members.contains(&seg.name.as_str()) => {
                group.children.push(Node::Segment(seg));
            }
            _ => {
                if let Some(group) = current.take() {
                    nodes.push(Node::Group(group));
                }
                nodes.push(Node::Segment(seg));
            }
        }
    }
    if let Some(group) = current {
        nodes.push(Node::Group(group));
    }
    nodes
}

/// One canonical line per segment, in message order.
pub fn to_pretty_segments(message: &Message) -> Vec<String> {
    message.segments().into_iter().map(Segment::to_er7).collect()
}

/// Segment name -> canonical lines, in first-seen order.
pub fn to_segment_map(message: &Message) -> IndexMap<String, Vec<String>> {
    let mut out: IndexMap<String, Vec<String>> = IndexMap::new();
    for seg in message.segments() {
        out.entry(seg.name.clone()).or_default().push(seg.to_er7());
    }
    out
}
