//! Dual-path field extraction.
//!
//! Values are read from the structured message tree when possible and from
//! the raw segment text otherwise. Every stage is bounds-checked; a miss at
//! one stage falls through to the next and a miss at the last stage is an
//! explicit [`Lookup::Missing`], never an error.

use std::fmt;

use tracing::trace;

use crate::hl7::{Component, Delimiters, Field, Message, Repetition};
use crate::locator::{find_first_raw_line, find_first_structured};

/// Result of a field lookup: a value or an explicit absence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup<T> {
    Found(T),
    Missing,
}

impl<T> Lookup<T> {
    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }

    pub fn is_missing(&self) -> bool {
        !self.is_found()
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Lookup<U> {
        match self {
            Lookup::Found(v) => Lookup::Found(f(v)),
            Lookup::Missing => Lookup::Missing,
        }
    }

    pub fn and_then<U>(self, f: impl FnOnce(T) -> Lookup<U>) -> Lookup<U> {
        match self {
            Lookup::Found(v) => f(v),
            Lookup::Missing => Lookup::Missing,
        }
    }

    /// Try another source when this one missed.
    pub fn or_else(self, f: impl FnOnce() -> Lookup<T>) -> Lookup<T> {
        match self {
            Lookup::Found(v) => Lookup::Found(v),
            Lookup::Missing => f(),
        }
    }

    pub fn as_ref(&self) -> Lookup<&T> {
        match self {
            Lookup::Found(v) => Lookup::Found(v),
            Lookup::Missing => Lookup::Missing,
        }
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Lookup::Found(v) => Some(v),
            Lookup::Missing => None,
        }
    }
}

impl<T> From<Option<T>> for Lookup<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Lookup::Found(v),
            None => Lookup::Missing,
        }
    }
}

/// Address of a value in a message: segment name, 1-based field index and
/// 1-based component index.
///
/// # Examples
///
/// - `PID-3` - first component of PID-3
/// - `PID-5.2` - given name
/// - `MSH-9` - message type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub segment: String,
    pub field: usize,
    pub component: usize,
}

impl FieldDescriptor {
    pub fn new(segment: impl Into<String>, field: usize, component: usize) -> Self {
        Self {
            segment: segment.into(),
            field,
            component,
        }
    }

    /// Parse `SEG-F` or `SEG-F.C` notation.
    ///
    /// # Example
    ///
    /// ```
    /// use hl7_fhir::extraction::FieldDescriptor;
    ///
    /// let d = FieldDescriptor::parse("PID-5.2").unwrap();
    /// assert_eq!((d.segment.as_str(), d.field, d.component), ("PID", 5, 2));
    /// ```
    pub fn parse(path: &str) -> Option<Self> {
        let (segment, rest) = path.trim().split_once('-')?;
        if segment.len() != 3 {
            return None;
        }
        let (field, component) = match rest.split_once('.') {
            Some((f, c)) => (f.parse().ok()?, c.parse().ok()?),
            None => (rest.parse().ok()?, 1),
        };
        if field == 0 || component == 0 {
            return None;
        }
        Some(Self::new(segment.to_ascii_uppercase(), field, component))
    }

    /// Split position of this field in a raw segment line.
    ///
    /// The header's field separator is MSH-1, so raw positions are shifted by
    /// one for MSH.
    pub fn raw_index(&self) -> usize {
        if self.segment == "MSH" {
            self.field.saturating_sub(1)
        } else {
            self.field
        }
    }
}

impl fmt::Display for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.component == 1 {
            write!(f, "{}-{}", self.segment, self.field)
        } else {
            write!(f, "{}-{}.{}", self.segment, self.field, self.component)
        }
    }
}

/// A structured candidate handed to [`extract_value`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Element<'a> {
    Field(&'a Field),
    Repetition(&'a Repetition),
    Component(&'a Component),
    Text(&'a str),
}

impl<'a> Element<'a> {
    /// Render to trimmed text. Fields always read their first repetition.
    pub fn scalar(&self) -> Lookup<String> {
        let text = match self {
            Element::Field(f) => match f.first_repetition() {
                Some(rep) => rep.to_er7(),
                None => return Lookup::Missing,
            },
            Element::Repetition(r) => r.to_er7(),
            Element::Component(c) => c.to_er7(),
            Element::Text(s) => s.to_string(),
        };
        clean(&text)
    }
}

fn clean(text: &str) -> Lookup<String> {
    crate::coercion::clean(text).into()
}

/// Pick a component out of a raw segment line written with `delimiters`.
///
/// `field_index` is a plain split position (0 is the segment name and is
/// never a value); `component_index` is 1-based.
pub fn raw_component(
    line: &str,
    delimiters: &Delimiters,
    field_index: usize,
    component_index: usize,
) -> Lookup<String> {
    if field_index == 0 || component_index == 0 {
        return Lookup::Missing;
    }
    line.split(delimiters.field)
        .nth(field_index)
        .and_then(|field| field.split(delimiters.component).nth(component_index - 1))
        .map_or(Lookup::Missing, clean)
}

/// Resolve a value: structured candidate first, raw line second.
///
/// # Arguments
///
/// * `structured` - candidate from the message tree, if one was found
/// * `raw_line` - first raw line of the segment, if present
/// * `delimiters` - delimiters the raw line is written with
/// * `field_index` - raw split position of the field
/// * `component_index` - 1-based component within the field
///
/// # Returns
///
/// The trimmed, non-empty value or [`Lookup::Missing`].
pub fn extract_value(
    structured: Lookup<Element<'_>>,
    raw_line: Option<&str>,
    delimiters: &Delimiters,
    field_index: usize,
    component_index: usize,
) -> Lookup<String> {
    structured
        .and_then(|element| element.scalar())
        .or_else(|| match raw_line {
            Some(line) => raw_component(line, delimiters, field_index, component_index),
            None => Lookup::Missing,
        })
}

/// Locate the structured component a descriptor points at.
pub fn structured_component<'a>(
    message: &'a Message,
    descriptor: &FieldDescriptor,
) -> Lookup<Element<'a>> {
    find_first_structured(message, &descriptor.segment).and_then(|segment| {
        Lookup::from(
            segment
                .field(descriptor.field)
                .and_then(Field::first_repetition)
                .and_then(|rep| rep.component(descriptor.component))
                .map(Element::Component),
        )
    })
}

/// Types that can resolve a [`FieldDescriptor`] to a value
pub trait Extractor {
    /// Extract the value at the given descriptor
    fn extract(&self, descriptor: &FieldDescriptor) -> Lookup<String>;
}

impl Extractor for Message {
    fn extract(&self, descriptor: &FieldDescriptor) -> Lookup<String> {
        let raw_line = find_first_raw_line(self, &descriptor.segment).into_option();
        let value = extract_value(
            structured_component(self, descriptor),
            raw_line.as_deref(),
            self.delimiters(),
            descriptor.raw_index(),
            descriptor.component,
        );
        if value.is_missing() {
            trace!(field = %descriptor, "No value");
        }
        value
    }
}

/// Read the full MSH-9 text (all components), tree first then raw text.
///
/// Components are always joined with `^`, whatever the message declares.
pub fn read_message_type(message: &Message) -> Lookup<String> {
    let structured = find_first_structured(message, "MSH")
        .and_then(|msh| Lookup::from(msh.field(9).map(Element::Field)));
    let raw_line = find_first_raw_line(message, "MSH").into_option();
    let delimiters = message.delimiters();
    structured
        .and_then(|element| element.scalar())
        .or_else(|| match raw_line.as_deref() {
            Some(line) => line
                .split(delimiters.field)
                .nth(8)
                .map_or(Lookup::Missing, |field| {
                    let parts: Vec<&str> = field.split(delimiters.component).collect();
                    clean(&parts.join("^"))
                }),
            None => Lookup::Missing,
        })
}
