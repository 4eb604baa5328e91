//! In-memory HL7 v2 message tree.
//!
//! A [`Message`] is an ordered list of [`Node`]s. A node is either a
//! [`Segment`] or a named [`Group`] of nodes (groups only appear when the
//! parser is asked to infer them). Segments hold fields, fields hold
//! repetitions, repetitions hold components and components hold
//! sub-components.
//!
//! Field and component accessors use HL7's 1-based numbering. For `MSH` the
//! field separator itself is MSH-1, so `segment.field(9)` is MSH-9 for the
//! header just like `segment.field(3)` is PID-3 for a PID segment.

use indexmap::IndexMap;

/// Canonical segment terminator used by the raw rendering.
pub const SEGMENT_TERMINATOR: char = '\r';

/// HL7 v2 delimiter set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delimiters {
    pub field: char,
    pub component: char,
    pub repetition: char,
    pub escape: char,
    pub subcomponent: char,
}

impl Default for Delimiters {
    fn default() -> Self {
        Self {
            field: '|',
            component: '^',
            repetition: '~',
            escape: '\\',
            subcomponent: '&',
        }
    }
}

impl Delimiters {
    /// Encoding characters as written in MSH-2.
    pub fn encoding_characters(&self) -> String {
        [self.component, self.repetition, self.escape, self.subcomponent]
            .iter()
            .collect()
    }
}

/// A component, made of one or more sub-components
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Component {
    pub subcomponents: Vec<String>,
}

impl Component {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            subcomponents: vec![value.into()],
        }
    }

    /// Render the component with canonical delimiters.
    pub fn to_er7(&self) -> String {
        self.subcomponents.join("&")
    }

    pub fn is_empty(&self) -> bool {
        self.subcomponents.iter().all(|s| s.trim().is_empty())
    }
}

/// One repetition of a field
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Repetition {
    pub components: Vec<Component>,
}

impl Repetition {
    /// 1-based component access.
    pub fn component(&self, index: usize) -> Option<&Component> {
        index.checked_sub(1).and_then(|i| self.components.get(i))
    }

    pub fn to_er7(&self) -> String {
        self.components
            .iter()
            .map(Component::to_er7)
            .collect::<Vec<_>>()
            .join("^")
    }

    pub fn is_empty(&self) -> bool {
        self.components.iter().all(Component::is_empty)
    }
}

/// A field, made of zero or more repetitions
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Field {
    pub repetitions: Vec<Repetition>,
}

impl Field {
    /// Build a single-repetition field holding one literal value.
    pub fn literal(value: impl Into<String>) -> Self {
        Self {
            repetitions: vec![Repetition {
                components: vec![Component::new(value)],
            }],
        }
    }

    pub fn first_repetition(&self) -> Option<&Repetition> {
        self.repetitions.first()
    }

    pub fn to_er7(&self) -> String {
        self.repetitions
            .iter()
            .map(Repetition::to_er7)
            .collect::<Vec<_>>()
            .join("~")
    }

    pub fn is_empty(&self) -> bool {
        self.repetitions.iter().all(Repetition::is_empty)
    }
}

/// A named segment (e.g. `PID`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub name: String,
    /// Fields in HL7 order; `fields[0]` is field 1.
    pub fields: Vec<Field>,
}

impl Segment {
    pub fn new(name: impl Into<String>, fields: Vec<Field>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }

    /// 1-based field access.
    pub fn field(&self, index: usize) -> Option<&Field> {
        index.checked_sub(1).and_then(|i| self.fields.get(i))
    }

    /// A segment with no populated field counts as absent for lookups.
    pub fn is_empty(&self) -> bool {
        self.fields.iter().all(Field::is_empty)
    }

    pub fn is_header(&self) -> bool {
        self.name == "MSH"
    }

    /// Render with canonical delimiters.
    ///
    /// MSH-1 is the field separator itself and MSH-2 carries the encoding
    /// characters verbatim, so the header is rendered specially.
    pub fn to_er7(&self) -> String {
        let mut out = self.name.clone();
        let fields: &[Field] = if self.is_header() {
            out.push('|');
            out.push_str(&Delimiters::default().encoding_characters());
            self.fields.get(2..).unwrap_or(&[])
        } else {
            &self.fields
        };
        for field in fields {
            out.push('|');
            out.push_str(&field.to_er7());
        }
        out
    }
}

/// A named group of nodes (e.g. `ORDER_OBSERVATION`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub name: String,
    pub children: Vec<Node>,
}

impl Group {
    pub fn new(name: impl Into<String>, children: Vec<Node>) -> Self {
        Self {
            name: name.into(),
            children,
        }
    }
}

/// A node of the message tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Segment(Segment),
    Group(Group),
}

impl Node {
    pub fn name(&self) -> &str {
        match self {
            Node::Segment(s) => &s.name,
            Node::Group(g) => &g.name,
        }
    }

    pub fn as_segment(&self) -> Option<&Segment> {
        match self {
            Node::Segment(s) => Some(s),
            Node::Group(_) => None,
        }
    }

    pub fn children(&self) -> &[Node] {
        match self {
            Node::Segment(_) => &[],
            Node::Group(g) => &g.children,
        }
    }

    fn collect_lines(&self, out: &mut Vec<String>) {
        match self {
            Node::Segment(s) => out.push(s.to_er7()),
            Node::Group(g) => g.children.iter().for_each(|c| c.collect_lines(out)),
        }
    }
}

/// A parsed HL7 v2 message.
///
/// The raw text is held next to the tree rather than re-derived on demand:
/// trees built by other tokenizers may carry placeholder nodes that do not
/// match the actual text, and the raw fallback must see the actual text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    children: Vec<Node>,
    /// Top-level segment name -> child positions
    index: IndexMap<String, Vec<usize>>,
    raw: String,
    delimiters: Delimiters,
}

impl Message {
    /// Build a message from a tree, rendering the raw text from it.
    pub fn new(children: Vec<Node>) -> Self {
        let mut lines = Vec::new();
        children.iter().for_each(|c| c.collect_lines(&mut lines));
        let raw = lines.join("\r");
        Self::from_parts(raw, children)
    }

    /// Build a message from a tree and an independently supplied raw text.
    pub fn from_parts(raw: impl Into<String>, children: Vec<Node>) -> Self {
        let mut index: IndexMap<String, Vec<usize>> = IndexMap::new();
        for (pos, child) in children.iter().enumerate() {
            if let Node::Segment(s) = child {
                index.entry(s.name.clone()).or_default().push(pos);
            }
        }
        Self {
            children,
            index,
            raw: raw.into(),
            delimiters: Delimiters::default(),
        }
    }

    /// Declare the delimiters the raw text is written with.
    pub fn with_delimiters(mut self, delimiters: Delimiters) -> Self {
        self.delimiters = delimiters;
        self
    }

    /// Delimiters of the raw text (canonical unless declared otherwise).
    pub fn delimiters(&self) -> &Delimiters {
        &self.delimiters
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    /// Direct top-level lookup through the name index.
    pub fn segment_named(&self, name: &str) -> Option<&Segment> {
        self.index
            .get(name)
            .and_then(|positions| positions.first())
            .and_then(|&pos| self.children.get(pos))
            .and_then(Node::as_segment)
    }

    /// The header segment, when the message has one.
    pub fn header(&self) -> Option<&Segment> {
        self.segment_named("MSH")
    }

    /// Full raw text, segments separated by `\r`.
    pub fn to_er7(&self) -> &str {
        &self.raw
    }

    /// Iterate over every segment in document order, descending into groups.
    pub fn segments(&self) -> Vec<&Segment> {
        fn walk<'a>(nodes: &'a [Node], out: &mut Vec<&'a Segment>) {
            for node in nodes {
                match node {
                    Node::Segment(s) => out.push(s),
                    Node::Group(g) => walk(&g.children, out),
                }
            }
        }
        let mut out = Vec::new();
        walk(&self.children, &mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid() -> Segment {
        Segment::new(
            "PID",
            vec![
                Field::literal("1"),
                Field::default(),
                Field {
                    repetitions: vec![
                        Repetition {
                            components: vec![Component::new("12345"), Component::new("")],
                        },
                        Repetition {
                            components: vec![Component::new("999")],
                        },
                    ],
                },
            ],
        )
    }

    #[test]
    fn test_field_access_is_one_based() {
        let seg = pid();
        assert!(seg.field(0).is_none());
        assert_eq!(seg.field(1), Some(&Field::literal("1")));
        assert!(seg.field(4).is_none());

        let pid3 = seg.field(3).unwrap();
        let rep = pid3.first_repetition().unwrap();
        assert_eq!(rep.component(1).unwrap().to_er7(), "12345");
        assert!(rep.component(0).is_none());
        assert!(rep.component(3).is_none());
    }

    #[test]
    fn test_segment_render() {
        assert_eq!(pid().to_er7(), "PID|1||12345^~999");
    }

    #[test]
    fn test_empty_segment_detection() {
        let seg = Segment::new("PV1", vec![Field::default(), Field::literal("  ")]);
        assert!(seg.is_empty());
        assert!(!pid().is_empty());
    }

    #[test]
    fn test_message_index_and_raw() {
        let msg = Message::new(vec![
            Node::Segment(pid()),
            Node::Group(Group::new(
                "ORDER",
                vec![Node::Segment(Segment::new("OBR", vec![Field::literal("1")]))],
            )),
        ]);

        assert!(msg.segment_named("PID").is_some());
        // Grouped segments are not in the top-level index
        assert!(msg.segment_named("OBR").is_none());
        assert_eq!(msg.segments().len(), 2);
        assert_eq!(msg.to_er7(), "PID|1||12345^~999\rOBR|1");
    }

    #[test]
    fn test_from_parts_keeps_raw_text() {
        let msg = Message::from_parts("PID|1\rOBX|1\rOBX|2", vec![Node::Segment(pid())]);
        assert_eq!(msg.to_er7(), "PID|1\rOBX|1\rOBX|2");
        assert_eq!(msg.children().len(), 1);
    }
}
