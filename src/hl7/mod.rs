//! HL7 v2 tokenizer and message tree.

pub mod message;
pub mod parser;

pub use message::{Component, Delimiters, Field, Group, Message, Node, Repetition, Segment};
pub use parser::{
    normalize_line_endings, parse_message, to_pretty_segments, to_segment_map, ParseError,
    ParseOptions,
};
