//! Segment location in the message tree and in the raw text.

use tracing::trace;

use crate::extraction::Lookup;
use crate::hl7::{normalize_line_endings, Message, Node, Segment};

/// Maximum group nesting searched below the top level.
pub const MAX_GROUP_DEPTH: usize = 8;

/// First non-empty segment with the given name.
///
/// Tries the message's name index, then the top-level children, then nested
/// groups down to [`MAX_GROUP_DEPTH`]. A segment without any populated field
/// counts as absent.
pub fn find_first_structured<'a>(message: &'a Message, name: &str) -> Lookup<&'a Segment> {
    if let Some(seg) = message.segment_named(name) {
        if !seg.is_empty() {
            return Lookup::Found(seg);
        }
    }
    search(message.children(), name, 0)
}

fn search<'a>(nodes: &'a [Node], name: &str, depth: usize) -> Lookup<&'a Segment> {
    if depth > MAX_GROUP_DEPTH {
        trace!(segment = name, depth, "Group nesting too deep, giving up");
        return Lookup::Missing;
    }

    let direct = nodes
        .iter()
        .filter_map(Node::as_segment)
        .find(|seg| seg.name == name && !seg.is_empty());
    if let Some(seg) = direct {
        return Lookup::Found(seg);
    }

    nodes
        .iter()
        .filter(|node| matches!(node, Node::Group(_)))
        .map(|group| search(group.children(), name, depth + 1))
        .find(Lookup::is_found)
        .unwrap_or(Lookup::Missing)
}

/// Every segment with the given name in document order, groups included.
///
/// Empty placeholders are kept so that the k-th entry lines up with the k-th
/// line from [`raw_lines`].
pub fn find_all_structured<'a>(message: &'a Message, name: &str) -> Vec<&'a Segment> {
    message
        .segments()
        .into_iter()
        .filter(|seg| seg.name == name)
        .collect()
}

/// Every raw line that starts with the segment name and a field separator,
/// in order.
pub fn raw_lines(message: &Message, name: &str) -> Vec<String> {
    let prefix = format!("{}{}", name, message.delimiters().field);
    normalize_line_endings(message.to_er7())
        .split('\r')
        .filter(|line| line.starts_with(&prefix))
        .map(str::to_string)
        .collect()
}

/// First raw line of the named segment.
pub fn find_first_raw_line(message: &Message, name: &str) -> Lookup<String> {
    raw_lines(message, name).into_iter().next().into()
}
