//! Local-name oriented queries over parsed XML trees.
//!
//! Government-portal exports mix namespaced, namespace-less and
//! SOAP-wrapped dialects of the same schema, so every lookup in this crate
//! matches on element local names (case-insensitive) and tries an ordered
//! list of candidate locations, first non-empty text wins.

use roxmltree::Node;

pub(crate) fn local_name_eq(node: Node, name: &str) -> bool {
    node.is_element() && node.tag_name().name().eq_ignore_ascii_case(name)
}

/// First descendant (excluding `node` itself) with the given local name.
pub(crate) fn find_descendant<'a, 'd>(node: Node<'a, 'd>, name: &str) -> Option<Node<'a, 'd>> {
    node.descendants()
        .find(|n| n.id() != node.id() && local_name_eq(*n, name))
}

/// Walk a path of local names, each step resolved as the first matching
/// descendant of the previous node.
pub(crate) fn find_path<'a, 'd>(node: Node<'a, 'd>, path: &[&str]) -> Option<Node<'a, 'd>> {
    let mut current = node;
    for name in path {
        current = find_descendant(current, name)?;
    }
    Some(current)
}

/// First direct child element with the given local name.
pub(crate) fn child<'a, 'd>(node: Node<'a, 'd>, name: &str) -> Option<Node<'a, 'd>> {
    node.children().find(|n| local_name_eq(*n, name))
}

/// Trimmed, non-empty text content of a node.
pub(crate) fn text(node: Node) -> Option<String> {
    let raw = node.text()?.trim();
    if raw.is_empty() {
        None
    } else {
        Some(raw.to_string())
    }
}

pub(crate) fn child_text(node: Node, name: &str) -> Option<String> {
    child(node, name).and_then(text)
}

pub(crate) fn path_text(node: Node, path: &[&str]) -> Option<String> {
    find_path(node, path).and_then(text)
}

/// Evaluate candidate paths in priority order; first non-empty text wins.
pub(crate) fn first_path_text(node: Node, candidates: &[&[&str]]) -> Option<String> {
    candidates.iter().find_map(|path| path_text(node, path))
}
