//! Shared tree-sitter helpers for the extraction code.

// Tree-sitter returns usize for positions, but lines are stored as u32.
// No source file reaches 4 billion lines.
#![allow(clippy::cast_possible_truncation)]

/// Get text content of a tree-sitter node.
///
/// Returns `None` if the node's byte range contains invalid UTF-8.
pub fn node_text(node: &tree_sitter::Node, content: &[u8]) -> Option<String> {
    match std::str::from_utf8(&content[node.byte_range()]) {
        Ok(s) => Some(s.to_string()),
        Err(e) => {
            tracing::trace!(
                byte_range = ?node.byte_range(),
                error = %e,
                node_kind = %node.kind(),
                "Failed to decode node text as UTF-8"
            );
            None
        }
    }
}

/// 1-indexed line on which the node starts.
pub fn node_line(node: &tree_sitter::Node) -> u32 {
    node.start_position().row as u32 + 1
}

/// Find the first error or missing node in document order.
///
/// Tree-sitter recovers from syntax errors instead of failing, so a file is
/// only known to be invalid by looking for these nodes.
pub fn first_error<'tree>(node: &tree_sitter::Node<'tree>) -> Option<tree_sitter::Node<'tree>> {
    if !node.has_error() {
        return None;
    }
    if node.is_error() || node.is_missing() {
        return Some(*node);
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if let Some(found) = first_error(&child) {
            return Some(found);
        }
    }

    // has_error() was set but no child owns it; report the node itself
    Some(*node)
}
