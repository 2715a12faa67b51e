use std::cmp::Ordering;
use std::collections::HashMap;

use crate::data::ProjectFile;

/// Conventional front-end and back-end entry points, in preference order.
pub const ENTRY_POINT_MARKERS: [&str; 4] = ["App.tsx", "App.jsx", "server.js", "server.ts"];

/// A node of the file hierarchy derived from a flat path list.
///
/// Children are kept in a map; display order is computed by [`TreeNode::sorted_children`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    pub name: String,
    pub path: String,
    pub is_leaf: bool,
    pub children: HashMap<String, TreeNode>,
}

impl TreeNode {
    fn root() -> Self {
        Self::new("root", "", false)
    }

    fn new(name: &str, path: &str, is_leaf: bool) -> Self {
        Self {
            name: name.to_string(),
            path: path.to_string(),
            is_leaf,
            children: HashMap::new(),
        }
    }

    /// Directories first, then files, each group by ascending name.
    pub fn sorted_children(&self) -> Vec<&TreeNode> {
        let mut children: Vec<&TreeNode> = self.children.values().collect();
        children.sort_by(|a, b| display_order(a, b));
        children
    }

    pub fn leaf_count(&self) -> usize {
        self.children
            .values()
            .map(|c| usize::from(c.is_leaf) + c.leaf_count())
            .sum()
    }

    /// Indented listing in display order, one line per node below the root.
    pub fn render(&self) -> String {
        let mut lines = Vec::new();
        self.render_into(0, &mut lines);
        lines.join("\n")
    }

    fn render_into(&self, depth: usize, lines: &mut Vec<String>) {
        for child in self.sorted_children() {
            let suffix = if child.is_leaf { "" } else { "/" };
            lines.push(format!("{}{}{}", "  ".repeat(depth), child.name, suffix));
            child.render_into(depth + 1, lines);
        }
    }
}

fn display_order(a: &TreeNode, b: &TreeNode) -> Ordering {
    match (a.is_leaf, b.is_leaf) {
        (false, true) => Ordering::Less,
        (true, false) => Ordering::Greater,
        _ => a.name.cmp(&b.name),
    }
}

/// Builds the file hierarchy for a flat list of `/`-separated paths.
pub struct FileTreeBuilder;

impl FileTreeBuilder {
    /// Every path gets exactly one leaf and every proper prefix one directory node.
    ///
    /// Empty segments are skipped, so `/preview.html` and `preview.html` land on the
    /// same leaf, as they do in an exported archive. A path that is also a prefix of
    /// another path stays a leaf and gains children. Nodes are never demoted.
    pub fn build(files: &[ProjectFile]) -> TreeNode {
        let mut root = TreeNode::root();

        for file in files {
            let parts: Vec<&str> = file.path.split('/').filter(|p| !p.is_empty()).collect();
            let mut current = &mut root;

            for (idx, part) in parts.iter().enumerate() {
                let is_last = idx == parts.len() - 1;
                let node = current
                    .children
                    .entry(part.to_string())
                    .or_insert_with(|| TreeNode::new(part, &parts[..=idx].join("/"), false));
                if is_last {
                    node.is_leaf = true;
                }
                current = node;
            }
        }

        root
    }
}

/// The file selected by default: the first file, in document order, whose path
/// mentions an entry point, otherwise the first file.
pub fn default_selection(files: &[ProjectFile]) -> Option<&str> {
    files
        .iter()
        .find(|f| ENTRY_POINT_MARKERS.iter().any(|m| f.path.contains(m)))
        .or_else(|| files.first())
        .map(|f| f.path.as_str())
}
