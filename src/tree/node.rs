//! Tree nodes over JSON values.

use super::parse::normalize;
use serde_json::Value;
use std::fmt;

/// Intrinsic type of a value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Object,
    Array,
    String,
    Number,
    Boolean,
    Null,
}

impl NodeKind {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Object(_) => NodeKind::Object,
            Value::Array(_) => NodeKind::Array,
            Value::String(_) => NodeKind::String,
            Value::Number(_) => NodeKind::Number,
            Value::Bool(_) => NodeKind::Boolean,
            Value::Null => NodeKind::Null,
        }
    }

    pub fn is_composite(self) -> bool {
        matches!(self, NodeKind::Object | NodeKind::Array)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeKind::Object => "object",
            NodeKind::Array => "array",
            NodeKind::String => "string",
            NodeKind::Number => "number",
            NodeKind::Boolean => "boolean",
            NodeKind::Null => "null",
        };
        f.write_str(name)
    }
}

/// Construction options shared by every node of a tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TreeOptions {
    /// Nodes with `depth < expand_depth` start expanded.
    pub expand_depth: usize,
    /// Keys listed in a collapsed object preview.
    pub preview_key_limit: usize,
}

impl Default for TreeOptions {
    fn default() -> Self {
        Self {
            expand_depth: 2,
            preview_key_limit: 4,
        }
    }
}

/// One node of a payload tree.
///
/// Children are built the first time a container is expanded and kept
/// afterwards, so toggles inside a collapsed subtree survive collapsing
/// and re-expanding its parent.
///
/// Each container remembers its preferred state: the depth default, or
/// the last explicit toggle. [`TreeNode::collapse_all`] leaves it alone
/// and [`TreeNode::expand_all`] restores it.
#[derive(Clone, Debug)]
pub struct TreeNode {
    key: Option<String>,
    value: Value,
    kind: NodeKind,
    depth: usize,
    expanded: bool,
    preferred: bool,
    trailing_separator: bool,
    options: TreeOptions,
    children: Option<Vec<TreeNode>>,
}

impl TreeNode {
    /// Build a root node with default options.
    pub fn new(value: Value) -> Self {
        Self::with_options(Some(value), 0, TreeOptions::default())
    }

    /// Build a root node from a possibly absent value.
    pub fn from_optional(value: Option<Value>) -> Self {
        Self::with_options(value, 0, TreeOptions::default())
    }

    /// Build a node at an explicit depth.
    pub fn with_options(value: Option<Value>, depth: usize, options: TreeOptions) -> Self {
        Self::build(None, normalize(value), depth, false, options)
    }

    fn build(
        key: Option<String>,
        value: Value,
        depth: usize,
        trailing_separator: bool,
        options: TreeOptions,
    ) -> Self {
        let kind = NodeKind::of(&value);
        let expanded = depth < options.expand_depth;
        let mut node = Self {
            key,
            value,
            kind,
            depth,
            expanded,
            preferred: expanded,
            trailing_separator,
            options,
            children: None,
        };
        if node.expanded {
            node.materialize();
        }
        node
    }

    fn materialize(&mut self) {
        if self.children.is_some() || !self.kind.is_composite() {
            return;
        }
        let depth = self.depth + 1;
        let options = self.options;
        let children: Vec<TreeNode> = match &self.value {
            Value::Object(map) => {
                let last = map.len().saturating_sub(1);
                map.iter()
                    .enumerate()
                    .map(|(i, (k, v))| {
                        let value = normalize(Some(v.clone()));
                        Self::build(Some(k.clone()), value, depth, i < last, options)
                    })
                    .collect()
            }
            Value::Array(items) => {
                let last = items.len().saturating_sub(1);
                items
                    .iter()
                    .enumerate()
                    .map(|(i, v)| {
                        let value = normalize(Some(v.clone()));
                        Self::build(None, value, depth, i < last, options)
                    })
                    .collect()
            }
            _ => Vec::new(),
        };
        self.children = Some(children);
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Display key; `None` for array items and the root.
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// The normalized value behind this node.
    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn is_expanded(&self) -> bool {
        self.expanded
    }

    /// True for every child but the last.
    pub fn trailing_separator(&self) -> bool {
        self.trailing_separator
    }

    /// Number of direct children in the underlying value.
    pub fn child_count(&self) -> usize {
        match &self.value {
            Value::Object(map) => map.len(),
            Value::Array(items) => items.len(),
            _ => 0,
        }
    }

    /// Visible children. Empty for leaves and collapsed containers.
    pub fn children(&self) -> &[TreeNode] {
        match (&self.children, self.expanded) {
            (Some(children), true) => children.as_slice(),
            _ => &[],
        }
    }

    /// Flip this node's expansion. Returns the new state; leaves stay put.
    pub fn toggle(&mut self) -> bool {
        let expanded = !self.expanded;
        self.set_expanded(expanded);
        self.expanded
    }

    pub fn set_expanded(&mut self, expanded: bool) {
        if !self.kind.is_composite() {
            return;
        }
        if expanded {
            self.materialize();
        }
        self.expanded = expanded;
        self.preferred = expanded;
    }

    /// Toggle the node reached by following child indices from here.
    /// Returns false if the path doesn't lead to a node.
    pub fn toggle_at(&mut self, path: &[usize]) -> bool {
        match self.node_at_mut(path) {
            Some(node) => {
                node.toggle();
                true
            }
            None => false,
        }
    }

    fn node_at_mut(&mut self, path: &[usize]) -> Option<&mut TreeNode> {
        let Some((first, rest)) = path.split_first() else {
            return Some(self);
        };
        self.materialize();
        self.children
            .as_mut()
            .and_then(|children| children.get_mut(*first))
            .and_then(|child| child.node_at_mut(rest))
    }

    /// Hide everything below this node. Preferred states are kept.
    pub fn collapse_all(&mut self) {
        if self.kind.is_composite() {
            self.expanded = false;
        }
        if let Some(children) = self.children.as_mut() {
            for child in children {
                child.collapse_all();
            }
        }
    }

    /// Reopen every container that was open before [`TreeNode::collapse_all`].
    pub fn expand_all(&mut self) {
        if self.kind.is_composite() {
            if self.preferred {
                self.materialize();
            }
            self.expanded = self.preferred;
        }
        if let Some(children) = self.children.as_mut() {
            for child in children {
                child.expand_all();
            }
        }
    }

    /// Open every container at any depth.
    pub fn expand_fully(&mut self) {
        self.set_expanded(true);
        if let Some(children) = self.children.as_mut() {
            for child in children {
                child.expand_fully();
            }
        }
    }

    /// Summary shown for a collapsed container.
    ///
    /// Arrays show their item count, objects their first few keys. Empty
    /// containers and leaves yield an empty string.
    pub fn preview(&self) -> String {
        match &self.value {
            Value::Array(items) => match items.len() {
                0 => String::new(),
                1 => "1 item".to_string(),
                n => format!("{n} items"),
            },
            Value::Object(map) => {
                let limit = self.options.preview_key_limit;
                let keys: Vec<&str> = map.keys().take(limit).map(String::as_str).collect();
                let mut preview = keys.join(", ");
                if map.len() > limit {
                    preview.push('…');
                }
                preview
            }
            _ => String::new(),
        }
    }

    /// Text shown for this node's value on its own line.
    pub fn display_value(&self) -> String {
        match &self.value {
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            Value::String(s) => Value::String(s.clone()).to_string(),
            Value::Object(_) | Value::Array(_) => {
                let (open, close) = self.brackets();
                if self.expanded {
                    open.to_string()
                } else {
                    let preview = self.preview();
                    if preview.is_empty() {
                        format!("{open}{close}")
                    } else {
                        format!("{open} {preview} {close}")
                    }
                }
            }
        }
    }

    fn brackets(&self) -> (char, char) {
        if self.kind == NodeKind::Array {
            ('[', ']')
        } else {
            ('{', '}')
        }
    }

    /// Display values of every leaf reachable through expanded nodes,
    /// in document order.
    pub fn visible_leaves(&self) -> Vec<String> {
        let mut leaves = Vec::new();
        self.collect_leaves(&mut leaves);
        leaves
    }

    fn collect_leaves(&self, out: &mut Vec<String>) {
        if !self.kind.is_composite() {
            out.push(self.display_value());
            return;
        }
        for child in self.children() {
            child.collect_leaves(out);
        }
    }

    /// Render the visible tree as indented text, two spaces per level.
    pub fn render_text(&self) -> String {
        let mut lines = Vec::new();
        self.render_lines(self.depth, &mut lines);
        lines.join("\n")
    }

    fn render_lines(&self, base_depth: usize, out: &mut Vec<String>) {
        let indent = "  ".repeat(self.depth.saturating_sub(base_depth));
        let separator = if self.trailing_separator { "," } else { "" };
        let label = match &self.key {
            Some(key) => format!("{key}: "),
            None => String::new(),
        };

        if self.kind.is_composite() && self.expanded && self.child_count() > 0 {
            out.push(format!("{indent}{label}{}", self.display_value()));
            for child in self.children() {
                child.render_lines(base_depth, out);
            }
            let (_, close) = self.brackets();
            out.push(format!("{indent}{close}{separator}"));
        } else if self.kind.is_composite() && self.expanded {
            let (open, close) = self.brackets();
            out.push(format!("{indent}{label}{open}{close}{separator}"));
        } else {
            out.push(format!("{indent}{label}{}{separator}", self.display_value()));
        }
    }
}
