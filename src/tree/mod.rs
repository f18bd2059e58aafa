//! Payload trees.
//!
//! Turns an arbitrary JSON value into a lazily expandable tree of display
//! nodes:
//! - Strings that hold embedded JSON objects/arrays are parsed in place
//! - Nodes shallower than the configured depth start expanded
//! - Collapsed containers show a short preview instead of their children
//!
//! # Example
//!
//! ```ignore
//! let mut tree = TreeNode::new(json!({"a": 1, "b": [1, 2, 3]}));
//! assert_eq!(tree.kind(), NodeKind::Object);
//!
//! tree.collapse_all();
//! println!("{}", tree.render_text()); // { a, b }
//! ```

mod node;
mod parse;

pub use node::{NodeKind, TreeNode, TreeOptions};
pub use parse::{looks_structured, normalize, parse_embedded};
