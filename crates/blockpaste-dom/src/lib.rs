//! # blockpaste-dom
//!
//! A small, mutable HTML fragment DOM for the paste pipeline. Pasted markup is
//! lexed with [Logos], built into an arena of nodes, queried with a CSS
//! selector subset and serialized back to HTML.
//!
//! [Logos]: https://docs.rs/logos
//!
//! ## Why not a browser-grade parser?
//!
//! Pasted fragments are short and the pipeline needs three things from them:
//! walk the tree, rewrite parts of it in place (list flattening, attribute
//! disarming) and match elements against selectors registered by block
//! types. A flat arena indexed by [`NodeId`] makes all three cheap and keeps
//! ownership simple: the [`Document`] owns every node, and callers hold plain
//! `Copy` ids.
//!
//! ## Architecture Overview
//!
//! ```text
//! HTML → Lexer → Tokens → TreeBuilder → Document (arena)
//!        (Logos)           (implied end tags, raw text)
//! ```
//!
//! ### 1. Lexer ([`lexer`] module)
//!
//! Every byte of the input lands in exactly one token. Tags are one token each;
//! the attribute string is split later by the tree builder.
//!
//! ### 2. Tree building
//!
//! Follows the handful of HTML tree construction rules that matter for pasted
//! content: void elements, raw text elements, implicitly closed `<p>`/`<li>`/
//! table cells, ignored stray end tags. Parsing never fails.
//!
//! ### 3. Querying and mutation ([`document`], [`selector`] modules)
//!
//! `Document` exposes DOM-like navigation (`parent`, `children`,
//! `next_sibling`, ...), mutation (`append_child`, `replace_with`,
//! `set_attribute`, ...) and `matches` / `query_selector_all` over a parsed
//! [`Selector`].
//!
//! ## Usage
//!
//! ```
//! use blockpaste_dom::{Document, Selector};
//!
//! let doc = Document::parse_fragment("<figure><img src=\"a.png\"></figure><p>Hi</p>");
//! let figure = Selector::parse("figure:has(img)").unwrap();
//!
//! let tops: Vec<_> = doc.element_children(doc.root()).collect();
//! assert!(doc.matches(tops[0], &figure));
//! assert!(!doc.matches(tops[1], &figure));
//! assert_eq!(doc.outer_html(tops[1]), "<p>Hi</p>");
//! ```

pub mod document;
pub mod lexer;
pub mod node;
pub mod selector;
mod serialize;
mod tree_builder;

pub use document::Document;
pub use node::{Attribute, ElementData, NodeId, NodeKind};
pub use selector::{Selector, SelectorError};
pub use serialize::escape_comment_data;
