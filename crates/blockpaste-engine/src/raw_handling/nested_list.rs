//! Flattening lists into a single paragraph for places that cannot hold list
//! markup (table cells).
//!
//! ```text
//! <ul><li>a<ol><li>b</li></ol></li></ul>
//!   → <p><br>- a<br>\u{a0} \u{a0} 1. b</p>
//! ```
//!
//! Ordered sub-lists number their items from 1 using only their own direct
//! `<li>` children.

use blockpaste_dom::{Document, NodeId, Selector};
use log::trace;

/// Indent added per nesting level.
pub const INDENT: &str = "\u{a0} \u{a0} ";

/// Label for items of unordered lists.
pub const BULLET: &str = "- ";

fn is_list(doc: &Document, node: NodeId) -> bool {
    doc.is_tag(node, "ul") || doc.is_tag(node, "ol")
}

fn list_items(doc: &Document, list: NodeId) -> Vec<NodeId> {
    doc.element_children(list)
        .filter(|c| doc.is_tag(*c, "li"))
        .collect()
}

/// Number of lists enclosing `list`, following parents while they are lists
/// or list items.
fn list_depth(doc: &Document, list: NodeId) -> usize {
    let mut depth = 0;
    let mut current = doc.parent_element(list);
    while let Some(parent) = current {
        if is_list(doc, parent) {
            depth += 1;
        } else if !doc.is_tag(parent, "li") {
            break;
        }
        current = doc.parent_element(parent);
    }
    depth
}

/// Replaces the `<ul>`/`<ol>` `list` with one `<p>` holding its items as
/// `<br>`-separated, labelled lines. A list without items is removed.
pub fn nested_list_converter(doc: &mut Document, list: NodeId) {
    if !is_list(doc, list) {
        return;
    }
    if list_items(doc, list).is_empty() {
        trace!("removing empty <{}>", doc.tag_name(list).unwrap_or_default());
        doc.remove(list);
        return;
    }

    let depth = list_depth(doc, list);
    let paragraph = doc.create_element("p");
    append_items(doc, paragraph, list, depth);
    doc.replace_with(list, paragraph);
}

fn append_items(doc: &mut Document, paragraph: NodeId, list: NodeId, depth: usize) {
    let ordered = doc.is_tag(list, "ol");
    for (index, item) in list_items(doc, list).into_iter().enumerate() {
        let br = doc.create_element("br");
        doc.append_child(paragraph, br);

        let label = if ordered {
            format!("{}{}. ", INDENT.repeat(depth), index + 1)
        } else {
            format!("{}{BULLET}", INDENT.repeat(depth))
        };
        let label = doc.create_text(label);
        doc.append_child(paragraph, label);

        for child in doc.children(item).to_vec() {
            if is_list(doc, child) {
                append_items(doc, paragraph, child, depth + 1);
            } else {
                doc.append_child(paragraph, child);
            }
        }
    }
}

/// Flattens every list inside elements matching `scope` (e.g. `td, th`),
/// outermost lists first. Returns the number of lists converted.
pub fn flatten_lists_in(doc: &mut Document, scope: &Selector) -> usize {
    let mut converted = 0;
    loop {
        let next = doc
            .query_selector_all(doc.root(), scope)
            .into_iter()
            .find_map(|cell| {
                doc.descendants(cell)
                    .into_iter()
                    .find(|n| is_list(doc, *n))
            });
        let Some(list) = next else {
            break;
        };
        nested_list_converter(doc, list);
        converted += 1;
    }
    converted
}
