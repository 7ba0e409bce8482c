use crate::lexer::lex;
use crate::node::{Attribute, ElementData, Node, NodeId, NodeKind};
use crate::tree_builder::TreeBuilder;

/// An HTML fragment stored as an arena of nodes.
///
/// Node ids index into the arena. Detaching a node (`remove`, `replace_with`)
/// only unlinks it from its parent; the node and its subtree stay in the arena
/// and may be inserted elsewhere.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Creates an empty document containing only its fragment root.
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::new(NodeKind::Fragment)],
            root: NodeId(0),
        }
    }

    /// Parses an HTML fragment. Never fails: malformed markup produces a
    /// best-effort tree.
    pub fn parse_fragment(html: &str) -> Self {
        let mut doc = Self::new();
        let tokens = lex(html);
        let root = doc.root;
        TreeBuilder::new(&mut doc, root).run(&tokens);
        doc
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.0].kind
    }

    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        match &self.nodes[id.0].kind {
            NodeKind::Element(data) => Some(data),
            _ => None,
        }
    }

    fn element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        match &mut self.nodes[id.0].kind {
            NodeKind::Element(data) => Some(data),
            _ => None,
        }
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.element(id).is_some()
    }

    pub fn is_text(&self, id: NodeId) -> bool {
        matches!(self.nodes[id.0].kind, NodeKind::Text(_))
    }

    /// Lowercase tag name of an element node.
    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|e| e.name.as_str())
    }

    /// Whether `id` is an element with the given tag name (ASCII case-insensitive).
    pub fn is_tag(&self, id: NodeId, name: &str) -> bool {
        self.tag_name(id)
            .is_some_and(|n| n.eq_ignore_ascii_case(name))
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id).and_then(|e| e.attribute(name))
    }

    pub fn attributes(&self, id: NodeId) -> &[Attribute] {
        self.element(id)
            .map(|e| e.attributes.as_slice())
            .unwrap_or(&[])
    }

    pub fn has_attributes(&self, id: NodeId) -> bool {
        !self.attributes(id).is_empty()
    }

    /// Sets (or overwrites) an attribute. No-op on non-element nodes.
    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: impl Into<String>) {
        let value = value.into();
        let Some(element) = self.element_mut(id) else {
            return;
        };
        match element
            .attributes
            .iter_mut()
            .find(|a| a.name.eq_ignore_ascii_case(name))
        {
            Some(existing) => existing.value = value,
            None => element.attributes.push(Attribute {
                name: name.to_ascii_lowercase(),
                value,
            }),
        }
    }

    pub fn remove_attribute(&mut self, id: NodeId, name: &str) {
        if let Some(element) = self.element_mut(id) {
            element
                .attributes
                .retain(|a| !a.name.eq_ignore_ascii_case(name));
        }
    }

    /// Whitespace-separated tokens of the `class` attribute.
    pub fn class_list(&self, id: NodeId) -> Vec<&str> {
        self.attribute(id, "class")
            .map(|c| c.split_ascii_whitespace().collect())
            .unwrap_or_default()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    /// The parent node if it is an element (the fragment root is not).
    pub fn parent_element(&self, id: NodeId) -> Option<NodeId> {
        self.parent(id).filter(|p| self.is_element(*p))
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn has_child_nodes(&self, id: NodeId) -> bool {
        !self.nodes[id.0].children.is_empty()
    }

    pub fn element_children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id)
            .iter()
            .copied()
            .filter(|c| self.is_element(*c))
    }

    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.children(id).first().copied()
    }

    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.children(id).last().copied()
    }

    fn index_in_parent(&self, id: NodeId) -> Option<(NodeId, usize)> {
        let parent = self.parent(id)?;
        let idx = self.children(parent).iter().position(|c| *c == id)?;
        Some((parent, idx))
    }

    pub fn previous_sibling(&self, id: NodeId) -> Option<NodeId> {
        let (parent, idx) = self.index_in_parent(id)?;
        idx.checked_sub(1).map(|i| self.children(parent)[i])
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let (parent, idx) = self.index_in_parent(id)?;
        self.children(parent).get(idx + 1).copied()
    }

    /// Whether `ancestor` is a strict ancestor of `id`.
    pub fn is_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut cur = self.parent(id);
        while let Some(p) = cur {
            if p == ancestor {
                return true;
            }
            cur = self.parent(p);
        }
        false
    }

    /// All descendants of `id` in document (pre-)order, excluding `id`.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(n) = stack.pop() {
            out.push(n);
            stack.extend(self.children(n).iter().rev().copied());
        }
        out
    }

    /// Concatenated text of all descendant text nodes.
    pub fn text_content(&self, id: NodeId) -> String {
        if let NodeKind::Text(text) = self.kind(id) {
            return text.clone();
        }
        self.descendants(id)
            .into_iter()
            .filter_map(|n| match self.kind(n) {
                NodeKind::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn create_element(&mut self, name: &str) -> NodeId {
        self.push(NodeKind::Element(ElementData::new(name)))
    }

    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.push(NodeKind::Text(text.into()))
    }

    pub fn create_comment(&mut self, data: impl Into<String>) -> NodeId {
        self.push(NodeKind::Comment(data.into()))
    }

    pub(crate) fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node::new(kind));
        id
    }

    pub(crate) fn text_mut(&mut self, id: NodeId) -> Option<&mut String> {
        match &mut self.nodes[id.0].kind {
            NodeKind::Text(t) => Some(t),
            _ => None,
        }
    }

    /// Unlinks `id` from its parent. The subtree stays in the arena.
    pub fn remove(&mut self, id: NodeId) {
        if let Some((parent, idx)) = self.index_in_parent(id) {
            self.nodes[parent.0].children.remove(idx);
        }
        self.nodes[id.0].parent = None;
    }

    /// Appends `child` as the last child of `parent`, detaching it first.
    ///
    /// # Panics
    /// Panics if `child` is `parent` or one of its ancestors.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        assert!(
            child != parent && !self.is_ancestor(child, parent),
            "cannot append a node to itself or its descendant"
        );
        self.remove(child);
        self.nodes[parent.0].children.push(child);
        self.nodes[child.0].parent = Some(parent);
    }

    /// Inserts `child` before `reference` under `reference`'s parent.
    /// No-op when `reference` is detached.
    pub fn insert_before(&mut self, reference: NodeId, child: NodeId) {
        if child == reference {
            return;
        }
        self.remove(child);
        let Some((parent, idx)) = self.index_in_parent(reference) else {
            return;
        };
        self.nodes[parent.0].children.insert(idx, child);
        self.nodes[child.0].parent = Some(parent);
    }

    /// Puts `replacement` where `old` was and detaches `old`.
    pub fn replace_with(&mut self, old: NodeId, replacement: NodeId) {
        self.insert_before(old, replacement);
        self.remove(old);
    }

    /// Moves all children of `from` to the end of `to`.
    pub fn move_children(&mut self, from: NodeId, to: NodeId) {
        let children = std::mem::take(&mut self.nodes[from.0].children);
        for child in children {
            self.nodes[child.0].parent = None;
            self.append_child(to, child);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_top_level_elements() {
        let doc = Document::parse_fragment("<p>Hello</p><figure><img src=\"x\"></figure>");
        let tops: Vec<_> = doc.element_children(doc.root()).collect();
        assert_eq!(tops.len(), 2);
        assert_eq!(doc.tag_name(tops[0]), Some("p"));
        assert_eq!(doc.tag_name(tops[1]), Some("figure"));
        assert_eq!(doc.text_content(tops[0]), "Hello");
    }

    #[test]
    fn parent_element_stops_at_fragment_root() {
        let doc = Document::parse_fragment("<ul><li>x</li></ul>");
        let ul = doc.first_child(doc.root()).unwrap();
        let li = doc.first_child(ul).unwrap();
        assert_eq!(doc.parent_element(li), Some(ul));
        assert_eq!(doc.parent_element(ul), None);
        assert_eq!(doc.parent(ul), Some(doc.root()));
    }

    #[test]
    fn set_and_remove_attribute() {
        let mut doc = Document::parse_fragment("<p CLASS=\"a\">x</p>");
        let p = doc.first_child(doc.root()).unwrap();
        assert_eq!(doc.attribute(p, "class"), Some("a"));
        doc.set_attribute(p, "class", "b");
        doc.set_attribute(p, "id", "main");
        assert_eq!(doc.attribute(p, "class"), Some("b"));
        assert_eq!(doc.attribute(p, "id"), Some("main"));
        doc.remove_attribute(p, "class");
        assert_eq!(doc.attribute(p, "class"), None);
    }

    #[test]
    fn replace_with_keeps_position() {
        let mut doc = Document::parse_fragment("<p>a</p><ul></ul><p>b</p>");
        let ul = doc.children(doc.root())[1];
        let replacement = doc.create_element("div");
        doc.replace_with(ul, replacement);
        let names: Vec<_> = doc
            .element_children(doc.root())
            .map(|c| doc.tag_name(c).unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["p", "div", "p"]);
        assert_eq!(doc.parent(ul), None);
    }

    #[test]
    fn remove_detaches_node() {
        let mut doc = Document::parse_fragment("<ul></ul>");
        let ul = doc.first_child(doc.root()).unwrap();
        doc.remove(ul);
        assert!(!doc.has_child_nodes(doc.root()));
    }

    #[test]
    fn move_children_reparents() {
        let mut doc = Document::parse_fragment("<li>a<b>b</b></li>");
        let li = doc.first_child(doc.root()).unwrap();
        let p = doc.create_element("p");
        doc.move_children(li, p);
        assert!(!doc.has_child_nodes(li));
        assert_eq!(doc.children(p).len(), 2);
        assert_eq!(doc.text_content(p), "ab");
    }

    #[test]
    #[should_panic(expected = "cannot append a node to itself")]
    fn append_into_own_descendant_panics() {
        let mut doc = Document::parse_fragment("<div><p></p></div>");
        let div = doc.first_child(doc.root()).unwrap();
        let p = doc.first_child(div).unwrap();
        doc.append_child(p, div);
    }
}
