//! Builds the arena tree from the token stream.
//!
//! This is a deliberately small subset of the HTML tree construction rules,
//! enough for pasted fragments:
//!
//! - void elements never get children
//! - raw text elements (`script`, `style`, ...) swallow tokens verbatim until
//!   their end tag
//! - `<p>`, `<li>`, `<dt>`/`<dd>`, `<tr>`, `<td>`/`<th>` and `<option>` are
//!   implicitly closed the way browsers do
//! - unmatched end tags are ignored, `</br>` is treated as `<br>`

use std::sync::OnceLock;

use log::trace;
use regex::Regex;

use crate::document::Document;
use crate::lexer::{Token, TokenKind};
use crate::node::{
    Attribute, ElementData, NodeId, NodeKind, is_escapable_raw_text_element, is_raw_text_element,
    is_void_element,
};

/// Start tags that close an open `<p>`.
const CLOSES_P: &[&str] = &[
    "address", "article", "aside", "blockquote", "details", "div", "dl", "fieldset",
    "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header",
    "hr", "main", "menu", "nav", "ol", "p", "pre", "section", "table", "ul",
];

/// Elements that stop the search for an element to implicitly close.
const SCOPE_BOUNDARIES: &[&str] = &["table", "td", "th", "caption", "template", "button"];

fn attribute_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"([^\s"'>/=]+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+)))?"#)
            .expect("attribute regex is valid")
    })
}

/// Splits a start tag token into its lowercase name and decoded attributes.
pub(crate) fn parse_start_tag(text: &str) -> ElementData {
    let inner = text
        .strip_prefix('<')
        .unwrap_or(text)
        .trim_end_matches('>')
        .trim_end_matches('/');
    let name_end = inner
        .find(|c: char| c.is_ascii_whitespace() || c == '/')
        .unwrap_or(inner.len());
    let mut element = ElementData::new(&inner[..name_end]);

    for caps in attribute_regex().captures_iter(&inner[name_end..]) {
        let name = caps[1].to_ascii_lowercase();
        if element.attributes.iter().any(|a| a.name == name) {
            continue;
        }
        let raw = caps
            .get(2)
            .or_else(|| caps.get(3))
            .or_else(|| caps.get(4))
            .map(|m| m.as_str())
            .unwrap_or("");
        element.attributes.push(Attribute {
            name,
            value: html_escape::decode_html_entities(raw).into_owned(),
        });
    }

    element
}

fn end_tag_name(text: &str) -> String {
    text.trim_start_matches("</")
        .trim_end_matches('>')
        .split(|c: char| c.is_ascii_whitespace() || c == '/')
        .next()
        .unwrap_or("")
        .to_ascii_lowercase()
}

pub(crate) struct TreeBuilder<'d> {
    doc: &'d mut Document,
    open: Vec<NodeId>,
}

impl<'d> TreeBuilder<'d> {
    pub(crate) fn new(doc: &'d mut Document, root: NodeId) -> Self {
        Self {
            doc,
            open: vec![root],
        }
    }

    fn current(&self) -> NodeId {
        *self.open.last().expect("fragment root is never popped")
    }

    pub(crate) fn run(mut self, tokens: &[Token<'_>]) {
        let mut i = 0;
        while i < tokens.len() {
            let token = &tokens[i];
            i += 1;
            match token.kind {
                TokenKind::Text | TokenKind::Lt => {
                    let decoded = html_escape::decode_html_entities(token.text);
                    self.append_text(&decoded);
                }
                TokenKind::Comment => {
                    let data = token
                        .text
                        .strip_prefix("<!--")
                        .unwrap_or(token.text)
                        .strip_suffix("-->")
                        .unwrap_or_else(|| token.text.trim_start_matches("<!--"));
                    self.append_comment(data);
                }
                TokenKind::BogusComment => {
                    self.append_comment(bogus_comment_data(token.text, 2));
                }
                TokenKind::ProcessingInstruction => {
                    self.append_comment(bogus_comment_data(token.text, 1));
                }
                TokenKind::Declaration => {
                    let data = bogus_comment_data(token.text, 2);
                    if !data.to_ascii_lowercase().starts_with("doctype") {
                        self.append_comment(data);
                    }
                }
                TokenKind::StartTag => {
                    let element = parse_start_tag(token.text);
                    let name = element.name.clone();
                    let id = self.open_element(element);
                    if is_raw_text_element(&name) || is_escapable_raw_text_element(&name) {
                        i = self.consume_raw_text(id, &name, tokens, i);
                    }
                }
                TokenKind::EndTag => {
                    let name = end_tag_name(token.text);
                    if name == "br" {
                        self.open_element(ElementData::new("br"));
                    } else {
                        self.close_element(&name);
                    }
                }
            }
        }
    }

    fn append_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let parent = self.current();
        // Merge with a preceding text node so `a < b` stays one node
        if let Some(last) = self.doc.last_child(parent)
            && let Some(existing) = self.doc.text_mut(last)
        {
            existing.push_str(text);
            return;
        }
        let id = self.doc.push(NodeKind::Text(text.to_string()));
        self.doc.append_child(parent, id);
    }

    fn append_comment(&mut self, data: &str) {
        let parent = self.current();
        let id = self.doc.push(NodeKind::Comment(data.to_string()));
        self.doc.append_child(parent, id);
    }

    fn open_element(&mut self, element: ElementData) -> NodeId {
        self.close_implied(&element.name);
        let name = element.name.clone();
        let parent = self.current();
        let id = self.doc.push(NodeKind::Element(element));
        self.doc.append_child(parent, id);
        if !is_void_element(&name) {
            self.open.push(id);
        }
        id
    }

    /// Closes elements that a new `name` start tag implicitly ends.
    fn close_implied(&mut self, name: &str) {
        if CLOSES_P.contains(&name) {
            self.close_in_scope(&["p"], &[]);
        }
        match name {
            "li" => self.close_in_scope(&["li"], &["ul", "ol"]),
            "dt" | "dd" => self.close_in_scope(&["dt", "dd"], &["dl"]),
            "td" | "th" => self.close_in_scope(&["td", "th"], &["tr"]),
            "tr" => self.close_in_scope(&["tr"], &["tbody", "thead", "tfoot"]),
            "option" => self.close_in_scope(&["option"], &["select"]),
            _ => {}
        }
    }

    /// Pops up to and including the nearest open element named in `targets`,
    /// unless a scope boundary (or one of `stops`) is found first.
    fn close_in_scope(&mut self, targets: &[&str], stops: &[&str]) {
        for depth in (1..self.open.len()).rev() {
            let Some(tag) = self.doc.tag_name(self.open[depth]) else {
                continue;
            };
            if targets.contains(&tag) {
                self.open.truncate(depth);
                return;
            }
            if stops.contains(&tag) || SCOPE_BOUNDARIES.contains(&tag) {
                return;
            }
        }
    }

    fn close_element(&mut self, name: &str) {
        // Never pop the fragment root
        if let Some(depth) = (1..self.open.len())
            .rev()
            .find(|d| self.doc.is_tag(self.open[*d], name))
        {
            self.open.truncate(depth);
        } else {
            trace!("ignoring unmatched </{name}>");
        }
    }

    /// Collects tokens verbatim until `</name>`; returns the index after it.
    fn consume_raw_text(
        &mut self,
        element: NodeId,
        name: &str,
        tokens: &[Token<'_>],
        mut i: usize,
    ) -> usize {
        let mut raw = String::new();
        while i < tokens.len() {
            let token = &tokens[i];
            i += 1;
            if token.kind == TokenKind::EndTag && end_tag_name(token.text) == name {
                break;
            }
            raw.push_str(token.text);
        }
        if !raw.is_empty() {
            let text = if is_escapable_raw_text_element(name) {
                html_escape::decode_html_entities(&raw).into_owned()
            } else {
                raw
            };
            let id = self.doc.push(NodeKind::Text(text));
            self.doc.append_child(element, id);
        }
        self.close_element(name);
        i
    }
}

fn bogus_comment_data(text: &str, prefix_len: usize) -> &str {
    let body = text.get(prefix_len..).unwrap_or("");
    body.strip_suffix('>').unwrap_or(body)
}

#[cfg(test)]
mod tests {
    use crate::Document;
    use crate::node::NodeKind;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn tag_names(doc: &Document, parent: crate::NodeId) -> Vec<String> {
        doc.element_children(parent)
            .map(|c| doc.tag_name(c).unwrap().to_string())
            .collect()
    }

    #[test]
    fn attributes_are_decoded_and_lowercased() {
        let doc = Document::parse_fragment(
            r#"<a HREF="/x?a=1&amp;b=2" title='single' data-flag checked=yes>t</a>"#,
        );
        let a = doc.first_child(doc.root()).unwrap();
        assert_eq!(doc.attribute(a, "href"), Some("/x?a=1&b=2"));
        assert_eq!(doc.attribute(a, "title"), Some("single"));
        assert_eq!(doc.attribute(a, "data-flag"), Some(""));
        assert_eq!(doc.attribute(a, "checked"), Some("yes"));
    }

    #[test]
    fn duplicate_attribute_keeps_first() {
        let doc = Document::parse_fragment(r#"<p class="a" class="b"></p>"#);
        let p = doc.first_child(doc.root()).unwrap();
        assert_eq!(doc.attribute(p, "class"), Some("a"));
    }

    #[test]
    fn void_elements_take_no_children() {
        let doc = Document::parse_fragment("<p>a<br>b<img src=x>c</p>");
        let p = doc.first_child(doc.root()).unwrap();
        assert_eq!(doc.children(p).len(), 5);
        assert_eq!(doc.text_content(p), "abc");
    }

    #[rstest]
    #[case("<ul><li>a<li>b</ul>", 2)]
    #[case("<ul><li>a</li><li>b</li><li>c</li></ul>", 3)]
    #[case("<ol><li>a<ul><li>x<li>y</ul><li>b</ol>", 2)]
    fn list_items_close_implicitly(#[case] html: &str, #[case] items: usize) {
        let doc = Document::parse_fragment(html);
        let list = doc.first_child(doc.root()).unwrap();
        assert_eq!(doc.element_children(list).count(), items);
    }

    #[test]
    fn block_start_closes_paragraph() {
        let doc = Document::parse_fragment("<p>one<div>two</div>");
        assert_eq!(tag_names(&doc, doc.root()), vec!["p", "div"]);
    }

    #[test]
    fn paragraph_inside_cell_is_not_closed_by_outer_p() {
        let doc = Document::parse_fragment("<table><tr><td><p>a<td>b</table>");
        let table = doc.first_child(doc.root()).unwrap();
        let tr = doc.first_child(table).unwrap();
        assert_eq!(tag_names(&doc, tr), vec!["td", "td"]);
    }

    #[test]
    fn unmatched_end_tag_is_ignored() {
        let doc = Document::parse_fragment("<p>a</span>b</p>");
        let p = doc.first_child(doc.root()).unwrap();
        assert_eq!(doc.text_content(p), "ab");
        assert_eq!(doc.children(p).len(), 1);
    }

    #[test]
    fn end_br_becomes_br() {
        let doc = Document::parse_fragment("a</br>b");
        assert_eq!(tag_names(&doc, doc.root()), vec!["br"]);
    }

    #[test]
    fn script_content_is_raw() {
        let doc = Document::parse_fragment(r#"<script>if (a < b) { x("</p>"); }</script><p>after</p>"#);
        let script = doc.first_child(doc.root()).unwrap();
        assert_eq!(doc.text_content(script), r#"if (a < b) { x("</p>"); }"#);
        assert_eq!(tag_names(&doc, doc.root()), vec!["script", "p"]);
    }

    #[test]
    fn entities_are_decoded_in_text() {
        let doc = Document::parse_fragment("a &amp; b &lt;c&gt; &nbsp;");
        assert_eq!(doc.text_content(doc.root()), "a & b <c> \u{a0}");
    }

    #[test]
    fn comments_and_bogus_comments() {
        let doc = Document::parse_fragment("<!--comment--><//funky><!DOCTYPE html>");
        let kinds: Vec<_> = doc
            .children(doc.root())
            .iter()
            .map(|c| doc.kind(*c).clone())
            .collect();
        assert_eq!(
            kinds,
            vec![
                NodeKind::Comment("comment".into()),
                NodeKind::Comment("/funky".into()),
            ]
        );
    }
}
