//! HTML serialization (`outerHTML` / `innerHTML`).

use std::borrow::Cow;

use crate::document::Document;
use crate::node::{NodeId, NodeKind, is_raw_text_element, is_void_element};

/// Comment data that cannot close its comment early: `-->` and `--!>` are
/// broken up, and a leading `>` or `->` is padded.
pub fn escape_comment_data(data: &str) -> Cow<'_, str> {
    let abrupt = data.starts_with('>') || data.starts_with("->");
    if !abrupt && !data.contains("-->") && !data.contains("--!>") {
        return Cow::Borrowed(data);
    }
    let mut out = String::with_capacity(data.len() + 4);
    if abrupt {
        out.push(' ');
    }
    out.push_str(&data.replace("--!>", "--! >").replace("-->", "-- >"));
    Cow::Owned(out)
}

impl Document {
    /// Serializes the node including its own tag.
    pub fn outer_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_node(id, &mut out);
        out
    }

    /// Serializes the node's children.
    pub fn inner_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        for child in self.children(id) {
            self.write_node(*child, &mut out);
        }
        out
    }

    fn write_node(&self, id: NodeId, out: &mut String) {
        match self.kind(id) {
            NodeKind::Fragment => {
                for child in self.children(id) {
                    self.write_node(*child, out);
                }
            }
            NodeKind::Element(element) => {
                out.push('<');
                out.push_str(&element.name);
                for attr in &element.attributes {
                    out.push(' ');
                    out.push_str(&attr.name);
                    out.push_str("=\"");
                    out.push_str(&html_escape::encode_double_quoted_attribute(&attr.value));
                    out.push('"');
                }
                out.push('>');
                if is_void_element(&element.name) {
                    return;
                }
                for child in self.children(id) {
                    self.write_node(*child, out);
                }
                out.push_str("</");
                out.push_str(&element.name);
                out.push('>');
            }
            NodeKind::Text(text) => {
                let raw = self
                    .parent(id)
                    .and_then(|p| self.tag_name(p))
                    .is_some_and(is_raw_text_element);
                if raw {
                    out.push_str(text);
                } else {
                    out.push_str(&html_escape::encode_text(text));
                }
            }
            NodeKind::Comment(data) => {
                out.push_str("<!--");
                out.push_str(&escape_comment_data(data));
                out.push_str("-->");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::escape_comment_data;
    use crate::{Document, NodeKind};
    use insta::assert_snapshot;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("<p>Hello</p>")]
    #[case("<p class=\"a b\">x<br>y</p>")]
    #[case("<figure><img src=\"x\"><figcaption>c</figcaption></figure>")]
    #[case("<!--note--><em>a</em>")]
    #[case("<script>if (a < b) {}</script>")]
    fn canonical_markup_round_trips(#[case] html: &str) {
        let doc = Document::parse_fragment(html);
        assert_eq!(doc.inner_html(doc.root()), html);
    }

    #[test]
    fn text_and_attributes_are_escaped() {
        let mut doc = Document::new();
        let p = doc.create_element("p");
        doc.set_attribute(p, "title", "say \"hi\" & bye");
        let text = doc.create_text("1 < 2 & 3");
        doc.append_child(p, text);
        let root = doc.root();
        doc.append_child(root, p);
        assert_snapshot!(
            doc.outer_html(p),
            @r#"<p title="say &quot;hi&quot; &amp; bye">1 &lt; 2 &amp; 3</p>"#
        );
    }

    #[test]
    fn unquoted_and_void_markup_is_normalised() {
        let doc = Document::parse_fragment("<IMG SRC=x.png><P>a");
        assert_eq!(
            doc.inner_html(doc.root()),
            "<img src=\"x.png\"><p>a</p>"
        );
    }

    #[rstest]
    #[case("plain", "plain")]
    #[case("a -- b", "a -- b")]
    #[case("a-->b", "a-- >b")]
    #[case("a--->b", "a--- >b")]
    #[case("a--!>b", "a--! >b")]
    #[case(">x", " >x")]
    #[case("->x", " ->x")]
    fn comment_data_is_neutralised(#[case] data: &str, #[case] want: &str) {
        assert_eq!(escape_comment_data(data), want);
    }

    #[test]
    fn comment_with_terminator_stays_one_comment() {
        let mut doc = Document::new();
        let comment = doc.create_comment("a-->b<p>x</p>");
        let root = doc.root();
        doc.append_child(root, comment);

        let html = doc.inner_html(root);
        assert_eq!(html, "<!--a-- >b<p>x</p>-->");

        let reparsed = Document::parse_fragment(&html);
        let children = reparsed.children(reparsed.root());
        assert_eq!(children.len(), 1);
        assert!(matches!(reparsed.kind(children[0]), NodeKind::Comment(_)));
    }
}
