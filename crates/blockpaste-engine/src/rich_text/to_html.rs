use blockpaste_dom::escape_comment_data;
use blockpaste_dom::node::is_void_element;

use super::create::{COMMENT_ATTRIBUTE, COMMENT_FORMAT};
use super::format::Format;
use super::format_types::FormatTypeRegistry;
use super::record::{LINE_SEPARATOR, OBJECT_REPLACEMENT_CHARACTER, Record};

/// Serializes a record to HTML.
///
/// Tags are opened outermost first and closed as soon as their format stops,
/// so `create_from_html(&to_html(r))` rebuilds `r` for records built from
/// HTML.
pub fn to_html(record: &Record, format_types: &FormatTypeRegistry) -> String {
    let mut out = String::new();
    HtmlWriter::new(format_types, &mut out).write(record);
    out
}

/// Serializes a multiline record, wrapping each `U+2028`-separated line in
/// `<tag>`.
pub fn to_multiline_html(record: &Record, format_types: &FormatTypeRegistry, tag: &str) -> String {
    if record.is_empty() {
        return String::new();
    }
    let mut out = String::new();
    let mut line_start = 0;
    let separators = record
        .text()
        .chars()
        .enumerate()
        .filter(|(_, c)| *c == LINE_SEPARATOR)
        .map(|(i, _)| i);
    for line_end in separators.chain(std::iter::once(record.len())) {
        let line = super::record::slice(record, line_start..line_end);
        out.push('<');
        out.push_str(tag);
        out.push('>');
        HtmlWriter::new(format_types, &mut out).write(&line);
        out.push_str("</");
        out.push_str(tag);
        out.push('>');
        line_start = line_end + 1;
    }
    out
}

struct HtmlWriter<'a> {
    format_types: &'a FormatTypeRegistry,
    out: &'a mut String,
    pending_text: String,
}

impl<'a> HtmlWriter<'a> {
    fn new(format_types: &'a FormatTypeRegistry, out: &'a mut String) -> Self {
        Self {
            format_types,
            out,
            pending_text: String::new(),
        }
    }

    fn write(mut self, record: &Record) {
        let mut open: Vec<&Format> = Vec::new();

        for (c, formats, replacement) in record.chars() {
            let common = open
                .iter()
                .zip(formats)
                .take_while(|(a, b)| **a == *b)
                .count();
            if common < open.len() || common < formats.len() {
                self.flush_text();
            }
            while open.len() > common {
                if let Some(format) = open.pop() {
                    self.end_tag(format);
                }
            }
            for format in &formats[common..] {
                self.start_tag(format);
                open.push(format);
            }

            match (c, replacement) {
                (OBJECT_REPLACEMENT_CHARACTER, Some(object)) => {
                    self.flush_text();
                    self.object(object);
                }
                ('\n', _) => {
                    self.flush_text();
                    self.out.push_str("<br>");
                }
                (c, _) => self.pending_text.push(c),
            }
        }

        self.flush_text();
        while let Some(format) = open.pop() {
            self.end_tag(format);
        }
    }

    fn flush_text(&mut self) {
        if self.pending_text.is_empty() {
            return;
        }
        self.out
            .push_str(&html_escape::encode_text(&self.pending_text));
        self.pending_text.clear();
    }

    /// Tag name and HTML attributes for a format.
    fn element(&self, format: &Format) -> (String, Vec<(String, String)>) {
        let Some(format_type) = self.format_types.get(&format.format_type) else {
            let attributes = format
                .attributes
                .iter()
                .chain(&format.unregistered_attributes)
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            return (format.format_type.clone(), attributes);
        };

        let mut attributes: Vec<(String, String)> = format
            .attributes
            .iter()
            .map(|(key, value)| {
                let name = format_type.attributes.get(key).unwrap_or(key);
                (name.clone(), value.clone())
            })
            .collect();
        let mut classes: Vec<&str> = format_type.class_name.iter().map(String::as_str).collect();
        for (name, value) in &format.unregistered_attributes {
            if name == "class" {
                classes.extend(value.split_ascii_whitespace());
            } else {
                attributes.push((name.clone(), value.clone()));
            }
        }
        if !classes.is_empty() {
            attributes.push(("class".to_string(), classes.join(" ")));
        }
        (format_type.tag_name.clone(), attributes)
    }

    fn start_tag(&mut self, format: &Format) {
        let (tag, attributes) = self.element(format);
        self.out.push('<');
        self.out.push_str(&tag);
        for (name, value) in attributes {
            self.out.push(' ');
            self.out.push_str(&name);
            self.out.push_str("=\"");
            self.out
                .push_str(&html_escape::encode_double_quoted_attribute(&value));
            self.out.push('"');
        }
        self.out.push('>');
    }

    fn end_tag(&mut self, format: &Format) {
        let (tag, _) = self.element(format);
        self.out.push_str("</");
        self.out.push_str(&tag);
        self.out.push('>');
    }

    fn object(&mut self, format: &Format) {
        if format.format_type == COMMENT_FORMAT {
            self.out.push_str("<!--");
            let data = format.attribute(COMMENT_ATTRIBUTE).unwrap_or_default();
            self.out.push_str(&escape_comment_data(data));
            self.out.push_str("-->");
            return;
        }
        self.start_tag(format);
        let (tag, _) = self.element(format);
        if !is_void_element(&tag) {
            self.end_tag(format);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rich_text::create::create_from_html;
    use crate::rich_text::record::apply_format;
    use insta::assert_snapshot;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn registry() -> FormatTypeRegistry {
        FormatTypeRegistry::with_core_formats()
    }

    #[test]
    fn applied_format_serializes_as_tag() {
        let record = apply_format(
            &Record::from_text("one two three"),
            Format::new("core/bold"),
            Some(4..7),
        );
        assert_snapshot!(to_html(&record, &registry()), @"one <strong>two</strong> three");
    }

    #[test]
    fn overlapping_formats_reopen_inner_tags() {
        let record = apply_format(&Record::from_text("abc"), Format::new("core/bold"), Some(0..2));
        let record = apply_format(&record, Format::new("core/italic"), Some(1..3));
        assert_eq!(
            to_html(&record, &registry()),
            "<strong>a<em>b</em></strong><em>c</em>"
        );
    }

    #[test]
    fn text_and_attributes_are_escaped() {
        let record = apply_format(
            &Record::from_text("a < b"),
            Format::new("core/link").with_attribute("url", "/q?a=1&b=2"),
            Some(0..5),
        );
        assert_snapshot!(
            to_html(&record, &registry()),
            @r#"<a href="/q?a=1&amp;b=2">a &lt; b</a>"#
        );
    }

    #[rstest]
    #[case("<em>te<strong>st</strong></em>")]
    #[case("a<br>b")]
    #[case(r#"<a href="https://x" rel="noopener">link</a> and <img alt="" src="i.png">"#)]
    #[case("a<!--note-->b")]
    #[case(r#"<span lang="fr">oui</span>"#)]
    #[case(r#"<mark class="hl extra">x</mark>"#)]
    fn html_round_trips_through_record(#[case] html: &str) {
        let mut registry = registry();
        registry
            .register(
                crate::rich_text::FormatType::new("my/highlight", "mark").with_class("hl"),
            )
            .unwrap();
        let record = create_from_html(html, &registry);
        let serialized = to_html(&record, &registry);
        assert_eq!(create_from_html(&serialized, &registry), record, "{serialized}");
    }

    #[test]
    fn disarmed_script_stays_disarmed() {
        let registry = registry();
        let record = create_from_html("<script>x()</script>", &registry);
        assert_snapshot!(
            to_html(&record, &registry),
            @r#"<script data-rich-text-script="x%28%29"></script>"#
        );
    }

    #[test]
    fn multiline_wraps_each_line() {
        let record = Record::from_text("one\u{2028}two");
        assert_eq!(
            to_multiline_html(&record, &registry(), "li"),
            "<li>one</li><li>two</li>"
        );
        assert_eq!(to_multiline_html(&Record::new(), &registry(), "li"), "");
    }

    #[test]
    fn comment_data_cannot_close_the_comment() {
        let record: Record = serde_json::from_value(serde_json::json!({
            "text": "a\u{fffc}b",
            "replacements": [null, {
                "type": "#comment",
                "attributes": { "data-rich-text-comment": "x--><b>y</b>" },
                "object": true
            }]
        }))
        .unwrap();
        let html = to_html(&record, &registry());
        assert_eq!(html, "a<!--x-- ><b>y</b>-->b");
        assert_eq!(create_from_html(&html, &registry()).text(), "a\u{fffc}b");
    }
}
