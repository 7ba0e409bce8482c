//! Building a [`Record`] from text or from a DOM subtree.
//!
//! ## Rules
//!
//! - Text nodes contribute their characters minus line breaks (`\r`, `\n`),
//!   zero-width no-break space padding and stray object replacement
//!   characters. Line breaks in HTML are `<br>` elements, which contribute
//!   `\n`.
//! - Other elements become formats wrapping their content, outermost first.
//!   Registered format types are looked up by tag and class; anything else
//!   becomes a format named after the lowercase tag.
//! - An element with no content is dropped, unless it is a void element, an
//!   object format type, or carries attributes: those become an object
//!   replacement character with the format stored as its replacement.
//! - Comments become `#comment` objects and scripts are disarmed into
//!   objects holding their URI-encoded source. `on*` event attributes are
//!   renamed so they never run when the markup is rendered again.

use std::collections::BTreeMap;
use std::sync::Arc;

use blockpaste_dom::node::is_void_element;
use blockpaste_dom::{Document, NodeId, NodeKind};

use super::format::Format;
use super::format_types::FormatTypeRegistry;
use super::record::{FormatSlot, LINE_SEPARATOR, OBJECT_REPLACEMENT_CHARACTER, Record};

/// Format type of preserved HTML comments.
pub const COMMENT_FORMAT: &str = "#comment";
/// Attribute holding a preserved comment's data.
pub const COMMENT_ATTRIBUTE: &str = "data-rich-text-comment";
/// Attribute holding a disarmed script's URI-encoded source.
pub const SCRIPT_ATTRIBUTE: &str = "data-rich-text-script";
/// Editor-only marker attribute that never becomes part of a format.
pub const FORMAT_BOUNDARY_ATTRIBUTE: &str = "data-rich-text-format-boundary";
/// Prefix given to `on*` event handler attributes.
pub const DISABLED_EVENT_PREFIX: &str = "data-disable-rich-text-";

const ZERO_WIDTH_NO_BREAK_SPACE: char = '\u{feff}';

/// Options for [`create_from_element`].
#[derive(Debug, Clone, Copy)]
pub struct CreateOptions<'a> {
    pub format_types: &'a FormatTypeRegistry,
    /// When set, only direct children with this tag contribute, one line
    /// each, separated by `U+2028`.
    pub multiline_tag: Option<&'a str>,
}

impl<'a> CreateOptions<'a> {
    pub fn new(format_types: &'a FormatTypeRegistry) -> Self {
        Self {
            format_types,
            multiline_tag: None,
        }
    }

    pub fn multiline(mut self, tag: &'a str) -> Self {
        self.multiline_tag = Some(tag);
        self
    }
}

/// A record of plain `text` without formats.
pub fn create_from_text(text: &str) -> Record {
    Record::from_text(text)
}

/// Parses `html` as a fragment and builds a record from all of it.
pub fn create_from_html(html: &str, format_types: &FormatTypeRegistry) -> Record {
    let doc = Document::parse_fragment(html);
    create_from_element(&doc, doc.root(), &CreateOptions::new(format_types))
}

/// Builds a record from the children of `node`.
pub fn create_from_element(doc: &Document, node: NodeId, options: &CreateOptions<'_>) -> Record {
    let acc = match options.multiline_tag {
        Some(tag) => accumulate_multiline(doc, node, tag, options.format_types),
        None => accumulate(doc, node, options.format_types),
    };
    acc.into_record()
}

#[derive(Default)]
struct Accumulator {
    text: String,
    formats: Vec<Vec<Format>>,
    replacements: Vec<Option<Format>>,
}

impl Accumulator {
    fn is_empty(&self) -> bool {
        self.formats.is_empty()
    }

    fn push_char(&mut self, c: char) {
        self.text.push(c);
        self.formats.push(Vec::new());
        self.replacements.push(None);
    }

    fn push_text(&mut self, text: &str) {
        text.chars().for_each(|c| self.push_char(c));
    }

    fn push_object(&mut self, format: Format) {
        self.push_char(OBJECT_REPLACEMENT_CHARACTER);
        if let Some(last) = self.replacements.last_mut() {
            *last = Some(format.into_object());
        }
    }

    /// Appends `inner`, wrapping each of its characters in `wrapper`.
    ///
    /// Nested formats of the wrapper's type collapse into the wrapper.
    fn append(&mut self, inner: Accumulator, wrapper: Option<Format>) {
        self.text.push_str(&inner.text);
        for slot in inner.formats {
            let merged = match &wrapper {
                Some(w) => std::iter::once(w.clone())
                    .chain(slot.into_iter().filter(|f| !f.is_same_type(w)))
                    .collect(),
                None => slot,
            };
            self.formats.push(merged);
        }
        self.replacements.extend(inner.replacements);
    }

    fn into_record(self) -> Record {
        let mut formats: Vec<FormatSlot> = Vec::with_capacity(self.formats.len());
        let mut previous: Option<(Vec<Format>, Arc<[Format]>)> = None;
        for slot in self.formats {
            if slot.is_empty() {
                formats.push(None);
                continue;
            }
            // Runs of identical slots share one allocation
            let shared = match &previous {
                Some((list, shared)) if *list == slot => shared.clone(),
                _ => {
                    let shared: Arc<[Format]> = slot.clone().into();
                    previous = Some((slot, shared.clone()));
                    shared
                }
            };
            formats.push(Some(shared));
        }
        Record::from_parts(self.text, formats, self.replacements)
    }
}

fn filter_text(text: &str) -> String {
    text.chars()
        .filter(|c| {
            !matches!(
                *c,
                '\r' | '\n' | ZERO_WIDTH_NO_BREAK_SPACE | OBJECT_REPLACEMENT_CHARACTER
            )
        })
        .collect()
}

fn accumulate(doc: &Document, node: NodeId, format_types: &FormatTypeRegistry) -> Accumulator {
    let mut acc = Accumulator::default();

    for &child in doc.children(node) {
        match doc.kind(child) {
            NodeKind::Text(text) => acc.push_text(&filter_text(text)),
            NodeKind::Comment(data) => acc.push_object(
                Format::new(COMMENT_FORMAT).with_attribute(COMMENT_ATTRIBUTE, data.clone()),
            ),
            NodeKind::Fragment => {}
            NodeKind::Element(element) => match element.name.as_str() {
                "br" => acc.push_char('\n'),
                "script" => {
                    let source = doc
                        .attribute(child, SCRIPT_ATTRIBUTE)
                        .map(str::to_string)
                        .unwrap_or_else(|| urlencoding::encode(&doc.inner_html(child)).into_owned());
                    acc.push_object(Format::new("script").with_attribute(SCRIPT_ATTRIBUTE, source));
                }
                name => {
                    let (format, is_object_type) = to_format(doc, child, format_types);
                    let inner = accumulate(doc, child, format_types);
                    if inner.is_empty() {
                        let has_attributes =
                            !format.attributes.is_empty() || !format.unregistered_attributes.is_empty();
                        if is_object_type || is_void_element(name) || has_attributes {
                            acc.push_object(format);
                        }
                        continue;
                    }
                    acc.append(inner, Some(format));
                }
            },
        }
    }

    acc
}

fn accumulate_multiline(
    doc: &Document,
    node: NodeId,
    tag: &str,
    format_types: &FormatTypeRegistry,
) -> Accumulator {
    let mut acc = Accumulator::default();
    let lines = doc.element_children(node).filter(|c| doc.is_tag(*c, tag));
    for (index, line) in lines.enumerate() {
        if index > 0 {
            acc.push_char(LINE_SEPARATOR);
        }
        acc.append(accumulate(doc, line, format_types), None);
    }
    acc
}

/// Element attributes with editor-only markers dropped and event handlers
/// disarmed.
fn safe_attributes(doc: &Document, node: NodeId) -> BTreeMap<String, String> {
    doc.attributes(node)
        .iter()
        .filter(|a| a.name != FORMAT_BOUNDARY_ATTRIBUTE)
        .map(|a| {
            let name = if a.name.starts_with("on") {
                format!("{DISABLED_EVENT_PREFIX}{}", a.name)
            } else {
                a.name.clone()
            };
            (name, a.value.clone())
        })
        .collect()
}

/// The format an element stands for, and whether its type is an object type.
fn to_format(doc: &Document, node: NodeId, format_types: &FormatTypeRegistry) -> (Format, bool) {
    let tag = doc.tag_name(node).unwrap_or_default();
    let attributes = safe_attributes(doc, node);
    let classes = doc.class_list(node);

    let Some(format_type) = format_types.find_for_element(tag, &classes) else {
        let mut format = Format::new(tag);
        format.attributes = attributes;
        return (format, false);
    };

    let mut format = Format::new(format_type.name.clone());
    for (name, value) in attributes {
        if name == "class"
            && let Some(own_class) = &format_type.class_name
        {
            let rest: Vec<&str> = value
                .split_ascii_whitespace()
                .filter(|c| *c != own_class.as_str())
                .collect();
            if !rest.is_empty() {
                format
                    .unregistered_attributes
                    .insert(name, rest.join(" "));
            }
            continue;
        }
        match format_type.key_for_html_attribute(&name) {
            Some(key) => {
                format.attributes.insert(key.to_string(), value);
            }
            None => {
                format.unregistered_attributes.insert(name, value);
            }
        }
    }
    (format, format_type.object)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn create(html: &str) -> Record {
        create_from_html(html, &FormatTypeRegistry::with_core_formats())
    }

    fn types(record: &Record, index: usize) -> Vec<&str> {
        record
            .formats_at(index)
            .iter()
            .map(|f| f.format_type.as_str())
            .collect()
    }

    #[test]
    fn plain_text() {
        let record = create_from_text("hello");
        assert_eq!(record.text(), "hello");
        assert_eq!(record.len(), 5);
        assert!(record.formats().iter().all(Option::is_none));
    }

    #[test]
    fn empty_html_is_empty_record() {
        assert_eq!(create(""), Record::new());
    }

    #[test]
    fn nested_formats_are_outer_first() {
        let record = create("<em>te<strong>st</strong></em>");
        assert_eq!(record.text(), "test");
        assert_eq!(types(&record, 1), vec!["core/italic"]);
        assert_eq!(types(&record, 2), vec!["core/italic", "core/bold"]);
    }

    #[test]
    fn split_tags_merge_into_one_run() {
        let record = create("<em>te</em><em>st</em>");
        assert_eq!(record.text(), "test");
        assert!((0..4).all(|i| types(&record, i) == vec!["core/italic"]));
        let shared = record.formats()[0].as_ref().unwrap();
        assert!(Arc::ptr_eq(shared, record.formats()[3].as_ref().unwrap()));
    }

    #[test]
    fn nested_same_type_collapses() {
        let record = create("<strong>a<strong>b</strong></strong>");
        assert_eq!(types(&record, 1), vec!["core/bold"]);
    }

    #[rstest]
    #[case("a<br>b", "a\nb")]
    #[case("a\nb\r\n", "ab")]
    #[case("\u{feff}a\u{feff}", "a")]
    #[case("a\u{fffc}b", "ab")]
    #[case("<strong></strong>x", "x")]
    #[case("&lt;b&gt;", "<b>")]
    fn text_filtering(#[case] html: &str, #[case] text: &str) {
        assert_eq!(create(html).text(), text);
    }

    #[test]
    fn link_attributes_map_to_keys() {
        let record = create(r#"<a href="https://x" rel="noopener">l</a>"#);
        let link = &record.formats_at(0)[0];
        assert_eq!(link.format_type, "core/link");
        assert_eq!(link.attribute("url"), Some("https://x"));
        assert_eq!(
            link.unregistered_attributes.get("rel").map(String::as_str),
            Some("noopener")
        );
    }

    #[test]
    fn unregistered_tag_keeps_its_attributes() {
        let record = create(r#"<span lang="fr">oui</span>"#);
        let format = &record.formats_at(0)[0];
        assert_eq!(format.format_type, "span");
        assert_eq!(format.attribute("lang"), Some("fr"));
    }

    #[test]
    fn image_becomes_object_replacement() {
        let record = create(r#"a<img src="i.png" alt="">b"#);
        assert_eq!(record.text(), "a\u{fffc}b");
        assert!(record.formats()[1].is_none());
        let image = record.replacement_at(1).unwrap();
        assert_eq!(image.format_type, "core/image");
        assert_eq!(image.attribute("url"), Some("i.png"));
        assert!(image.object);
    }

    #[test]
    fn object_inside_format_keeps_wrapper() {
        let record = create(r#"<a href="x"><img src="i.png"></a>"#);
        assert_eq!(types(&record, 0), vec!["core/link"]);
        assert!(record.replacement_at(0).is_some());
    }

    #[test]
    fn comments_are_preserved_as_objects() {
        let record = create("a<!--note--><//funky>");
        assert_eq!(record.text(), "a\u{fffc}\u{fffc}");
        let data: Vec<_> = (1..3)
            .map(|i| record.replacement_at(i).unwrap().attribute(COMMENT_ATTRIBUTE).unwrap())
            .collect();
        assert_eq!(data, vec!["note", "/funky"]);
    }

    #[test]
    fn scripts_are_disarmed() {
        let record = create(r#"<script>alert("x")</script>"#);
        let script = record.replacement_at(0).unwrap();
        assert_eq!(script.format_type, "script");
        assert_eq!(
            script.attribute(SCRIPT_ATTRIBUTE),
            Some("alert%28%22x%22%29")
        );
    }

    #[test]
    fn event_handlers_are_renamed_and_boundaries_dropped() {
        let record = create(
            r#"<span onclick="evil()" data-rich-text-format-boundary="true">x</span>"#,
        );
        let format = &record.formats_at(0)[0];
        assert_eq!(
            format.attributes.keys().collect::<Vec<_>>(),
            vec!["data-disable-rich-text-onclick"]
        );
    }

    #[test]
    fn multiline_joins_lines_with_separator() {
        let registry = FormatTypeRegistry::with_core_formats();
        let doc = Document::parse_fragment("<p>one</p><div>skip</div><p><em>two</em></p>");
        let record = create_from_element(
            &doc,
            doc.root(),
            &CreateOptions::new(&registry).multiline("p"),
        );
        assert_eq!(record.text(), "one\u{2028}two");
        assert_eq!(types(&record, 4), vec!["core/italic"]);
        assert!(record.formats()[3].is_none());
    }
}
