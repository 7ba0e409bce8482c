//! Block attributes sourced from saved markup.
//!
//! A block type declares, per attribute, where its value lives in the HTML:
//! an element attribute, an element's inner HTML, its text, or its tag name.
//! Each source optionally narrows the search with a selector; the first
//! matching element (in document order, including the outermost one) is
//! used.

use std::collections::BTreeMap;

use blockpaste_dom::{Document, NodeId, Selector};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::registry::BlockType;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeSource {
    /// Value of the HTML attribute `attribute`.
    Attribute {
        selector: Option<Selector>,
        attribute: String,
    },
    /// Inner HTML.
    Html { selector: Option<Selector> },
    /// Text content.
    Text { selector: Option<Selector> },
    /// Lowercase tag name.
    Tag { selector: Option<Selector> },
    /// Not stored in markup; only the default or an explicit value applies.
    None,
}

impl AttributeSource {
    fn selector(&self) -> Option<&Selector> {
        match self {
            Self::Attribute { selector, .. }
            | Self::Html { selector }
            | Self::Text { selector }
            | Self::Tag { selector } => selector.as_ref(),
            Self::None => None,
        }
    }
}

/// Declared value type of an attribute. Values are held as text and typed
/// on output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeType {
    #[default]
    String,
    Integer,
    Number,
    Boolean,
}

impl AttributeType {
    /// `raw` as a JSON value of this type, or `None` if it is not one.
    pub fn to_value(self, raw: &str) -> Option<Value> {
        match self {
            Self::String => Some(Value::String(raw.to_string())),
            Self::Integer => raw.trim().parse::<i64>().ok().map(Value::from),
            Self::Number => raw
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number),
            Self::Boolean => raw.trim().parse::<bool>().ok().map(Value::Bool),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeSchema {
    pub source: AttributeSource,
    pub kind: AttributeType,
    pub default: Option<String>,
}

impl AttributeSchema {
    pub fn new(source: AttributeSource) -> Self {
        Self {
            source,
            kind: AttributeType::default(),
            default: None,
        }
    }

    /// An attribute that is not sourced from markup.
    pub fn plain() -> Self {
        Self::new(AttributeSource::None)
    }

    pub fn with_type(mut self, kind: AttributeType) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Whether `raw` is a valid value of the declared type.
    pub fn accepts(&self, raw: &str) -> bool {
        self.kind.to_value(raw).is_some()
    }
}

/// Evaluates every attribute schema of `block_type` against `html`.
///
/// Attributes whose source finds nothing fall back to their default, and
/// are omitted when there is none.
pub fn get_block_attributes(block_type: &BlockType, html: &str) -> BTreeMap<String, String> {
    let doc = Document::parse_fragment(html);
    block_type
        .attributes
        .iter()
        .filter_map(|(key, schema)| {
            parse_source(&doc, &schema.source)
                .or_else(|| schema.default.clone())
                .map(|value| (key.clone(), value))
        })
        .collect()
}

fn parse_source(doc: &Document, source: &AttributeSource) -> Option<String> {
    if matches!(source, AttributeSource::None) {
        return None;
    }
    let node: NodeId = match source.selector() {
        Some(selector) => doc.query_selector(doc.root(), selector)?,
        None => doc.root(),
    };
    match source {
        AttributeSource::Attribute { attribute, .. } => {
            doc.attribute(node, attribute).map(str::to_string)
        }
        AttributeSource::Html { .. } => Some(doc.inner_html(node)),
        AttributeSource::Text { .. } => Some(doc.text_content(node)),
        AttributeSource::Tag { .. } => doc.tag_name(node).map(str::to_string),
        AttributeSource::None => None,
    }
}
