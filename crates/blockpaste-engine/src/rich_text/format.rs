use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A named annotation (bold, link, ...) applied to characters of a
/// [`Record`](super::Record).
///
/// Two formats are "the same format" at a position when their `format_type`
/// matches; attributes are carried but ignored for de-duplication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Format {
    #[serde(rename = "type")]
    pub format_type: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
    /// HTML attributes the registered format type does not declare.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub unregistered_attributes: BTreeMap<String, String>,
    /// Set when the format stands for an object replacement character.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub object: bool,
}

impl Format {
    pub fn new(format_type: impl Into<String>) -> Self {
        Self {
            format_type: format_type.into(),
            attributes: BTreeMap::new(),
            unregistered_attributes: BTreeMap::new(),
            object: false,
        }
    }

    /// Builder-style attribute setter.
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn is_same_type(&self, other: &Format) -> bool {
        self.format_type == other.format_type
    }

    pub(crate) fn into_object(mut self) -> Self {
        self.object = true;
        self
    }
}
