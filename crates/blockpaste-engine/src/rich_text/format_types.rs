use std::collections::BTreeMap;
use std::sync::OnceLock;

use log::debug;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatTypeError {
    #[error(
        "Format names must contain a namespace prefix, include only lowercase alphanumeric \
         characters or dashes, and start with a letter. Example: my-plugin/my-custom-format. Got {0:?}"
    )]
    InvalidName(String),
    #[error("Format {0:?} is already registered")]
    AlreadyRegistered(String),
    #[error("Format {name:?} needs a tag name")]
    MissingTagName { name: String },
    #[error("Format {existing:?} is already registered to handle <{tag_name}> (class {class_name:?})")]
    TagAlreadyHandled {
        tag_name: String,
        class_name: Option<String>,
        existing: String,
    },
}

/// How a format maps to HTML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatType {
    /// Namespaced name, e.g. `core/bold`.
    pub name: String,
    pub tag_name: String,
    /// When set, only elements carrying this class use this type.
    #[serde(default)]
    pub class_name: Option<String>,
    /// Format attribute key → HTML attribute name.
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    /// Objects (images, ...) occupy an object replacement character.
    #[serde(default)]
    pub object: bool,
}

impl FormatType {
    pub fn new(name: impl Into<String>, tag_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tag_name: tag_name.into(),
            class_name: None,
            attributes: BTreeMap::new(),
            object: false,
        }
    }

    pub fn with_class(mut self, class_name: impl Into<String>) -> Self {
        self.class_name = Some(class_name.into());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, html_name: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), html_name.into());
        self
    }

    pub fn object(mut self) -> Self {
        self.object = true;
        self
    }

    /// The format attribute key for an HTML attribute name.
    pub fn key_for_html_attribute(&self, html_name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(_, html)| html.as_str() == html_name)
            .map(|(key, _)| key.as_str())
    }
}

fn name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z][a-z0-9-]*/[a-z][a-z0-9-]*$").expect("format name regex is valid"))
}

/// Registered format types, in registration order.
#[derive(Debug, Clone, Default)]
pub struct FormatTypeRegistry {
    types: Vec<FormatType>,
}

impl FormatTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the inline formats every editor ships.
    pub fn with_core_formats() -> Self {
        let mut registry = Self::new();
        let core = [
            FormatType::new("core/bold", "strong"),
            FormatType::new("core/italic", "em"),
            FormatType::new("core/code", "code"),
            FormatType::new("core/strikethrough", "s"),
            FormatType::new("core/subscript", "sub"),
            FormatType::new("core/superscript", "sup"),
            FormatType::new("core/link", "a")
                .with_attribute("url", "href")
                .with_attribute("target", "target"),
            FormatType::new("core/image", "img")
                .with_attribute("url", "src")
                .with_attribute("alt", "alt")
                .object(),
        ];
        for format_type in core {
            registry
                .register(format_type)
                .expect("core format types are consistent");
        }
        registry
    }

    pub fn register(&mut self, format_type: FormatType) -> Result<(), FormatTypeError> {
        if !name_regex().is_match(&format_type.name) {
            return Err(FormatTypeError::InvalidName(format_type.name));
        }
        if self.get(&format_type.name).is_some() {
            return Err(FormatTypeError::AlreadyRegistered(format_type.name));
        }
        if format_type.tag_name.trim().is_empty() {
            return Err(FormatTypeError::MissingTagName {
                name: format_type.name,
            });
        }
        if let Some(existing) = self.types.iter().find(|t| {
            t.tag_name.eq_ignore_ascii_case(&format_type.tag_name)
                && t.class_name == format_type.class_name
        }) {
            return Err(FormatTypeError::TagAlreadyHandled {
                tag_name: format_type.tag_name,
                class_name: format_type.class_name,
                existing: existing.name.clone(),
            });
        }
        debug!("registered format type {}", format_type.name);
        self.types.push(format_type);
        Ok(())
    }

    pub fn unregister(&mut self, name: &str) -> Option<FormatType> {
        let index = self.types.iter().position(|t| t.name == name)?;
        Some(self.types.remove(index))
    }

    pub fn get(&self, name: &str) -> Option<&FormatType> {
        self.types.iter().find(|t| t.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FormatType> {
        self.types.iter()
    }

    /// The type handling an element: a class-specific registration wins over
    /// a bare one for the same tag.
    pub fn find_for_element(&self, tag_name: &str, classes: &[&str]) -> Option<&FormatType> {
        let same_tag = || {
            self.types
                .iter()
                .filter(|t| t.tag_name.eq_ignore_ascii_case(tag_name))
        };
        same_tag()
            .find(|t| {
                t.class_name
                    .as_deref()
                    .is_some_and(|c| classes.contains(&c))
            })
            .or_else(|| same_tag().find(|t| t.class_name.is_none()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("bold")]
    #[case("Core/bold")]
    #[case("core/")]
    #[case("core/bold/extra")]
    #[case("1core/bold")]
    fn test_invalid_names_are_rejected(#[case] name: &str) {
        let mut registry = FormatTypeRegistry::new();
        assert_eq!(
            registry.register(FormatType::new(name, "b")),
            Err(FormatTypeError::InvalidName(name.to_string()))
        );
    }

    #[test]
    fn test_duplicates_are_rejected() {
        let mut registry = FormatTypeRegistry::with_core_formats();
        assert_eq!(
            registry.register(FormatType::new("core/bold", "b")),
            Err(FormatTypeError::AlreadyRegistered("core/bold".into()))
        );
        assert!(matches!(
            registry.register(FormatType::new("my/strong", "strong")),
            Err(FormatTypeError::TagAlreadyHandled { existing, .. }) if existing == "core/bold"
        ));
    }

    #[test]
    fn test_class_specific_type_wins() {
        let mut registry = FormatTypeRegistry::with_core_formats();
        registry
            .register(FormatType::new("my/highlight", "mark").with_class("hl"))
            .unwrap();
        registry
            .register(FormatType::new("my/mark", "mark"))
            .unwrap();

        let found = registry.find_for_element("mark", &["x", "hl"]).unwrap();
        assert_eq!(found.name, "my/highlight");
        let found = registry.find_for_element("MARK", &[]).unwrap();
        assert_eq!(found.name, "my/mark");
        assert!(registry.find_for_element("u", &[]).is_none());
    }

    #[test]
    fn test_unregister_returns_the_type() {
        let mut registry = FormatTypeRegistry::with_core_formats();
        let removed = registry.unregister("core/code").unwrap();
        assert_eq!(removed.tag_name, "code");
        assert!(registry.get("core/code").is_none());
        assert!(registry.unregister("core/code").is_none());
    }

    #[test]
    fn test_attribute_keys_map_to_html_names() {
        let registry = FormatTypeRegistry::with_core_formats();
        let link = registry.get("core/link").unwrap();
        assert_eq!(link.key_for_html_attribute("href"), Some("url"));
        assert_eq!(link.key_for_html_attribute("rel"), None);
    }
}
