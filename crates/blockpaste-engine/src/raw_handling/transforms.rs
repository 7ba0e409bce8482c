use std::fmt;
use std::sync::Arc;

use blockpaste_dom::{Document, NodeId, Selector};
use log::debug;
use serde::{Deserialize, Serialize};

use super::RawHandlerContext;
use crate::blocks::{Block, BlockError, BlockTypeRegistry};

/// Priority of transforms that do not set one. Lower runs first.
pub const DEFAULT_PRIORITY: i32 = 10;

/// What a `from` transform converts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransformKind {
    /// Pasted or raw HTML nodes.
    Raw,
    /// Other blocks.
    Block,
    Shortcode,
    Files,
    Prefix,
    Enter,
}

pub type IsMatchFn = Arc<dyn Fn(&Document, NodeId) -> bool + Send + Sync>;

pub type TransformFn =
    Arc<dyn Fn(&Document, NodeId, &RawHandlerContext<'_>) -> Result<Block, BlockError> + Send + Sync>;

/// How a raw transform decides whether it applies to a node.
#[derive(Clone)]
pub enum Matcher {
    Predicate(IsMatchFn),
    Selector(Selector),
}

impl Matcher {
    pub fn is_match(&self, doc: &Document, node: NodeId) -> bool {
        match self {
            Self::Predicate(is_match) => is_match(doc, node),
            Self::Selector(selector) => doc.matches(node, selector),
        }
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Predicate(_) => f.write_str("Predicate(..)"),
            Self::Selector(selector) => f.debug_tuple("Selector").field(&selector.as_str()).finish(),
        }
    }
}

/// A `from` transform as a block type registers it.
///
/// Either `is_match` or `selector` (or both) should be set for raw
/// transforms; `is_match` takes precedence.
#[derive(Clone)]
pub struct Transform {
    pub kind: TransformKind,
    pub is_match: Option<IsMatchFn>,
    pub selector: Option<Selector>,
    /// Without a transform function the block is built from the node's
    /// markup using the block type's attribute schema.
    pub transform: Option<TransformFn>,
    pub priority: Option<i32>,
}

impl Transform {
    pub fn new(kind: TransformKind) -> Self {
        Self {
            kind,
            is_match: None,
            selector: None,
            transform: None,
            priority: None,
        }
    }

    pub fn raw() -> Self {
        Self::new(TransformKind::Raw)
    }

    pub fn with_selector(mut self, selector: Selector) -> Self {
        self.selector = Some(selector);
        self
    }

    pub fn with_is_match(
        mut self,
        is_match: impl Fn(&Document, NodeId) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.is_match = Some(Arc::new(is_match));
        self
    }

    pub fn with_transform(
        mut self,
        transform: impl Fn(&Document, NodeId, &RawHandlerContext<'_>) -> Result<Block, BlockError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        self.transform = Some(Arc::new(transform));
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transform")
            .field("kind", &self.kind)
            .field("is_match", &self.is_match.as_ref().map(|_| ".."))
            .field("selector", &self.selector.as_ref().map(Selector::as_str))
            .field("transform", &self.transform.as_ref().map(|_| ".."))
            .field("priority", &self.priority)
            .finish()
    }
}

/// A raw transform normalized for matching: it always has a [`Matcher`].
#[derive(Clone)]
pub struct RawTransform {
    pub block_name: String,
    pub matcher: Matcher,
    pub transform: Option<TransformFn>,
    pub priority: i32,
}

impl RawTransform {
    fn normalize(block_name: &str, transform: &Transform) -> Option<Self> {
        let matcher = match (&transform.is_match, &transform.selector) {
            (Some(is_match), _) => Matcher::Predicate(is_match.clone()),
            (None, Some(selector)) => Matcher::Selector(selector.clone()),
            (None, None) => {
                debug!("skipping raw transform of {block_name}: no predicate or selector");
                return None;
            }
        };
        Some(Self {
            block_name: block_name.to_string(),
            matcher,
            transform: transform.transform.clone(),
            priority: transform.priority.unwrap_or(DEFAULT_PRIORITY),
        })
    }

    pub fn is_match(&self, doc: &Document, node: NodeId) -> bool {
        self.matcher.is_match(doc, node)
    }
}

impl fmt::Debug for RawTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawTransform")
            .field("block_name", &self.block_name)
            .field("matcher", &self.matcher)
            .field("transform", &self.transform.as_ref().map(|_| ".."))
            .field("priority", &self.priority)
            .finish()
    }
}

/// All raw transforms of all block types, ready for first-match lookup.
///
/// Ordered by priority (lower first); equal priorities keep registration
/// order.
pub fn get_raw_transforms(registry: &BlockTypeRegistry) -> Vec<RawTransform> {
    let mut transforms: Vec<RawTransform> = registry
        .iter()
        .flat_map(|block_type| {
            block_type
                .transforms
                .iter()
                .filter(|t| t.kind == TransformKind::Raw)
                .filter_map(|t| RawTransform::normalize(&block_type.name, t))
        })
        .collect();
    transforms.sort_by_key(|t| t.priority);
    transforms
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::BlockType;
    use pretty_assertions::assert_eq;

    fn registry() -> BlockTypeRegistry {
        let mut registry = BlockTypeRegistry::new();
        registry
            .register(
                BlockType::new("test/late", "Late")
                    .with_transform(Transform::raw().with_selector(Selector::parse("p").unwrap()).with_priority(20)),
            )
            .unwrap();
        registry
            .register(
                BlockType::new("test/first", "First")
                    .with_transform(Transform::raw().with_selector(Selector::parse("div").unwrap()))
                    .with_transform(Transform::new(TransformKind::Shortcode))
                    .with_transform(Transform::raw()),
            )
            .unwrap();
        registry
            .register(
                BlockType::new("test/second", "Second").with_transform(
                    Transform::raw()
                        .with_selector(Selector::parse("never").unwrap())
                        .with_is_match(|doc, node| doc.is_tag(node, "div")),
                ),
            )
            .unwrap();
        registry
    }

    #[test]
    fn filters_to_raw_and_orders_by_priority() {
        let transforms = get_raw_transforms(&registry());
        let names: Vec<_> = transforms.iter().map(|t| t.block_name.as_str()).collect();
        assert_eq!(names, vec!["test/first", "test/second", "test/late"]);
        assert_eq!(transforms[0].priority, DEFAULT_PRIORITY);
    }

    #[test]
    fn every_candidate_is_callable_as_a_predicate() {
        let transforms = get_raw_transforms(&registry());
        let doc = Document::parse_fragment("<div></div>");
        let div = doc.first_child(doc.root()).unwrap();
        let matches: Vec<_> = transforms.iter().map(|t| t.is_match(&doc, div)).collect();
        assert_eq!(matches, vec![true, true, false]);
    }

    #[test]
    fn predicate_wins_over_selector() {
        let transforms = get_raw_transforms(&registry());
        assert!(matches!(transforms[1].matcher, Matcher::Predicate(_)));
        assert!(matches!(transforms[0].matcher, Matcher::Selector(_)));
    }
}
