//! # Raw handling
//!
//! Converts pasted or raw HTML into blocks.
//!
//! ## Pipeline
//!
//! ```text
//! HTML ─parse─▶ Document ─flatten lists in cells─▶ top-level elements
//!                                                     │
//!              ┌──────────── first matching raw transform? ────────────┐
//!              ▼ yes                                                    ▼ no
//!   transform fn / schema attributes                          core/html fallback
//! ```
//!
//! Every top-level element yields exactly one block, in document order:
//! content that no transform claims (or whose transform fails) is kept
//! verbatim in the fallback block rather than dropped. Bare top-level text
//! is expected to have been wrapped by earlier filtering and is ignored.

pub mod nested_list;
pub mod transforms;

pub use nested_list::{flatten_lists_in, nested_list_converter};
pub use transforms::{
    DEFAULT_PRIORITY, IsMatchFn, Matcher, RawTransform, Transform, TransformFn, TransformKind,
    get_raw_transforms,
};

use std::collections::BTreeMap;

use blockpaste_dom::{Document, NodeId, Selector};
use log::{debug, trace, warn};

use crate::blocks::{
    Block, BlockError, BlockTypeRegistry, CLASS_NAME_ATTRIBUTE, get_block_attributes,
};
use crate::rich_text::FormatTypeRegistry;

/// Block used for content no transform claims.
pub const DEFAULT_FALLBACK_BLOCK: &str = "core/html";

/// Attribute of the fallback block holding the original markup.
pub const FALLBACK_CONTENT_ATTRIBUTE: &str = "content";

/// Elements inside which lists are flattened by default.
pub const DEFAULT_FLATTEN_SCOPE: &str = "td, th";

/// Everything a conversion needs, passed to every transform function.
#[derive(Debug, Clone)]
pub struct RawHandlerContext<'a> {
    pub blocks: &'a BlockTypeRegistry,
    pub format_types: &'a FormatTypeRegistry,
    pub fallback_block: String,
    /// Lists inside elements matching this selector are flattened before
    /// matching. `None` disables flattening.
    pub flatten_lists_in: Option<Selector>,
}

impl<'a> RawHandlerContext<'a> {
    pub fn new(blocks: &'a BlockTypeRegistry, format_types: &'a FormatTypeRegistry) -> Self {
        Self {
            blocks,
            format_types,
            fallback_block: DEFAULT_FALLBACK_BLOCK.to_string(),
            flatten_lists_in: Some(
                Selector::parse(DEFAULT_FLATTEN_SCOPE).expect("default flatten scope is valid"),
            ),
        }
    }

    pub fn with_fallback_block(mut self, name: impl Into<String>) -> Self {
        self.fallback_block = name.into();
        self
    }

    pub fn with_list_flattening(mut self, scope: Option<Selector>) -> Self {
        self.flatten_lists_in = scope;
        self
    }
}

/// Converts `html` into one block per top-level element.
pub fn html_to_blocks(html: &str, ctx: &RawHandlerContext<'_>) -> Vec<Block> {
    let mut doc = Document::parse_fragment(html);
    if let Some(scope) = &ctx.flatten_lists_in {
        let flattened = flatten_lists_in(&mut doc, scope);
        if flattened > 0 {
            trace!("flattened {flattened} list(s) inside {scope}");
        }
    }

    let transforms = get_raw_transforms(ctx.blocks);
    let nodes: Vec<NodeId> = doc.element_children(doc.root()).collect();
    nodes
        .into_iter()
        .map(|node| node_to_block(&doc, node, &transforms, ctx))
        .collect()
}

fn node_to_block(
    doc: &Document,
    node: NodeId,
    transforms: &[RawTransform],
    ctx: &RawHandlerContext<'_>,
) -> Block {
    let tag = doc.tag_name(node).unwrap_or_default();
    let Some(raw) = transforms.iter().find(|t| t.is_match(doc, node)) else {
        debug!("no raw transform matches <{tag}>, using {}", ctx.fallback_block);
        return fallback_block(doc, node, ctx);
    };
    debug!("<{tag}> matched raw transform of {}", raw.block_name);

    let result = match &raw.transform {
        Some(transform) => transform(doc, node, ctx).map(|mut block| {
            if let Some(class) = doc.attribute(node, "class") {
                block.set_attribute(CLASS_NAME_ATTRIBUTE, class);
            }
            block
        }),
        None => ctx
            .blocks
            .get(&raw.block_name)
            .ok_or_else(|| BlockError::UnknownBlockType(raw.block_name.clone()))
            .and_then(|block_type| {
                let attributes = get_block_attributes(block_type, &doc.outer_html(node));
                ctx.blocks.create_block(&raw.block_name, attributes, Vec::new())
            }),
    };

    result.unwrap_or_else(|err| {
        warn!("raw transform of {} failed on <{tag}>: {err}", raw.block_name);
        fallback_block(doc, node, ctx)
    })
}

/// A block holding the node's markup verbatim.
fn fallback_block(doc: &Document, node: NodeId, ctx: &RawHandlerContext<'_>) -> Block {
    let attributes = BTreeMap::from([(
        FALLBACK_CONTENT_ATTRIBUTE.to_string(),
        doc.outer_html(node),
    )]);
    if ctx.blocks.get(&ctx.fallback_block).is_some()
        && let Ok(block) = ctx
            .blocks
            .create_block(&ctx.fallback_block, attributes.clone(), Vec::new())
        && block.attribute(FALLBACK_CONTENT_ATTRIBUTE).is_some()
    {
        return block;
    }
    Block::new(ctx.fallback_block.clone(), attributes, Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::{AttributeSchema, AttributeSource, BlockType};
    use pretty_assertions::assert_eq;

    fn names(blocks: &[Block]) -> Vec<&str> {
        blocks.iter().map(|b| b.name.as_str()).collect()
    }

    fn registry() -> BlockTypeRegistry {
        let mut registry = BlockTypeRegistry::new();
        registry
            .register(
                BlockType::new("test/image", "Image")
                    .with_attribute(
                        "url",
                        AttributeSchema::new(AttributeSource::Attribute {
                            selector: Some(Selector::parse("img").unwrap()),
                            attribute: "src".into(),
                        }),
                    )
                    .with_transform(
                        Transform::raw().with_selector(Selector::parse("figure:has(img)").unwrap()),
                    ),
            )
            .unwrap();
        registry
            .register(
                BlockType::new("test/heading", "Heading")
                    .with_attribute("level", AttributeSchema::plain())
                    .with_transform(Transform::raw().with_is_match(|doc, node| doc.is_tag(node, "h2")).with_transform(
                        |doc, node, ctx| {
                            let level = doc.tag_name(node).unwrap_or("h2")[1..].to_string();
                            ctx.blocks.create_block(
                                "test/heading",
                                BTreeMap::from([("level".to_string(), level)]),
                                vec![],
                            )
                        },
                    )),
            )
            .unwrap();
        registry
            .register(BlockType::new("test/broken", "Broken").with_transform(
                Transform::raw()
                    .with_selector(Selector::parse("aside").unwrap())
                    .with_transform(|_, _, _| {
                        Err(BlockError::TransformFailed {
                            block_name: "test/broken".into(),
                            reason: "nope".into(),
                        })
                    }),
            ))
            .unwrap();
        registry
    }

    #[test]
    fn one_block_per_top_level_element() {
        let registry = registry();
        let format_types = FormatTypeRegistry::new();
        let ctx = RawHandlerContext::new(&registry, &format_types);
        let blocks = html_to_blocks(
            "<p>Hello</p><figure><img src=\"x\"></figure><h2 class=\"big\">T</h2><aside>a</aside>",
            &ctx,
        );

        assert_eq!(
            names(&blocks),
            vec!["core/html", "test/image", "test/heading", "core/html"]
        );
        assert_eq!(blocks[0].attribute("content"), Some("<p>Hello</p>"));
        assert_eq!(blocks[1].attribute("url"), Some("x"));
        assert_eq!(blocks[2].attribute("level"), Some("2"));
        assert_eq!(blocks[2].attribute("className"), Some("big"));
        assert_eq!(blocks[3].attribute("content"), Some("<aside>a</aside>"));
    }

    #[test]
    fn bare_text_is_ignored() {
        let registry = registry();
        let format_types = FormatTypeRegistry::new();
        let ctx = RawHandlerContext::new(&registry, &format_types);
        assert!(html_to_blocks("just text", &ctx).is_empty());
    }

    #[test]
    fn custom_fallback_block() {
        let registry = registry();
        let format_types = FormatTypeRegistry::new();
        let ctx = RawHandlerContext::new(&registry, &format_types).with_fallback_block("my/raw");
        let blocks = html_to_blocks("<div>x</div>", &ctx);
        assert_eq!(names(&blocks), vec!["my/raw"]);
        assert_eq!(blocks[0].attribute("content"), Some("<div>x</div>"));
    }

    #[test]
    fn list_flattening_can_be_disabled() {
        let registry = registry();
        let format_types = FormatTypeRegistry::new();
        let html = "<table><tr><td><ul><li>a</li></ul></td></tr></table>";

        let ctx = RawHandlerContext::new(&registry, &format_types);
        let flattened = html_to_blocks(html, &ctx);
        assert_eq!(
            flattened[0].attribute("content"),
            Some("<table><tr><td><p><br>- a</p></td></tr></table>")
        );

        let ctx = ctx.with_list_flattening(None);
        let kept = html_to_blocks(html, &ctx);
        assert_eq!(kept[0].attribute("content"), Some(html));
    }
}
