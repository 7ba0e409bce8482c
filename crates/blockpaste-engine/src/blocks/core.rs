//! The built-in `core/*` block types and their raw transforms.

use std::collections::BTreeMap;

use blockpaste_dom::{Document, NodeId, Selector};

use super::attributes::{AttributeSchema, AttributeSource, AttributeType};
use super::block::Block;
use super::parser::ORIGINAL_CONTENT_ATTRIBUTE;
use super::registry::{BlockError, BlockType, BlockTypeRegistry};
use crate::raw_handling::{RawHandlerContext, Transform, html_to_blocks};

pub const PARAGRAPH_BLOCK: &str = "core/paragraph";
pub const HTML_BLOCK: &str = "core/html";
pub const PATTERN_BLOCK: &str = "core/pattern";
/// Placeholder for content that cannot be rendered.
pub const MISSING_BLOCK: &str = "core/missing";

fn sel(selector: &str) -> Selector {
    Selector::parse(selector).expect("built-in selector is valid")
}

fn html(selector: &str) -> AttributeSchema {
    AttributeSchema::new(AttributeSource::Html {
        selector: Some(sel(selector)),
    })
}

fn attribute(selector: &str, name: &str) -> AttributeSchema {
    AttributeSchema::new(AttributeSource::Attribute {
        selector: Some(sel(selector)),
        attribute: name.to_string(),
    })
}

fn has_image(doc: &Document, node: NodeId) -> bool {
    doc.descendants(node)
        .into_iter()
        .any(|n| doc.is_tag(n, "img"))
}

fn paragraph() -> BlockType {
    BlockType::new(PARAGRAPH_BLOCK, "Paragraph")
        .with_attribute("content", html("p"))
        .with_transform(
            Transform::raw()
                .with_is_match(|doc, node| doc.is_tag(node, "p") && !has_image(doc, node))
                .with_priority(20),
        )
}

fn heading() -> BlockType {
    BlockType::new("core/heading", "Heading")
        .with_attribute("content", html("h1, h2, h3, h4, h5, h6"))
        .with_attribute(
            "level",
            AttributeSchema::plain()
                .with_type(AttributeType::Integer)
                .with_default("2"),
        )
        .with_transform(
            Transform::raw()
                .with_selector(sel("h1, h2, h3, h4, h5, h6"))
                .with_transform(|doc, node, ctx| {
                    let level = doc
                        .tag_name(node)
                        .and_then(|t| t.strip_prefix('h'))
                        .unwrap_or("2")
                        .to_string();
                    ctx.blocks.create_block(
                        "core/heading",
                        BTreeMap::from([
                            ("content".to_string(), doc.inner_html(node)),
                            ("level".to_string(), level),
                        ]),
                        Vec::new(),
                    )
                }),
        )
}

fn list() -> BlockType {
    BlockType::new("core/list", "List")
        .with_attribute("values", html("ol, ul"))
        .with_attribute(
            "ordered",
            AttributeSchema::plain()
                .with_type(AttributeType::Boolean)
                .with_default("false"),
        )
        .with_transform(
            Transform::raw()
                .with_selector(sel("ol, ul"))
                .with_transform(|doc, node, ctx| {
                    ctx.blocks.create_block(
                        "core/list",
                        BTreeMap::from([
                            ("values".to_string(), doc.inner_html(node)),
                            ("ordered".to_string(), doc.is_tag(node, "ol").to_string()),
                        ]),
                        Vec::new(),
                    )
                }),
        )
}

/// Quotes keep their content as inner blocks, converted recursively.
fn quote() -> BlockType {
    BlockType::new("core/quote", "Quote")
        .with_attribute("citation", html("cite"))
        .with_transform(
            Transform::raw()
                .with_selector(sel("blockquote"))
                .with_transform(quote_from_node),
        )
}

fn quote_from_node(
    doc: &Document,
    node: NodeId,
    ctx: &RawHandlerContext<'_>,
) -> Result<Block, BlockError> {
    let mut inner_blocks = html_to_blocks(&doc.inner_html(node), ctx);
    if inner_blocks.is_empty() && doc.has_child_nodes(node) {
        let content = doc.inner_html(node);
        inner_blocks.push(ctx.blocks.create_block(
            PARAGRAPH_BLOCK,
            BTreeMap::from([("content".to_string(), content)]),
            Vec::new(),
        )?);
    }
    let mut attributes = BTreeMap::new();
    if let Some(cite) = doc
        .descendants(node)
        .into_iter()
        .find(|n| doc.is_tag(*n, "cite"))
    {
        attributes.insert("citation".to_string(), doc.inner_html(cite));
    }
    ctx.blocks.create_block("core/quote", attributes, inner_blocks)
}

fn image() -> BlockType {
    BlockType::new("core/image", "Image")
        .with_attribute("url", attribute("img", "src"))
        .with_attribute("alt", attribute("img", "alt").with_default(""))
        .with_attribute("caption", html("figcaption"))
        .with_attribute("href", attribute("figure > a", "href"))
        .with_transform(Transform::raw().with_selector(sel("figure:has(img)")))
}

fn separator() -> BlockType {
    BlockType::new("core/separator", "Separator")
        .with_transform(Transform::raw().with_selector(sel("hr")))
}

fn preformatted() -> BlockType {
    BlockType::new("core/preformatted", "Preformatted")
        .with_attribute("content", html("pre"))
        .with_transform(Transform::raw().with_selector(sel("pre")))
}

fn custom_html() -> BlockType {
    BlockType::new(HTML_BLOCK, "Custom HTML").with_attribute("content", AttributeSchema::plain())
}

fn pattern() -> BlockType {
    BlockType::new(PATTERN_BLOCK, "Pattern").with_attribute("slug", AttributeSchema::plain())
}

fn missing() -> BlockType {
    BlockType::new(MISSING_BLOCK, "Unsupported")
        .with_attribute("originalName", AttributeSchema::plain())
        .with_attribute("slug", AttributeSchema::plain())
        .with_attribute("reason", AttributeSchema::plain())
        .with_attribute(ORIGINAL_CONTENT_ATTRIBUTE, AttributeSchema::plain())
}

impl BlockTypeRegistry {
    /// A registry holding the built-in block types, in an order where the
    /// more specific raw transforms are tried first.
    pub fn with_core_blocks() -> Self {
        let mut registry = Self::new();
        for block_type in [
            heading(),
            list(),
            quote(),
            image(),
            separator(),
            preformatted(),
            paragraph(),
            custom_html(),
            pattern(),
            missing(),
        ] {
            registry
                .register(block_type)
                .expect("core block types are consistent");
        }
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rich_text::FormatTypeRegistry;
    use insta::assert_snapshot;
    use pretty_assertions::assert_eq;

    fn convert(html: &str) -> Vec<Block> {
        let registry = BlockTypeRegistry::with_core_blocks();
        let format_types = FormatTypeRegistry::with_core_formats();
        html_to_blocks(html, &RawHandlerContext::new(&registry, &format_types))
    }

    /// `name {attributes}` per block, inner blocks indented.
    fn outline(blocks: &[Block], indent: usize) -> String {
        let mut out = String::new();
        for block in blocks {
            out.push_str(&format!("{}{} {:?}\n", "  ".repeat(indent), block.name, block.attributes));
            out.push_str(&outline(&block.inner_blocks, indent + 1));
        }
        out
    }

    #[test]
    fn core_blocks_cover_common_markup() {
        let blocks = convert(concat!(
            "<h3>Title</h3>",
            "<p>Some <strong>text</strong></p>",
            "<figure><img src=\"cat.png\" alt=\"Cat\"><figcaption>A cat</figcaption></figure>",
            "<ol><li>one</li></ol>",
            "<hr>",
            "<blockquote><p>Quoted</p><cite>Me</cite></blockquote>",
            "<div>unknown</div>",
        ));
        assert_snapshot!(outline(&blocks, 0), @r#"
        core/heading {"content": "Title", "level": "3"}
        core/paragraph {"content": "Some <strong>text</strong>"}
        core/image {"alt": "Cat", "caption": "A cat", "url": "cat.png"}
        core/list {"ordered": "true", "values": "<li>one</li>"}
        core/separator {}
        core/quote {"citation": "Me"}
          core/paragraph {"content": "Quoted"}
          core/html {"content": "<cite>Me</cite>"}
        core/html {"content": "<div>unknown</div>"}
        "#);
    }

    #[test]
    fn paragraph_with_image_is_not_a_paragraph() {
        let blocks = convert("<p><img src=\"x.png\"></p>");
        assert_eq!(blocks[0].name, HTML_BLOCK);
    }

    #[test]
    fn quote_of_bare_text_wraps_a_paragraph() {
        let blocks = convert("<blockquote>plain words</blockquote>");
        assert_eq!(blocks[0].name, "core/quote");
        assert_eq!(blocks[0].inner_blocks[0].name, PARAGRAPH_BLOCK);
        assert_eq!(
            blocks[0].inner_blocks[0].attribute("content"),
            Some("plain words")
        );
    }

    #[test]
    fn every_core_block_can_be_created_empty() {
        let registry = BlockTypeRegistry::with_core_blocks();
        for block_type in registry.iter() {
            let block = registry
                .create_block(&block_type.name, BTreeMap::new(), Vec::new())
                .unwrap();
            assert_eq!(block.name, block_type.name);
        }
    }
}
