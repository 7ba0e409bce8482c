//! Parses saved content: HTML with block delimiters in comments.
//!
//! ```text
//! <!-- wp:heading {"level":"3"} --><h3>Title</h3><!-- /wp:heading -->
//! <!-- wp:pattern {"slug":"nav"} /-->
//! ```
//!
//! Delimited blocks may nest. A name without a namespace is in `core/`.
//! HTML outside any delimiter goes through raw handling, so plain HTML
//! parses the same way as a paste.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use log::{debug, warn};
use regex::{Captures, Regex};
use serde_json::Value;

use super::attributes::get_block_attributes;
use super::block::Block;
use super::core::MISSING_BLOCK;
use crate::raw_handling::{RawHandlerContext, html_to_blocks};

/// Attribute of `core/missing` holding the markup of the unknown block.
pub const ORIGINAL_CONTENT_ATTRIBUTE: &str = "originalContent";

fn delimiter_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?s)<!--\s+(/)?wp:([a-z][a-z0-9_-]*/)?([a-z][a-z0-9_-]*)\s+(\{.*?\}\s+)?(/)?-->",
        )
        .expect("block delimiter regex is valid")
    })
}

/// A delimited block whose closer has not been seen yet.
#[derive(Debug)]
struct Frame {
    name: String,
    attributes: BTreeMap<String, String>,
    html: String,
    inner_blocks: Vec<Block>,
}

impl Frame {
    fn new(name: String, attributes: BTreeMap<String, String>) -> Self {
        Self {
            name,
            attributes,
            html: String::new(),
            inner_blocks: Vec::new(),
        }
    }
}

enum Delimiter {
    Open,
    Close,
    Void,
}

/// Parses `content` into blocks, in document order.
///
/// Never fails: unknown block names become `core/missing` placeholders
/// keeping their markup, unbalanced closers are ignored and blocks left
/// open at the end are closed.
pub fn parse_blocks(content: &str, ctx: &RawHandlerContext<'_>) -> Vec<Block> {
    let mut output = Vec::new();
    let mut stack: Vec<Frame> = Vec::new();
    let mut offset = 0;

    for caps in delimiter_regex().captures_iter(content) {
        let Some(whole) = caps.get(0) else { continue };
        push_text(&content[offset..whole.start()], &mut stack, &mut output, ctx);
        offset = whole.end();

        let (kind, name, attributes) = read_delimiter(&caps);
        match kind {
            Delimiter::Void => {
                let block = build_block(Frame::new(name, attributes), ctx);
                push_block(block, &mut stack, &mut output);
            }
            Delimiter::Open => stack.push(Frame::new(name, attributes)),
            Delimiter::Close => {
                let Some(frame) = stack.pop() else {
                    warn!("ignoring closer of {name} with no open block");
                    continue;
                };
                if frame.name != name {
                    debug!("closer of {name} ends open block {}", frame.name);
                }
                let block = build_block(frame, ctx);
                push_block(block, &mut stack, &mut output);
            }
        }
    }

    push_text(&content[offset..], &mut stack, &mut output, ctx);
    while let Some(frame) = stack.pop() {
        debug!("closing unterminated block {}", frame.name);
        let block = build_block(frame, ctx);
        push_block(block, &mut stack, &mut output);
    }
    output
}

fn read_delimiter(caps: &Captures<'_>) -> (Delimiter, String, BTreeMap<String, String>) {
    let namespace = caps.get(2).map_or("core/", |m| m.as_str());
    let name = format!("{namespace}{}", &caps[3]);
    let kind = if caps.get(1).is_some() {
        Delimiter::Close
    } else if caps.get(5).is_some() {
        Delimiter::Void
    } else {
        Delimiter::Open
    };
    let attributes = caps
        .get(4)
        .map(|m| parse_attributes(&name, m.as_str()))
        .unwrap_or_default();
    (kind, name, attributes)
}

/// Reads the JSON object of a delimiter. Non-string values keep their JSON
/// text.
fn parse_attributes(name: &str, json: &str) -> BTreeMap<String, String> {
    match serde_json::from_str::<BTreeMap<String, Value>>(json.trim()) {
        Ok(values) => values
            .into_iter()
            .map(|(key, value)| match value {
                Value::String(s) => (key, s),
                other => (key, other.to_string()),
            })
            .collect(),
        Err(e) => {
            warn!("invalid attributes on {name}: {e}");
            BTreeMap::new()
        }
    }
}

fn push_text(
    text: &str,
    stack: &mut [Frame],
    output: &mut Vec<Block>,
    ctx: &RawHandlerContext<'_>,
) {
    if let Some(frame) = stack.last_mut() {
        frame.html.push_str(text);
    } else if !text.trim().is_empty() {
        output.extend(html_to_blocks(text, ctx));
    }
}

fn push_block(block: Block, stack: &mut [Frame], output: &mut Vec<Block>) {
    match stack.last_mut() {
        Some(parent) => parent.inner_blocks.push(block),
        None => output.push(block),
    }
}

/// Attributes sourced from the block's own markup, overlaid by the ones
/// written in its delimiter.
fn build_block(frame: Frame, ctx: &RawHandlerContext<'_>) -> Block {
    let html = frame.html.trim();
    let Some(block_type) = ctx.blocks.get(&frame.name) else {
        return missing(frame.name, html, "unregistered block type", frame.inner_blocks);
    };

    let mut attributes = get_block_attributes(block_type, html);
    attributes.extend(frame.attributes);
    match ctx.blocks.create_block(&frame.name, attributes, frame.inner_blocks) {
        Ok(block) => block,
        Err(e) => {
            warn!("failed to create {}: {e}", frame.name);
            missing(frame.name, html, &e.to_string(), Vec::new())
        }
    }
}

fn missing(name: String, html: &str, reason: &str, inner_blocks: Vec<Block>) -> Block {
    debug!("{name}: {reason}");
    Block::new(
        MISSING_BLOCK,
        BTreeMap::from([
            ("originalName".to_string(), name),
            (ORIGINAL_CONTENT_ATTRIBUTE.to_string(), html.to_string()),
            ("reason".to_string(), reason.to_string()),
        ]),
        inner_blocks,
    )
}
