use std::collections::BTreeMap;
use std::sync::OnceLock;

use log::{debug, trace};
use regex::Regex;
use thiserror::Error;

use super::attributes::AttributeSchema;
use super::block::{Block, CLASS_NAME_ATTRIBUTE};
use crate::raw_handling::Transform;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlockError {
    #[error("Block type {0:?} is not registered")]
    UnknownBlockType(String),
    #[error("Block type {0:?} is already registered")]
    AlreadyRegistered(String),
    #[error(
        "Block names must contain a namespace prefix, include only lowercase alphanumeric \
         characters or dashes, and start with a letter. Example: my-plugin/my-custom-block. Got {0:?}"
    )]
    InvalidName(String),
    #[error("Transform into {block_name} failed: {reason}")]
    TransformFailed { block_name: String, reason: String },
}

/// A registered kind of block: its attribute schema and the transforms that
/// create it from other content.
#[derive(Debug, Clone)]
pub struct BlockType {
    pub name: String,
    pub title: String,
    pub attributes: BTreeMap<String, AttributeSchema>,
    /// `from` transforms, in registration order.
    pub transforms: Vec<Transform>,
}

impl BlockType {
    pub fn new(name: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            title: title.into(),
            attributes: BTreeMap::new(),
            transforms: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, schema: AttributeSchema) -> Self {
        self.attributes.insert(key.into(), schema);
        self
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transforms.push(transform);
        self
    }
}

fn name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z][a-z0-9-]*/[a-z][a-z0-9-]*$").expect("block name regex is valid"))
}

/// Registered block types, in registration order.
///
/// Registration order is the tie-break between transforms of equal
/// priority, so it is significant.
#[derive(Debug, Clone, Default)]
pub struct BlockTypeRegistry {
    types: Vec<BlockType>,
}

impl BlockTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, block_type: BlockType) -> Result<(), BlockError> {
        if !name_regex().is_match(&block_type.name) {
            return Err(BlockError::InvalidName(block_type.name));
        }
        if self.get(&block_type.name).is_some() {
            return Err(BlockError::AlreadyRegistered(block_type.name));
        }
        debug!(
            "registered block type {} with {} transform(s)",
            block_type.name,
            block_type.transforms.len()
        );
        self.types.push(block_type);
        Ok(())
    }

    pub fn unregister(&mut self, name: &str) -> Option<BlockType> {
        let index = self.types.iter().position(|t| t.name == name)?;
        Some(self.types.remove(index))
    }

    pub fn get(&self, name: &str) -> Option<&BlockType> {
        self.types.iter().find(|t| t.name == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut BlockType> {
        self.types.iter_mut().find(|t| t.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &BlockType> {
        self.types.iter()
    }

    /// Creates a block of a registered type.
    ///
    /// Only attributes declared by the type's schema are kept (plus
    /// `className`); missing ones, and ones not of their declared type,
    /// take the schema default.
    pub fn create_block(
        &self,
        name: &str,
        attributes: BTreeMap<String, String>,
        inner_blocks: Vec<Block>,
    ) -> Result<Block, BlockError> {
        let block_type = self
            .get(name)
            .ok_or_else(|| BlockError::UnknownBlockType(name.to_string()))?;

        let mut sanitized = BTreeMap::new();
        for (key, schema) in &block_type.attributes {
            let given = attributes.get(key).filter(|value| {
                let accepted = schema.accepts(value);
                if !accepted {
                    debug!("{name}: {key} {value:?} is not {:?}, using default", schema.kind);
                }
                accepted
            });
            if let Some(value) = given.or(schema.default.as_ref()) {
                sanitized.insert(key.clone(), value.clone());
            }
        }
        for (key, value) in attributes {
            if key == CLASS_NAME_ATTRIBUTE {
                sanitized.insert(key, value);
            } else if !block_type.attributes.contains_key(&key) {
                trace!("dropping undeclared attribute {key} of {name}");
            }
        }

        Ok(Block::new(name, sanitized, inner_blocks))
    }
}
