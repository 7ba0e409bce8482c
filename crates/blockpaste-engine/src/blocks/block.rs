use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use uuid::Uuid;

use super::registry::BlockTypeRegistry;

/// Attribute receiving the source element's `class` on raw conversion.
pub const CLASS_NAME_ATTRIBUTE: &str = "className";

/// A unit of content: a named block type, its attributes and nested blocks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub client_id: Uuid,
    pub name: String,
    pub is_valid: bool,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub inner_blocks: Vec<Block>,
}

impl Block {
    /// A valid block with a fresh client id. Does not consult any registry;
    /// use [`BlockTypeRegistry::create_block`](super::BlockTypeRegistry::create_block)
    /// to apply a block type's schema.
    pub fn new(
        name: impl Into<String>,
        attributes: BTreeMap<String, String>,
        inner_blocks: Vec<Block>,
    ) -> Self {
        Self {
            client_id: Uuid::new_v4(),
            name: name.into(),
            is_valid: true,
            attributes,
            inner_blocks,
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(name.into(), value.into());
    }

    /// Attributes as JSON values of the types `registry` declares for them.
    /// Undeclared attributes, and values not of their type, stay strings.
    pub fn typed_attributes(&self, registry: &BlockTypeRegistry) -> Map<String, Value> {
        let block_type = registry.get(&self.name);
        self.attributes
            .iter()
            .map(|(key, raw)| {
                let value = block_type
                    .and_then(|t| t.attributes.get(key))
                    .and_then(|schema| schema.kind.to_value(raw))
                    .unwrap_or_else(|| Value::String(raw.clone()));
                (key.clone(), value)
            })
            .collect()
    }

    /// Same shape as the serde form, with typed attributes throughout.
    pub fn to_json(&self, registry: &BlockTypeRegistry) -> Value {
        let inner_blocks: Vec<Value> = self
            .inner_blocks
            .iter()
            .map(|inner| inner.to_json(registry))
            .collect();
        json!({
            "clientId": self.client_id,
            "name": self.name,
            "isValid": self.is_valid,
            "attributes": self.typed_attributes(registry),
            "innerBlocks": inner_blocks,
        })
    }
}

/// Copies `block` with a new client id, `merge_attributes` laid over its
/// attributes, and either `inner_blocks` or clones of its own inner blocks.
pub fn clone_block(
    block: &Block,
    merge_attributes: BTreeMap<String, String>,
    inner_blocks: Option<Vec<Block>>,
) -> Block {
    let mut attributes = block.attributes.clone();
    attributes.extend(merge_attributes);
    let inner_blocks = inner_blocks.unwrap_or_else(|| {
        block
            .inner_blocks
            .iter()
            .map(|inner| clone_block(inner, BTreeMap::new(), None))
            .collect()
    });
    Block {
        client_id: Uuid::new_v4(),
        name: block.name.clone(),
        is_valid: block.is_valid,
        attributes,
        inner_blocks,
    }
}
