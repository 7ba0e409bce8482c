//! Blocks, block types, the block factory and the saved-content parser.

pub mod attributes;
pub mod block;
pub mod core;
pub mod parser;
pub mod registry;

pub use attributes::{AttributeSchema, AttributeSource, AttributeType, get_block_attributes};
pub use block::{Block, CLASS_NAME_ATTRIBUTE, clone_block};
pub use core::{HTML_BLOCK, MISSING_BLOCK, PARAGRAPH_BLOCK, PATTERN_BLOCK};
pub use parser::{ORIGINAL_CONTENT_ATTRIBUTE, parse_blocks};
pub use registry::{BlockError, BlockType, BlockTypeRegistry};
