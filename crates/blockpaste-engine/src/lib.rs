//! Turns pasted HTML into blocks of rich text.
//!
//! - [`rich_text`]: records (text plus per-character formats) and the format algebra
//! - [`blocks`]: block values, block types, the core block set and the
//!   parser for saved content with block delimiters
//! - [`raw_handling`]: matching top-level HTML elements to block transforms
//! - [`patterns`]: pattern expansion with cycle detection

pub mod blocks;
pub mod patterns;
pub mod raw_handling;
pub mod rich_text;

// Re-export key types for easier usage
pub use blocks::{Block, BlockError, BlockType, BlockTypeRegistry, parse_blocks};
pub use patterns::{
    Pattern, PatternCycleError, PatternRecursionDetector, PatternRegistry, expand_patterns,
};
pub use raw_handling::{RawHandlerContext, Transform, html_to_blocks};
pub use rich_text::{Format, FormatTypeRegistry, Record};
