//! Rich text as a flat character sequence plus per-character formats.
//!
//! ```text
//! text:    o n e   t w o   t h r e e
//! formats: - - - - B B B - - - - - -      B = [core/bold]
//! ```
//!
//! - [`record`]: the [`Record`] value and the format-interval algebra
//!   ([`apply_format`], [`remove_format`], range queries)
//! - [`create`]: building records from text or HTML
//! - [`to_html`](mod@to_html): serializing records back to HTML
//! - [`format_types`]: which HTML elements map to which formats

pub mod create;
pub mod format;
pub mod format_types;
pub mod record;
pub mod to_html;

pub use create::{CreateOptions, create_from_element, create_from_html, create_from_text};
pub use format::Format;
pub use format_types::{FormatType, FormatTypeError, FormatTypeRegistry};
pub use record::{
    FormatSlot, LINE_SEPARATOR, OBJECT_REPLACEMENT_CHARACTER, Record, RecordError, apply_format,
    concat, formats_in_range, get_active_format, get_active_formats, is_empty, remove_format,
    slice,
};
pub use to_html::{to_html, to_multiline_html};
