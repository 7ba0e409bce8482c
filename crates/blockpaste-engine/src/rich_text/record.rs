//! The [`Record`] value and its format-interval algebra.
//!
//! A record is plain text plus one format slot and one replacement slot per
//! character. Offsets are `char` (Unicode scalar value) indices, never byte
//! offsets.
//!
//! ## Structural sharing
//!
//! Records are immutable: every operation takes `&Record` and returns a new
//! one. A slot is an `Option<Arc<[Format]>>`, so copying a record copies
//! pointers, and operations only allocate for the slots inside their range.
//! Applying one format over an unformatted range allocates a single slot that
//! every index in the range points at.

use std::ops::Range;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::format::Format;

/// The object replacement character used for images, comments and other
/// inline objects.
pub const OBJECT_REPLACEMENT_CHARACTER: char = '\u{fffc}';

/// Separates lines of a multiline record.
pub const LINE_SEPARATOR: char = '\u{2028}';

/// The formats active at one character, outermost first.
pub type FormatSlot = Option<Arc<[Format]>>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("{what} has {actual} slots but the text has {expected} characters")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("selection {start}..{end} is outside a record of length {len}")]
    InvalidSelection { start: usize, end: usize, len: usize },
    #[error("slot {0} holds an empty format list")]
    EmptySlot(usize),
    #[error("slot {index} holds two formats of type {format_type:?}")]
    DuplicateType { index: usize, format_type: String },
}

/// Rich text: a string plus sparse per-character formats and a selection.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "RecordParts")]
pub struct Record {
    text: String,
    formats: Vec<FormatSlot>,
    replacements: Vec<Option<Format>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    start: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    end: Option<usize>,
}

#[derive(Deserialize)]
struct RecordParts {
    text: String,
    #[serde(default)]
    formats: Vec<FormatSlot>,
    #[serde(default)]
    replacements: Vec<Option<Format>>,
    start: Option<usize>,
    end: Option<usize>,
}

impl TryFrom<RecordParts> for Record {
    type Error = RecordError;

    fn try_from(parts: RecordParts) -> Result<Self, Self::Error> {
        let len = parts.text.chars().count();
        // Missing trailing slots are absent, the way a sparse array reads
        let mut formats = parts.formats;
        let mut replacements = parts.replacements;
        if formats.len() > len {
            return Err(RecordError::LengthMismatch {
                what: "formats",
                expected: len,
                actual: formats.len(),
            });
        }
        if replacements.len() > len {
            return Err(RecordError::LengthMismatch {
                what: "replacements",
                expected: len,
                actual: replacements.len(),
            });
        }
        formats.resize(len, None);
        replacements.resize(len, None);

        for (index, slot) in formats.iter().enumerate() {
            let Some(slot) = slot else { continue };
            if slot.is_empty() {
                return Err(RecordError::EmptySlot(index));
            }
            for (i, format) in slot.iter().enumerate() {
                if slot[..i].iter().any(|f| f.is_same_type(format)) {
                    return Err(RecordError::DuplicateType {
                        index,
                        format_type: format.format_type.clone(),
                    });
                }
            }
        }

        let selection = match (parts.start, parts.end) {
            (Some(start), Some(end)) if start <= end && end <= len => (Some(start), Some(end)),
            (Some(start), None) if start <= len => (Some(start), Some(start)),
            (None, None) => (None, None),
            (start, end) => {
                return Err(RecordError::InvalidSelection {
                    start: start.unwrap_or(0),
                    end: end.unwrap_or(0),
                    len,
                });
            }
        };

        Ok(Self {
            text: parts.text,
            formats,
            replacements,
            start: selection.0,
            end: selection.1,
        })
    }
}

impl Record {
    /// An empty record with no selection.
    pub fn new() -> Self {
        Self::default()
    }

    /// A record holding `text` with no formatting.
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        let len = text.chars().count();
        Self {
            text,
            formats: vec![None; len],
            replacements: vec![None; len],
            start: None,
            end: None,
        }
    }

    /// Assembles a record from parts already known to be consistent.
    pub(crate) fn from_parts(
        text: String,
        formats: Vec<FormatSlot>,
        replacements: Vec<Option<Format>>,
    ) -> Self {
        debug_assert_eq!(text.chars().count(), formats.len());
        debug_assert_eq!(formats.len(), replacements.len());
        Self {
            text,
            formats,
            replacements,
            start: None,
            end: None,
        }
    }

    /// Returns a copy with the selection set to `start..end`.
    ///
    /// # Panics
    /// Panics unless `start <= end <= self.len()`.
    pub fn with_selection(mut self, start: usize, end: usize) -> Self {
        assert!(
            start <= end && end <= self.len(),
            "selection {start}..{end} is outside a record of length {}",
            self.len()
        );
        self.start = Some(start);
        self.end = Some(end);
        self
    }

    /// Returns a copy without selection state.
    pub fn without_selection(mut self) -> Self {
        self.start = None;
        self.end = None;
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Number of characters.
    pub fn len(&self) -> usize {
        self.formats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn formats(&self) -> &[FormatSlot] {
        &self.formats
    }

    /// Formats at `index`, outermost first. Empty when the slot is absent.
    pub fn formats_at(&self, index: usize) -> &[Format] {
        self.formats
            .get(index)
            .and_then(|slot| slot.as_deref())
            .unwrap_or(&[])
    }

    pub fn replacements(&self) -> &[Option<Format>] {
        &self.replacements
    }

    pub fn replacement_at(&self, index: usize) -> Option<&Format> {
        self.replacements.get(index).and_then(Option::as_ref)
    }

    pub fn start(&self) -> Option<usize> {
        self.start
    }

    pub fn end(&self) -> Option<usize> {
        self.end
    }

    pub fn selection(&self) -> Option<Range<usize>> {
        match (self.start, self.end) {
            (Some(start), Some(end)) => Some(start..end),
            _ => None,
        }
    }

    /// Characters paired with their format slot and replacement.
    pub fn chars(&self) -> impl Iterator<Item = (char, &[Format], Option<&Format>)> + '_ {
        self.text
            .chars()
            .enumerate()
            .map(|(i, c)| (c, self.formats_at(i), self.replacement_at(i)))
    }

    fn with_formats(&self, formats: Vec<FormatSlot>) -> Self {
        Self {
            text: self.text.clone(),
            formats,
            replacements: self.replacements.clone(),
            start: self.start,
            end: self.end,
        }
    }
}

/// Resolves an explicit range or the selection, asserting it is in bounds.
fn resolve_range(record: &Record, range: Option<Range<usize>>, op: &str) -> Option<Range<usize>> {
    let range = range.or_else(|| record.selection())?;
    assert!(
        range.start <= range.end && range.end <= record.len(),
        "{op}: range {}..{} is outside a record of length {}",
        range.start,
        range.end,
        record.len()
    );
    Some(range)
}

/// Applies `format` to every character in `range` (default: the selection).
///
/// An existing format of the same type is replaced in place, keeping the
/// order of the other formats; otherwise the format is appended as the
/// innermost. Without a range and without a selection this is a no-op.
///
/// # Panics
/// Panics if the range is not within `0..=record.len()`.
pub fn apply_format(record: &Record, format: Format, range: Option<Range<usize>>) -> Record {
    let Some(range) = resolve_range(record, range, "apply_format") else {
        return record.clone();
    };

    let single: Arc<[Format]> = Arc::from(vec![format.clone()]);
    let mut formats = record.formats.clone();
    for slot in &mut formats[range] {
        let updated = match slot.as_deref() {
            None => single.clone(),
            Some(existing) => match existing.iter().position(|f| f.is_same_type(&format)) {
                Some(pos) => {
                    let mut list = existing.to_vec();
                    list[pos] = format.clone();
                    list.into()
                }
                None => existing
                    .iter()
                    .cloned()
                    .chain(std::iter::once(format.clone()))
                    .collect(),
            },
        };
        *slot = Some(updated);
    }

    record.with_formats(formats)
}

/// Removes formats of `format_type` from every character in `range`
/// (default: the selection). Slots left empty become absent.
///
/// # Panics
/// Panics if the range is not within `0..=record.len()`.
pub fn remove_format(record: &Record, format_type: &str, range: Option<Range<usize>>) -> Record {
    let Some(range) = resolve_range(record, range, "remove_format") else {
        return record.clone();
    };

    let mut formats = record.formats.clone();
    for slot in &mut formats[range] {
        let Some(existing) = slot.as_deref() else {
            continue;
        };
        if !existing.iter().any(|f| f.format_type == format_type) {
            continue;
        }
        let kept: Vec<Format> = existing
            .iter()
            .filter(|f| f.format_type != format_type)
            .cloned()
            .collect();
        *slot = if kept.is_empty() { None } else { Some(kept.into()) };
    }

    record.with_formats(formats)
}

/// All formats active at the selection.
///
/// For a collapsed caret these are the formats of the character before it;
/// for a range, those of the first selected character.
pub fn get_active_formats(record: &Record) -> Vec<Format> {
    let Some(selection) = record.selection() else {
        return Vec::new();
    };
    let index = if selection.is_empty() {
        match selection.start.checked_sub(1) {
            Some(i) => i,
            None => return Vec::new(),
        }
    } else {
        selection.start
    };
    record.formats_at(index).to_vec()
}

/// The format of `format_type` active at the selection, if any.
pub fn get_active_format(record: &Record, format_type: &str) -> Option<Format> {
    get_active_formats(record)
        .into_iter()
        .find(|f| f.format_type == format_type)
}

/// Formats present on every character of `range`, in the order of the first
/// character's slot. Empty for an empty range.
///
/// # Panics
/// Panics if the range is not within `0..=record.len()`.
pub fn formats_in_range(record: &Record, range: Range<usize>) -> Vec<Format> {
    let Some(range) = resolve_range(record, Some(range), "formats_in_range") else {
        return Vec::new();
    };
    if range.is_empty() {
        return Vec::new();
    }
    let mut common = record.formats_at(range.start).to_vec();
    for index in range.skip(1) {
        let here = record.formats_at(index);
        common.retain(|f| here.iter().any(|h| h.is_same_type(f)));
        if common.is_empty() {
            break;
        }
    }
    common
}

/// The characters of `range` with their slots. The result has no selection.
///
/// # Panics
/// Panics if the range is not within `0..=record.len()`.
pub fn slice(record: &Record, range: Range<usize>) -> Record {
    let Some(range) = resolve_range(record, Some(range), "slice") else {
        return Record::new();
    };
    let text = record
        .text
        .chars()
        .skip(range.start)
        .take(range.len())
        .collect();
    Record::from_parts(
        text,
        record.formats[range.clone()].to_vec(),
        record.replacements[range].to_vec(),
    )
}

/// Joins records end to end. The result has no selection.
pub fn concat(records: &[Record]) -> Record {
    let mut text = String::new();
    let mut formats = Vec::new();
    let mut replacements = Vec::new();
    for record in records {
        text.push_str(&record.text);
        formats.extend(record.formats.iter().cloned());
        replacements.extend(record.replacements.iter().cloned());
    }
    Record::from_parts(text, formats, replacements)
}

pub fn is_empty(record: &Record) -> bool {
    record.is_empty()
}
