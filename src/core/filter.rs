//! Free-text matching over view entries.

use crate::types::JumpId;

use super::view::JumpViewEntry;

/// Parsed search query. Matching is case-insensitive substring containment.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct JumpQuery {
    raw: String,
    needle: String,
}

impl JumpQuery {
    /// Parses raw user input; surrounding whitespace is ignored.
    pub fn parse(raw: &str) -> Self {
        Self {
            raw: raw.to_string(),
            needle: raw.trim().to_lowercase(),
        }
    }

    /// Text exactly as entered.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// True when the query matches everything.
    pub fn is_empty(&self) -> bool {
        self.needle.is_empty()
    }

    /// Matches number, notes, exit name, location name or displayed date.
    pub fn matches(&self, entry: &JumpViewEntry) -> bool {
        if self.is_empty() {
            return true;
        }

        let record = entry.record();
        if record
            .jump_number
            .is_some_and(|n| n.to_string().contains(&self.needle))
        {
            return true;
        }

        [
            record.notes.as_deref(),
            entry.exit_name(),
            entry.location_name(),
            Some(entry.date_text()),
        ]
        .into_iter()
        .flatten()
        .any(|text| self.contains(text))
    }

    fn contains(&self, text: &str) -> bool {
        !text.is_empty() && text.to_lowercase().contains(&self.needle)
    }
}

/// Ids of matching entries, in the order given.
pub fn filter_ids<'a, I>(entries: I, query: &JumpQuery) -> Vec<JumpId>
where
    I: IntoIterator<Item = &'a JumpViewEntry>,
{
    entries
        .into_iter()
        .filter(|e| query.matches(e))
        .map(JumpViewEntry::id)
        .collect()
}
