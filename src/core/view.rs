//! Derived, per-load view entries wrapping jump records.

use std::{fmt::Write, sync::Arc};

use chrono::{
    format::{Item, StrftimeItems},
    DateTime, FixedOffset, Local, Utc,
};
use serde::{Deserialize, Serialize};

use crate::{
    jump::{ExitObject, JumpRecord},
    types::{Generation, JumpId, ObjectId},
};

/// Observable fields of a [`JumpViewEntry`], used in change notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryField {
    /// [`JumpViewEntry::exit_name`].
    ExitName,
    /// [`JumpViewEntry::location_name`].
    LocationName,
    /// [`JumpViewEntry::latitude`].
    Latitude,
    /// [`JumpViewEntry::longitude`].
    Longitude,
    /// [`JumpViewEntry::has_coordinates`].
    HasCoordinates,
    /// [`JumpViewEntry::thumbnail`].
    Thumbnail,
    /// [`JumpViewEntry::is_expanded`].
    IsExpanded,
}

/// Fields written by hydration, in notification order.
pub const HYDRATED_FIELDS: &[EntryField] = &[
    EntryField::ExitName,
    EntryField::LocationName,
    EntryField::Latitude,
    EntryField::Longitude,
    EntryField::HasCoordinates,
    EntryField::Thumbnail,
];

/// Exit and thumbnail data resolved for one entry.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Hydration {
    /// Exit object name.
    pub exit_name: Option<String>,
    /// Exit object region.
    pub location_name: Option<String>,
    /// Exit latitude.
    pub latitude: Option<f64>,
    /// Exit longitude.
    pub longitude: Option<f64>,
    /// Thumbnail image bytes.
    pub thumbnail: Option<Arc<[u8]>>,
}

impl Hydration {
    /// No exit, no thumbnail.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a hydration from a resolved object and its thumbnail.
    pub fn from_object(object: ExitObject, thumbnail: Option<Vec<u8>>) -> Self {
        Self {
            exit_name: Some(object.name).filter(|n| !n.is_empty()),
            location_name: object.region.filter(|r| !r.is_empty()),
            latitude: object.latitude,
            longitude: object.longitude,
            thumbnail: thumbnail.map(Arc::from),
        }
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self == &Self::empty()
    }
}

/// One entry to hydrate, tagged with the load generation it was issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HydrationJob {
    /// Generation of the full set the entry belonged to.
    pub generation: Generation,
    /// Entry id.
    pub id: JumpId,
    /// Object to resolve; `None` hydrates to empty.
    pub object_id: Option<ObjectId>,
}

/// Format used when none is configured or the configured one is invalid.
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";

/// How `date_text` is rendered.
#[derive(Debug, Clone)]
pub struct DateDisplay {
    /// `chrono` format string.
    pub format: String,
    /// Fixed UTC offset in seconds; `None` uses the host's local zone.
    pub utc_offset_seconds: Option<i32>,
}

impl Default for DateDisplay {
    fn default() -> Self {
        Self {
            format: DEFAULT_DATE_FORMAT.to_string(),
            utc_offset_seconds: None,
        }
    }
}

impl DateDisplay {
    /// Whether `format` parses as a `chrono` strftime string.
    pub fn is_valid_format(format: &str) -> bool {
        StrftimeItems::new(format).all(|item| !matches!(item, Item::Error))
    }

    /// Renders a date in the configured zone.
    ///
    /// Falls back to [`DEFAULT_DATE_FORMAT`] when the configured format
    /// cannot be rendered.
    pub fn render(&self, date: DateTime<Utc>) -> String {
        let mut out = String::new();
        if self.write_date(&mut out, date, &self.format).is_err() {
            out.clear();
            let _ = self.write_date(&mut out, date, DEFAULT_DATE_FORMAT);
        }
        out
    }

    fn write_date(&self, out: &mut String, date: DateTime<Utc>, format: &str) -> std::fmt::Result {
        match self.utc_offset_seconds.and_then(FixedOffset::east_opt) {
            Some(offset) => write!(out, "{}", date.with_timezone(&offset).format(format)),
            None => write!(out, "{}", date.with_timezone(&Local).format(format)),
        }
    }
}

/// A jump record as shown in the list, plus hydration results and UI state.
#[derive(Debug, Clone, PartialEq)]
pub struct JumpViewEntry {
    id: JumpId,
    generation: Generation,
    record: JumpRecord,
    date_utc: Option<DateTime<Utc>>,
    date_text: String,
    exit_name: Option<String>,
    location_name: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    thumbnail: Option<Arc<[u8]>>,
    is_hydrated: bool,
    is_expanded: bool,
}

impl JumpViewEntry {
    /// Wraps a stored record. Returns `None` when the record has no id yet.
    pub fn new(record: JumpRecord, generation: Generation, display: &DateDisplay) -> Option<Self> {
        let id = record.id?;
        let date_utc = record.jump_date_utc();
        let date_text = date_utc.map(|d| display.render(d)).unwrap_or_default();
        Some(Self {
            id,
            generation,
            record,
            date_utc,
            date_text,
            exit_name: None,
            location_name: None,
            latitude: None,
            longitude: None,
            thumbnail: None,
            is_hydrated: false,
            is_expanded: false,
        })
    }

    /// Store id.
    pub fn id(&self) -> JumpId {
        self.id
    }

    /// Load generation this entry belongs to.
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Underlying record.
    pub fn record(&self) -> &JumpRecord {
        &self.record
    }

    /// Decoded jump date.
    pub fn date_utc(&self) -> Option<DateTime<Utc>> {
        self.date_utc
    }

    /// Date as displayed; empty when the jump has no date.
    pub fn date_text(&self) -> &str {
        &self.date_text
    }

    /// Exit object name.
    pub fn exit_name(&self) -> Option<&str> {
        self.exit_name.as_deref()
    }

    /// Exit object region.
    pub fn location_name(&self) -> Option<&str> {
        self.location_name.as_deref()
    }

    /// Exit latitude.
    pub fn latitude(&self) -> Option<f64> {
        self.latitude
    }

    /// Exit longitude.
    pub fn longitude(&self) -> Option<f64> {
        self.longitude
    }

    /// True iff both coordinates are present.
    pub fn has_coordinates(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some()
    }

    /// Exit thumbnail bytes.
    pub fn thumbnail(&self) -> Option<&Arc<[u8]>> {
        self.thumbnail.as_ref()
    }

    /// Whether hydration results have been applied.
    pub fn is_hydrated(&self) -> bool {
        self.is_hydrated
    }

    /// List expansion state.
    pub fn is_expanded(&self) -> bool {
        self.is_expanded
    }

    /// Job that hydrates this entry.
    pub fn hydration_job(&self) -> HydrationJob {
        HydrationJob {
            generation: self.generation,
            id: self.id,
            object_id: self.record.linked_object(),
        }
    }

    pub(crate) fn set_expanded(&mut self, expanded: bool) {
        self.is_expanded = expanded;
    }

    pub(crate) fn set_jump_number(&mut self, number: Option<i64>) {
        self.record.jump_number = number;
    }

    /// Copies the previous entry's hydration and expansion onto a rebuilt entry.
    pub(crate) fn inherit_from(&mut self, previous: &JumpViewEntry) {
        if previous.record.linked_object() == self.record.linked_object() && previous.is_hydrated {
            self.exit_name = previous.exit_name.clone();
            self.location_name = previous.location_name.clone();
            self.latitude = previous.latitude;
            self.longitude = previous.longitude;
            self.thumbnail = previous.thumbnail.clone();
            self.is_hydrated = true;
        }
        self.is_expanded = previous.is_expanded;
    }

    /// Writes hydration results in place.
    pub(crate) fn apply_hydration(&mut self, hydration: Hydration) {
        self.exit_name = hydration.exit_name;
        self.location_name = hydration.location_name;
        self.latitude = hydration.latitude;
        self.longitude = hydration.longitude;
        self.thumbnail = hydration.thumbnail;
        self.is_hydrated = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> JumpViewEntry {
        let rec = JumpRecord {
            id: Some(4),
            jump_number: Some(12),
            jump_date_raw: Some(500_000_000),
            ..JumpRecord::default()
        };
        let display = DateDisplay {
            utc_offset_seconds: Some(0),
            ..DateDisplay::default()
        };
        JumpViewEntry::new(rec, 1, &display).expect("entry")
    }

    #[test]
    fn date_text_uses_configured_offset() {
        assert_eq!(entry().date_text(), "2016-11-05");
    }

    #[test]
    fn unknown_format_specifier_falls_back() {
        assert!(!DateDisplay::is_valid_format("%Q"));
        assert!(DateDisplay::is_valid_format("%d.%m.%Y"));

        let display = DateDisplay {
            format: "%Q".to_string(),
            utc_offset_seconds: Some(0),
        };
        let rec = JumpRecord {
            id: Some(1),
            jump_date_raw: Some(500_000_000),
            ..JumpRecord::default()
        };
        let e = JumpViewEntry::new(rec, 1, &display).expect("entry");
        assert_eq!(e.date_text(), "2016-11-05");
    }

    #[test]
    fn coordinates_require_both_axes() {
        let mut e = entry();
        assert!(!e.has_coordinates());

        e.apply_hydration(Hydration {
            latitude: Some(46.5),
            ..Hydration::empty()
        });
        assert!(!e.has_coordinates());

        e.apply_hydration(Hydration {
            latitude: Some(46.5),
            longitude: Some(7.9),
            ..Hydration::empty()
        });
        assert!(e.has_coordinates());
        assert!(e.is_hydrated());
    }

    #[test]
    fn empty_names_are_dropped() {
        let h = Hydration::from_object(
            ExitObject {
                id: 1,
                name: String::new(),
                region: Some(String::new()),
                ..ExitObject::default()
            },
            None,
        );
        assert!(h.is_empty());
    }

    #[test]
    fn records_without_id_are_rejected() {
        assert!(JumpViewEntry::new(JumpRecord::default(), 1, &DateDisplay::default()).is_none());
    }
}
