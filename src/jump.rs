//! Jump domain records and legacy date decoding.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{JumpId, JumpNumber, JumpTypeId, ObjectId};

/// Unix timestamp of 2001-01-01T00:00:00Z, the reference epoch of stored jump dates.
pub const REFERENCE_EPOCH_UNIX_SECS: i64 = 978_307_200;

/// Raw values above this are read as reference-epoch seconds.
pub const REFERENCE_SECONDS_FLOOR: i64 = 100_000;

/// Raw values at or above this are read as reference-epoch milliseconds.
pub const REFERENCE_MILLIS_FLOOR: i64 = 5_000_000_000;

/// Persisted jump record as returned by a repository.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct JumpRecord {
    /// Store-assigned key; `None` until first inserted.
    pub id: Option<JumpId>,
    /// User-entered jump number.
    pub jump_number: Option<JumpNumber>,
    /// Raw date integer; see [`decode_jump_date`].
    pub jump_date_raw: Option<i64>,
    /// Free-text notes.
    pub notes: Option<String>,
    /// Exit object the jump was made from.
    pub object_id: Option<ObjectId>,
    /// Freefall delay in seconds.
    pub delay_seconds: Option<i64>,
    /// Jump type foreign key.
    pub jump_type_id: Option<JumpTypeId>,
    /// Deployment type foreign key.
    pub deployment_type_id: Option<i64>,
    /// Slider configuration foreign key.
    pub slider_type_id: Option<i64>,
}

impl JumpRecord {
    /// Decoded jump date.
    pub fn jump_date_utc(&self) -> Option<DateTime<Utc>> {
        self.jump_date_raw.and_then(decode_jump_date)
    }

    /// Linked exit object id, if present and positive.
    pub fn linked_object(&self) -> Option<ObjectId> {
        self.object_id.filter(|id| *id > 0)
    }
}

/// Exit point (jump site) referenced by jump records.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExitObject {
    /// Object key.
    pub id: ObjectId,
    /// Display name.
    pub name: String,
    /// Region or location label.
    pub region: Option<String>,
    /// Latitude in decimal degrees.
    pub latitude: Option<f64>,
    /// Longitude in decimal degrees.
    pub longitude: Option<f64>,
    /// Exit height in meters.
    pub height: Option<f64>,
}

/// Jump type lookup row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JumpType {
    /// Jump type key.
    pub id: JumpTypeId,
    /// Display name.
    pub name: String,
}

/// Decodes a raw stored jump date.
///
/// The legacy schema does not record the unit, so the value range decides:
/// * `100_000 < raw < 5_000_000_000`: seconds since 2001-01-01 UTC
/// * `raw >= 5_000_000_000`: milliseconds since 2001-01-01 UTC
/// * any other positive value: seconds since the Unix epoch
/// * zero or negative: no date
///
/// ```
/// use jumplog::jump::decode_jump_date;
///
/// let date = decode_jump_date(500_000_000).expect("date");
/// assert_eq!(date.format("%Y").to_string(), "2016");
/// assert!(decode_jump_date(0).is_none());
/// ```
pub fn decode_jump_date(raw: i64) -> Option<DateTime<Utc>> {
    if raw > REFERENCE_SECONDS_FLOOR && raw < REFERENCE_MILLIS_FLOOR {
        let secs = REFERENCE_EPOCH_UNIX_SECS.checked_add(raw)?;
        DateTime::from_timestamp(secs, 0)
    } else if raw >= REFERENCE_MILLIS_FLOOR {
        let millis = REFERENCE_EPOCH_UNIX_SECS
            .checked_mul(1000)?
            .checked_add(raw)?;
        DateTime::from_timestamp_millis(millis)
    } else if raw > 0 {
        DateTime::from_timestamp(raw, 0)
    } else {
        None
    }
}

/// Encodes a date as seconds since 2001-01-01 UTC, the form new records are stored in.
///
/// Dates within `REFERENCE_SECONDS_FLOOR` seconds of the reference epoch (or
/// before it) do not decode back to themselves.
pub fn encode_jump_date(date: DateTime<Utc>) -> i64 {
    date.timestamp() - REFERENCE_EPOCH_UNIX_SECS
}

/// Listing order shared by repositories and the in-memory full set.
///
/// Jump number descending with unnumbered records last, then decoded date
/// descending, then id descending.
pub fn listing_order(a: &JumpRecord, b: &JumpRecord) -> Ordering {
    desc_nulls_last(a.jump_number, b.jump_number)
        .then_with(|| desc_nulls_last(a.jump_date_utc(), b.jump_date_utc()))
        .then_with(|| desc_nulls_last(a.id, b.id))
}

fn desc_nulls_last<T: Ord>(a: Option<T>, b: Option<T>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
