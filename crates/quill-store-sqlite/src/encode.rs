//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings with microsecond
//! precision so that text order matches time order. UUIDs are stored as
//! hyphenated lowercase strings. Subject payloads are compact JSON keyed by
//! the kind discriminant stored beside them.

use chrono::{DateTime, SecondsFormat, SubsecRound as _, Utc};
use quill_core::{
  access::{Bucket, Membership, Role},
  capability::capabilities,
  event::{Event, EventAction, EventDetail},
  recording::Recording,
  store::{SearchEntry, TagEntry},
  subject::{Subject, SubjectKind, SubjectRef, SubjectValue},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

/// The current time at storage precision, so values read back compare equal.
pub fn now() -> DateTime<Utc> { Utc::now().trunc_subsecs(6) }

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Enums ───────────────────────────────────────────────────────────────────

pub fn decode_kind(s: &str) -> Result<SubjectKind> { Ok(SubjectKind::parse(s)?) }

pub fn decode_role(s: &str) -> Result<Role> { Ok(Role::parse(s)?) }

pub fn decode_action(s: &str) -> Result<EventAction> {
  Ok(EventAction::parse(s)?)
}

/// The publishable kind discriminants as a quoted SQL list, for `IN (...)`.
/// Discriminants are static identifiers, never user input.
pub fn publishable_kinds_sql() -> String {
  SubjectKind::ALL
    .into_iter()
    .filter(|kind| capabilities(*kind).publishable)
    .map(|kind| format!("'{}'", kind.as_str()))
    .collect::<Vec<_>>()
    .join(", ")
}

// ─── Column lists ────────────────────────────────────────────────────────────

pub const RECORDING_COLUMNS: &str = "recording_id, parent_id, bucket_id, \
                                     subject_kind, subject_id, discarded_at, \
                                     created_at, updated_at";

pub const EVENT_COLUMNS: &str = "sequence, event_id, recording_id, subject_kind, \
                                 subject_id, previous_kind, previous_id, action, \
                                 person_id, bucket_id, created_at";

pub const SUBJECT_COLUMNS: &str = "subject_id, kind, value_json, created_at";

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `recordings` row.
pub struct RawRecording {
  pub recording_id: String,
  pub parent_id:    Option<String>,
  pub bucket_id:    String,
  pub subject_kind: String,
  pub subject_id:   String,
  pub discarded_at: Option<String>,
  pub created_at:   String,
  pub updated_at:   String,
}

impl RawRecording {
  /// Map a row selected with [`RECORDING_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      recording_id: row.get(0)?,
      parent_id:    row.get(1)?,
      bucket_id:    row.get(2)?,
      subject_kind: row.get(3)?,
      subject_id:   row.get(4)?,
      discarded_at: row.get(5)?,
      created_at:   row.get(6)?,
      updated_at:   row.get(7)?,
    })
  }

  pub fn into_recording(self) -> Result<Recording> {
    Ok(Recording {
      recording_id: decode_uuid(&self.recording_id)?,
      parent_id:    self.parent_id.as_deref().map(decode_uuid).transpose()?,
      bucket_id:    decode_uuid(&self.bucket_id)?,
      subject:      SubjectRef {
        kind: decode_kind(&self.subject_kind)?,
        id:   decode_uuid(&self.subject_id)?,
      },
      discarded_at: self.discarded_at.as_deref().map(decode_dt).transpose()?,
      created_at:   decode_dt(&self.created_at)?,
      updated_at:   decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw strings read directly from a `subjects` row.
pub struct RawSubject {
  pub subject_id: String,
  pub kind:       String,
  pub value_json: String,
  pub created_at: String,
}

impl RawSubject {
  /// Map a row selected with [`SUBJECT_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      subject_id: row.get(0)?,
      kind:       row.get(1)?,
      value_json: row.get(2)?,
      created_at: row.get(3)?,
    })
  }

  pub fn into_subject(self) -> Result<Subject> {
    let value_json: serde_json::Value = serde_json::from_str(&self.value_json)?;
    Ok(Subject {
      subject_id: decode_uuid(&self.subject_id)?,
      value:      SubjectValue::from_parts(&self.kind, value_json)?,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read directly from an `events` row.
pub struct RawEvent {
  pub sequence:      i64,
  pub event_id:      String,
  pub recording_id:  String,
  pub subject_kind:  String,
  pub subject_id:    String,
  pub previous_kind: Option<String>,
  pub previous_id:   Option<String>,
  pub action:        String,
  pub person_id:     Option<String>,
  pub bucket_id:     String,
  pub created_at:    String,
}

impl RawEvent {
  /// Map a row selected with [`EVENT_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      sequence:      row.get(0)?,
      event_id:      row.get(1)?,
      recording_id:  row.get(2)?,
      subject_kind:  row.get(3)?,
      subject_id:    row.get(4)?,
      previous_kind: row.get(5)?,
      previous_id:   row.get(6)?,
      action:        row.get(7)?,
      person_id:     row.get(8)?,
      bucket_id:     row.get(9)?,
      created_at:    row.get(10)?,
    })
  }

  pub fn into_event(self) -> Result<Event> {
    let previous = match (self.previous_kind, self.previous_id) {
      (Some(kind), Some(id)) => Some(SubjectRef {
        kind: decode_kind(&kind)?,
        id:   decode_uuid(&id)?,
      }),
      _ => None,
    };

    Ok(Event {
      event_id: decode_uuid(&self.event_id)?,
      sequence: self.sequence,
      recording_id: decode_uuid(&self.recording_id)?,
      subject: SubjectRef {
        kind: decode_kind(&self.subject_kind)?,
        id:   decode_uuid(&self.subject_id)?,
      },
      previous,
      action: decode_action(&self.action)?,
      person_id: self.person_id.as_deref().map(decode_uuid).transpose()?,
      bucket_id: decode_uuid(&self.bucket_id)?,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

pub struct RawEventDetail {
  pub event_id: String,
  pub key:      String,
  pub value:    Option<String>,
}

impl RawEventDetail {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self { event_id: row.get(0)?, key: row.get(1)?, value: row.get(2)? })
  }

  pub fn into_detail(self) -> Result<EventDetail> {
    Ok(EventDetail {
      event_id: decode_uuid(&self.event_id)?,
      key:      self.key,
      value:    self.value,
    })
  }
}

pub struct RawBucket {
  pub bucket_id:  String,
  pub name:       String,
  pub created_at: String,
}

impl RawBucket {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self { bucket_id: row.get(0)?, name: row.get(1)?, created_at: row.get(2)? })
  }

  pub fn into_bucket(self) -> Result<Bucket> {
    Ok(Bucket {
      bucket_id:  decode_uuid(&self.bucket_id)?,
      name:       self.name,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

pub struct RawMembership {
  pub person_id: String,
  pub bucket_id: String,
  pub role:      String,
}

impl RawMembership {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self { person_id: row.get(0)?, bucket_id: row.get(1)?, role: row.get(2)? })
  }

  pub fn into_membership(self) -> Result<Membership> {
    Ok(Membership {
      person_id: decode_uuid(&self.person_id)?,
      bucket_id: decode_uuid(&self.bucket_id)?,
      role:      decode_role(&self.role)?,
    })
  }
}

pub struct RawTagEntry {
  pub tag_id:    String,
  pub name:      String,
  pub available: bool,
}

impl RawTagEntry {
  /// Map a row of `tag_id, name, available`.
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self { tag_id: row.get(0)?, name: row.get(1)?, available: row.get(2)? })
  }

  pub fn into_entry(self) -> Result<TagEntry> {
    Ok(TagEntry {
      tag_id:    decode_uuid(&self.tag_id)?,
      name:      self.name,
      available: self.available,
    })
  }
}

pub struct RawSearchEntry {
  pub recording_id: String,
  pub subject_kind: String,
  pub content:      String,
}

impl RawSearchEntry {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      recording_id: row.get(0)?,
      subject_kind: row.get(1)?,
      content:      row.get(2)?,
    })
  }

  pub fn into_entry(self) -> Result<SearchEntry> {
    Ok(SearchEntry {
      recording_id: decode_uuid(&self.recording_id)?,
      kind:         decode_kind(&self.subject_kind)?,
      content:      self.content,
    })
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone as _;

  use super::*;

  #[test]
  fn timestamps_sort_as_text() {
    let earlier = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
    let later = earlier + chrono::Duration::microseconds(1);
    assert!(encode_dt(earlier) < encode_dt(later));
    assert_eq!(encode_dt(earlier), "2024-01-01T09:00:00.000000Z");
  }

  #[test]
  fn now_survives_a_round_trip() {
    let t = now();
    assert_eq!(decode_dt(&encode_dt(t)).unwrap(), t);
  }
}
