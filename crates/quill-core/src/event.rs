//! Timeline events: the append-only audit trail of a recording.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result, subject::SubjectRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventAction {
  Created,
  Updated,
  Discarded,
  Published,
  Unpublished,
}

impl EventAction {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Created => "created",
      Self::Updated => "updated",
      Self::Discarded => "discarded",
      Self::Published => "published",
      Self::Unpublished => "unpublished",
    }
  }

  pub fn parse(s: &str) -> Result<Self> {
    match s {
      "created" => Ok(Self::Created),
      "updated" => Ok(Self::Updated),
      "discarded" => Ok(Self::Discarded),
      "published" => Ok(Self::Published),
      "unpublished" => Ok(Self::Unpublished),
      other => Err(Error::UnknownAction(other.to_owned())),
    }
  }
}

/// An immutable audit record about one recording ("eventable").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
  pub event_id:     Uuid,
  /// Store-assigned insertion order; breaks ties between equal timestamps.
  pub sequence:     i64,
  pub recording_id: Uuid,
  /// The recording's subject when the event was written.
  pub subject:      SubjectRef,
  /// The replaced subject, present only on `updated` events.
  pub previous:     Option<SubjectRef>,
  pub action:       EventAction,
  pub person_id:    Option<Uuid>,
  pub bucket_id:    Uuid,
  pub created_at:   DateTime<Utc>,
}

/// A key/value annotation on an event; unique per `(event, key)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDetail {
  pub event_id: Uuid,
  pub key:      String,
  pub value:    Option<String>,
}
