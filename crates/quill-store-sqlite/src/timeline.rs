//! The append-only event timeline and its time-travel reads.
//!
//! Events are totally ordered by `(created_at, sequence)`. `sequence` is the
//! table's autoincrement key, so two events written in the same microsecond
//! still have a definite order.

use chrono::{DateTime, Utc};
use quill_core::{
  Error as CoreError,
  context::RequestContext,
  event::{Event, EventAction, EventDetail},
  recording::Recording,
  subject::{Subject, SubjectKind, SubjectRef},
};
use rusqlite::{Connection, OptionalExtension as _};
use uuid::Uuid;

use crate::{
  Result,
  encode::{EVENT_COLUMNS, RawEvent, RawEventDetail, encode_dt, encode_uuid, now},
  tree,
};

fn query_events<P: rusqlite::Params>(
  conn: &Connection,
  sql: &str,
  params: P,
) -> Result<Vec<Event>> {
  let mut stmt = conn.prepare(sql)?;
  let raws = stmt
    .query_map(params, RawEvent::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawEvent::into_event).collect()
}

/// Record `action` against `recording` as it currently stands.
pub(crate) fn append_event(
  conn: &Connection,
  ctx: &RequestContext,
  recording: &Recording,
  action: EventAction,
  previous: Option<SubjectRef>,
) -> Result<Event> {
  let event_id = Uuid::new_v4();
  let created_at = now();

  conn.execute(
    "INSERT INTO events
       (event_id, recording_id, subject_kind, subject_id, previous_kind, previous_id,
        action, person_id, bucket_id, created_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
    rusqlite::params![
      encode_uuid(event_id),
      encode_uuid(recording.recording_id),
      recording.subject.kind.as_str(),
      encode_uuid(recording.subject.id),
      previous.map(|p| p.kind.as_str()),
      previous.map(|p| encode_uuid(p.id)),
      action.as_str(),
      ctx.person_id.map(encode_uuid),
      encode_uuid(recording.bucket_id),
      encode_dt(created_at),
    ],
  )?;

  Ok(Event {
    event_id,
    sequence: conn.last_insert_rowid(),
    recording_id: recording.recording_id,
    subject: recording.subject,
    previous,
    action,
    person_id: ctx.person_id,
    bucket_id: recording.bucket_id,
    created_at,
  })
}

pub(crate) fn get_event(conn: &Connection, event_id: Uuid) -> Result<Option<Event>> {
  let sql = format!("SELECT {EVENT_COLUMNS} FROM events WHERE event_id = ?1");
  conn
    .query_row(&sql, rusqlite::params![encode_uuid(event_id)], RawEvent::from_row)
    .optional()?
    .map(RawEvent::into_event)
    .transpose()
}

pub(crate) fn require_event(conn: &Connection, event_id: Uuid) -> Result<Event> {
  Ok(get_event(conn, event_id)?.ok_or(CoreError::EventNotFound(event_id))?)
}

pub(crate) fn events(conn: &Connection, recording_id: Uuid) -> Result<Vec<Event>> {
  let sql = format!(
    "SELECT {EVENT_COLUMNS} FROM events WHERE recording_id = ?1
     ORDER BY created_at, sequence"
  );
  query_events(conn, &sql, rusqlite::params![encode_uuid(recording_id)])
}

/// Events of `recording_id` and every descendant, oldest first.
pub(crate) fn timeline_events(
  conn: &Connection,
  recording_id: Uuid,
  limit: usize,
  offset: usize,
) -> Result<Vec<Event>> {
  tree::require_recording(conn, recording_id)?;
  let sql = format!(
    "WITH RECURSIVE tree(id) AS (
       SELECT ?1
       UNION ALL
       SELECT r.recording_id FROM recordings r JOIN tree ON r.parent_id = tree.id
     )
     SELECT {EVENT_COLUMNS} FROM events
     WHERE recording_id IN (SELECT id FROM tree)
     ORDER BY created_at, sequence
     LIMIT ?2 OFFSET ?3"
  );
  query_events(
    conn,
    &sql,
    rusqlite::params![encode_uuid(recording_id), limit as i64, offset as i64],
  )
}

/// The person on the recording's first `created` event.
pub(crate) fn creator(conn: &Connection, recording_id: Uuid) -> Result<Option<Uuid>> {
  let person: Option<Option<String>> = conn
    .query_row(
      "SELECT person_id FROM events WHERE recording_id = ?1 AND action = 'created'
       ORDER BY created_at, sequence LIMIT 1",
      rusqlite::params![encode_uuid(recording_id)],
      |row| row.get(0),
    )
    .optional()?;
  Ok(person.flatten().as_deref().map(Uuid::parse_str).transpose()?)
}

fn load_subject(conn: &Connection, subject_id: Option<String>) -> Result<Option<Subject>> {
  let Some(subject_id) = subject_id else {
    return Ok(None);
  };
  tree::get_subject(conn, Uuid::parse_str(&subject_id)?)
}

/// The subject the recording pointed at as of `at`.
pub(crate) fn subject_at(
  conn: &Connection,
  recording_id: Uuid,
  at: DateTime<Utc>,
) -> Result<Option<Subject>> {
  let subject_id = conn
    .query_row(
      "SELECT subject_id FROM events
       WHERE recording_id = ?1 AND created_at <= ?2
       ORDER BY created_at DESC, sequence DESC LIMIT 1",
      rusqlite::params![encode_uuid(recording_id), encode_dt(at)],
      |row| row.get(0),
    )
    .optional()?;
  load_subject(conn, subject_id)
}

/// The subject the recording pointed at when `event` was written. Unlike
/// [`subject_at`], this is exact for events sharing a timestamp.
fn subject_as_of(
  conn: &Connection,
  recording_id: Uuid,
  event: &Event,
) -> Result<Option<Subject>> {
  let subject_id = conn
    .query_row(
      "SELECT subject_id FROM events
       WHERE recording_id = ?1
         AND (created_at < ?2 OR (created_at = ?2 AND sequence <= ?3))
       ORDER BY created_at DESC, sequence DESC LIMIT 1",
      rusqlite::params![
        encode_uuid(recording_id),
        encode_dt(event.created_at),
        event.sequence
      ],
      |row| row.get(0),
    )
    .optional()?;
  load_subject(conn, subject_id)
}

/// The nearest ancestor currently holding a subject of `kind`, read back as
/// it was when `event` was written. The ancestor is chosen by its current
/// kind, so its subject at the time may be of another kind.
pub(crate) fn ancestor_at(
  conn: &Connection,
  event: &Event,
  kind: SubjectKind,
) -> Result<Option<Subject>> {
  let Some(ancestor) = tree::ancestors(conn, event.recording_id)?
    .into_iter()
    .find(|a| a.subject.kind == kind)
  else {
    return Ok(None);
  };
  subject_as_of(conn, ancestor.recording_id, event)
}

pub(crate) fn describe_event(conn: &Connection, event_id: Uuid) -> Result<String> {
  let event = require_event(conn, event_id)?;
  let subject = tree::require_subject(conn, event.subject.id)?;
  let recordable = subject.value.as_recordable();

  let anchor = match recordable.description_anchor() {
    Some(kind) => ancestor_at(conn, &event, kind)?,
    None => None,
  };
  Ok(recordable.timeline_description(anchor.as_ref().map(|s| &s.value)))
}

pub(crate) fn add_detail(
  conn: &Connection,
  event_id: Uuid,
  key: &str,
  value: Option<&str>,
) -> Result<EventDetail> {
  require_event(conn, event_id)?;
  let id_str = encode_uuid(event_id);

  let exists = conn
    .query_row(
      "SELECT 1 FROM event_details WHERE event_id = ?1 AND key = ?2",
      rusqlite::params![id_str, key],
      |_| Ok(()),
    )
    .optional()?
    .is_some();
  if exists {
    return Err(
      CoreError::Conflict(format!("event {event_id} already has detail {key:?}")).into(),
    );
  }

  conn.execute(
    "INSERT INTO event_details (event_id, key, value) VALUES (?1, ?2, ?3)",
    rusqlite::params![id_str, key, value],
  )?;

  Ok(EventDetail {
    event_id,
    key: key.to_owned(),
    value: value.map(str::to_owned),
  })
}

pub(crate) fn details(conn: &Connection, event_id: Uuid) -> Result<Vec<EventDetail>> {
  let mut stmt = conn.prepare(
    "SELECT event_id, key, value FROM event_details WHERE event_id = ?1
     ORDER BY rowid",
  )?;
  let raws = stmt
    .query_map(rusqlite::params![encode_uuid(event_id)], RawEventDetail::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawEventDetail::into_detail).collect()
}
