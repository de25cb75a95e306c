//! The recording tree: attaching subjects, swapping them, and walking the
//! parent/child structure.
//!
//! Every function here runs on the connection thread inside the caller's
//! transaction. Traversals are single recursive CTEs, so tree depth never
//! grows the host stack.

use quill_core::{
  Error as CoreError,
  broadcast::BroadcastAction,
  capability::capabilities,
  context::RequestContext,
  event::EventAction,
  recording::{NewRecording, Recording},
  subject::{Subject, SubjectKind, SubjectValue},
};
use rusqlite::{Connection, OptionalExtension as _};
use uuid::Uuid;

use crate::{
  Result,
  access,
  counter,
  encode::{
    RECORDING_COLUMNS, RawRecording, RawSubject, SUBJECT_COLUMNS, encode_dt, encode_uuid,
    now,
  },
  outbox::Outbox,
  search,
  timeline,
};

// ─── Reads ───────────────────────────────────────────────────────────────────

/// Run `sql` (which must select [`RECORDING_COLUMNS`]) and decode every row.
pub(crate) fn query_recordings<P: rusqlite::Params>(
  conn: &Connection,
  sql: &str,
  params: P,
) -> Result<Vec<Recording>> {
  let mut stmt = conn.prepare(sql)?;
  let raws = stmt
    .query_map(params, RawRecording::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawRecording::into_recording).collect()
}

pub(crate) fn get_recording(conn: &Connection, id: Uuid) -> Result<Option<Recording>> {
  let sql = format!("SELECT {RECORDING_COLUMNS} FROM recordings WHERE recording_id = ?1");
  conn
    .query_row(&sql, rusqlite::params![encode_uuid(id)], RawRecording::from_row)
    .optional()?
    .map(RawRecording::into_recording)
    .transpose()
}

pub(crate) fn require_recording(conn: &Connection, id: Uuid) -> Result<Recording> {
  Ok(get_recording(conn, id)?.ok_or(CoreError::RecordingNotFound(id))?)
}

/// Like [`require_recording`], but a discarded recording is an error.
pub(crate) fn require_kept(conn: &Connection, id: Uuid) -> Result<Recording> {
  let recording = require_recording(conn, id)?;
  if recording.is_discarded() {
    return Err(CoreError::Discarded(id).into());
  }
  Ok(recording)
}

pub(crate) fn get_subject(conn: &Connection, id: Uuid) -> Result<Option<Subject>> {
  let sql = format!("SELECT {SUBJECT_COLUMNS} FROM subjects WHERE subject_id = ?1");
  conn
    .query_row(&sql, rusqlite::params![encode_uuid(id)], RawSubject::from_row)
    .optional()?
    .map(RawSubject::into_subject)
    .transpose()
}

pub(crate) fn require_subject(conn: &Connection, id: Uuid) -> Result<Subject> {
  Ok(get_subject(conn, id)?.ok_or(CoreError::SubjectNotFound(id))?)
}

pub(crate) fn children(conn: &Connection, id: Uuid) -> Result<Vec<Recording>> {
  let sql = format!(
    "SELECT {RECORDING_COLUMNS} FROM recordings WHERE parent_id = ?1
     ORDER BY created_at, rowid"
  );
  query_recordings(conn, &sql, rusqlite::params![encode_uuid(id)])
}

pub(crate) fn kept_children(conn: &Connection, id: Uuid) -> Result<Vec<Recording>> {
  let sql = format!(
    "SELECT {RECORDING_COLUMNS} FROM recordings
     WHERE parent_id = ?1 AND discarded_at IS NULL
     ORDER BY created_at, rowid"
  );
  query_recordings(conn, &sql, rusqlite::params![encode_uuid(id)])
}

pub(crate) fn kept_children_of_kind(
  conn: &Connection,
  id: Uuid,
  kind: SubjectKind,
) -> Result<Vec<Recording>> {
  let sql = format!(
    "SELECT {RECORDING_COLUMNS} FROM recordings
     WHERE parent_id = ?1 AND subject_kind = ?2 AND discarded_at IS NULL
     ORDER BY created_at, rowid"
  );
  query_recordings(conn, &sql, rusqlite::params![encode_uuid(id), kind.as_str()])
}

/// Every discarded recording in the bucket, most recently discarded first.
pub(crate) fn discarded_in_bucket(conn: &Connection, bucket_id: Uuid) -> Result<Vec<Recording>> {
  if !access::bucket_exists(conn, bucket_id)? {
    return Err(CoreError::BucketNotFound(bucket_id).into());
  }
  let sql = format!(
    "SELECT {RECORDING_COLUMNS} FROM recordings
     WHERE bucket_id = ?1 AND discarded_at IS NOT NULL
     ORDER BY discarded_at DESC, rowid DESC"
  );
  query_recordings(conn, &sql, rusqlite::params![encode_uuid(bucket_id)])
}

/// Kept comment children, or nothing when the subject is not commentable.
pub(crate) fn comments(conn: &Connection, id: Uuid) -> Result<Vec<Recording>> {
  let recording = require_recording(conn, id)?;
  if !capabilities(recording.subject.kind).commentable {
    return Ok(Vec::new());
  }
  kept_children_of_kind(conn, id, SubjectKind::Comment)
}

/// Nearest ancestor first.
pub(crate) fn ancestors(conn: &Connection, id: Uuid) -> Result<Vec<Recording>> {
  require_recording(conn, id)?;
  let sql = format!(
    "WITH RECURSIVE up(id, parent, depth) AS (
       SELECT recording_id, parent_id, 0 FROM recordings WHERE recording_id = ?1
       UNION ALL
       SELECT r.recording_id, r.parent_id, up.depth + 1
       FROM recordings r JOIN up ON r.recording_id = up.parent
     )
     SELECT {RECORDING_COLUMNS} FROM recordings JOIN up ON recording_id = up.id
     WHERE up.depth > 0
     ORDER BY up.depth"
  );
  query_recordings(conn, &sql, rusqlite::params![encode_uuid(id)])
}

pub(crate) fn root(conn: &Connection, id: Uuid) -> Result<Recording> {
  match ancestors(conn, id)?.pop() {
    Some(root) => Ok(root),
    None => require_recording(conn, id),
  }
}

/// Depth-first pre-order, siblings in creation order. Each row's path is the
/// concatenation of fixed-width `(created_at, rowid)` keys from the top, so
/// sorting by path yields the walk.
pub(crate) fn descendants(conn: &Connection, id: Uuid) -> Result<Vec<Recording>> {
  require_recording(conn, id)?;
  let sql = format!(
    "WITH RECURSIVE down(id, path) AS (
       SELECT recording_id, created_at || printf('%012d', rowid)
       FROM recordings WHERE parent_id = ?1
       UNION ALL
       SELECT r.recording_id, down.path || '/' || r.created_at || printf('%012d', r.rowid)
       FROM recordings r JOIN down ON r.parent_id = down.id
     )
     SELECT {RECORDING_COLUMNS} FROM recordings JOIN down ON recording_id = down.id
     ORDER BY down.path"
  );
  query_recordings(conn, &sql, rusqlite::params![encode_uuid(id)])
}

// ─── Writes ──────────────────────────────────────────────────────────────────

/// Validate and persist a new subject. Subjects are never written again.
pub(crate) fn insert_subject(conn: &Connection, value: SubjectValue) -> Result<Subject> {
  value.validate()?;
  let subject = Subject { subject_id: Uuid::new_v4(), value, created_at: now() };
  conn.execute(
    "INSERT INTO subjects (subject_id, kind, value_json, created_at)
     VALUES (?1, ?2, ?3, ?4)",
    rusqlite::params![
      encode_uuid(subject.subject_id),
      subject.value.kind().as_str(),
      subject.value.to_json()?.to_string(),
      encode_dt(subject.created_at),
    ],
  )?;
  Ok(subject)
}

/// Work out which bucket a new recording lives in.
fn resolve_bucket(
  conn: &Connection,
  ctx: &RequestContext,
  parent_id: Option<Uuid>,
  bucket_id: Option<Uuid>,
) -> Result<Uuid> {
  let resolved = match parent_id {
    Some(parent_id) => {
      let parent = require_kept(conn, parent_id)?;
      if let Some(bucket_id) = bucket_id
        && bucket_id != parent.bucket_id
      {
        return Err(
          CoreError::Validation(format!(
            "bucket {bucket_id} differs from parent bucket {}",
            parent.bucket_id
          ))
          .into(),
        );
      }
      parent.bucket_id
    }
    None => bucket_id.or(ctx.bucket_id).ok_or(CoreError::BucketMissing)?,
  };

  if !access::bucket_exists(conn, resolved)? {
    return Err(CoreError::BucketNotFound(resolved).into());
  }
  Ok(resolved)
}

/// Persist `input` as a new subject inside a new recording.
pub(crate) fn attach(
  conn: &Connection,
  ctx: &RequestContext,
  input: NewRecording,
  outbox: &mut Outbox,
) -> Result<Recording> {
  let kind = input.value.kind();
  if kind.is_shared() {
    return Err(
      CoreError::Validation(format!("{kind} subjects are attached through their capability"))
        .into(),
    );
  }

  let bucket_id = resolve_bucket(conn, ctx, input.parent_id, input.bucket_id)?;
  let subject = insert_subject(conn, input.value)?;
  insert_recording(conn, ctx, input.parent_id, bucket_id, &subject, outbox)
}

/// Create a recording around an already persisted subject and run the
/// creation fan-out: timeline, parent counter, search index, broadcast.
pub(crate) fn insert_recording(
  conn: &Connection,
  ctx: &RequestContext,
  parent_id: Option<Uuid>,
  bucket_id: Uuid,
  subject: &Subject,
  outbox: &mut Outbox,
) -> Result<Recording> {
  let created_at = now();
  let recording = Recording {
    recording_id: Uuid::new_v4(),
    parent_id,
    bucket_id,
    subject: subject.reference(),
    discarded_at: None,
    created_at,
    updated_at: created_at,
  };

  conn.execute(
    "INSERT INTO recordings
       (recording_id, parent_id, bucket_id, subject_kind, subject_id, created_at, updated_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
    rusqlite::params![
      encode_uuid(recording.recording_id),
      parent_id.map(encode_uuid),
      encode_uuid(bucket_id),
      recording.subject.kind.as_str(),
      encode_uuid(recording.subject.id),
      encode_dt(created_at),
    ],
  )?;

  timeline::append_event(conn, ctx, &recording, EventAction::Created, None)?;

  if let Some(parent_id) = parent_id
    && let Some(name) = capabilities(recording.subject.kind).countable
  {
    counter::increment(conn, parent_id, name)?;
  }

  search::refresh(conn, &recording, &subject.value)?;
  outbox.record(&subject.value, BroadcastAction::Created, &recording);

  tracing::debug!(
    recording_id = %recording.recording_id,
    kind = %recording.subject.kind,
    "recording attached"
  );
  Ok(recording)
}

/// Persist `value` and point the recording at it.
pub(crate) fn replace_subject(
  conn: &Connection,
  ctx: &RequestContext,
  id: Uuid,
  value: SubjectValue,
  outbox: &mut Outbox,
) -> Result<Recording> {
  let recording = require_kept(conn, id)?;
  for kind in [recording.subject.kind, value.kind()] {
    if kind.is_shared() {
      return Err(
        CoreError::Validation(format!("{kind} subjects are swapped through their capability"))
          .into(),
      );
    }
  }

  let subject = insert_subject(conn, value)?;
  swap_subject(conn, ctx, recording, &subject, outbox)
}

/// Re-point `recording` at `subject` and run the update fan-out.
pub(crate) fn swap_subject(
  conn: &Connection,
  ctx: &RequestContext,
  recording: Recording,
  subject: &Subject,
  outbox: &mut Outbox,
) -> Result<Recording> {
  let previous = recording.subject;
  let updated_at = now();

  conn.execute(
    "UPDATE recordings SET subject_kind = ?2, subject_id = ?3, updated_at = ?4
     WHERE recording_id = ?1",
    rusqlite::params![
      encode_uuid(recording.recording_id),
      subject.value.kind().as_str(),
      encode_uuid(subject.subject_id),
      encode_dt(updated_at),
    ],
  )?;

  let recording = Recording { subject: subject.reference(), updated_at, ..recording };
  timeline::append_event(conn, ctx, &recording, EventAction::Updated, Some(previous))?;

  // A kind change moves the recording between its parent's counters.
  if previous.kind != recording.subject.kind
    && let Some(parent_id) = recording.parent_id
  {
    if let Some(name) = capabilities(previous.kind).countable {
      counter::decrement(conn, parent_id, name)?;
    }
    if let Some(name) = capabilities(recording.subject.kind).countable {
      counter::increment(conn, parent_id, name)?;
    }
  }

  search::refresh(conn, &recording, &subject.value)?;
  outbox.record(&subject.value, BroadcastAction::Updated, &recording);

  tracing::debug!(
    recording_id = %recording.recording_id,
    previous = %previous.id,
    subject_id = %recording.subject.id,
    "subject replaced"
  );
  Ok(recording)
}

/// Administrative hard delete of a recording nothing refers to.
pub(crate) fn purge(conn: &Connection, id: Uuid) -> Result<()> {
  let recording = require_recording(conn, id)?;
  let id_str = encode_uuid(id);

  let (events, children, people): (i64, i64, i64) = conn.query_row(
    "SELECT
       (SELECT COUNT(*) FROM events WHERE recording_id = ?1),
       (SELECT COUNT(*) FROM recordings WHERE parent_id = ?1),
       (SELECT COUNT(*) FROM people WHERE recording_id = ?1)",
    rusqlite::params![id_str],
    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
  )?;

  if events > 0 || children > 0 || people > 0 {
    tracing::warn!(recording_id = %id, events, children, people, "purge refused");
    return Err(
      CoreError::Restricted(format!(
        "recording {id} is referenced by {events} events, {children} children and \
         {people} people"
      ))
      .into(),
    );
  }

  conn.execute("DELETE FROM search_indices WHERE recording_id = ?1", rusqlite::params![id_str])?;
  conn.execute("DELETE FROM counter_caches WHERE recording_id = ?1", rusqlite::params![id_str])?;
  conn.execute("DELETE FROM recordings WHERE recording_id = ?1", rusqlite::params![id_str])?;

  if let Some(parent_id) = recording.parent_id
    && let Some(name) = capabilities(recording.subject.kind).countable
  {
    counter::decrement(conn, parent_id, name)?;
  }

  tracing::info!(recording_id = %id, "recording purged");
  Ok(())
}
