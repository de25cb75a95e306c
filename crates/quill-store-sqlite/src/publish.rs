//! Publishing: a child recording pointing at one of two shared
//! publication-state subjects.

use quill_core::{
  Error as CoreError,
  capability::capabilities,
  context::RequestContext,
  event::EventAction,
  recording::Recording,
  subject::{Publication, PublicationState, Subject, SubjectKind, SubjectValue},
};
use rusqlite::{Connection, OptionalExtension as _};
use uuid::Uuid;

use crate::{
  Result,
  encode::{RECORDING_COLUMNS, encode_uuid, publishable_kinds_sql},
  outbox::Outbox,
  timeline,
  tree,
};

/// The shared subject for `state`, created on first use.
fn state_subject(conn: &Connection, state: Publication) -> Result<Subject> {
  let existing: Option<String> = conn
    .query_row(
      "SELECT subject_id FROM publication_states WHERE state = ?1",
      rusqlite::params![state.as_str()],
      |row| row.get(0),
    )
    .optional()?;
  if let Some(subject_id) = existing {
    return tree::require_subject(conn, Uuid::parse_str(&subject_id)?);
  }

  let subject =
    tree::insert_subject(conn, SubjectValue::PublicationState(PublicationState { state }))?;
  conn.execute(
    "INSERT INTO publication_states (state, subject_id) VALUES (?1, ?2)",
    rusqlite::params![state.as_str(), encode_uuid(subject.subject_id)],
  )?;
  tracing::debug!(state = state.as_str(), "publication state created");
  Ok(subject)
}

/// The kept child holding the recording's publication state.
pub(crate) fn publication_recording(conn: &Connection, id: Uuid) -> Result<Option<Recording>> {
  Ok(
    tree::kept_children_of_kind(conn, id, SubjectKind::PublicationState)?
      .into_iter()
      .next(),
  )
}

pub(crate) fn is_published(conn: &Connection, id: Uuid) -> Result<bool> {
  let found = conn
    .query_row(
      "SELECT 1 FROM recordings r
       JOIN publication_states p ON p.subject_id = r.subject_id
       WHERE r.parent_id = ?1 AND r.discarded_at IS NULL AND p.state = 'published'
       LIMIT 1",
      rusqlite::params![encode_uuid(id)],
      |_| Ok(()),
    )
    .optional()?;
  Ok(found.is_some())
}

/// Move the recording to `target`. Returns `false` when it is not
/// publishable or already there.
pub(crate) fn transition(
  conn: &Connection,
  ctx: &RequestContext,
  id: Uuid,
  target: Publication,
  outbox: &mut Outbox,
) -> Result<bool> {
  let recording = tree::require_recording(conn, id)?;
  if !capabilities(recording.subject.kind).publishable {
    return Ok(false);
  }
  if recording.is_discarded() {
    return Err(CoreError::Discarded(id).into());
  }

  let publishing = target == Publication::Published;
  if is_published(conn, id)? == publishing {
    return Ok(false);
  }

  let subject = state_subject(conn, target)?;
  match publication_recording(conn, id)? {
    Some(child) => {
      tree::swap_subject(conn, ctx, child, &subject, outbox)?;
    }
    None => {
      tree::insert_recording(conn, ctx, Some(id), recording.bucket_id, &subject, outbox)?;
    }
  }

  let action = if publishing { EventAction::Published } else { EventAction::Unpublished };
  timeline::append_event(conn, ctx, &recording, action, None)?;

  tracing::debug!(recording_id = %id, state = target.as_str(), "publication changed");
  Ok(true)
}

/// Kept publishable recordings in `bucket_id` whose published flag is
/// `published`.
pub(crate) fn recordings_in_state(
  conn: &Connection,
  bucket_id: Uuid,
  published: bool,
) -> Result<Vec<Recording>> {
  let membership = if published { "IN" } else { "NOT IN" };
  let kinds = publishable_kinds_sql();
  let sql = format!(
    "SELECT {RECORDING_COLUMNS} FROM recordings
     WHERE bucket_id = ?1 AND discarded_at IS NULL AND subject_kind IN ({kinds})
       AND recording_id {membership} (
         SELECT r.parent_id FROM recordings r
         JOIN publication_states p ON p.subject_id = r.subject_id
         WHERE r.parent_id IS NOT NULL AND r.discarded_at IS NULL
           AND p.state = 'published'
       )
     ORDER BY created_at, rowid"
  );
  tree::query_recordings(conn, &sql, rusqlite::params![encode_uuid(bucket_id)])
}
