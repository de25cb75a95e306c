//! Shared tags and the child recordings that apply them.

use quill_core::{
  Error as CoreError,
  capability::capabilities,
  context::RequestContext,
  recording::Recording,
  store::TagEntry,
  subject::{SubjectKind, SubjectValue, Tag, normalize_tag_name},
};
use rusqlite::{Connection, OptionalExtension as _};
use uuid::Uuid;

use crate::{
  Result,
  discard,
  encode::{RECORDING_COLUMNS, RawTagEntry, encode_uuid},
  outbox::Outbox,
  tree,
};

fn query_tags<P: rusqlite::Params>(
  conn: &Connection,
  sql: &str,
  params: P,
) -> Result<Vec<TagEntry>> {
  let mut stmt = conn.prepare(sql)?;
  let raws = stmt
    .query_map(params, RawTagEntry::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawTagEntry::into_entry).collect()
}

pub(crate) fn find(conn: &Connection, name: &str) -> Result<Option<TagEntry>> {
  conn
    .query_row(
      "SELECT t.tag_id, t.name, COALESCE(s.available, 1)
       FROM tags t LEFT JOIN tag_states s ON s.tag_id = t.tag_id
       WHERE t.name = ?1",
      rusqlite::params![normalize_tag_name(name)],
      RawTagEntry::from_row,
    )
    .optional()?
    .map(RawTagEntry::into_entry)
    .transpose()
}

/// Find or create the tag named `name` after normalisation.
pub(crate) fn create(conn: &Connection, name: &str) -> Result<TagEntry> {
  if let Some(entry) = find(conn, name)? {
    return Ok(entry);
  }

  let name = normalize_tag_name(name);
  let subject = tree::insert_subject(conn, SubjectValue::Tag(Tag { name: name.clone() }))?;
  let tag_id = encode_uuid(subject.subject_id);
  conn.execute(
    "INSERT INTO tags (tag_id, name) VALUES (?1, ?2)",
    rusqlite::params![tag_id, name],
  )?;
  conn.execute(
    "INSERT INTO tag_states (tag_id, available) VALUES (?1, 1)",
    rusqlite::params![tag_id],
  )?;

  tracing::debug!(tag = %name, "tag created");
  Ok(TagEntry { tag_id: subject.subject_id, name, available: true })
}

pub(crate) fn set_available(conn: &Connection, name: &str, available: bool) -> Result<TagEntry> {
  let entry = find(conn, name)?.ok_or_else(|| CoreError::TagNotFound(name.to_owned()))?;
  conn.execute(
    "INSERT INTO tag_states (tag_id, available) VALUES (?1, ?2)
     ON CONFLICT (tag_id) DO UPDATE SET available = excluded.available",
    rusqlite::params![encode_uuid(entry.tag_id), available],
  )?;
  Ok(TagEntry { available, ..entry })
}

/// The kept child of `id` that applies `tag_id`.
fn applied(conn: &Connection, id: Uuid, tag_id: Uuid) -> Result<Option<Recording>> {
  let sql = format!(
    "SELECT {RECORDING_COLUMNS} FROM recordings
     WHERE parent_id = ?1 AND subject_kind = 'tag' AND subject_id = ?2
       AND discarded_at IS NULL
     ORDER BY created_at, rowid LIMIT 1"
  );
  Ok(
    tree::query_recordings(conn, &sql, rusqlite::params![encode_uuid(id), encode_uuid(tag_id)])?
      .into_iter()
      .next(),
  )
}

/// Apply the tag. Returns `false` when the recording is not taggable, the
/// tag is missing or unavailable, or it is already applied.
pub(crate) fn tag(
  conn: &Connection,
  ctx: &RequestContext,
  id: Uuid,
  name: &str,
  outbox: &mut Outbox,
) -> Result<bool> {
  let recording = tree::require_recording(conn, id)?;
  if !capabilities(recording.subject.kind).taggable {
    return Ok(false);
  }
  if recording.is_discarded() {
    return Err(CoreError::Discarded(id).into());
  }

  let Some(entry) = find(conn, name)? else {
    return Ok(false);
  };
  if !entry.available || applied(conn, id, entry.tag_id)?.is_some() {
    return Ok(false);
  }

  let subject = tree::require_subject(conn, entry.tag_id)?;
  tree::insert_recording(conn, ctx, Some(id), recording.bucket_id, &subject, outbox)?;
  tracing::debug!(recording_id = %id, tag = %entry.name, "tagged");
  Ok(true)
}

/// Discard the child recording applying the tag. Returns `false` when the
/// tag was not applied.
pub(crate) fn untag(
  conn: &Connection,
  ctx: &RequestContext,
  id: Uuid,
  name: &str,
  outbox: &mut Outbox,
) -> Result<bool> {
  tree::require_recording(conn, id)?;
  let Some(entry) = find(conn, name)? else {
    return Ok(false);
  };
  let Some(child) = applied(conn, id, entry.tag_id)? else {
    return Ok(false);
  };
  discard::discard(conn, ctx, child.recording_id, outbox)
}

pub(crate) fn is_tagged(conn: &Connection, id: Uuid, name: &str) -> Result<bool> {
  match find(conn, name)? {
    Some(entry) => Ok(applied(conn, id, entry.tag_id)?.is_some()),
    None => Ok(false),
  }
}

/// Distinct tags applied through kept children, by name.
pub(crate) fn tags(conn: &Connection, id: Uuid) -> Result<Vec<TagEntry>> {
  query_tags(
    conn,
    "SELECT DISTINCT t.tag_id, t.name, COALESCE(s.available, 1)
     FROM recordings r
     JOIN tags t ON t.tag_id = r.subject_id
     LEFT JOIN tag_states s ON s.tag_id = t.tag_id
     WHERE r.parent_id = ?1 AND r.subject_kind = 'tag' AND r.discarded_at IS NULL
     ORDER BY t.name",
    rusqlite::params![encode_uuid(id)],
  )
}

pub(crate) fn tag_recordings(conn: &Connection, id: Uuid) -> Result<Vec<Recording>> {
  tree::kept_children_of_kind(conn, id, SubjectKind::Tag)
}
