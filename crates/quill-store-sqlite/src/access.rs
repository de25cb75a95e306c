//! Buckets, people, memberships and permission resolution.

use quill_core::{
  Error as CoreError,
  access::{Bucket, Membership, Permissions, Person, Role, Standing},
  context::RequestContext,
  recording::NewRecording,
  subject::{PersonCard, SubjectValue},
};
use rusqlite::{Connection, OptionalExtension as _};
use uuid::Uuid;

use crate::{
  Result,
  encode::{RawBucket, RawMembership, decode_uuid, encode_dt, encode_uuid, now},
  outbox::Outbox,
  timeline,
  tree,
};

// ─── Buckets ─────────────────────────────────────────────────────────────────

pub(crate) fn create_bucket(conn: &Connection, name: &str) -> Result<Bucket> {
  if name.trim().is_empty() {
    return Err(CoreError::Validation("bucket name can't be blank".into()).into());
  }
  let bucket = Bucket { bucket_id: Uuid::new_v4(), name: name.to_owned(), created_at: now() };
  conn.execute(
    "INSERT INTO buckets (bucket_id, name, created_at) VALUES (?1, ?2, ?3)",
    rusqlite::params![encode_uuid(bucket.bucket_id), bucket.name, encode_dt(bucket.created_at)],
  )?;
  tracing::debug!(bucket_id = %bucket.bucket_id, "bucket created");
  Ok(bucket)
}

pub(crate) fn get_bucket(conn: &Connection, id: Uuid) -> Result<Option<Bucket>> {
  conn
    .query_row(
      "SELECT bucket_id, name, created_at FROM buckets WHERE bucket_id = ?1",
      rusqlite::params![encode_uuid(id)],
      RawBucket::from_row,
    )
    .optional()?
    .map(RawBucket::into_bucket)
    .transpose()
}

pub(crate) fn bucket_exists(conn: &Connection, id: Uuid) -> Result<bool> {
  Ok(get_bucket(conn, id)?.is_some())
}

/// Delete a bucket and its memberships once nothing else lives in it.
pub(crate) fn delete_bucket(conn: &Connection, id: Uuid) -> Result<()> {
  if !bucket_exists(conn, id)? {
    return Err(CoreError::BucketNotFound(id).into());
  }
  let id_str = encode_uuid(id);

  let (recordings, events): (i64, i64) = conn.query_row(
    "SELECT
       (SELECT COUNT(*) FROM recordings WHERE bucket_id = ?1),
       (SELECT COUNT(*) FROM events WHERE bucket_id = ?1)",
    rusqlite::params![id_str],
    |row| Ok((row.get(0)?, row.get(1)?)),
  )?;
  if recordings > 0 || events > 0 {
    tracing::warn!(bucket_id = %id, recordings, events, "bucket delete refused");
    return Err(
      CoreError::Restricted(format!(
        "bucket {id} still holds {recordings} recordings and {events} events"
      ))
      .into(),
    );
  }

  conn.execute("DELETE FROM memberships WHERE bucket_id = ?1", rusqlite::params![id_str])?;
  conn.execute("DELETE FROM buckets WHERE bucket_id = ?1", rusqlite::params![id_str])?;
  tracing::info!(bucket_id = %id, "bucket deleted");
  Ok(())
}

// ─── People ──────────────────────────────────────────────────────────────────

/// Attach the person's card as a root recording and register the person.
pub(crate) fn create_person(
  conn: &Connection,
  ctx: &RequestContext,
  card: PersonCard,
  outbox: &mut Outbox,
) -> Result<Person> {
  let recording =
    tree::attach(conn, ctx, NewRecording::root(SubjectValue::PersonCard(card)), outbox)?;
  let person = Person { person_id: Uuid::new_v4(), recording_id: recording.recording_id };
  conn.execute(
    "INSERT INTO people (person_id, recording_id) VALUES (?1, ?2)",
    rusqlite::params![encode_uuid(person.person_id), encode_uuid(person.recording_id)],
  )?;
  tracing::debug!(person_id = %person.person_id, "person created");
  Ok(person)
}

pub(crate) fn get_person(conn: &Connection, id: Uuid) -> Result<Option<Person>> {
  let recording_id: Option<String> = conn
    .query_row(
      "SELECT recording_id FROM people WHERE person_id = ?1",
      rusqlite::params![encode_uuid(id)],
      |row| row.get(0),
    )
    .optional()?;
  recording_id
    .map(|r| Ok(Person { person_id: id, recording_id: decode_uuid(&r)? }))
    .transpose()
}

fn require_person(conn: &Connection, id: Uuid) -> Result<Person> {
  Ok(get_person(conn, id)?.ok_or(CoreError::PersonNotFound(id))?)
}

// ─── Memberships ─────────────────────────────────────────────────────────────

pub(crate) fn membership(
  conn: &Connection,
  person_id: Uuid,
  bucket_id: Uuid,
) -> Result<Option<Membership>> {
  conn
    .query_row(
      "SELECT person_id, bucket_id, role FROM memberships
       WHERE person_id = ?1 AND bucket_id = ?2",
      rusqlite::params![encode_uuid(person_id), encode_uuid(bucket_id)],
      RawMembership::from_row,
    )
    .optional()?
    .map(RawMembership::into_membership)
    .transpose()
}

pub(crate) fn add_membership(
  conn: &Connection,
  person_id: Uuid,
  bucket_id: Uuid,
  role: Role,
) -> Result<Membership> {
  require_person(conn, person_id)?;
  if !bucket_exists(conn, bucket_id)? {
    return Err(CoreError::BucketNotFound(bucket_id).into());
  }
  if membership(conn, person_id, bucket_id)?.is_some() {
    return Err(
      CoreError::Conflict(format!(
        "person {person_id} is already a member of bucket {bucket_id}"
      ))
      .into(),
    );
  }

  conn.execute(
    "INSERT INTO memberships (person_id, bucket_id, role) VALUES (?1, ?2, ?3)",
    rusqlite::params![encode_uuid(person_id), encode_uuid(bucket_id), role.as_str()],
  )?;
  Ok(Membership { person_id, bucket_id, role })
}

pub(crate) fn memberships_for(conn: &Connection, person_id: Uuid) -> Result<Vec<Membership>> {
  let mut stmt = conn.prepare(
    "SELECT person_id, bucket_id, role FROM memberships WHERE person_id = ?1
     ORDER BY rowid",
  )?;
  let raws = stmt
    .query_map(rusqlite::params![encode_uuid(person_id)], RawMembership::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawMembership::into_membership).collect()
}

pub(crate) fn remove_membership(
  conn: &Connection,
  person_id: Uuid,
  bucket_id: Uuid,
) -> Result<bool> {
  let removed = conn.execute(
    "DELETE FROM memberships WHERE person_id = ?1 AND bucket_id = ?2",
    rusqlite::params![encode_uuid(person_id), encode_uuid(bucket_id)],
  )?;
  Ok(removed > 0)
}

// ─── Permissions ─────────────────────────────────────────────────────────────

pub(crate) fn standing(conn: &Connection, person_id: Uuid, recording_id: Uuid) -> Result<Standing> {
  let person = require_person(conn, person_id)?;
  let recording = tree::require_recording(conn, recording_id)?;
  Ok(Standing {
    role:    membership(conn, person_id, recording.bucket_id)?.map(|m| m.role),
    creator: timeline::creator(conn, recording_id)? == Some(person_id),
    owner:   person.recording_id == recording_id,
  })
}

pub(crate) fn permissions(
  conn: &Connection,
  person_id: Uuid,
  recording_id: Uuid,
) -> Result<Permissions> {
  let standing = standing(conn, person_id, recording_id)?;
  let recording = tree::require_recording(conn, recording_id)?;
  let subject = tree::require_subject(conn, recording.subject.id)?;
  Ok(subject.value.as_recordable().permissions(&standing))
}
