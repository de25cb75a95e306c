//! Denormalised child counts kept on the parent recording.
//!
//! Increments and decrements are single statements so concurrent writers
//! never lose an update.

use quill_core::capability::{countable_kinds, counter_kind};
use rusqlite::{Connection, OptionalExtension as _};
use uuid::Uuid;

use crate::{Result, encode::encode_uuid, tree};

pub(crate) fn get(conn: &Connection, id: Uuid, name: &str) -> Result<i64> {
  let count = conn
    .query_row(
      "SELECT count FROM counter_caches WHERE recording_id = ?1 AND name = ?2",
      rusqlite::params![encode_uuid(id), name],
      |row| row.get(0),
    )
    .optional()?;
  Ok(count.unwrap_or(0))
}

pub(crate) fn increment(conn: &Connection, id: Uuid, name: &str) -> Result<i64> {
  let count = conn.query_row(
    "INSERT INTO counter_caches (recording_id, name, count) VALUES (?1, ?2, 1)
     ON CONFLICT (recording_id, name) DO UPDATE SET count = count + 1
     RETURNING count",
    rusqlite::params![encode_uuid(id), name],
    |row| row.get(0),
  )?;
  Ok(count)
}

/// Never drives the count below zero.
pub(crate) fn decrement(conn: &Connection, id: Uuid, name: &str) -> Result<i64> {
  conn.execute(
    "UPDATE counter_caches SET count = count - 1
     WHERE recording_id = ?1 AND name = ?2 AND count > 0",
    rusqlite::params![encode_uuid(id), name],
  )?;
  get(conn, id, name)
}

/// Recount the kept children of the kind `name` counts and store the result.
pub(crate) fn refresh(conn: &Connection, id: Uuid, name: &str) -> Result<i64> {
  let kind = counter_kind(name)?;
  tree::require_recording(conn, id)?;
  let id_str = encode_uuid(id);

  let live: i64 = conn.query_row(
    "SELECT COUNT(*) FROM recordings
     WHERE parent_id = ?1 AND subject_kind = ?2 AND discarded_at IS NULL",
    rusqlite::params![id_str, kind.as_str()],
    |row| row.get(0),
  )?;

  conn.execute(
    "INSERT INTO counter_caches (recording_id, name, count) VALUES (?1, ?2, ?3)
     ON CONFLICT (recording_id, name) DO UPDATE SET count = excluded.count",
    rusqlite::params![id_str, name, live],
  )?;

  tracing::debug!(recording_id = %id, name, count = live, "counter refreshed");
  Ok(live)
}

pub(crate) fn refresh_all(conn: &Connection, id: Uuid) -> Result<Vec<(&'static str, i64)>> {
  countable_kinds()
    .map(|(_, name)| refresh(conn, id, name).map(|count| (name, count)))
    .collect()
}
