//! The search projection: one row per recording whose current subject is
//! searchable, matched with `LIKE` terms against a case-folded copy of its
//! content.

use quill_core::{
  recording::Recording,
  store::{SearchEntry, SearchQuery},
  subject::SubjectValue,
};
use rusqlite::{Connection, OptionalExtension as _, types::Value};
use uuid::Uuid;

use crate::{
  Result,
  encode::{RECORDING_COLUMNS, RawSearchEntry, encode_uuid},
  tree,
};

/// Bring the row for `recording` in line with `value`. The row keeps its
/// identity across updates; a non-searchable subject leaves no row.
pub(crate) fn refresh(
  conn: &Connection,
  recording: &Recording,
  value: &SubjectValue,
) -> Result<()> {
  let Some(content) = value.search_content()? else {
    return remove(conn, recording.recording_id);
  };

  conn.execute(
    "INSERT INTO search_indices
       (search_index_id, recording_id, subject_kind, content, folded)
     VALUES (?1, ?2, ?3, ?4, ?5)
     ON CONFLICT (recording_id) DO UPDATE
       SET subject_kind = excluded.subject_kind,
           content      = excluded.content,
           folded       = excluded.folded",
    rusqlite::params![
      encode_uuid(Uuid::new_v4()),
      encode_uuid(recording.recording_id),
      value.kind().as_str(),
      &content,
      fold(&content),
    ],
  )?;
  Ok(())
}

pub(crate) fn remove(conn: &Connection, recording_id: Uuid) -> Result<()> {
  conn.execute(
    "DELETE FROM search_indices WHERE recording_id = ?1",
    rusqlite::params![encode_uuid(recording_id)],
  )?;
  Ok(())
}

pub(crate) fn entry(conn: &Connection, recording_id: Uuid) -> Result<Option<SearchEntry>> {
  conn
    .query_row(
      "SELECT recording_id, subject_kind, content FROM search_indices
       WHERE recording_id = ?1",
      rusqlite::params![encode_uuid(recording_id)],
      RawSearchEntry::from_row,
    )
    .optional()?
    .map(RawSearchEntry::into_entry)
    .transpose()
}

/// Case folding shared by the stored row and the query terms.
fn fold(text: &str) -> String { text.to_lowercase() }

fn escape_like(term: &str) -> String {
  let mut escaped = String::with_capacity(term.len());
  for c in term.chars() {
    if matches!(c, '%' | '_' | '\\') {
      escaped.push('\\');
    }
    escaped.push(c);
  }
  escaped
}

/// Recordings whose content contains every whitespace-separated term. A
/// query without terms matches nothing.
pub(crate) fn search(
  conn: &Connection,
  query: &SearchQuery,
  default_limit: usize,
) -> Result<Vec<Recording>> {
  let terms: Vec<String> = query
    .text
    .split_whitespace()
    .map(|term| format!("%{}%", escape_like(&fold(term))))
    .collect();
  if terms.is_empty() {
    return Ok(Vec::new());
  }

  let mut filter = String::new();
  let mut params: Vec<Value> = Vec::new();
  for term in terms {
    params.push(Value::Text(term));
    filter.push_str(&format!(" AND folded LIKE ?{} ESCAPE '\\'", params.len()));
  }
  if let Some(kind) = query.kind {
    params.push(Value::Text(kind.as_str().to_owned()));
    filter.push_str(&format!(" AND subject_kind = ?{}", params.len()));
  }

  let limit = query.limit.unwrap_or(default_limit);
  params.push(Value::Integer(limit as i64));
  let limit_idx = params.len();
  params.push(Value::Integer(query.offset.unwrap_or(0) as i64));
  let offset_idx = params.len();

  let sql = format!(
    "SELECT {RECORDING_COLUMNS} FROM recordings
     WHERE recording_id IN (SELECT recording_id FROM search_indices WHERE 1 = 1{filter})
     ORDER BY created_at, rowid
     LIMIT ?{limit_idx} OFFSET ?{offset_idx}"
  );
  tree::query_recordings(conn, &sql, rusqlite::params_from_iter(params))
}
