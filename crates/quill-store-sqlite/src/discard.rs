//! Soft deletion with cascade.

use quill_core::{
  broadcast::BroadcastAction,
  capability::{Cascade, capabilities},
  context::RequestContext,
  event::EventAction,
  recording::Recording,
};
use rusqlite::Connection;
use uuid::Uuid;

use crate::{
  Result,
  encode::{encode_dt, encode_uuid, now},
  outbox::Outbox,
  search,
  timeline,
  tree,
};

/// Detail key naming the recording whose discard reached this one.
pub const CASCADED_FROM: &str = "cascaded_from";

/// Discard `id` and, where its kind cascades, every kept descendant, children
/// before parents. Returns `false` if `id` was already discarded.
pub(crate) fn discard(
  conn: &Connection,
  ctx: &RequestContext,
  id: Uuid,
  outbox: &mut Outbox,
) -> Result<bool> {
  let target = tree::require_recording(conn, id)?;
  if target.is_discarded() {
    tracing::debug!(recording_id = %id, "already discarded");
    return Ok(false);
  }

  // Explicit post-order walk: a node is finished once all its kept children
  // have been.
  let mut stack = vec![(target, false)];
  let mut count = 0usize;
  while let Some((recording, expanded)) = stack.pop() {
    let cascades = capabilities(recording.subject.kind).cascade == Cascade::KeptChildren;
    if expanded || !cascades {
      let cascaded_from = (recording.recording_id != id).then_some(id);
      discard_one(conn, ctx, recording, cascaded_from, outbox)?;
      count += 1;
      continue;
    }

    let children = tree::kept_children(conn, recording.recording_id)?;
    stack.push((recording, true));
    stack.extend(children.into_iter().rev().map(|child| (child, false)));
  }

  tracing::debug!(recording_id = %id, count, "recording discarded");
  Ok(true)
}

fn discard_one(
  conn: &Connection,
  ctx: &RequestContext,
  recording: Recording,
  cascaded_from: Option<Uuid>,
  outbox: &mut Outbox,
) -> Result<()> {
  let event = timeline::append_event(conn, ctx, &recording, EventAction::Discarded, None)?;
  if let Some(origin) = cascaded_from {
    timeline::add_detail(conn, event.event_id, CASCADED_FROM, Some(&origin.to_string()))?;
  }

  let discarded_at = now();
  conn.execute(
    "UPDATE recordings SET discarded_at = ?2, updated_at = ?2 WHERE recording_id = ?1",
    rusqlite::params![encode_uuid(recording.recording_id), encode_dt(discarded_at)],
  )?;
  search::remove(conn, recording.recording_id)?;

  let recording = Recording {
    discarded_at: Some(discarded_at),
    updated_at: discarded_at,
    ..recording
  };
  let subject = tree::require_subject(conn, recording.subject.id)?;
  outbox.record(&subject.value, BroadcastAction::Discarded, &recording);
  Ok(())
}
