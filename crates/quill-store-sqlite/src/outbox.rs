//! Broadcasts collected during a write, delivered only once it commits.

use quill_core::{
  broadcast::{Broadcast, BroadcastAction, Broadcaster},
  capability::capabilities,
  recording::Recording,
  subject::SubjectValue,
};

#[derive(Debug, Default)]
pub(crate) struct Outbox {
  pending: Vec<Broadcast>,
}

impl Outbox {
  /// Queue the broadcast `value` declares for `action`, if its kind is
  /// broadcastable.
  pub(crate) fn record(
    &mut self,
    value: &SubjectValue,
    action: BroadcastAction,
    recording: &Recording,
  ) {
    if !capabilities(value.kind()).broadcastable {
      return;
    }
    if let Some(broadcast) = value.as_recordable().broadcast(action, recording) {
      self.pending.push(broadcast);
    }
  }

  pub(crate) fn deliver(self, broadcaster: &dyn Broadcaster) {
    for broadcast in self.pending {
      tracing::debug!(
        stream = %broadcast.stream,
        recording_id = %broadcast.recording_id,
        "broadcasting"
      );
      broadcaster.send(broadcast);
    }
  }
}
