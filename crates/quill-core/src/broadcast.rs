//! Broadcasting: structured change notifications for subscribers.
//!
//! The store produces [`Broadcast`]s after a mutation commits and hands them
//! to a [`Broadcaster`]. Delivery is best-effort: the store never waits for
//! or inspects the outcome.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BroadcastAction {
  Created,
  Updated,
  Discarded,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Broadcast {
  /// Subscription key, e.g. `recording:<parent>:comments`.
  pub stream:       String,
  pub recording_id: Uuid,
  pub action:       BroadcastAction,
  pub payload:      serde_json::Value,
}

/// A sink for committed broadcasts. Implementations must not block.
pub trait Broadcaster: Send + Sync {
  fn send(&self, broadcast: Broadcast);
}

/// Drops every broadcast.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullBroadcaster;

impl Broadcaster for NullBroadcaster {
  fn send(&self, _broadcast: Broadcast) {}
}

/// Fans broadcasts out to any number of [`broadcast::Receiver`]s.
#[derive(Debug, Clone)]
pub struct ChannelBroadcaster {
  sender: broadcast::Sender<Broadcast>,
}

impl ChannelBroadcaster {
  pub fn new(capacity: usize) -> Self {
    let (sender, _) = broadcast::channel(capacity.max(1));
    Self { sender }
  }

  pub fn subscribe(&self) -> broadcast::Receiver<Broadcast> {
    self.sender.subscribe()
  }
}

impl Broadcaster for ChannelBroadcaster {
  fn send(&self, broadcast: Broadcast) {
    // An error only means nobody is listening right now.
    if let Err(e) = self.sender.send(broadcast) {
      tracing::debug!(stream = %e.0.stream, "broadcast dropped: no subscribers");
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn sample() -> Broadcast {
    Broadcast {
      stream:       "recording:x:comments".into(),
      recording_id: Uuid::new_v4(),
      action:       BroadcastAction::Created,
      payload:      serde_json::json!({}),
    }
  }

  #[tokio::test]
  async fn channel_broadcaster_delivers_to_subscribers() {
    let broadcaster = ChannelBroadcaster::new(8);
    let mut rx = broadcaster.subscribe();

    let sent = sample();
    broadcaster.send(sent.clone());

    assert_eq!(rx.recv().await.unwrap(), sent);
  }

  #[test]
  fn channel_broadcaster_without_subscribers_does_not_fail() {
    ChannelBroadcaster::new(1).send(sample());
  }
}
