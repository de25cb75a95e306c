use quill_core::{Error as CoreError, store::RecordingStore};

use super::fixture;
use crate::Error;

fn assert_immutable(result: crate::Result<usize>) {
  match result {
    Err(Error::Core(CoreError::Immutable(message))) => {
      assert!(message.starts_with("immutable:"), "{message}");
    }
    other => panic!("expected an immutability error, got {other:?}"),
  }
}

#[tokio::test]
async fn subjects_cannot_be_rewritten() {
  let f = fixture().await;
  f.article("Post").await;

  assert_immutable(
    f.store
      .execute_raw("UPDATE subjects SET value_json = '{\"title\":\"hacked\"}'")
      .await,
  );
  assert_immutable(f.store.execute_raw("DELETE FROM subjects").await);
}

#[tokio::test]
async fn events_and_details_cannot_be_rewritten() {
  let f = fixture().await;
  let post = f.article("Post").await;
  let event = f.store.events(post.recording_id).await.unwrap()[0].clone();
  f.store.add_event_detail(event.event_id, "k", Some("v")).await.unwrap();

  assert_immutable(f.store.execute_raw("UPDATE events SET action = 'updated'").await);
  assert_immutable(f.store.execute_raw("DELETE FROM events").await);
  assert_immutable(f.store.execute_raw("UPDATE event_details SET value = 'x'").await);
  assert_immutable(f.store.execute_raw("DELETE FROM event_details").await);
}

#[tokio::test]
async fn recording_identity_is_fixed() {
  let f = fixture().await;
  let post = f.article("Post").await;
  f.comment(&post, "hi").await;

  assert_immutable(f.store.execute_raw("UPDATE recordings SET parent_id = NULL").await);
  assert_immutable(
    f.store
      .execute_raw("UPDATE recordings SET created_at = '2000-01-01T00:00:00.000000Z'")
      .await,
  );
  assert_immutable(
    f.store
      .execute_raw("UPDATE recordings SET bucket_id = 'elsewhere'")
      .await,
  );
}

#[tokio::test]
async fn discard_timestamp_is_written_once() {
  let f = fixture().await;
  let post = f.article("Post").await;
  f.store.discard(f.ctx, post.recording_id).await.unwrap();

  assert_immutable(f.store.execute_raw("UPDATE recordings SET discarded_at = NULL").await);
}
