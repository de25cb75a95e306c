use quill_core::{
  broadcast::BroadcastAction,
  event::EventAction,
  recording::NewRecording,
  store::RecordingStore,
  subject::PersonCard,
};
use uuid::Uuid;

use super::{Fixture, comment, fixture};
use crate::{CASCADED_FROM, Error};

#[tokio::test]
async fn discard_is_idempotent() {
  let f = fixture().await;
  let post = f.article("Post").await;

  assert!(f.store.discard(f.ctx, post.recording_id).await.unwrap());
  let first = f.store.get_recording(post.recording_id).await.unwrap().unwrap();
  assert!(first.is_discarded());

  assert!(!f.store.discard(f.ctx, post.recording_id).await.unwrap());
  let second = f.store.get_recording(post.recording_id).await.unwrap().unwrap();
  assert_eq!(second.discarded_at, first.discarded_at);

  let discards = f
    .store
    .events(post.recording_id)
    .await
    .unwrap()
    .into_iter()
    .filter(|e| e.action == EventAction::Discarded)
    .count();
  assert_eq!(discards, 1);
}

#[tokio::test]
async fn discard_cascades_through_kept_children() {
  let f = fixture().await;
  let post = f.article("Post").await;
  let c1 = f.comment(&post, "one").await;
  let reply = f.comment(&c1, "reply").await;
  let c2 = f.comment(&post, "two").await;

  assert!(f.store.discard(f.ctx, post.recording_id).await.unwrap());

  for id in [post.recording_id, c1.recording_id, reply.recording_id, c2.recording_id] {
    let r = f.store.get_recording(id).await.unwrap().unwrap();
    assert!(r.is_discarded(), "{id} should be discarded");
  }

  // Children are finished before their parents.
  let timeline = f
    .store
    .timeline_events(post.recording_id, Default::default())
    .await
    .unwrap();
  let order: Vec<_> = timeline
    .iter()
    .filter(|e| e.action == EventAction::Discarded)
    .map(|e| e.recording_id)
    .collect();
  assert_eq!(
    order,
    vec![reply.recording_id, c1.recording_id, c2.recording_id, post.recording_id]
  );

  // Cascaded discards name where they came from.
  let reply_discard = timeline
    .iter()
    .find(|e| e.recording_id == reply.recording_id && e.action == EventAction::Discarded)
    .unwrap();
  let details = f.store.event_details(reply_discard.event_id).await.unwrap();
  assert_eq!(details.len(), 1);
  assert_eq!(details[0].key, CASCADED_FROM);
  assert_eq!(details[0].value, Some(post.recording_id.to_string()));

  let own = timeline.iter().rfind(|e| e.recording_id == post.recording_id).unwrap();
  assert!(f.store.event_details(own.event_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn already_discarded_children_are_left_alone() {
  let f = fixture().await;
  let post = f.article("Post").await;
  let early = f.comment(&post, "early").await;
  f.store.discard(f.ctx, early.recording_id).await.unwrap();
  let early_at = f
    .store
    .get_recording(early.recording_id)
    .await
    .unwrap()
    .unwrap()
    .discarded_at;

  f.store.discard(f.ctx, post.recording_id).await.unwrap();

  let early_after = f.store.get_recording(early.recording_id).await.unwrap().unwrap();
  assert_eq!(early_after.discarded_at, early_at);
  let discards = f
    .store
    .events(early.recording_id)
    .await
    .unwrap()
    .into_iter()
    .filter(|e| e.action == EventAction::Discarded)
    .count();
  assert_eq!(discards, 1);
}

#[tokio::test]
async fn non_cascading_kinds_leave_children_untouched() {
  let f = fixture().await;
  let person = f
    .store
    .create_person(f.ctx, PersonCard { first_name: Some("Alan".into()), last_name: None })
    .await
    .unwrap();
  let note = f
    .store
    .attach(f.ctx, NewRecording::child(person.recording_id, comment("hello")))
    .await
    .unwrap();

  assert!(f.store.discard(f.ctx, person.recording_id).await.unwrap());

  let card = f.store.get_recording(person.recording_id).await.unwrap().unwrap();
  assert!(card.is_discarded());
  let note = f.store.get_recording(note.recording_id).await.unwrap().unwrap();
  assert!(note.is_kept());
}

#[tokio::test]
async fn discard_removes_search_rows_but_not_counters() {
  let f = fixture().await;
  let post = f.article("Searchable post").await;
  let reply = f.comment(&post, "searchable reply").await;
  assert_eq!(f.store.counter(post.recording_id, "comments").await.unwrap(), 1);

  f.store.discard(f.ctx, reply.recording_id).await.unwrap();

  assert!(f.store.search_entry(reply.recording_id).await.unwrap().is_none());
  assert!(f.store.search_entry(post.recording_id).await.unwrap().is_some());
  assert_eq!(f.store.counter(post.recording_id, "comments").await.unwrap(), 1);
}

#[tokio::test]
async fn broadcasts_follow_comment_lifecycle() {
  let f = fixture().await;
  let post = f.article("Post").await;
  assert!(f.recorder.take().is_empty());

  let reply = f.comment(&post, "hi").await;
  f.store
    .replace_subject(f.ctx, reply.recording_id, comment("hi, edited"))
    .await
    .unwrap();
  f.store.discard(f.ctx, reply.recording_id).await.unwrap();

  let seen = f.recorder.take();
  let actions: Vec<_> = seen.iter().map(|b| b.action).collect();
  assert_eq!(
    actions,
    vec![BroadcastAction::Created, BroadcastAction::Updated, BroadcastAction::Discarded]
  );
  let stream = format!("recording:{}:comments", post.recording_id);
  assert!(seen.iter().all(|b| b.stream == stream && b.recording_id == reply.recording_id));
}

#[tokio::test]
async fn failed_writes_broadcast_nothing() {
  let f = fixture().await;
  let post = f.article("Post").await;
  let reply = f.comment(&post, "hi").await;
  f.recorder.take();

  let result = f
    .store
    .replace_subject(f.ctx, reply.recording_id, comment("   "))
    .await;
  assert!(result.is_err());
  assert!(f.recorder.take().is_empty());
}

#[tokio::test]
async fn default_channel_delivers_after_commit() {
  let store = super::store().await;
  let mut rx = store.subscribe().expect("default channel");
  let bucket = store.create_bucket("Blog").await.unwrap();
  let ctx = quill_core::context::RequestContext::system().with_bucket(bucket.bucket_id);

  let post = store
    .attach(ctx, NewRecording::root(super::article("Post")))
    .await
    .unwrap();
  let reply = store
    .attach(ctx, NewRecording::child(post.recording_id, comment("hi")))
    .await
    .unwrap();

  let broadcast = rx.recv().await.unwrap();
  assert_eq!(broadcast.recording_id, reply.recording_id);
  assert_eq!(broadcast.payload["op"], "append");
}

async fn assert_cascade_rolled_back(f: &Fixture, post: Uuid, reply: Uuid) {
  for id in [post, reply] {
    let recording = f.store.get_recording(id).await.unwrap().unwrap();
    assert!(!recording.is_discarded());
    let events = f.store.events(id).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].action, EventAction::Created);
  }
  assert!(f.store.search_entry(reply).await.unwrap().is_some());
  assert!(f.recorder.take().is_empty());
}

#[tokio::test]
async fn cascade_rolls_back_when_a_detail_cannot_be_written() {
  let f = fixture().await;
  let post = f.article("Post").await;
  let reply = f.comment(&post, "reply").await;
  f.recorder.take();

  f.store
    .execute_raw(
      "CREATE TRIGGER details_offline BEFORE INSERT ON event_details
       BEGIN SELECT RAISE(ABORT, 'details offline'); END",
    )
    .await
    .unwrap();

  let err = f.store.discard(f.ctx, post.recording_id).await.unwrap_err();
  assert!(matches!(err, Error::Sqlite(_)));
  assert_cascade_rolled_back(&f, post.recording_id, reply.recording_id).await;
}

#[tokio::test]
async fn cascade_rolls_back_children_when_the_root_fails() {
  let f = fixture().await;
  let post = f.article("Post").await;
  let reply = f.comment(&post, "reply").await;
  f.recorder.take();

  // Children are discarded first, so this fails after the reply is done.
  f.store
    .execute_raw(
      "CREATE TRIGGER root_discard_offline BEFORE INSERT ON events
       WHEN NEW.action = 'discarded'
         AND NEW.recording_id IN (SELECT recording_id FROM recordings WHERE parent_id IS NULL)
       BEGIN SELECT RAISE(ABORT, 'root discard offline'); END",
    )
    .await
    .unwrap();

  let err = f.store.discard(f.ctx, post.recording_id).await.unwrap_err();
  assert!(matches!(err, Error::Sqlite(_)));
  assert_cascade_rolled_back(&f, post.recording_id, reply.recording_id).await;
}
