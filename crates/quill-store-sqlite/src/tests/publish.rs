use quill_core::{
  Error as CoreError,
  event::EventAction,
  store::RecordingStore,
  subject::{SubjectKind, SubjectValue},
};

use super::fixture;
use crate::Error;

#[tokio::test]
async fn publish_is_idempotent() {
  let f = fixture().await;
  let post = f.article("Post").await;
  assert!(!f.store.is_published(post.recording_id).await.unwrap());

  assert!(f.store.publish(f.ctx, post.recording_id).await.unwrap());
  assert!(f.store.is_published(post.recording_id).await.unwrap());
  assert!(!f.store.publish(f.ctx, post.recording_id).await.unwrap());

  let published = f
    .store
    .events(post.recording_id)
    .await
    .unwrap()
    .into_iter()
    .filter(|e| e.action == EventAction::Published)
    .count();
  assert_eq!(published, 1);
}

#[tokio::test]
async fn unpublish_without_publish_is_a_no_op() {
  let f = fixture().await;
  let post = f.article("Post").await;
  assert!(!f.store.unpublish(f.ctx, post.recording_id).await.unwrap());
  assert!(f.store.publication_recording(post.recording_id).await.unwrap().is_none());
}

#[tokio::test]
async fn state_lives_on_one_shared_subject_per_value() {
  let f = fixture().await;
  let a = f.article("A").await;
  let b = f.article("B").await;
  f.store.publish(f.ctx, a.recording_id).await.unwrap();
  f.store.publish(f.ctx, b.recording_id).await.unwrap();

  let state_a = f.store.publication_recording(a.recording_id).await.unwrap().unwrap();
  let state_b = f.store.publication_recording(b.recording_id).await.unwrap().unwrap();
  assert_eq!(state_a.subject.kind, SubjectKind::PublicationState);
  assert_eq!(state_a.subject.id, state_b.subject.id);
  assert_ne!(state_a.recording_id, state_b.recording_id);

  // Unpublishing swaps the existing child rather than adding another.
  f.store.unpublish(f.ctx, a.recording_id).await.unwrap();
  let children = f.store.kept_children(a.recording_id).await.unwrap();
  assert_eq!(children.len(), 1);
  assert_eq!(children[0].recording_id, state_a.recording_id);
  assert_ne!(children[0].subject.id, state_b.subject.id);

  let subject = f.store.get_subject(children[0].subject.id).await.unwrap().unwrap();
  match subject.value {
    SubjectValue::PublicationState(state) => assert!(!state.is_published()),
    other => panic!("unexpected subject {other:?}"),
  }
}

#[tokio::test]
async fn lists_by_state_within_a_bucket() {
  let f = fixture().await;
  let live = f.article("Live").await;
  let draft = f.article("Draft").await;
  let pulled = f.article("Pulled").await;
  let gone = f.article("Gone").await;
  f.comment(&live, "not publishable").await;

  f.store.publish(f.ctx, live.recording_id).await.unwrap();
  f.store.publish(f.ctx, pulled.recording_id).await.unwrap();
  f.store.unpublish(f.ctx, pulled.recording_id).await.unwrap();
  f.store.publish(f.ctx, gone.recording_id).await.unwrap();
  f.store.discard(f.ctx, gone.recording_id).await.unwrap();

  let published = f.store.published_recordings(f.bucket.bucket_id).await.unwrap();
  assert_eq!(
    published.iter().map(|r| r.recording_id).collect::<Vec<_>>(),
    vec![live.recording_id]
  );

  let unpublished = f.store.unpublished_recordings(f.bucket.bucket_id).await.unwrap();
  assert_eq!(
    unpublished.iter().map(|r| r.recording_id).collect::<Vec<_>>(),
    vec![draft.recording_id, pulled.recording_id]
  );
}

#[tokio::test]
async fn non_publishable_kinds_are_refused_quietly() {
  let f = fixture().await;
  let post = f.article("Post").await;
  let reply = f.comment(&post, "hi").await;
  assert!(!f.store.publish(f.ctx, reply.recording_id).await.unwrap());
  assert!(f.store.kept_children(reply.recording_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn publishing_a_discarded_recording_fails() {
  let f = fixture().await;
  let post = f.article("Post").await;
  f.store.discard(f.ctx, post.recording_id).await.unwrap();

  let err = f.store.publish(f.ctx, post.recording_id).await.unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::Discarded(_))));
}

#[tokio::test]
async fn discarding_an_article_discards_its_publication() {
  let f = fixture().await;
  let post = f.article("Post").await;
  f.store.publish(f.ctx, post.recording_id).await.unwrap();
  let state = f.store.publication_recording(post.recording_id).await.unwrap().unwrap();

  f.store.discard(f.ctx, post.recording_id).await.unwrap();
  assert!(!f.store.is_published(post.recording_id).await.unwrap());
  let state = f.store.get_recording(state.recording_id).await.unwrap().unwrap();
  assert!(state.is_discarded());
}
