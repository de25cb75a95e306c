//! End-to-end walks through the behaviours callers rely on most.

use quill_core::{
  Error as CoreError,
  context::RequestContext,
  event::EventAction,
  recording::NewRecording,
  store::{RecordingStore, SearchQuery},
};

use super::{article, comment, fixture};
use crate::Error;

#[tokio::test]
async fn root_without_any_bucket_is_refused() {
  let f = fixture().await;
  let err = f
    .store
    .attach(RequestContext::system(), NewRecording::root(article("X")))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::BucketMissing)));
}

#[tokio::test]
async fn children_inherit_the_parent_bucket_not_the_context() {
  let f = fixture().await;
  let b2 = f.store.create_bucket("B2").await.unwrap();
  let post = f.article("In B1").await;

  let ctx = f.ctx.with_bucket(b2.bucket_id);
  let reply = f
    .store
    .attach(ctx, NewRecording::child(post.recording_id, comment("hello")))
    .await
    .unwrap();
  assert_eq!(reply.bucket_id, f.bucket.bucket_id);
  assert_ne!(reply.bucket_id, b2.bucket_id);
}

#[tokio::test]
async fn tagging_twice_creates_one_association() {
  let f = fixture().await;
  let post = f.article("Post").await;
  let other = f.article("Other").await;
  f.store.create_tag("Ruby").await.unwrap();

  assert!(f.store.tag(f.ctx, post.recording_id, "Ruby").await.unwrap());
  assert!(!f.store.tag(f.ctx, post.recording_id, "Ruby").await.unwrap());
  assert_eq!(f.store.tag_recordings(post.recording_id).await.unwrap().len(), 1);

  f.store.set_tag_available("Ruby", false).await.unwrap();
  assert!(f.store.is_tagged(post.recording_id, "Ruby").await.unwrap());
  assert!(!f.store.tag(f.ctx, other.recording_id, "Ruby").await.unwrap());
  assert!(!f.store.is_tagged(other.recording_id, "Ruby").await.unwrap());
}

#[tokio::test]
async fn publish_cycle_is_recorded_in_order() {
  let f = fixture().await;
  let post = f.article("Post").await;

  assert!(f.store.publish(f.ctx, post.recording_id).await.unwrap());
  assert!(!f.store.publish(f.ctx, post.recording_id).await.unwrap());
  assert!(f.store.unpublish(f.ctx, post.recording_id).await.unwrap());
  assert!(!f.store.unpublish(f.ctx, post.recording_id).await.unwrap());
  assert!(f.store.publish(f.ctx, post.recording_id).await.unwrap());

  let actions: Vec<_> = f
    .store
    .events(post.recording_id)
    .await
    .unwrap()
    .into_iter()
    .map(|e| e.action)
    .filter(|a| matches!(a, EventAction::Published | EventAction::Unpublished))
    .collect();
  assert_eq!(
    actions,
    vec![EventAction::Published, EventAction::Unpublished, EventAction::Published]
  );
  assert!(f.store.is_published(post.recording_id).await.unwrap());
}

#[tokio::test]
async fn search_follows_subject_replacement() {
  let f = fixture().await;
  let post = f.article("Functional programming").await;
  assert_eq!(f.store.search(&SearchQuery::new("functional")).await.unwrap().len(), 1);

  f.store
    .replace_subject(f.ctx, post.recording_id, article("Object orientation"))
    .await
    .unwrap();

  assert!(f.store.search(&SearchQuery::new("functional")).await.unwrap().is_empty());
  let found = f.store.search(&SearchQuery::new("object")).await.unwrap();
  assert_eq!(found.len(), 1);
  assert_eq!(found[0].recording_id, post.recording_id);
}
