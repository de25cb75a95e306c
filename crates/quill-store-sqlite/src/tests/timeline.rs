use std::time::Duration;

use quill_core::{
  Error as CoreError,
  event::EventAction,
  recording::NewRecording,
  store::{Page, RecordingStore},
  subject::{PersonCard, SubjectKind},
};
use uuid::Uuid;

use super::{article, comment, fixture};
use crate::Error;

#[tokio::test]
async fn attach_and_replace_each_append_one_event() {
  let f = fixture().await;
  let person = Uuid::new_v4();
  let ctx = f.ctx.with_person(person);

  let recording = f.store.attach(ctx, NewRecording::root(article("One"))).await.unwrap();
  let first_subject = recording.subject;
  let updated = f
    .store
    .replace_subject(ctx, recording.recording_id, article("Two"))
    .await
    .unwrap();

  let events = f.store.events(recording.recording_id).await.unwrap();
  assert_eq!(events.len(), 2);

  assert_eq!(events[0].action, EventAction::Created);
  assert_eq!(events[0].subject, first_subject);
  assert_eq!(events[0].previous, None);
  assert_eq!(events[0].person_id, Some(person));
  assert_eq!(events[0].bucket_id, f.bucket.bucket_id);

  assert_eq!(events[1].action, EventAction::Updated);
  assert_eq!(events[1].subject, updated.subject);
  assert_eq!(events[1].previous, Some(first_subject));
  assert!(events[0].sequence < events[1].sequence);
}

#[tokio::test]
async fn creator_is_the_person_on_the_created_event() {
  let f = fixture().await;
  let author = Uuid::new_v4();
  let editor = Uuid::new_v4();

  let recording = f
    .store
    .attach(f.ctx.with_person(author), NewRecording::root(article("Mine")))
    .await
    .unwrap();
  f.store
    .replace_subject(f.ctx.with_person(editor), recording.recording_id, article("Ours"))
    .await
    .unwrap();

  assert_eq!(f.store.creator(recording.recording_id).await.unwrap(), Some(author));

  let anonymous = f.article("Nobody's").await;
  assert_eq!(f.store.creator(anonymous.recording_id).await.unwrap(), None);
}

#[tokio::test]
async fn timeline_covers_descendants_in_order() {
  let f = fixture().await;
  let post = f.article("Post").await;
  let c1 = f.comment(&post, "one").await;
  f.comment(&c1, "reply").await;
  f.store
    .replace_subject(f.ctx, post.recording_id, article("Post v2"))
    .await
    .unwrap();

  let events = f.store.timeline_events(post.recording_id, Page::default()).await.unwrap();
  assert_eq!(events.len(), 4);
  assert!(events.windows(2).all(|w| {
    (w[0].created_at, w[0].sequence) < (w[1].created_at, w[1].sequence)
  }));
  assert_eq!(events.last().unwrap().action, EventAction::Updated);

  let page = Page { limit: Some(2), offset: Some(1) };
  let window = f.store.timeline_events(post.recording_id, page).await.unwrap();
  assert_eq!(window.len(), 2);
  assert_eq!(window[0].event_id, events[1].event_id);
}

#[tokio::test]
async fn subject_at_reads_the_past() {
  let f = fixture().await;
  let recording = f.article("Before").await;
  let created = f.store.events(recording.recording_id).await.unwrap()[0].clone();

  tokio::time::sleep(Duration::from_millis(5)).await;
  f.store
    .replace_subject(f.ctx, recording.recording_id, article("After"))
    .await
    .unwrap();

  let then = f
    .store
    .subject_at(recording.recording_id, created.created_at)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(then.value, article("Before"));

  let now = f
    .store
    .subject_at(recording.recording_id, chrono::Utc::now())
    .await
    .unwrap()
    .unwrap();
  assert_eq!(now.value, article("After"));

  let before_creation = created.created_at - chrono::Duration::seconds(1);
  assert!(
    f.store
      .subject_at(recording.recording_id, before_creation)
      .await
      .unwrap()
      .is_none()
  );
}

#[tokio::test]
async fn comment_description_reflects_article_at_event_time() {
  let f = fixture().await;
  let post = f.article("Original title").await;
  let reply = f.comment(&post, "nice").await;
  f.store
    .replace_subject(f.ctx, post.recording_id, article("Renamed"))
    .await
    .unwrap();

  let created = f.store.events(reply.recording_id).await.unwrap()[0].clone();
  assert_eq!(
    f.store.describe_event(created.event_id).await.unwrap(),
    "comment on Original title"
  );

  let ancestor = f
    .store
    .ancestor_at(&created, SubjectKind::Article)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(ancestor.value, article("Original title"));

  // A comment written after the rename sees the new title.
  let later = f.comment(&post, "later").await;
  let later_event = f.store.events(later.recording_id).await.unwrap()[0].clone();
  assert_eq!(
    f.store.describe_event(later_event.event_id).await.unwrap(),
    "comment on Renamed"
  );
}

#[tokio::test]
async fn ancestor_is_chosen_by_its_current_kind() {
  let f = fixture().await;
  let post = f.article("Post").await;
  let reply = f.comment(&post, "reply").await;
  let created = f.store.events(reply.recording_id).await.unwrap()[0].clone();

  f.store
    .replace_subject(f.ctx, post.recording_id, comment("now a comment"))
    .await
    .unwrap();

  assert!(f.store.ancestor_at(&created, SubjectKind::Article).await.unwrap().is_none());
  let ancestor = f
    .store
    .ancestor_at(&created, SubjectKind::Comment)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(ancestor.value, article("Post"));
  assert_eq!(f.store.describe_event(created.event_id).await.unwrap(), "comment");
}

#[tokio::test]
async fn describe_uses_kind_specific_wording() {
  let f = fixture().await;
  let post = f.article("Hello world").await;
  let event = f.store.events(post.recording_id).await.unwrap()[0].clone();
  assert_eq!(f.store.describe_event(event.event_id).await.unwrap(), "Hello world");

  let person = f
    .store
    .create_person(
      f.ctx,
      PersonCard { first_name: Some("Grace".into()), last_name: Some("Hopper".into()) },
    )
    .await
    .unwrap();
  let event = f.store.events(person.recording_id).await.unwrap()[0].clone();
  assert_eq!(f.store.describe_event(event.event_id).await.unwrap(), "Grace Hopper");

  // A comment with no article above it falls back to the bare label.
  let orphan = f
    .store
    .attach(f.ctx, NewRecording::root(comment("alone")))
    .await
    .unwrap();
  let event = f.store.events(orphan.recording_id).await.unwrap()[0].clone();
  assert_eq!(f.store.describe_event(event.event_id).await.unwrap(), "comment");
}

#[tokio::test]
async fn event_details_are_unique_per_key() {
  let f = fixture().await;
  let post = f.article("Post").await;
  let event = f.store.events(post.recording_id).await.unwrap()[0].clone();

  let detail = f
    .store
    .add_event_detail(event.event_id, "source", Some("import"))
    .await
    .unwrap();
  assert_eq!(detail.value.as_deref(), Some("import"));
  f.store.add_event_detail(event.event_id, "note", None).await.unwrap();

  let err = f
    .store
    .add_event_detail(event.event_id, "source", Some("again"))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::Conflict(_))));

  let details = f.store.event_details(event.event_id).await.unwrap();
  assert_eq!(details.len(), 2);
  assert_eq!(details[0].key, "source");
  assert_eq!(details[1].value, None);

  let err = f
    .store
    .add_event_detail(Uuid::new_v4(), "source", None)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::EventNotFound(_))));
}
