//! The `RecordingStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g. `quill-store-sqlite`).
//! Outer layers (controllers, views, jobs) depend on this abstraction, not on
//! any concrete backend.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  access::{Bucket, Membership, Permissions, Person, Role},
  context::RequestContext,
  event::{Event, EventDetail},
  recording::{NewRecording, Recording},
  subject::{PersonCard, Subject, SubjectKind, SubjectValue},
};

// ─── Query types ─────────────────────────────────────────────────────────────

/// Parameters for [`RecordingStore::search`].
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
  /// Every whitespace-separated term must occur in the indexed content.
  pub text:   String,
  /// Restrict to recordings whose subject is of this kind.
  pub kind:   Option<SubjectKind>,
  pub limit:  Option<usize>,
  pub offset: Option<usize>,
}

impl SearchQuery {
  pub fn new(text: impl Into<String>) -> Self {
    Self { text: text.into(), ..Self::default() }
  }

  pub fn of_kind(mut self, kind: SubjectKind) -> Self {
    self.kind = Some(kind);
    self
  }
}

/// Window over a potentially large result set. `limit: None` falls back to
/// the backend's configured cap.
#[derive(Debug, Clone, Copy, Default)]
pub struct Page {
  pub limit:  Option<usize>,
  pub offset: Option<usize>,
}

/// The search projection stored for one recording.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchEntry {
  pub recording_id: Uuid,
  pub kind:         SubjectKind,
  pub content:      String,
}

/// A shared tag together with its availability flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagEntry {
  /// Identity of the shared tag subject.
  pub tag_id:    Uuid,
  pub name:      String,
  pub available: bool,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a recording store backend.
///
/// Subjects are append-only. Every mutation runs as one atomic unit covering
/// the subject swap, the timeline event, counter adjustments and the search
/// index; broadcasts are emitted only after that unit commits.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes.
pub trait RecordingStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Buckets, people, memberships ──────────────────────────────────────

  fn create_bucket<'a>(
    &'a self,
    name: &'a str,
  ) -> impl Future<Output = Result<Bucket, Self::Error>> + Send + 'a;

  fn get_bucket(
    &self,
    bucket_id: Uuid,
  ) -> impl Future<Output = Result<Option<Bucket>, Self::Error>> + Send + '_;

  /// Hard-delete a bucket and its memberships. Refused while any recording
  /// or event still lives in it.
  fn delete_bucket(
    &self,
    bucket_id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// One membership per `(person, bucket)`; a second one is a conflict.
  fn add_membership(
    &self,
    person_id: Uuid,
    bucket_id: Uuid,
    role: Role,
  ) -> impl Future<Output = Result<Membership, Self::Error>> + Send + '_;

  fn membership(
    &self,
    person_id: Uuid,
    bucket_id: Uuid,
  ) -> impl Future<Output = Result<Option<Membership>, Self::Error>> + Send + '_;

  fn memberships_for(
    &self,
    person_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Membership>, Self::Error>> + Send + '_;

  /// Returns `false` if there was no such membership.
  fn remove_membership(
    &self,
    person_id: Uuid,
    bucket_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Attach a person-card recording and register the person it backs.
  fn create_person(
    &self,
    ctx: RequestContext,
    card: PersonCard,
  ) -> impl Future<Output = Result<Person, Self::Error>> + Send + '_;

  fn get_person(
    &self,
    person_id: Uuid,
  ) -> impl Future<Output = Result<Option<Person>, Self::Error>> + Send + '_;

  // ── Recording tree ────────────────────────────────────────────────────

  /// Persist a new subject inside a new recording.
  fn attach(
    &self,
    ctx: RequestContext,
    input: NewRecording,
  ) -> impl Future<Output = Result<Recording, Self::Error>> + Send + '_;

  /// Persist `value` as a new subject and point the recording at it.
  fn replace_subject(
    &self,
    ctx: RequestContext,
    recording_id: Uuid,
    value: SubjectValue,
  ) -> impl Future<Output = Result<Recording, Self::Error>> + Send + '_;

  fn get_recording(
    &self,
    recording_id: Uuid,
  ) -> impl Future<Output = Result<Option<Recording>, Self::Error>> + Send + '_;

  fn get_subject(
    &self,
    subject_id: Uuid,
  ) -> impl Future<Output = Result<Option<Subject>, Self::Error>> + Send + '_;

  /// All direct children, discarded ones included, in creation order.
  fn children(
    &self,
    recording_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Recording>, Self::Error>> + Send + '_;

  fn kept_children(
    &self,
    recording_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Recording>, Self::Error>> + Send + '_;

  /// The bucket's trash: discarded recordings, latest discard first.
  fn discarded_recordings(
    &self,
    bucket_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Recording>, Self::Error>> + Send + '_;

  /// Kept comment children; empty when the subject is not commentable.
  fn comments(
    &self,
    recording_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Recording>, Self::Error>> + Send + '_;

  fn root(
    &self,
    recording_id: Uuid,
  ) -> impl Future<Output = Result<Recording, Self::Error>> + Send + '_;

  /// Parent first, root last.
  fn ancestors(
    &self,
    recording_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Recording>, Self::Error>> + Send + '_;

  /// Depth-first, excluding the recording itself.
  fn descendants(
    &self,
    recording_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Recording>, Self::Error>> + Send + '_;

  /// Administrative hard delete. Refused while any event or child references
  /// the recording.
  fn purge_recording(
    &self,
    recording_id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Timeline ──────────────────────────────────────────────────────────

  /// The recording's own events, oldest first.
  fn events(
    &self,
    recording_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Event>, Self::Error>> + Send + '_;

  /// Events of the recording and every descendant, oldest first.
  fn timeline_events(
    &self,
    recording_id: Uuid,
    page: Page,
  ) -> impl Future<Output = Result<Vec<Event>, Self::Error>> + Send + '_;

  /// The person on the recording's `created` event.
  fn creator(
    &self,
    recording_id: Uuid,
  ) -> impl Future<Output = Result<Option<Uuid>, Self::Error>> + Send + '_;

  /// The recording's subject as of `at`.
  fn subject_at(
    &self,
    recording_id: Uuid,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<Option<Subject>, Self::Error>> + Send + '_;

  /// The nearest ancestor whose recording currently holds a `kind` subject,
  /// with that ancestor's subject as it was when `event` was written.
  fn ancestor_at<'a>(
    &'a self,
    event: &'a Event,
    kind: SubjectKind,
  ) -> impl Future<Output = Result<Option<Subject>, Self::Error>> + Send + 'a;

  /// One human-readable line for the timeline.
  fn describe_event(
    &self,
    event_id: Uuid,
  ) -> impl Future<Output = Result<String, Self::Error>> + Send + '_;

  fn add_event_detail<'a>(
    &'a self,
    event_id: Uuid,
    key: &'a str,
    value: Option<&'a str>,
  ) -> impl Future<Output = Result<EventDetail, Self::Error>> + Send + 'a;

  fn event_details(
    &self,
    event_id: Uuid,
  ) -> impl Future<Output = Result<Vec<EventDetail>, Self::Error>> + Send + '_;

  // ── Discard ───────────────────────────────────────────────────────────

  /// Soft-delete the recording. Returns `false` if it was already discarded.
  fn discard(
    &self,
    ctx: RequestContext,
    recording_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Counter cache ─────────────────────────────────────────────────────

  /// The cached value, or 0 when no cache row exists.
  fn counter<'a>(
    &'a self,
    recording_id: Uuid,
    name: &'a str,
  ) -> impl Future<Output = Result<i64, Self::Error>> + Send + 'a;

  fn increment_counter<'a>(
    &'a self,
    recording_id: Uuid,
    name: &'a str,
  ) -> impl Future<Output = Result<i64, Self::Error>> + Send + 'a;

  /// Never drives the value below zero.
  fn decrement_counter<'a>(
    &'a self,
    recording_id: Uuid,
    name: &'a str,
  ) -> impl Future<Output = Result<i64, Self::Error>> + Send + 'a;

  /// Recompute from the live kept children and overwrite the cache.
  fn refresh_counter<'a>(
    &'a self,
    recording_id: Uuid,
    name: &'a str,
  ) -> impl Future<Output = Result<i64, Self::Error>> + Send + 'a;

  fn refresh_all_counters(
    &self,
    recording_id: Uuid,
  ) -> impl Future<Output = Result<Vec<(&'static str, i64)>, Self::Error>> + Send + '_;

  // ── Search ────────────────────────────────────────────────────────────

  fn search<'a>(
    &'a self,
    query: &'a SearchQuery,
  ) -> impl Future<Output = Result<Vec<Recording>, Self::Error>> + Send + 'a;

  fn search_entry(
    &self,
    recording_id: Uuid,
  ) -> impl Future<Output = Result<Option<SearchEntry>, Self::Error>> + Send + '_;

  // ── Publishing ────────────────────────────────────────────────────────

  /// Returns `false` when not publishable or already published.
  fn publish(
    &self,
    ctx: RequestContext,
    recording_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Returns `false` when not publishable or not published.
  fn unpublish(
    &self,
    ctx: RequestContext,
    recording_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  fn is_published(
    &self,
    recording_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// The kept child recording holding the publication state, if any.
  fn publication_recording(
    &self,
    recording_id: Uuid,
  ) -> impl Future<Output = Result<Option<Recording>, Self::Error>> + Send + '_;

  /// Kept publishable recordings in `bucket_id` that are published.
  fn published_recordings(
    &self,
    bucket_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Recording>, Self::Error>> + Send + '_;

  /// Kept publishable recordings in `bucket_id` that are not published.
  fn unpublished_recordings(
    &self,
    bucket_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Recording>, Self::Error>> + Send + '_;

  // ── Tagging ───────────────────────────────────────────────────────────

  /// Find or create the shared tag named `name` (normalized).
  fn create_tag<'a>(
    &'a self,
    name: &'a str,
  ) -> impl Future<Output = Result<TagEntry, Self::Error>> + Send + 'a;

  fn find_tag<'a>(
    &'a self,
    name: &'a str,
  ) -> impl Future<Output = Result<Option<TagEntry>, Self::Error>> + Send + 'a;

  fn set_tag_available<'a>(
    &'a self,
    name: &'a str,
    available: bool,
  ) -> impl Future<Output = Result<TagEntry, Self::Error>> + Send + 'a;

  /// Returns `false` when not taggable, the tag is missing or unavailable, or
  /// the recording is already tagged.
  fn tag<'a>(
    &'a self,
    ctx: RequestContext,
    recording_id: Uuid,
    name: &'a str,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  /// Discard the tag's child recording. The shared tag is left alone.
  fn untag<'a>(
    &'a self,
    ctx: RequestContext,
    recording_id: Uuid,
    name: &'a str,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  fn is_tagged<'a>(
    &'a self,
    recording_id: Uuid,
    name: &'a str,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  fn tags(
    &self,
    recording_id: Uuid,
  ) -> impl Future<Output = Result<Vec<TagEntry>, Self::Error>> + Send + '_;

  /// [`RecordingStore::tags`] filtered by each tag's availability flag.
  fn available_tags(
    &self,
    recording_id: Uuid,
  ) -> impl Future<Output = Result<Vec<TagEntry>, Self::Error>> + Send + '_;

  fn tag_recordings(
    &self,
    recording_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Recording>, Self::Error>> + Send + '_;

  // ── Permissions ───────────────────────────────────────────────────────

  fn permissions(
    &self,
    person_id: Uuid,
    recording_id: Uuid,
  ) -> impl Future<Output = Result<Permissions, Self::Error>> + Send + '_;

  fn viewable_by(
    &self,
    person_id: Uuid,
    recording_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  fn editable_by(
    &self,
    person_id: Uuid,
    recording_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  fn deletable_by(
    &self,
    person_id: Uuid,
    recording_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;
}
