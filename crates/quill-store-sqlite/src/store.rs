//! [`SqliteStore`], the SQLite implementation of [`RecordingStore`].

use std::{path::Path, sync::Arc};

use chrono::{DateTime, Utc};
use quill_core::{
  access::{Bucket, Membership, Permissions, Person, Role},
  broadcast::{Broadcast, Broadcaster, ChannelBroadcaster},
  context::RequestContext,
  event::{Event, EventDetail},
  recording::{NewRecording, Recording},
  store::{Page, RecordingStore, SearchEntry, SearchQuery, TagEntry},
  subject::{PersonCard, Publication, Subject, SubjectKind, SubjectValue},
};
use rusqlite::{Connection, TransactionBehavior};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::{
  Error, Result, access, config::StoreConfig, counter, discard, outbox::Outbox, publish,
  schema::SCHEMA, search, tagging, timeline, tree,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Quill recording store backed by a single SQLite database.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn:        tokio_rusqlite::Connection,
  config:      StoreConfig,
  broadcaster: Arc<dyn Broadcaster>,
  channel:     Option<ChannelBroadcaster>,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    Self::open_with_config(StoreConfig::at(path.as_ref())).await
  }

  /// Open an in-memory store, mostly for tests.
  pub async fn open_in_memory() -> Result<Self> {
    Self::open_with_config(StoreConfig::default()).await
  }

  /// Open the database `config` names. Broadcasts go to a
  /// [`ChannelBroadcaster`] sized by the config until
  /// [`SqliteStore::with_broadcaster`] replaces it.
  pub async fn open_with_config(config: StoreConfig) -> Result<Self> {
    let conn = if config.is_in_memory() {
      tokio_rusqlite::Connection::open_in_memory().await?
    } else {
      tokio_rusqlite::Connection::open(&config.path).await?
    };

    let channel = ChannelBroadcaster::new(config.broadcast_capacity);
    let store = Self {
      conn,
      broadcaster: Arc::new(channel.clone()),
      channel: Some(channel),
      config,
    };
    store.init_schema().await?;

    tracing::info!(path = %store.config.path.display(), "recording store opened");
    Ok(store)
  }

  /// Send committed broadcasts to `broadcaster` instead.
  pub fn with_broadcaster(mut self, broadcaster: Arc<dyn Broadcaster>) -> Self {
    self.broadcaster = broadcaster;
    self.channel = None;
    self
  }

  /// A receiver for the default channel broadcaster; `None` once a custom
  /// broadcaster is installed.
  pub fn subscribe(&self) -> Option<broadcast::Receiver<Broadcast>> {
    self.channel.as_ref().map(ChannelBroadcaster::subscribe)
  }

  pub fn config(&self) -> &StoreConfig { &self.config }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run `f` on the connection thread.
  async fn read<T, F>(&self, f: F) -> Result<T>
  where
    T: Send + 'static,
    F: FnOnce(&Connection) -> Result<T> + Send + 'static,
  {
    Ok(self.conn.call(move |conn| f(conn).map_err(Error::into_call)).await?)
  }

  /// Run `f` in one immediate transaction. Any error rolls everything back;
  /// broadcasts queued by `f` are delivered only after the commit.
  async fn write<T, F>(&self, f: F) -> Result<T>
  where
    T: Send + 'static,
    F: FnOnce(&Connection, &mut Outbox) -> Result<T> + Send + 'static,
  {
    let (value, outbox) = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut outbox = Outbox::default();
        let value = f(&tx, &mut outbox).map_err(Error::into_call)?;
        tx.commit()?;
        Ok((value, outbox))
      })
      .await
      .inspect_err(|e| tracing::debug!(error = %e, "write rolled back"))?;

    outbox.deliver(self.broadcaster.as_ref());
    Ok(value)
  }

  /// Execute raw SQL outside any store operation.
  #[cfg(test)]
  pub(crate) async fn execute_raw(&self, sql: &'static str) -> Result<usize> {
    self.read(move |conn| Ok(conn.execute(sql, [])?)).await
  }

  fn timeline_limit(&self, page: Page) -> (usize, usize) {
    (page.limit.unwrap_or(self.config.timeline_limit), page.offset.unwrap_or(0))
  }
}

// ─── RecordingStore impl ─────────────────────────────────────────────────────

impl RecordingStore for SqliteStore {
  type Error = Error;

  // ── Buckets, people, memberships ──────────────────────────────────────────

  async fn create_bucket<'a>(&'a self, name: &'a str) -> Result<Bucket> {
    let name = name.to_owned();
    self.write(move |conn, _| access::create_bucket(conn, &name)).await
  }

  async fn get_bucket(&self, bucket_id: Uuid) -> Result<Option<Bucket>> {
    self.read(move |conn| access::get_bucket(conn, bucket_id)).await
  }

  async fn delete_bucket(&self, bucket_id: Uuid) -> Result<()> {
    self.write(move |conn, _| access::delete_bucket(conn, bucket_id)).await
  }

  async fn add_membership(
    &self,
    person_id: Uuid,
    bucket_id: Uuid,
    role: Role,
  ) -> Result<Membership> {
    self
      .write(move |conn, _| access::add_membership(conn, person_id, bucket_id, role))
      .await
  }

  async fn membership(&self, person_id: Uuid, bucket_id: Uuid) -> Result<Option<Membership>> {
    self.read(move |conn| access::membership(conn, person_id, bucket_id)).await
  }

  async fn memberships_for(&self, person_id: Uuid) -> Result<Vec<Membership>> {
    self.read(move |conn| access::memberships_for(conn, person_id)).await
  }

  async fn remove_membership(&self, person_id: Uuid, bucket_id: Uuid) -> Result<bool> {
    self
      .write(move |conn, _| access::remove_membership(conn, person_id, bucket_id))
      .await
  }

  async fn create_person(&self, ctx: RequestContext, card: PersonCard) -> Result<Person> {
    self
      .write(move |conn, outbox| access::create_person(conn, &ctx, card, outbox))
      .await
  }

  async fn get_person(&self, person_id: Uuid) -> Result<Option<Person>> {
    self.read(move |conn| access::get_person(conn, person_id)).await
  }

  // ── Recording tree ────────────────────────────────────────────────────────

  async fn attach(&self, ctx: RequestContext, input: NewRecording) -> Result<Recording> {
    self
      .write(move |conn, outbox| tree::attach(conn, &ctx, input, outbox))
      .await
  }

  async fn replace_subject(
    &self,
    ctx: RequestContext,
    recording_id: Uuid,
    value: SubjectValue,
  ) -> Result<Recording> {
    self
      .write(move |conn, outbox| {
        tree::replace_subject(conn, &ctx, recording_id, value, outbox)
      })
      .await
  }

  async fn get_recording(&self, recording_id: Uuid) -> Result<Option<Recording>> {
    self.read(move |conn| tree::get_recording(conn, recording_id)).await
  }

  async fn get_subject(&self, subject_id: Uuid) -> Result<Option<Subject>> {
    self.read(move |conn| tree::get_subject(conn, subject_id)).await
  }

  async fn children(&self, recording_id: Uuid) -> Result<Vec<Recording>> {
    self.read(move |conn| tree::children(conn, recording_id)).await
  }

  async fn kept_children(&self, recording_id: Uuid) -> Result<Vec<Recording>> {
    self.read(move |conn| tree::kept_children(conn, recording_id)).await
  }

  async fn discarded_recordings(&self, bucket_id: Uuid) -> Result<Vec<Recording>> {
    self
      .read(move |conn| tree::discarded_in_bucket(conn, bucket_id))
      .await
  }

  async fn comments(&self, recording_id: Uuid) -> Result<Vec<Recording>> {
    self.read(move |conn| tree::comments(conn, recording_id)).await
  }

  async fn root(&self, recording_id: Uuid) -> Result<Recording> {
    self.read(move |conn| tree::root(conn, recording_id)).await
  }

  async fn ancestors(&self, recording_id: Uuid) -> Result<Vec<Recording>> {
    self.read(move |conn| tree::ancestors(conn, recording_id)).await
  }

  async fn descendants(&self, recording_id: Uuid) -> Result<Vec<Recording>> {
    self.read(move |conn| tree::descendants(conn, recording_id)).await
  }

  async fn purge_recording(&self, recording_id: Uuid) -> Result<()> {
    self.write(move |conn, _| tree::purge(conn, recording_id)).await
  }

  // ── Timeline ──────────────────────────────────────────────────────────────

  async fn events(&self, recording_id: Uuid) -> Result<Vec<Event>> {
    self.read(move |conn| timeline::events(conn, recording_id)).await
  }

  async fn timeline_events(&self, recording_id: Uuid, page: Page) -> Result<Vec<Event>> {
    let (limit, offset) = self.timeline_limit(page);
    self
      .read(move |conn| timeline::timeline_events(conn, recording_id, limit, offset))
      .await
  }

  async fn creator(&self, recording_id: Uuid) -> Result<Option<Uuid>> {
    self.read(move |conn| timeline::creator(conn, recording_id)).await
  }

  async fn subject_at(
    &self,
    recording_id: Uuid,
    at: DateTime<Utc>,
  ) -> Result<Option<Subject>> {
    self.read(move |conn| timeline::subject_at(conn, recording_id, at)).await
  }

  async fn ancestor_at<'a>(
    &'a self,
    event: &'a Event,
    kind: SubjectKind,
  ) -> Result<Option<Subject>> {
    let event = event.clone();
    self.read(move |conn| timeline::ancestor_at(conn, &event, kind)).await
  }

  async fn describe_event(&self, event_id: Uuid) -> Result<String> {
    self.read(move |conn| timeline::describe_event(conn, event_id)).await
  }

  async fn add_event_detail<'a>(
    &'a self,
    event_id: Uuid,
    key: &'a str,
    value: Option<&'a str>,
  ) -> Result<EventDetail> {
    let key = key.to_owned();
    let value = value.map(str::to_owned);
    self
      .write(move |conn, _| timeline::add_detail(conn, event_id, &key, value.as_deref()))
      .await
  }

  async fn event_details(&self, event_id: Uuid) -> Result<Vec<EventDetail>> {
    self.read(move |conn| timeline::details(conn, event_id)).await
  }

  // ── Discard ───────────────────────────────────────────────────────────────

  async fn discard(&self, ctx: RequestContext, recording_id: Uuid) -> Result<bool> {
    self
      .write(move |conn, outbox| discard::discard(conn, &ctx, recording_id, outbox))
      .await
  }

  // ── Counter cache ─────────────────────────────────────────────────────────

  async fn counter<'a>(&'a self, recording_id: Uuid, name: &'a str) -> Result<i64> {
    let name = name.to_owned();
    self.read(move |conn| counter::get(conn, recording_id, &name)).await
  }

  async fn increment_counter<'a>(&'a self, recording_id: Uuid, name: &'a str) -> Result<i64> {
    let name = name.to_owned();
    self
      .write(move |conn, _| {
        tree::require_recording(conn, recording_id)?;
        counter::increment(conn, recording_id, &name)
      })
      .await
  }

  async fn decrement_counter<'a>(&'a self, recording_id: Uuid, name: &'a str) -> Result<i64> {
    let name = name.to_owned();
    self
      .write(move |conn, _| counter::decrement(conn, recording_id, &name))
      .await
  }

  async fn refresh_counter<'a>(&'a self, recording_id: Uuid, name: &'a str) -> Result<i64> {
    let name = name.to_owned();
    self
      .write(move |conn, _| counter::refresh(conn, recording_id, &name))
      .await
  }

  async fn refresh_all_counters(&self, recording_id: Uuid) -> Result<Vec<(&'static str, i64)>> {
    self
      .write(move |conn, _| counter::refresh_all(conn, recording_id))
      .await
  }

  // ── Search ────────────────────────────────────────────────────────────────

  async fn search<'a>(&'a self, query: &'a SearchQuery) -> Result<Vec<Recording>> {
    let query = query.clone();
    let default_limit = self.config.search_limit;
    self
      .read(move |conn| search::search(conn, &query, default_limit))
      .await
  }

  async fn search_entry(&self, recording_id: Uuid) -> Result<Option<SearchEntry>> {
    self.read(move |conn| search::entry(conn, recording_id)).await
  }

  // ── Publishing ────────────────────────────────────────────────────────────

  async fn publish(&self, ctx: RequestContext, recording_id: Uuid) -> Result<bool> {
    self
      .write(move |conn, outbox| {
        publish::transition(conn, &ctx, recording_id, Publication::Published, outbox)
      })
      .await
  }

  async fn unpublish(&self, ctx: RequestContext, recording_id: Uuid) -> Result<bool> {
    self
      .write(move |conn, outbox| {
        publish::transition(conn, &ctx, recording_id, Publication::NotPublished, outbox)
      })
      .await
  }

  async fn is_published(&self, recording_id: Uuid) -> Result<bool> {
    self.read(move |conn| publish::is_published(conn, recording_id)).await
  }

  async fn publication_recording(&self, recording_id: Uuid) -> Result<Option<Recording>> {
    self
      .read(move |conn| publish::publication_recording(conn, recording_id))
      .await
  }

  async fn published_recordings(&self, bucket_id: Uuid) -> Result<Vec<Recording>> {
    self
      .read(move |conn| publish::recordings_in_state(conn, bucket_id, true))
      .await
  }

  async fn unpublished_recordings(&self, bucket_id: Uuid) -> Result<Vec<Recording>> {
    self
      .read(move |conn| publish::recordings_in_state(conn, bucket_id, false))
      .await
  }

  // ── Tagging ───────────────────────────────────────────────────────────────

  async fn create_tag<'a>(&'a self, name: &'a str) -> Result<TagEntry> {
    let name = name.to_owned();
    self.write(move |conn, _| tagging::create(conn, &name)).await
  }

  async fn find_tag<'a>(&'a self, name: &'a str) -> Result<Option<TagEntry>> {
    let name = name.to_owned();
    self.read(move |conn| tagging::find(conn, &name)).await
  }

  async fn set_tag_available<'a>(&'a self, name: &'a str, available: bool) -> Result<TagEntry> {
    let name = name.to_owned();
    self
      .write(move |conn, _| tagging::set_available(conn, &name, available))
      .await
  }

  async fn tag<'a>(
    &'a self,
    ctx: RequestContext,
    recording_id: Uuid,
    name: &'a str,
  ) -> Result<bool> {
    let name = name.to_owned();
    self
      .write(move |conn, outbox| tagging::tag(conn, &ctx, recording_id, &name, outbox))
      .await
  }

  async fn untag<'a>(
    &'a self,
    ctx: RequestContext,
    recording_id: Uuid,
    name: &'a str,
  ) -> Result<bool> {
    let name = name.to_owned();
    self
      .write(move |conn, outbox| tagging::untag(conn, &ctx, recording_id, &name, outbox))
      .await
  }

  async fn is_tagged<'a>(&'a self, recording_id: Uuid, name: &'a str) -> Result<bool> {
    let name = name.to_owned();
    self
      .read(move |conn| tagging::is_tagged(conn, recording_id, &name))
      .await
  }

  async fn tags(&self, recording_id: Uuid) -> Result<Vec<TagEntry>> {
    self.read(move |conn| tagging::tags(conn, recording_id)).await
  }

  async fn available_tags(&self, recording_id: Uuid) -> Result<Vec<TagEntry>> {
    let tags = self.tags(recording_id).await?;
    Ok(tags.into_iter().filter(|t| t.available).collect())
  }

  async fn tag_recordings(&self, recording_id: Uuid) -> Result<Vec<Recording>> {
    self
      .read(move |conn| tagging::tag_recordings(conn, recording_id))
      .await
  }

  // ── Permissions ───────────────────────────────────────────────────────────

  async fn permissions(&self, person_id: Uuid, recording_id: Uuid) -> Result<Permissions> {
    self
      .read(move |conn| access::permissions(conn, person_id, recording_id))
      .await
  }

  async fn viewable_by(&self, person_id: Uuid, recording_id: Uuid) -> Result<bool> {
    Ok(self.permissions(person_id, recording_id).await?.view)
  }

  async fn editable_by(&self, person_id: Uuid, recording_id: Uuid) -> Result<bool> {
    Ok(self.permissions(person_id, recording_id).await?.edit)
  }

  async fn deletable_by(&self, person_id: Uuid, recording_id: Uuid) -> Result<bool> {
    Ok(self.permissions(person_id, recording_id).await?.delete)
  }
}
