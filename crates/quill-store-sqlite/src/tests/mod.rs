//! Integration tests for `SqliteStore` against an in-memory database.

use std::sync::{Arc, Mutex};

use quill_core::{
  access::Bucket,
  broadcast::{Broadcast, Broadcaster},
  context::RequestContext,
  recording::{NewRecording, Recording},
  store::RecordingStore,
  subject::{Article, Comment, SubjectValue},
};

use crate::SqliteStore;

mod discard;
mod immutability;
mod publish;
mod scenarios;
mod timeline;

/// Keeps every broadcast it is handed.
#[derive(Default)]
struct Recorder {
  seen: Mutex<Vec<Broadcast>>,
}

impl Recorder {
  fn take(&self) -> Vec<Broadcast> { std::mem::take(&mut *self.seen.lock().unwrap()) }
}

impl Broadcaster for Recorder {
  fn send(&self, broadcast: Broadcast) { self.seen.lock().unwrap().push(broadcast); }
}

struct Fixture {
  store:    SqliteStore,
  bucket:   Bucket,
  ctx:      RequestContext,
  recorder: Arc<Recorder>,
}

async fn store() -> SqliteStore {
  let _ = tracing_subscriber::fmt()
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .with_test_writer()
    .try_init();
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

async fn fixture() -> Fixture {
  let recorder = Arc::new(Recorder::default());
  let store = store().await.with_broadcaster(recorder.clone());
  let bucket = store.create_bucket("Blog").await.unwrap();
  let ctx = RequestContext::system().with_bucket(bucket.bucket_id);
  Fixture { store, bucket, ctx, recorder }
}

fn article(title: &str) -> SubjectValue {
  SubjectValue::Article(Article { title: title.into(), body: None })
}

fn article_with_body(title: &str, body: &str) -> SubjectValue {
  SubjectValue::Article(Article { title: title.into(), body: Some(body.into()) })
}

fn comment(body: &str) -> SubjectValue {
  SubjectValue::Comment(Comment { body: body.into() })
}

impl Fixture {
  async fn article(&self, title: &str) -> Recording {
    self
      .store
      .attach(self.ctx, NewRecording::root(article(title)))
      .await
      .unwrap()
  }

  async fn comment(&self, parent: &Recording, body: &str) -> Recording {
    self
      .store
      .attach(self.ctx, NewRecording::child(parent.recording_id, comment(body)))
      .await
      .unwrap()
  }
}
