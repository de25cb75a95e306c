//! Recordings: the tree nodes that pair a subject reference with partition
//! and lifecycle metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::subject::{SubjectRef, SubjectValue};

/// A node in the recording tree.
///
/// `parent_id`, `bucket_id` and `created_at` never change after creation. The
/// subject reference changes only through subject replacement, and
/// `discarded_at` is written at most once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recording {
  pub recording_id: Uuid,
  pub parent_id:    Option<Uuid>,
  pub bucket_id:    Uuid,
  pub subject:      SubjectRef,
  pub discarded_at: Option<DateTime<Utc>>,
  pub created_at:   DateTime<Utc>,
  pub updated_at:   DateTime<Utc>,
}

impl Recording {
  pub fn is_root(&self) -> bool { self.parent_id.is_none() }

  pub fn is_discarded(&self) -> bool { self.discarded_at.is_some() }

  pub fn is_kept(&self) -> bool { self.discarded_at.is_none() }
}

/// Input to [`crate::store::RecordingStore::attach`].
#[derive(Debug, Clone)]
pub struct NewRecording {
  pub value:     SubjectValue,
  pub parent_id: Option<Uuid>,
  /// Must be unset or equal to the parent's bucket when a parent is given.
  pub bucket_id: Option<Uuid>,
}

impl NewRecording {
  /// A root recording whose bucket comes from the request context.
  pub fn root(value: SubjectValue) -> Self {
    Self { value, parent_id: None, bucket_id: None }
  }

  /// A child recording that inherits its parent's bucket.
  pub fn child(parent_id: Uuid, value: SubjectValue) -> Self {
    Self { value, parent_id: Some(parent_id), bucket_id: None }
  }

  pub fn in_bucket(mut self, bucket_id: Uuid) -> Self {
    self.bucket_id = Some(bucket_id);
    self
  }
}
