//! Error types for `quill-core`.

use thiserror::Error;
use uuid::Uuid;

use crate::subject::SubjectKind;

#[derive(Debug, Error)]
pub enum Error {
  /// A subject or recording failed validation; nothing was written.
  #[error("validation failed: {0}")]
  Validation(String),

  /// An attempt to change persisted data outside the defined operations.
  #[error("immutable record: {0}")]
  Immutable(String),

  /// Neither a parent nor the request context supplied a bucket.
  #[error("bucket must be set via parent or request context")]
  BucketMissing,

  /// A hard delete was refused because dependent rows still exist.
  #[error("restricted: {0}")]
  Restricted(String),

  /// A subject kind declares a capability but does not provide it.
  #[error("{kind} declares {capability} but does not implement it")]
  CapabilityContract {
    kind:       SubjectKind,
    capability: &'static str,
  },

  #[error("recording {0} is discarded")]
  Discarded(Uuid),

  #[error("recording not found: {0}")]
  RecordingNotFound(Uuid),

  #[error("subject not found: {0}")]
  SubjectNotFound(Uuid),

  #[error("bucket not found: {0}")]
  BucketNotFound(Uuid),

  #[error("person not found: {0}")]
  PersonNotFound(Uuid),

  #[error("event not found: {0}")]
  EventNotFound(Uuid),

  #[error("tag not found: {0:?}")]
  TagNotFound(String),

  #[error("no countable subject kind for counter {0:?}")]
  UnknownCounter(String),

  #[error("conflict: {0}")]
  Conflict(String),

  #[error("unknown subject kind discriminant: {0:?}")]
  UnknownSubjectKind(String),

  #[error("unknown event action: {0:?}")]
  UnknownAction(String),

  #[error("unknown role: {0:?}")]
  UnknownRole(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
