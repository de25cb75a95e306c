//! The per-request actor context.
//!
//! Every mutating store operation takes a [`RequestContext`] explicitly, so
//! concurrent requests never share an acting person or active bucket.

use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestContext {
  /// The acting person, recorded on every event. `None` for system actions.
  pub person_id: Option<Uuid>,
  /// Fallback bucket for root recordings created without an explicit one.
  pub bucket_id: Option<Uuid>,
}

impl RequestContext {
  pub fn new(person_id: Option<Uuid>, bucket_id: Option<Uuid>) -> Self {
    Self { person_id, bucket_id }
  }

  /// A context with no person and no bucket.
  pub fn system() -> Self { Self::default() }

  pub fn with_person(mut self, person_id: Uuid) -> Self {
    self.person_id = Some(person_id);
    self
  }

  pub fn with_bucket(mut self, bucket_id: Uuid) -> Self {
    self.bucket_id = Some(bucket_id);
    self
  }
}
