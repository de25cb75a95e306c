//! Buckets, memberships and the permission model.
//!
//! A bucket is a data partition. A person reaches a bucket's recordings
//! through exactly one [`Membership`], whose [`Role`] drives the default
//! permission policy in [`Standing::default_permissions`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
  pub bucket_id:  Uuid,
  pub name:       String,
  pub created_at: DateTime<Utc>,
}

/// A person is backed by a recording holding their person card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
  pub person_id:    Uuid,
  pub recording_id: Uuid,
}

/// Ordered: `Viewer < Editor < Admin`.
#[derive(
  Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
  #[default]
  Viewer,
  Editor,
  Admin,
}

impl Role {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Viewer => "viewer",
      Self::Editor => "editor",
      Self::Admin => "admin",
    }
  }

  pub fn parse(s: &str) -> Result<Self> {
    match s {
      "viewer" => Ok(Self::Viewer),
      "editor" => Ok(Self::Editor),
      "admin" => Ok(Self::Admin),
      other => Err(Error::UnknownRole(other.to_owned())),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
  pub person_id: Uuid,
  pub bucket_id: Uuid,
  pub role:      Role,
}

/// What the store knows about a person relative to one recording.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Standing {
  /// Membership role in the recording's bucket, if any.
  pub role:    Option<Role>,
  /// The person is on the recording's `created` event.
  pub creator: bool,
  /// The person is backed by this very recording.
  pub owner:   bool,
}

impl Standing {
  pub fn is_viewer(&self) -> bool { self.role.is_some() }

  pub fn is_editor(&self) -> bool { self.role >= Some(Role::Editor) }

  pub fn is_admin(&self) -> bool { self.role == Some(Role::Admin) }

  /// Members view, editors edit, admins delete.
  pub fn default_permissions(&self) -> Permissions {
    Permissions {
      view:   self.is_viewer(),
      edit:   self.is_editor(),
      delete: self.is_admin(),
    }
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions {
  pub view:   bool,
  pub edit:   bool,
  pub delete: bool,
}

#[cfg(test)]
mod tests {
  use super::*;

  fn standing(role: Option<Role>) -> Standing {
    Standing { role, ..Standing::default() }
  }

  #[test]
  fn roles_are_ordered() {
    assert!(Role::Viewer < Role::Editor);
    assert!(Role::Editor < Role::Admin);
    assert_eq!(Role::default(), Role::Viewer);
  }

  #[test]
  fn default_permissions_follow_role() {
    assert_eq!(standing(None).default_permissions(), Permissions::default());

    let viewer = standing(Some(Role::Viewer)).default_permissions();
    assert!(viewer.view && !viewer.edit && !viewer.delete);

    let editor = standing(Some(Role::Editor)).default_permissions();
    assert!(editor.view && editor.edit && !editor.delete);

    let admin = standing(Some(Role::Admin)).default_permissions();
    assert!(admin.view && admin.edit && admin.delete);
  }

  #[test]
  fn role_parse_rejects_unknown() {
    assert_eq!(Role::parse("editor").unwrap(), Role::Editor);
    assert!(matches!(Role::parse("owner"), Err(Error::UnknownRole(_))));
  }
}
