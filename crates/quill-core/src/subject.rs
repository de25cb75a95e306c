//! Subjects: the immutable typed payloads a recording points at.
//!
//! A subject is written once and never updated. "Editing" a recording means
//! persisting a new subject and swapping the recording's reference to it.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Kind ────────────────────────────────────────────────────────────────────

/// The closed set of subject types. The snake-case name is the discriminant
/// stored next to every subject reference.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SubjectKind {
  Article,
  Comment,
  PersonCard,
  PublicationState,
  Tag,
}

impl SubjectKind {
  /// Every kind, in registry order.
  pub const ALL: [SubjectKind; 5] = [
    Self::Article,
    Self::Comment,
    Self::PersonCard,
    Self::PublicationState,
    Self::Tag,
  ];

  pub const fn as_str(self) -> &'static str {
    match self {
      Self::Article => "article",
      Self::Comment => "comment",
      Self::PersonCard => "person_card",
      Self::PublicationState => "publication_state",
      Self::Tag => "tag",
    }
  }

  /// Human-readable name used by the default timeline description.
  pub const fn display_name(self) -> &'static str {
    match self {
      Self::Article => "Article",
      Self::Comment => "Comment",
      Self::PersonCard => "Person card",
      Self::PublicationState => "Publication state",
      Self::Tag => "Tag",
    }
  }

  /// Plural label; the default counter name for countable kinds.
  pub const fn plural(self) -> &'static str {
    match self {
      Self::Article => "articles",
      Self::Comment => "comments",
      Self::PersonCard => "person_cards",
      Self::PublicationState => "publication_states",
      Self::Tag => "tags",
    }
  }

  pub fn parse(s: &str) -> Result<Self> {
    Self::ALL
      .into_iter()
      .find(|k| k.as_str() == s)
      .ok_or_else(|| Error::UnknownSubjectKind(s.to_owned()))
  }

  /// Tags and publication states are shared singletons: many recordings
  /// reference the same subject row, so callers cannot attach them directly.
  pub fn is_shared(self) -> bool {
    matches!(self, Self::PublicationState | Self::Tag)
  }
}

impl fmt::Display for SubjectKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// The polymorphic `(kind, id)` pair stored on recordings and events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubjectRef {
  pub kind: SubjectKind,
  pub id:   Uuid,
}

// ─── Payloads ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
  pub title: String,
  pub body:  Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
  pub body: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonCard {
  pub first_name: Option<String>,
  pub last_name:  Option<String>,
}

impl PersonCard {
  /// First and last name joined by a space, skipping missing parts.
  pub fn name(&self) -> String {
    [self.first_name.as_deref(), self.last_name.as_deref()]
      .into_iter()
      .flatten()
      .collect::<Vec<_>>()
      .join(" ")
  }
}

/// The two singleton publication states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Publication {
  #[serde(rename = "published")]
  Published,
  #[serde(rename = "notPublished")]
  NotPublished,
}

impl Publication {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Published => "published",
      Self::NotPublished => "notPublished",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicationState {
  pub state: Publication,
}

impl PublicationState {
  pub fn is_published(&self) -> bool {
    self.state == Publication::Published
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
  pub name: String,
}

/// Tag names are compared after trimming and lowercasing.
pub fn normalize_tag_name(name: &str) -> String {
  name.trim().to_lowercase()
}

// ─── SubjectValue ────────────────────────────────────────────────────────────

/// The typed payload of a subject. The variant name is the `kind`
/// discriminant stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum SubjectValue {
  Article(Article),
  Comment(Comment),
  PersonCard(PersonCard),
  PublicationState(PublicationState),
  Tag(Tag),
}

impl SubjectValue {
  pub fn kind(&self) -> SubjectKind {
    match self {
      Self::Article(_) => SubjectKind::Article,
      Self::Comment(_) => SubjectKind::Comment,
      Self::PersonCard(_) => SubjectKind::PersonCard,
      Self::PublicationState(_) => SubjectKind::PublicationState,
      Self::Tag(_) => SubjectKind::Tag,
    }
  }

  /// Serialise the inner payload (without the type tag) for the `value_json`
  /// database column.
  pub fn to_json(&self) -> Result<serde_json::Value> {
    let full = serde_json::to_value(self)?;
    Ok(full.get("data").cloned().unwrap_or(serde_json::Value::Null))
  }

  /// Deserialise from the discriminant string and JSON payload stored in the
  /// database.
  pub fn from_parts(kind: &str, data: serde_json::Value) -> Result<Self> {
    let kind = SubjectKind::parse(kind)?;
    let wrapped = serde_json::json!({ "type": kind.as_str(), "data": data });
    Ok(serde_json::from_value(wrapped)?)
  }
}

// ─── Subject ─────────────────────────────────────────────────────────────────

/// A persisted subject. Once written, no field is ever updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
  pub subject_id: Uuid,
  pub value:      SubjectValue,
  pub created_at: DateTime<Utc>,
}

impl Subject {
  pub fn reference(&self) -> SubjectRef {
    SubjectRef { kind: self.value.kind(), id: self.subject_id }
  }
}
