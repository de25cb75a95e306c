//! Capability registry and the [`Recordable`] trait.
//!
//! Kind-level facts (is this kind countable? does discarding it cascade?) live
//! in a static table keyed by [`SubjectKind`]. Behaviour that depends on the
//! payload (search text, timeline wording, broadcasts, permissions) lives on
//! [`Recordable`], which every payload type implements on top of explicit
//! defaults.

use serde_json::json;

use crate::{
  Error, Result,
  access::{Permissions, Standing},
  broadcast::{Broadcast, BroadcastAction},
  recording::Recording,
  subject::{
    Article, Comment, PersonCard, PublicationState, SubjectKind, SubjectValue, Tag,
  },
};

// ─── Registry ────────────────────────────────────────────────────────────────

/// What discarding a recording does to its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cascade {
  /// Discard every kept child (and, through their own policy, theirs).
  KeptChildren,
  /// Leave children untouched.
  None,
}

/// Static capability declarations for one subject kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
  pub commentable:   bool,
  /// `Some(counter name)` when children of this kind are counted on their
  /// parent.
  pub countable:     Option<&'static str>,
  pub publishable:   bool,
  pub searchable:    bool,
  pub taggable:      bool,
  pub broadcastable: bool,
  pub cascade:       Cascade,
}

const NONE: Capabilities = Capabilities {
  commentable:   false,
  countable:     None,
  publishable:   false,
  searchable:    false,
  taggable:      false,
  broadcastable: false,
  cascade:       Cascade::None,
};

const ARTICLE: Capabilities = Capabilities {
  commentable: true,
  publishable: true,
  searchable: true,
  taggable: true,
  cascade: Cascade::KeptChildren,
  ..NONE
};

const COMMENT: Capabilities = Capabilities {
  countable: Some(SubjectKind::Comment.plural()),
  searchable: true,
  broadcastable: true,
  cascade: Cascade::KeptChildren,
  ..NONE
};

const PERSON_CARD: Capabilities = Capabilities { searchable: true, ..NONE };

/// Look up the capability declarations for `kind`.
pub fn capabilities(kind: SubjectKind) -> &'static Capabilities {
  match kind {
    SubjectKind::Article => &ARTICLE,
    SubjectKind::Comment => &COMMENT,
    SubjectKind::PersonCard => &PERSON_CARD,
    SubjectKind::PublicationState | SubjectKind::Tag => &NONE,
  }
}

/// Every kind that declares itself countable, with its counter name.
pub fn countable_kinds() -> impl Iterator<Item = (SubjectKind, &'static str)> {
  SubjectKind::ALL
    .into_iter()
    .filter_map(|kind| capabilities(kind).countable.map(|name| (kind, name)))
}

/// Resolve a counter name back to the countable kind it counts.
pub fn counter_kind(name: &str) -> Result<SubjectKind> {
  countable_kinds()
    .find(|(_, counter)| *counter == name)
    .map(|(kind, _)| kind)
    .ok_or_else(|| Error::UnknownCounter(name.to_owned()))
}

// ─── Recordable ──────────────────────────────────────────────────────────────

/// Per-payload behaviour. Every method has a default; payload types override
/// only what their kind customises.
pub trait Recordable {
  fn kind(&self) -> SubjectKind;

  fn capabilities(&self) -> &'static Capabilities { capabilities(self.kind()) }

  /// Field-level validation run before the subject is persisted.
  fn validate(&self) -> Result<()> { Ok(()) }

  /// Derived text for the search index. Must return `Some` for every kind
  /// that declares itself searchable.
  fn searchable_content(&self) -> Option<String> { None }

  /// Subject kind of the nearest ancestor this subject's description refers
  /// to. The store looks that ancestor up as of the event being described.
  fn description_anchor(&self) -> Option<SubjectKind> { None }

  /// One human-readable timeline line. `anchor` is the subject named by
  /// [`Recordable::description_anchor`] as it was at the event's time.
  fn timeline_description(&self, _anchor: Option<&SubjectValue>) -> String {
    self.kind().display_name().to_lowercase()
  }

  /// The broadcast to emit after `action` commits on `recording`.
  fn broadcast(
    &self,
    _action: BroadcastAction,
    _recording: &Recording,
  ) -> Option<Broadcast> {
    None
  }

  fn permissions(&self, standing: &Standing) -> Permissions {
    standing.default_permissions()
  }
}

fn require_present(field: &str, value: &str) -> Result<()> {
  if value.trim().is_empty() {
    return Err(Error::Validation(format!("{field} can't be blank")));
  }
  Ok(())
}

impl Recordable for Article {
  fn kind(&self) -> SubjectKind { SubjectKind::Article }

  fn validate(&self) -> Result<()> { require_present("title", &self.title) }

  fn searchable_content(&self) -> Option<String> {
    Some(
      [Some(self.title.as_str()), self.body.as_deref()]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" "),
    )
  }

  fn timeline_description(&self, _anchor: Option<&SubjectValue>) -> String {
    self.title.clone()
  }

  /// Creators may delete their own articles.
  fn permissions(&self, standing: &Standing) -> Permissions {
    let mut permissions = standing.default_permissions();
    permissions.delete |= standing.creator;
    permissions
  }
}

impl Recordable for Comment {
  fn kind(&self) -> SubjectKind { SubjectKind::Comment }

  fn validate(&self) -> Result<()> { require_present("body", &self.body) }

  fn searchable_content(&self) -> Option<String> { Some(self.body.clone()) }

  fn description_anchor(&self) -> Option<SubjectKind> {
    Some(SubjectKind::Article)
  }

  fn timeline_description(&self, anchor: Option<&SubjectValue>) -> String {
    match anchor {
      Some(article) => format!(
        "comment on {}",
        article.as_recordable().timeline_description(None)
      ),
      None => "comment".to_owned(),
    }
  }

  fn broadcast(
    &self,
    action: BroadcastAction,
    recording: &Recording,
  ) -> Option<Broadcast> {
    let parent_id = recording.parent_id?;
    let (op, target) = match action {
      BroadcastAction::Created => ("append", "comments".to_owned()),
      BroadcastAction::Updated => ("replace", format!("recording_{}", recording.recording_id)),
      BroadcastAction::Discarded => ("remove", format!("recording_{}", recording.recording_id)),
    };
    let mut payload = json!({
      "op": op,
      "target": target,
      "recording_id": recording.recording_id,
    });
    if action != BroadcastAction::Discarded {
      payload["body"] = json!(self.body);
    }
    Some(Broadcast {
      stream: format!("recording:{parent_id}:comments"),
      recording_id: recording.recording_id,
      action,
      payload,
    })
  }

  fn permissions(&self, standing: &Standing) -> Permissions {
    let mut permissions = standing.default_permissions();
    permissions.delete |= standing.creator;
    permissions
  }
}

impl Recordable for PersonCard {
  fn kind(&self) -> SubjectKind { SubjectKind::PersonCard }

  fn searchable_content(&self) -> Option<String> { Some(self.name()) }

  fn timeline_description(&self, _anchor: Option<&SubjectValue>) -> String {
    self.name()
  }

  /// Owners edit their own card; only admins delete it.
  fn permissions(&self, standing: &Standing) -> Permissions {
    Permissions {
      view:   standing.is_viewer(),
      edit:   standing.owner || standing.is_admin(),
      delete: standing.is_admin(),
    }
  }
}

impl Recordable for PublicationState {
  fn kind(&self) -> SubjectKind { SubjectKind::PublicationState }
}

impl Recordable for Tag {
  fn kind(&self) -> SubjectKind { SubjectKind::Tag }

  fn validate(&self) -> Result<()> { require_present("name", &self.name) }
}

impl SubjectValue {
  /// Dispatch to the payload's [`Recordable`] implementation.
  pub fn as_recordable(&self) -> &dyn Recordable {
    match self {
      Self::Article(v) => v,
      Self::Comment(v) => v,
      Self::PersonCard(v) => v,
      Self::PublicationState(v) => v,
      Self::Tag(v) => v,
    }
  }

  pub fn validate(&self) -> Result<()> { self.as_recordable().validate() }

  /// Search text for kinds that declare themselves searchable, `None` for the
  /// rest. A searchable kind without content is a contract violation.
  pub fn search_content(&self) -> Result<Option<String>> {
    let recordable = self.as_recordable();
    if !recordable.capabilities().searchable {
      return Ok(None);
    }
    recordable
      .searchable_content()
      .map(Some)
      .ok_or(Error::CapabilityContract {
        kind:       self.kind(),
        capability: "searchable",
      })
  }
}
