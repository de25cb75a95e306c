//! Error type for `quill-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] quill_core::Error),

  #[error("database error: {0}")]
  Database(tokio_rusqlite::Error),

  #[error("sqlite error: {0}")]
  Sqlite(rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("configuration error: {0}")]
  Config(#[from] config::ConfigError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
  /// Carry an error out of a `tokio_rusqlite` closure. Domain errors travel
  /// boxed and are restored by the `From<tokio_rusqlite::Error>` impl.
  pub(crate) fn into_call(self) -> tokio_rusqlite::Error {
    match self {
      Error::Sqlite(e) => tokio_rusqlite::Error::Rusqlite(e),
      other => tokio_rusqlite::Error::Other(Box::new(other)),
    }
  }

  /// The wrapped domain error, if this is one.
  pub fn as_core(&self) -> Option<&quill_core::Error> {
    match self {
      Error::Core(e) => Some(e),
      _ => None,
    }
  }
}

impl From<rusqlite::Error> for Error {
  fn from(e: rusqlite::Error) -> Self {
    // Schema triggers abort with messages prefixed "immutable:".
    if let rusqlite::Error::SqliteFailure(_, Some(message)) = &e
      && message.starts_with("immutable:")
    {
      return Error::Core(quill_core::Error::Immutable(message.clone()));
    }
    Error::Sqlite(e)
  }
}

impl From<tokio_rusqlite::Error> for Error {
  fn from(e: tokio_rusqlite::Error) -> Self {
    match e {
      tokio_rusqlite::Error::Rusqlite(e) => Error::from(e),
      tokio_rusqlite::Error::Other(boxed) => match boxed.downcast::<Error>() {
        Ok(inner) => *inner,
        Err(boxed) => Error::Database(tokio_rusqlite::Error::Other(boxed)),
      },
      other => Error::Database(other),
    }
  }
}
