use sea_orm::{DbErr, SqlErr};
use std::path::PathBuf;
use thiserror::Error;

/// Failures the persistence core cannot recover from locally.
///
/// A missing event or image is not an error: lookups return `None` and
/// mutations return `None`/`false` so callers can answer "not found".
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid events JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("events document '{}' is malformed: {message}", path.display())]
    Corrupt { path: PathBuf, message: String },
    #[error("database error: {0}")]
    Database(DbErr),
    #[error("an image with filename '{0}' already exists")]
    DuplicateFilename(String),
    #[error("an image with id '{0}' already exists")]
    DuplicateImageId(String),
    #[error("invalid event date '{0}', expected YYYY-MM-DD or an ISO-8601 timestamp")]
    InvalidDate(String),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }

    /// HTTP-equivalent status for callers that expose the core over a web layer.
    pub fn status_code(&self) -> u16 {
        match self {
            StoreError::DuplicateFilename(_) | StoreError::DuplicateImageId(_) => 409,
            StoreError::InvalidDate(_) => 400,
            StoreError::Io { .. }
            | StoreError::Json(_)
            | StoreError::Corrupt { .. }
            | StoreError::Database(_) => 500,
        }
    }
}

impl From<DbErr> for StoreError {
    fn from(err: DbErr) -> Self {
        StoreError::Database(err)
    }
}

/// Extension trait to attach store context to `DbErr`
pub trait DbErrorExt {
    /// Maps a unique-constraint violation raised while inserting an image to
    /// [`StoreError::DuplicateFilename`] or [`StoreError::DuplicateImageId`],
    /// depending on which constraint fired.
    fn for_image(self, image_id: &str, filename: &str) -> StoreError;
}

impl DbErrorExt for DbErr {
    fn for_image(self, image_id: &str, filename: &str) -> StoreError {
        match self.sql_err() {
            // SQLite names the column, Postgres the `event_images_filename_key` constraint
            Some(SqlErr::UniqueConstraintViolation(message)) if message.contains("filename") => {
                StoreError::DuplicateFilename(filename.to_string())
            }
            Some(SqlErr::UniqueConstraintViolation(_)) => {
                StoreError::DuplicateImageId(image_id.to_string())
            }
            _ => StoreError::Database(self),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
