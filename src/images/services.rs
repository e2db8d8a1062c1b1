use super::filenames::unique_filename;
use crate::common::errors::{StoreError, StoreResult};
use crate::events::models::{EventImage, NewImage};
use crate::events::services::EventService;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Attempts at finding a free filename before giving up.
const MAX_NAME_ATTEMPTS: usize = 5;

/// Optional metadata sent along with an upload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageUpload {
    pub alt: Option<String>,
    pub is_hero: bool,
}

/// Stores uploaded image bytes in the public image directory and keeps the
/// event records in step with the files on disk.
#[derive(Clone)]
pub struct ImageService {
    events: EventService,
    images_dir: PathBuf,
}

impl ImageService {
    pub fn new(events: EventService, images_dir: impl Into<PathBuf>) -> Self {
        Self {
            events,
            images_dir: images_dir.into(),
        }
    }

    pub fn images_dir(&self) -> &Path {
        &self.images_dir
    }

    /// Where static hosting serves `filename` from.
    pub fn image_path(&self, filename: &str) -> PathBuf {
        self.images_dir.join(filename)
    }

    /// Writes the bytes under a fresh filename, then records the image on
    /// the event. The file is on disk before the record referencing it is
    /// committed; if the record cannot be written (unknown event or storage
    /// failure) the file is removed again.
    pub async fn save_image(
        &self,
        event_id: &str,
        bytes: &[u8],
        original_name: &str,
        upload: ImageUpload,
    ) -> StoreResult<Option<EventImage>> {
        tokio::fs::create_dir_all(&self.images_dir)
            .await
            .map_err(|err| StoreError::io(&self.images_dir, err))?;
        let (filename, path) = self.write_new_file(bytes, original_name).await?;

        let recorded = self
            .events
            .add_image_to_event(
                event_id,
                NewImage {
                    filename: filename.clone(),
                    alt: upload.alt.unwrap_or_default(),
                    is_hero: upload.is_hero,
                },
            )
            .await;

        match recorded {
            Ok(Some(image)) => Ok(Some(image)),
            Ok(None) => {
                tracing::warn!(event_id, %filename, "Upload for unknown event, removing file");
                remove_file_quietly(&path).await;
                Ok(None)
            }
            Err(err) => {
                tracing::warn!(event_id, %filename, %err, "Recording upload failed, removing file");
                remove_file_quietly(&path).await;
                Err(err)
            }
        }
    }

    /// Creates the file with create-new semantics so an existing upload is
    /// never overwritten, drawing a new name on collision.
    async fn write_new_file(
        &self,
        bytes: &[u8],
        original_name: &str,
    ) -> StoreResult<(String, PathBuf)> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let filename = unique_filename(original_name);
            let path = self.image_path(&filename);
            let opened = tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await;
            let mut file = match opened {
                Ok(file) => file,
                Err(err) if err.kind() == ErrorKind::AlreadyExists && attempt < MAX_NAME_ATTEMPTS => {
                    tracing::debug!(%filename, "Generated filename already taken, retrying");
                    continue;
                }
                Err(err) => return Err(StoreError::io(&path, err)),
            };
            let written = async {
                file.write_all(bytes).await?;
                file.sync_all().await
            }
            .await;
            if let Err(err) = written {
                remove_file_quietly(&path).await;
                return Err(StoreError::io(&path, err));
            }
            tracing::debug!(%filename, size = bytes.len(), "Wrote image file");
            return Ok((filename, path));
        }
    }

    /// Deletes the image record and then, only if that succeeded, its file.
    /// File removal is best-effort: the record is authoritative.
    pub async fn delete_image(&self, event_id: &str, image_id: &str) -> StoreResult<bool> {
        let Some(event) = self.events.get_event(event_id).await? else {
            return Ok(false);
        };
        let Some(image) = event.image(image_id) else {
            return Ok(false);
        };
        let path = self.image_path(&image.filename);

        let deleted = self.events.delete_image(event_id, image_id).await?;
        if deleted {
            remove_file_quietly(&path).await;
        }
        Ok(deleted)
    }

    /// Deletes an event together with the files of its gallery.
    pub async fn delete_event(&self, event_id: &str) -> StoreResult<bool> {
        let Some(event) = self.events.get_event(event_id).await? else {
            return Ok(false);
        };
        let deleted = self.events.delete_event(event_id).await?;
        if deleted {
            for image in &event.images {
                remove_file_quietly(&self.image_path(&image.filename)).await;
            }
        }
        Ok(deleted)
    }
}

async fn remove_file_quietly(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::debug!(path = %path.display(), "Removed image file"),
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => {
            tracing::warn!(path = %path.display(), %err, "Failed to remove image file");
        }
    }
}
