use super::{EventStore, check_gallery};
use crate::common::clock;
use crate::common::errors::{StoreError, StoreResult};
use crate::events::hero;
use crate::events::models::{Event, EventImage, EventPatch, EventsDocument, ImageChanges};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// Stores the whole collection as one pretty-printed JSON document.
///
/// Every mutation reads the document, changes it in memory and rewrites it
/// while holding `write_lock`, so there is at most one writer per handle.
/// The new document is written beside the old one and renamed over it.
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_document(&self) -> StoreResult<EventsDocument> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(EventsDocument::default()),
            Err(err) => return Err(StoreError::io(&self.path, err)),
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(EventsDocument::default());
        }
        serde_json::from_slice(&bytes).map_err(|err| StoreError::Corrupt {
            path: self.path.clone(),
            message: err.to_string(),
        })
    }

    async fn write_document(&self, document: &EventsDocument) -> StoreResult<()> {
        let json = serde_json::to_vec_pretty(document)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|err| StoreError::io(parent, err))?;
        }
        let staging = self.path.with_extension("json.tmp");
        tokio::fs::write(&staging, json)
            .await
            .map_err(|err| StoreError::io(&staging, err))?;
        tokio::fs::rename(&staging, &self.path)
            .await
            .map_err(|err| StoreError::io(&self.path, err))
    }

    /// Read-modify-write under the lock. The document is only rewritten when
    /// `change` reports a result.
    async fn mutate<T, F>(&self, change: F) -> StoreResult<Option<T>>
    where
        T: Send,
        F: FnOnce(&mut Vec<Event>) -> StoreResult<Option<T>> + Send,
    {
        let _guard = self.write_lock.lock().await;
        let mut document = self.read_document().await?;
        let outcome = change(&mut document.events)?;
        if outcome.is_some() {
            self.write_document(&document).await?;
        }
        Ok(outcome)
    }

    /// Same as [`Self::mutate`] for a single event, stamping `updated_at`.
    async fn mutate_event<T, F>(
        &self,
        event_id: &str,
        now: DateTime<Utc>,
        change: F,
    ) -> StoreResult<Option<T>>
    where
        T: Send,
        F: FnOnce(&mut Event) -> Option<T> + Send,
    {
        self.mutate(|events| {
            let Some(event) = events.iter_mut().find(|event| event.id == event_id) else {
                return Ok(None);
            };
            let outcome = change(event);
            if outcome.is_some() {
                event.updated_at = clock::after(event.updated_at, now);
            }
            Ok(outcome)
        })
        .await
    }
}

/// Whether an event other than `except_event` already uses `filename`.
fn filename_taken(events: &[Event], filename: &str, except_event: Option<&str>) -> bool {
    events
        .iter()
        .filter(|event| Some(event.id.as_str()) != except_event)
        .flat_map(|event| &event.images)
        .any(|image| image.filename == filename)
}

/// Whether an event other than `except_event` already owns `image_id`.
fn image_id_taken(events: &[Event], image_id: &str, except_event: Option<&str>) -> bool {
    events
        .iter()
        .filter(|event| Some(event.id.as_str()) != except_event)
        .flat_map(|event| &event.images)
        .any(|image| image.id == image_id)
}

/// Checks `event`'s gallery against itself and against every other event.
fn check_unique_images(events: &[Event], event: &Event) -> StoreResult<()> {
    check_gallery(event)?;
    for image in &event.images {
        if filename_taken(events, &image.filename, Some(event.id.as_str())) {
            return Err(StoreError::DuplicateFilename(image.filename.clone()));
        }
        if image_id_taken(events, &image.id, Some(event.id.as_str())) {
            return Err(StoreError::DuplicateImageId(image.id.clone()));
        }
    }
    Ok(())
}

/// Same order as the relational backend: `created_at`, then `id`.
fn in_creation_order(mut events: Vec<Event>) -> Vec<Event> {
    events.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
    events
}

#[async_trait]
impl EventStore for JsonFileStore {
    async fn list(&self) -> StoreResult<Vec<Event>> {
        let document = self.read_document().await?;
        Ok(in_creation_order(document.events)
            .into_iter()
            .map(Event::into_summary)
            .collect())
    }

    async fn list_visible(&self) -> StoreResult<Vec<Event>> {
        let document = self.read_document().await?;
        Ok(in_creation_order(document.events)
            .into_iter()
            .filter(Event::is_visible)
            .map(Event::into_summary)
            .collect())
    }

    async fn get(&self, id: &str) -> StoreResult<Option<Event>> {
        let document = self.read_document().await?;
        Ok(document.events.into_iter().find(|event| event.id == id))
    }

    async fn create(&self, event: Event) -> StoreResult<Event> {
        let _guard = self.write_lock.lock().await;
        let mut document = self.read_document().await?;
        check_unique_images(&document.events, &event)?;
        document.events.push(event.clone());
        self.write_document(&document).await?;
        Ok(event)
    }

    async fn update(
        &self,
        id: &str,
        patch: &EventPatch,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Event>> {
        self.mutate(|events| {
            let Some(event) = events.iter_mut().find(|event| event.id == id) else {
                return Ok(None);
            };
            patch.apply(event);
            event.updated_at = clock::after(event.updated_at, now);
            Ok(Some(event.clone()))
        })
        .await
    }

    async fn delete(&self, id: &str) -> StoreResult<bool> {
        let removed = self
            .mutate(|events| {
                let before = events.len();
                events.retain(|event| event.id != id);
                Ok((events.len() < before).then_some(()))
            })
            .await?;
        Ok(removed.is_some())
    }

    async fn add_image(
        &self,
        event_id: &str,
        image: EventImage,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<EventImage>> {
        self.mutate(|events| {
            let Some(index) = events.iter().position(|event| event.id == event_id) else {
                return Ok(None);
            };
            if filename_taken(events, &image.filename, None) {
                return Err(StoreError::DuplicateFilename(image.filename));
            }
            if image_id_taken(events, &image.id, None) {
                return Err(StoreError::DuplicateImageId(image.id));
            }
            let event = &mut events[index];
            let added = hero::attach(event, image);
            event.updated_at = clock::after(event.updated_at, now);
            Ok(Some(added))
        })
        .await
    }

    async fn update_image(
        &self,
        event_id: &str,
        image_id: &str,
        changes: &ImageChanges,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<EventImage>> {
        self.mutate_event(event_id, now, |event| {
            hero::apply_changes(event, image_id, changes)
        })
        .await
    }

    async fn delete_image(
        &self,
        event_id: &str,
        image_id: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let removed = self
            .mutate_event(event_id, now, |event| hero::detach(event, image_id))
            .await?;
        Ok(removed.is_some())
    }

    async fn set_hero(
        &self,
        event_id: &str,
        image_id: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let promoted = self
            .mutate_event(event_id, now, |event| {
                hero::promote(event, image_id).then_some(())
            })
            .await?;
        Ok(promoted.is_some())
    }

    async fn upsert(&self, event: Event) -> StoreResult<()> {
        self.mutate(|events| {
            check_unique_images(events, &event)?;
            match events.iter_mut().find(|existing| existing.id == event.id) {
                Some(existing) => *existing = event,
                None => events.push(event),
            }
            Ok(Some(()))
        })
        .await?;
        Ok(())
    }
}
