//! Event persistence.
//!
//! [`EventStore`] is the backend contract; [`JsonFileStore`] keeps the whole
//! collection in one JSON document and [`DatabaseStore`] maps it onto the
//! `events`/`event_images` tables. Both apply the hero rules from
//! [`crate::events::hero`] atomically, so observable behaviour is identical.
//!
//! Listing order is ascending `(created_at, id)` for both backends. Images
//! keep the order in which they were attached. Image ids and filenames are
//! unique across the whole store.

mod database;
mod json_file;


pub use database::DatabaseStore;
pub use json_file::JsonFileStore;

use crate::common::errors::{StoreError, StoreResult};
use crate::config::{Config, StoreBackend};
use crate::events::models::{Event, EventImage, EventPatch, ImageChanges};
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, Database};
use std::collections::HashSet;
use std::sync::Arc;

#[async_trait]
pub trait EventStore: Send + Sync {
    /// All events without their galleries.
    async fn list(&self) -> StoreResult<Vec<Event>>;

    /// Events whose `visible` flag is exactly `true`, without galleries.
    async fn list_visible(&self) -> StoreResult<Vec<Event>>;

    /// One event with its gallery.
    async fn get(&self, id: &str) -> StoreResult<Option<Event>>;

    /// Persists a fully-formed event, visibility included, in one write.
    async fn create(&self, event: Event) -> StoreResult<Event>;

    /// Merges `patch` into the event and stamps `updated_at` no earlier than
    /// `now` and strictly after its previous value.
    async fn update(&self, id: &str, patch: &EventPatch, now: DateTime<Utc>)
    -> StoreResult<Option<Event>>;

    /// Removes the event and its images.
    async fn delete(&self, id: &str) -> StoreResult<bool>;

    /// Attaches an image, applying the hero rules.
    async fn add_image(
        &self,
        event_id: &str,
        image: EventImage,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<EventImage>>;

    async fn update_image(
        &self,
        event_id: &str,
        image_id: &str,
        changes: &ImageChanges,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<EventImage>>;

    /// Removes an image, reassigning the hero role if it held it.
    async fn delete_image(
        &self,
        event_id: &str,
        image_id: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<bool>;

    async fn set_hero(&self, event_id: &str, image_id: &str, now: DateTime<Utc>)
    -> StoreResult<bool>;

    /// Inserts or replaces an event and its gallery as given, keyed by id.
    /// Used by import, so re-running it with the same document is a no-op.
    async fn upsert(&self, event: Event) -> StoreResult<()>;
}

/// Rejects a gallery that repeats an image id or a filename. Both must be
/// unique store-wide, so they must also be unique within one event.
fn check_gallery(event: &Event) -> StoreResult<()> {
    let mut ids = HashSet::new();
    let mut filenames = HashSet::new();
    for image in &event.images {
        if !ids.insert(image.id.as_str()) {
            return Err(StoreError::DuplicateImageId(image.id.clone()));
        }
        if !filenames.insert(image.filename.as_str()) {
            return Err(StoreError::DuplicateFilename(image.filename.clone()));
        }
    }
    Ok(())
}

/// Opens the backend selected by configuration.
pub async fn connect(config: &Config) -> anyhow::Result<Arc<dyn EventStore>> {
    match config.store_backend {
        StoreBackend::File => {
            tracing::info!(path = %config.events_file.display(), "Using file-backed event store");
            Ok(Arc::new(JsonFileStore::new(&config.events_file)))
        }
        StoreBackend::Database => {
            let url = config
                .db_url
                .as_deref()
                .context("STORE_BACKEND=database requires DB_URL or DB_* settings")?;
            let mut options = ConnectOptions::new(url);
            options.sqlx_logging(false);
            let db = Database::connect(options)
                .await
                .context("Failed to connect to the database")?;
            Migrator::up(&db, None)
                .await
                .context("Failed to run migrations")?;
            tracing::info!("Connected to the database, migrations complete");
            Ok(Arc::new(DatabaseStore::new(db)))
        }
    }
}
