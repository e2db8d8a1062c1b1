use super::models::{
    Event, EventChanges, EventImage, EventPatch, ImageChanges, NewEvent, NewImage,
};
use crate::common::clock::Clock;
use crate::common::errors::StoreResult;
use crate::store::EventStore;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

/// CRUD and query operations over an [`EventStore`].
///
/// Not-found is reported as `None`/`false`; only storage failures are
/// errors. The service owns identifiers and timestamps, the store applies
/// the hero rules atomically.
#[derive(Clone)]
pub struct EventService {
    store: Arc<dyn EventStore>,
    clock: Arc<Clock>,
}

pub(crate) fn new_event_id() -> String {
    format!("evt_{}", Uuid::new_v4().simple())
}

pub(crate) fn new_image_id() -> String {
    format!("img_{}", Uuid::new_v4().simple())
}

impl EventService {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self::with_clock(store, Arc::new(Clock::new()))
    }

    pub fn with_clock(store: Arc<dyn EventStore>, clock: Arc<Clock>) -> Self {
        Self { store, clock }
    }

    pub fn store(&self) -> &Arc<dyn EventStore> {
        &self.store
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub async fn list_events(&self) -> StoreResult<Vec<Event>> {
        self.store.list().await
    }

    /// Events shown to the public: `visible` must be exactly `true`.
    pub async fn get_visible_events(&self) -> StoreResult<Vec<Event>> {
        self.store.list_visible().await
    }

    pub async fn get_event(&self, id: &str) -> StoreResult<Option<Event>> {
        tracing::debug!(event_id = id, "Fetching event");
        self.store.get(id).await
    }

    /// Detail view for the public: hidden and never-published events are
    /// reported as missing.
    pub async fn get_visible_event(&self, id: &str) -> StoreResult<Option<Event>> {
        Ok(self.store.get(id).await?.filter(Event::is_visible))
    }

    pub async fn create_event(&self, new_event: NewEvent) -> StoreResult<Event> {
        self.insert_event(new_event, None).await
    }

    pub(crate) async fn insert_event(
        &self,
        new_event: NewEvent,
        visible: Option<bool>,
    ) -> StoreResult<Event> {
        let now = self.clock.now();
        let event = Event {
            id: new_event_id(),
            title: new_event.title,
            description: new_event.description,
            date: new_event.date,
            category: new_event.category,
            hero_poster: String::new(),
            images: Vec::new(),
            created_at: now,
            updated_at: now,
            visible,
        };
        let created = self.store.create(event).await?;
        tracing::info!(event_id = %created.id, title = %created.title, "Created event");
        Ok(created)
    }

    /// Merges the provided fields; unset fields keep their values.
    pub async fn update_event(
        &self,
        id: &str,
        changes: EventChanges,
    ) -> StoreResult<Option<Event>> {
        self.apply_patch(id, changes.into()).await
    }

    pub(crate) async fn apply_patch(
        &self,
        id: &str,
        patch: EventPatch,
    ) -> StoreResult<Option<Event>> {
        let updated = self.store.update(id, &patch, self.clock.now()).await?;
        match &updated {
            Some(_) => tracing::info!(event_id = id, ?patch, "Updated event"),
            None => tracing::debug!(event_id = id, "Update skipped, event not found"),
        }
        Ok(updated)
    }

    /// Removes the event and its image records. Image files are left for
    /// [`crate::images::services::ImageService`] to clean up.
    pub async fn delete_event(&self, id: &str) -> StoreResult<bool> {
        let deleted = self.store.delete(id).await?;
        if deleted {
            tracing::info!(event_id = id, "Deleted event");
        }
        Ok(deleted)
    }

    /// Records an image on the event. The first image of a gallery, or one
    /// flagged as hero, becomes the hero poster.
    pub async fn add_image_to_event(
        &self,
        event_id: &str,
        image: NewImage,
    ) -> StoreResult<Option<EventImage>> {
        let now = self.clock.now();
        let image = EventImage {
            id: new_image_id(),
            filename: image.filename,
            alt: image.alt,
            is_hero: image.is_hero,
            uploaded_at: now,
        };
        let added = self.store.add_image(event_id, image, now).await?;
        if let Some(image) = &added {
            tracing::info!(
                event_id,
                image_id = %image.id,
                filename = %image.filename,
                is_hero = image.is_hero,
                "Added image to event"
            );
        }
        Ok(added)
    }

    pub async fn update_image(
        &self,
        event_id: &str,
        image_id: &str,
        changes: ImageChanges,
    ) -> StoreResult<Option<EventImage>> {
        let updated = self
            .store
            .update_image(event_id, image_id, &changes, self.clock.now())
            .await?;
        if updated.is_some() {
            tracing::info!(event_id, image_id, ?changes, "Updated image");
        }
        Ok(updated)
    }

    pub async fn delete_image(&self, event_id: &str, image_id: &str) -> StoreResult<bool> {
        let deleted = self
            .store
            .delete_image(event_id, image_id, self.clock.now())
            .await?;
        if deleted {
            tracing::info!(event_id, image_id, "Deleted image record");
        }
        Ok(deleted)
    }

    pub async fn set_hero_poster(&self, event_id: &str, image_id: &str) -> StoreResult<bool> {
        let promoted = self
            .store
            .set_hero(event_id, image_id, self.clock.now())
            .await?;
        if promoted {
            tracing::info!(event_id, image_id, "Set hero poster");
        }
        Ok(promoted)
    }
}
