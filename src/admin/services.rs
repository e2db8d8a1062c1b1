use crate::common::errors::StoreResult;
use crate::events::models::{AdminEventChanges, Event, EventPatch, NewEvent};
use crate::events::services::EventService;

/// Administrative operations: the event service plus the `visible` flag.
///
/// Content and visibility always travel in a single store write, so there is
/// no window in which only half of an admin update has been applied.
#[derive(Clone)]
pub struct AdminService {
    events: EventService,
}

impl AdminService {
    pub fn new(events: EventService) -> Self {
        Self { events }
    }

    /// Creates an event. Without an explicit `visible` the event stays
    /// hidden from public listings.
    pub async fn create_event_admin(
        &self,
        new_event: NewEvent,
        visible: Option<bool>,
    ) -> StoreResult<Event> {
        self.events.insert_event(new_event, visible).await
    }

    /// Applies content changes and visibility together. A visibility-only
    /// update is valid and still stamps `updated_at`.
    pub async fn update_event_admin(
        &self,
        id: &str,
        changes: AdminEventChanges,
    ) -> StoreResult<Option<Event>> {
        self.events.apply_patch(id, changes.into()).await
    }

    pub async fn delete_event_admin(&self, id: &str) -> StoreResult<bool> {
        self.events.delete_event(id).await
    }

    pub async fn set_event_visibility(&self, id: &str, visible: bool) -> StoreResult<bool> {
        let updated = self
            .events
            .apply_patch(id, EventPatch::visibility(visible))
            .await?;
        Ok(updated.is_some())
    }
}
