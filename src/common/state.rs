use crate::admin::services::AdminService;
use crate::config::Config;
use crate::events::services::EventService;
use crate::images::services::ImageService;
use crate::store::{self, EventStore};
use std::sync::Arc;

/// Process-lifetime handles shared by every caller of the core.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn EventStore>,
    pub events: EventService,
    pub admin: AdminService,
    pub images: ImageService,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn EventStore>) -> Self {
        let events = EventService::new(store.clone());
        let admin = AdminService::new(events.clone());
        let images = ImageService::new(events.clone(), config.images_dir.clone());
        Self {
            config,
            store,
            events,
            admin,
            images,
        }
    }

    /// Opens the configured backend and wires the services on top of it.
    pub async fn from_config(config: Config) -> anyhow::Result<Self> {
        let store = store::connect(&config).await?;
        Ok(Self::new(config, store))
    }
}
