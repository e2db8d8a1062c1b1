use anyhow::{Context, bail};
use dotenvy::dotenv;
use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// Which persistence backend serves the event store.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    File,
    Database,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "file" | "json" => Ok(StoreBackend::File),
            "database" | "db" | "postgres" | "sqlite" => Ok(StoreBackend::Database),
            other => bail!("unknown STORE_BACKEND '{other}', expected 'file' or 'database'"),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    pub app_name: String,
    pub deployment: String,
    pub store_backend: StoreBackend,
    pub events_file: PathBuf,
    pub db_url: Option<String>,
    pub images_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok(); // Load from .env file if available

        let db_url = env::var("DB_URL").ok().or_else(|| {
            let user = env::var("DB_USER").ok()?;
            Some(format!(
                "{}://{}:{}@{}:{}/{}",
                env::var("DB_PREFIX").unwrap_or_else(|_| "postgresql".to_string()),
                user,
                env::var("DB_PASSWORD").unwrap_or_default(),
                env::var("DB_HOST").unwrap_or_else(|_| "localhost".to_string()),
                env::var("DB_PORT").unwrap_or_else(|_| "5432".to_string()),
                env::var("DB_NAME").unwrap_or_else(|_| "events".to_string()),
            ))
        });

        let store_backend = match env::var("STORE_BACKEND") {
            Ok(raw) => raw.parse().context("Invalid STORE_BACKEND")?,
            Err(_) => StoreBackend::File,
        };
        if store_backend == StoreBackend::Database && db_url.is_none() {
            bail!("STORE_BACKEND=database requires DB_URL or DB_USER/DB_HOST/DB_NAME to be set");
        }

        Ok(Config {
            app_name: env::var("APP_NAME").unwrap_or_else(|_| "event-gallery".to_string()),
            deployment: env::var("DEPLOYMENT").unwrap_or_else(|_| "local".to_string()),
            store_backend,
            events_file: env::var("EVENTS_FILE")
                .map_or_else(|_| PathBuf::from("data/events.json"), PathBuf::from),
            db_url,
            images_dir: env::var("IMAGES_DIR")
                .map_or_else(|_| PathBuf::from("public/images"), PathBuf::from),
        })
    }

    #[cfg(test)]
    pub fn for_tests(root: &std::path::Path) -> Self {
        Config {
            app_name: "event-gallery-test".to_string(),
            deployment: "test".to_string(),
            store_backend: StoreBackend::File,
            events_file: root.join("data").join("events.json"),
            db_url: None,
            images_dir: root.join("public").join("images"),
        }
    }
}

#[cfg(test)]
pub mod test_helpers {
    use super::*;
    use crate::common::state::AppState;
    use crate::events::models::NewEvent;
    use crate::store::{DatabaseStore, EventStore, JsonFileStore};
    use chrono::NaiveDate;
    use migration::{Migrator, MigratorTrait};
    use sea_orm::{ConnectOptions, Database, DatabaseConnection};
    use std::path::Path;
    use std::sync::Arc;

    /// Backends exercised by the shared store and service tests.
    #[derive(Debug, Clone, Copy)]
    pub enum Backend {
        File,
        Sqlite,
    }

    /// A fresh, migrated in-memory SQLite database.
    pub async fn setup_test_db() -> DatabaseConnection {
        let mut options = ConnectOptions::new("sqlite::memory:");
        // Each pooled connection would otherwise get its own empty database
        options
            .max_connections(1)
            .min_connections(1)
            .sqlx_logging(false);
        let db = Database::connect(options)
            .await
            .expect("Failed to open in-memory SQLite database");
        Migrator::up(&db, None)
            .await
            .expect("Failed to run database migrations");
        db
    }

    pub async fn setup_store(backend: Backend, root: &Path) -> Arc<dyn EventStore> {
        match backend {
            Backend::File => Arc::new(JsonFileStore::new(root.join("data").join("events.json"))),
            Backend::Sqlite => Arc::new(DatabaseStore::new(setup_test_db().await)),
        }
    }

    pub async fn setup_test_state(backend: Backend, root: &Path) -> AppState {
        let store = setup_store(backend, root).await;
        AppState::new(Config::for_tests(root), store)
    }

    pub fn spring_fest() -> NewEvent {
        NewEvent {
            title: "Spring Fest".to_string(),
            description: "Music, food and art on the main lawn".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            category: "Cultural".to_string(),
        }
    }

    pub fn new_event(title: &str) -> NewEvent {
        NewEvent {
            title: title.to_string(),
            ..spring_fest()
        }
    }
}
