//! Bulk loading of an `{ "events": [...] }` document into the store.
//!
//! Records are upserted by their external `id`, so importing the same
//! document twice leaves the store unchanged. Incomplete records are skipped
//! rather than failing the whole import.

use super::hero;
use super::models::{Event, EventImage, parse_event_date};
use super::services::EventService;
use crate::common::errors::{StoreError, StoreResult};
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

/// Lenient view of an events document: every field may be missing.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ImportDocument {
    #[serde(default)]
    pub events: Vec<ImportedEvent>,
}

impl ImportDocument {
    pub fn from_slice(bytes: &[u8]) -> StoreResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImportedEvent {
    pub id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub date: Option<String>,
    pub category: Option<String>,
    pub hero_poster: Option<String>,
    pub visible: Option<bool>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub images: Vec<ImportedImage>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImportedImage {
    pub id: Option<String>,
    pub filename: Option<String>,
    pub alt: Option<String>,
    pub is_hero: Option<bool>,
    pub uploaded_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    Imported {
        event_id: String,
        images: usize,
        skipped_images: usize,
    },
    Skipped {
        reason: String,
    },
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub events: usize,
    pub images: usize,
    pub skipped_events: usize,
    pub skipped_images: usize,
}

impl ImportSummary {
    pub fn record(&mut self, outcome: &ImportOutcome) {
        match outcome {
            ImportOutcome::Imported {
                images,
                skipped_images,
                ..
            } => {
                self.events += 1;
                self.images += images;
                self.skipped_images += skipped_images;
            }
            ImportOutcome::Skipped { .. } => self.skipped_events += 1,
        }
    }
}

fn required(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

fn timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = raw?;
    match DateTime::parse_from_rfc3339(raw) {
        // Stored timestamps carry milliseconds only
        Ok(stamp) => Some(stamp.to_utc().trunc_subsecs(3)),
        Err(err) => {
            tracing::warn!(value = raw, %err, "Ignoring unparseable timestamp");
            None
        }
    }
}

impl EventService {
    pub async fn import_event(&self, imported: ImportedEvent) -> StoreResult<ImportOutcome> {
        let label = imported.id.clone().unwrap_or_else(|| "<no id>".to_string());
        let (Some(id), Some(title), Some(description), Some(raw_date), Some(category)) = (
            required(imported.id),
            required(imported.title),
            required(imported.description),
            required(imported.date),
            required(imported.category),
        ) else {
            tracing::warn!(event_id = %label, "Skipping event with missing required fields");
            return Ok(ImportOutcome::Skipped {
                reason: format!("event {label} is missing required fields"),
            });
        };
        let date = match parse_event_date(&raw_date) {
            Ok(date) => date,
            Err(err) => {
                tracing::warn!(event_id = %id, %err, "Skipping event with invalid date");
                return Ok(ImportOutcome::Skipped {
                    reason: format!("event {id}: {err}"),
                });
            }
        };

        // Timestamps absent from the document fall back to what is already
        // stored, so a second import writes identical records.
        let existing = self.store().get(&id).await?;
        let now = self.now();
        let created_at = timestamp(imported.created_at.as_deref())
            .or(existing.as_ref().map(|event| event.created_at))
            .unwrap_or(now);
        let updated_at = timestamp(imported.updated_at.as_deref())
            .or(existing.as_ref().map(|event| event.updated_at))
            .unwrap_or(now);

        let mut images = Vec::with_capacity(imported.images.len());
        let mut skipped_images = 0;
        for image in imported.images {
            let (Some(image_id), Some(filename)) = (required(image.id), required(image.filename))
            else {
                tracing::warn!(event_id = %id, "Skipping image with missing fields");
                skipped_images += 1;
                continue;
            };
            let uploaded_at = timestamp(image.uploaded_at.as_deref())
                .or_else(|| {
                    existing
                        .as_ref()
                        .and_then(|event| event.image(&image_id))
                        .map(|known| known.uploaded_at)
                })
                .unwrap_or(now);
            images.push(EventImage {
                id: image_id,
                filename,
                alt: image.alt.unwrap_or_default(),
                is_hero: image.is_hero.unwrap_or(false),
                uploaded_at,
            });
        }

        let mut event = Event {
            id: id.clone(),
            title,
            description,
            date,
            category,
            hero_poster: imported.hero_poster.unwrap_or_default(),
            images,
            created_at,
            updated_at,
            visible: imported.visible,
        };
        hero::normalize(&mut event);
        let image_count = event.images.len();
        match self.store().upsert(event).await {
            Ok(()) => {}
            Err(err @ (StoreError::DuplicateFilename(_) | StoreError::DuplicateImageId(_))) => {
                tracing::warn!(event_id = %id, %err, "Skipping event with conflicting images");
                return Ok(ImportOutcome::Skipped {
                    reason: format!("event {id}: {err}"),
                });
            }
            Err(err) => return Err(err),
        }

        tracing::info!(event_id = %id, images = image_count, "Upserted event");
        Ok(ImportOutcome::Imported {
            event_id: id,
            images: image_count,
            skipped_images,
        })
    }

    pub async fn import_document(&self, document: ImportDocument) -> StoreResult<ImportSummary> {
        tracing::info!(events = document.events.len(), "Importing events document");
        let mut summary = ImportSummary::default();
        for imported in document.events {
            let outcome = self.import_event(imported).await?;
            summary.record(&outcome);
        }
        tracing::info!(?summary, "Import complete");
        Ok(summary)
    }
}
