use crate::common::errors::{StoreError, StoreResult};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// An event with its image gallery, in the persisted JSON shape.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(with = "iso_date")]
    pub date: NaiveDate,
    pub category: String,
    /// Filename of the hero image, empty when the gallery is empty.
    #[serde(default)]
    pub hero_poster: String,
    #[serde(default)]
    pub images: Vec<EventImage>,
    #[serde(with = "iso_timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "iso_timestamp")]
    pub updated_at: DateTime<Utc>,
    /// Unset is treated as hidden by every public read path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible: Option<bool>,
}

impl Event {
    pub fn is_visible(&self) -> bool {
        self.visible == Some(true)
    }

    pub fn image(&self, image_id: &str) -> Option<&EventImage> {
        self.images.iter().find(|image| image.id == image_id)
    }

    pub fn hero(&self) -> Option<&EventImage> {
        self.images.iter().find(|image| image.is_hero)
    }

    /// List projection: same record without the gallery.
    pub(crate) fn into_summary(mut self) -> Self {
        self.images = Vec::new();
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventImage {
    pub id: String,
    pub filename: String,
    #[serde(default)]
    pub alt: String,
    #[serde(default)]
    pub is_hero: bool,
    #[serde(with = "iso_timestamp")]
    pub uploaded_at: DateTime<Utc>,
}

/// Root of the file-backed document: `{ "events": [...] }`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventsDocument {
    #[serde(default)]
    pub events: Vec<Event>,
}

/// Content fields supplied when creating an event.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct NewEvent {
    pub title: String,
    pub description: String,
    #[serde(with = "iso_date")]
    pub date: NaiveDate,
    pub category: String,
}

/// Partial content update. Unset fields are left untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct EventChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(default, with = "iso_date::option")]
    pub date: Option<NaiveDate>,
    pub category: Option<String>,
}

impl EventChanges {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.date.is_none()
            && self.category.is_none()
    }
}

/// Content update plus the visibility flag, written as one operation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct AdminEventChanges {
    #[serde(flatten)]
    pub content: EventChanges,
    pub visible: Option<bool>,
}

/// Store-level partial update of an event row.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EventPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub date: Option<NaiveDate>,
    pub category: Option<String>,
    pub visible: Option<bool>,
}

impl EventPatch {
    pub fn visibility(visible: bool) -> Self {
        Self {
            visible: Some(visible),
            ..Self::default()
        }
    }

    /// Merges the provided fields into `event`. Does not touch timestamps.
    pub fn apply(&self, event: &mut Event) {
        if let Some(title) = &self.title {
            event.title.clone_from(title);
        }
        if let Some(description) = &self.description {
            event.description.clone_from(description);
        }
        if let Some(date) = self.date {
            event.date = date;
        }
        if let Some(category) = &self.category {
            event.category.clone_from(category);
        }
        if let Some(visible) = self.visible {
            event.visible = Some(visible);
        }
    }
}

impl From<EventChanges> for EventPatch {
    fn from(changes: EventChanges) -> Self {
        Self {
            title: changes.title,
            description: changes.description,
            date: changes.date,
            category: changes.category,
            visible: None,
        }
    }
}

impl From<AdminEventChanges> for EventPatch {
    fn from(changes: AdminEventChanges) -> Self {
        Self {
            visible: changes.visible,
            ..changes.content.into()
        }
    }
}

/// Metadata for an image that is being attached to an event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewImage {
    pub filename: String,
    pub alt: String,
    pub is_hero: bool,
}

/// Partial image update. The filename is fixed once recorded.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageChanges {
    pub alt: Option<String>,
    pub is_hero: Option<bool>,
}

/// Parses an event date given either as `YYYY-MM-DD` or as a full ISO-8601
/// timestamp, in which case the UTC calendar date is kept.
pub fn parse_event_date(raw: &str) -> StoreResult<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| DateTime::parse_from_rfc3339(raw).map(|stamp| stamp.to_utc().date_naive()))
        .map_err(|_| StoreError::InvalidDate(raw.to_string()))
}

pub(crate) mod iso_date {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&date.format("%Y-%m-%d"))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_event_date(&raw).map_err(D::Error::custom)
    }

    pub mod option {
        use chrono::NaiveDate;
        use serde::{Deserialize, Deserializer, de::Error};

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<NaiveDate>, D::Error> {
            Option::<String>::deserialize(deserializer)?
                .map(|raw| super::super::parse_event_date(&raw).map_err(D::Error::custom))
                .transpose()
        }
    }
}

/// ISO-8601 UTC with millisecond precision, e.g. `2024-03-01T10:00:00.000Z`.
pub(crate) mod iso_timestamp {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(
        stamp: &DateTime<Utc>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&stamp.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|stamp| stamp.to_utc())
            .map_err(D::Error::custom)
    }
}
