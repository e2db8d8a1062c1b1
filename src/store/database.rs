use super::{EventStore, check_gallery};
use crate::common::clock;
use crate::common::errors::{DbErrorExt, StoreError, StoreResult};
use crate::events::models::{Event, EventImage, EventPatch, ImageChanges};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gallery_entity::{event_images, events};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr,
    EntityTrait, QueryFilter, QueryOrder, TransactionTrait,
};

/// Relational backend over the `events` and `event_images` tables.
///
/// Every operation that issues more than one statement runs in a single
/// transaction, so no reader ever sees a gallery with zero or two heroes.
#[derive(Clone)]
pub struct DatabaseStore {
    db: DatabaseConnection,
}

impl DatabaseStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }
}

impl From<event_images::Model> for EventImage {
    fn from(model: event_images::Model) -> Self {
        Self {
            id: model.id,
            filename: model.filename,
            alt: model.alt,
            is_hero: model.is_hero,
            uploaded_at: model.uploaded_at,
        }
    }
}

fn to_event(model: events::Model, images: Vec<event_images::Model>) -> Event {
    Event {
        id: model.id,
        title: model.title,
        description: model.description,
        date: model.date,
        category: model.category,
        hero_poster: model.hero_poster,
        images: images.into_iter().map(EventImage::from).collect(),
        created_at: model.created_at,
        updated_at: model.updated_at,
        visible: model.visible,
    }
}

fn event_row(event: &Event) -> events::ActiveModel {
    events::ActiveModel {
        id: Set(event.id.clone()),
        title: Set(event.title.clone()),
        description: Set(event.description.clone()),
        date: Set(event.date),
        category: Set(event.category.clone()),
        hero_poster: Set(event.hero_poster.clone()),
        visible: Set(event.visible),
        created_at: Set(event.created_at),
        updated_at: Set(event.updated_at),
    }
}

async fn insert_image<C: ConnectionTrait>(
    conn: &C,
    event_id: &str,
    image: &EventImage,
    position: i32,
) -> StoreResult<()> {
    let row = event_images::ActiveModel {
        id: Set(image.id.clone()),
        event_id: Set(event_id.to_string()),
        filename: Set(image.filename.clone()),
        alt: Set(image.alt.clone()),
        is_hero: Set(image.is_hero),
        position: Set(position),
        uploaded_at: Set(image.uploaded_at),
    };
    event_images::Entity::insert(row)
        .exec_without_returning(conn)
        .await
        .map_err(|err| err.for_image(&image.id, &image.filename))?;
    Ok(())
}

async fn gallery<C: ConnectionTrait>(
    conn: &C,
    event_id: &str,
) -> Result<Vec<event_images::Model>, DbErr> {
    event_images::Entity::find()
        .filter(event_images::Column::EventId.eq(event_id))
        .order_by_asc(event_images::Column::Position)
        .all(conn)
        .await
}

async fn find_image<C: ConnectionTrait>(
    conn: &C,
    event_id: &str,
    image_id: &str,
) -> Result<Option<event_images::Model>, DbErr> {
    event_images::Entity::find_by_id(image_id)
        .filter(event_images::Column::EventId.eq(event_id))
        .one(conn)
        .await
}

async fn filename_in_use<C: ConnectionTrait>(
    conn: &C,
    filename: &str,
    except_event: Option<&str>,
) -> Result<bool, DbErr> {
    let mut query = event_images::Entity::find().filter(event_images::Column::Filename.eq(filename));
    if let Some(event_id) = except_event {
        query = query.filter(event_images::Column::EventId.ne(event_id));
    }
    Ok(query.one(conn).await?.is_some())
}

async fn image_id_in_use<C: ConnectionTrait>(
    conn: &C,
    image_id: &str,
    except_event: Option<&str>,
) -> Result<bool, DbErr> {
    let mut query = event_images::Entity::find_by_id(image_id);
    if let Some(event_id) = except_event {
        query = query.filter(event_images::Column::EventId.ne(event_id));
    }
    Ok(query.one(conn).await?.is_some())
}

/// Checks `event`'s gallery against itself and against every other event,
/// so a clash is reported by name instead of as a constraint failure.
async fn check_unique_images<C: ConnectionTrait>(conn: &C, event: &Event) -> StoreResult<()> {
    check_gallery(event)?;
    for image in &event.images {
        if filename_in_use(conn, &image.filename, Some(event.id.as_str())).await? {
            return Err(StoreError::DuplicateFilename(image.filename.clone()));
        }
        if image_id_in_use(conn, &image.id, Some(event.id.as_str())).await? {
            return Err(StoreError::DuplicateImageId(image.id.clone()));
        }
    }
    Ok(())
}

/// Flags `hero_id` and clears every other image of the event in one statement.
async fn assign_hero<C: ConnectionTrait>(
    conn: &C,
    event_id: &str,
    hero_id: &str,
) -> Result<(), DbErr> {
    event_images::Entity::update_many()
        .col_expr(
            event_images::Column::IsHero,
            Expr::col(event_images::Column::Id).eq(hero_id),
        )
        .filter(event_images::Column::EventId.eq(event_id))
        .exec(conn)
        .await?;
    Ok(())
}

async fn clear_hero<C: ConnectionTrait>(conn: &C, event_id: &str) -> Result<(), DbErr> {
    event_images::Entity::update_many()
        .col_expr(event_images::Column::IsHero, Expr::value(false))
        .filter(event_images::Column::EventId.eq(event_id))
        .exec(conn)
        .await?;
    Ok(())
}

/// Stamps `updated_at` and, when given, replaces `hero_poster`.
async fn touch<C: ConnectionTrait>(
    conn: &C,
    event: events::Model,
    hero_poster: Option<String>,
    now: DateTime<Utc>,
) -> Result<events::Model, DbErr> {
    let updated_at = clock::after(event.updated_at, now);
    let mut row: events::ActiveModel = event.into();
    if let Some(hero_poster) = hero_poster {
        row.hero_poster = Set(hero_poster);
    }
    row.updated_at = Set(updated_at);
    row.update(conn).await
}

fn position_of(index: usize) -> i32 {
    i32::try_from(index).unwrap_or(i32::MAX)
}

#[async_trait]
impl EventStore for DatabaseStore {
    async fn list(&self) -> StoreResult<Vec<Event>> {
        let models = events::Entity::find()
            .order_by_asc(events::Column::CreatedAt)
            .order_by_asc(events::Column::Id)
            .all(&self.db)
            .await?;
        Ok(models
            .into_iter()
            .map(|model| to_event(model, Vec::new()))
            .collect())
    }

    async fn list_visible(&self) -> StoreResult<Vec<Event>> {
        let models = events::Entity::find()
            .filter(events::Column::Visible.eq(true))
            .order_by_asc(events::Column::CreatedAt)
            .order_by_asc(events::Column::Id)
            .all(&self.db)
            .await?;
        Ok(models
            .into_iter()
            .map(|model| to_event(model, Vec::new()))
            .collect())
    }

    async fn get(&self, id: &str) -> StoreResult<Option<Event>> {
        let Some(model) = events::Entity::find_by_id(id).one(&self.db).await? else {
            return Ok(None);
        };
        let images = gallery(&self.db, id).await?;
        Ok(Some(to_event(model, images)))
    }

    async fn create(&self, event: Event) -> StoreResult<Event> {
        let txn = self.db.begin().await?;
        check_unique_images(&txn, &event).await?;
        events::Entity::insert(event_row(&event))
            .exec_without_returning(&txn)
            .await?;
        for (index, image) in event.images.iter().enumerate() {
            insert_image(&txn, &event.id, image, position_of(index)).await?;
        }
        txn.commit().await?;
        Ok(event)
    }

    async fn update(
        &self,
        id: &str,
        patch: &EventPatch,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Event>> {
        let txn = self.db.begin().await?;
        let Some(model) = events::Entity::find_by_id(id).one(&txn).await? else {
            return Ok(None);
        };
        let updated_at = clock::after(model.updated_at, now);
        let mut row: events::ActiveModel = model.into();
        if let Some(title) = &patch.title {
            row.title = Set(title.clone());
        }
        if let Some(description) = &patch.description {
            row.description = Set(description.clone());
        }
        if let Some(date) = patch.date {
            row.date = Set(date);
        }
        if let Some(category) = &patch.category {
            row.category = Set(category.clone());
        }
        if let Some(visible) = patch.visible {
            row.visible = Set(Some(visible));
        }
        row.updated_at = Set(updated_at);
        let model = row.update(&txn).await?;
        let images = gallery(&txn, id).await?;
        txn.commit().await?;
        Ok(Some(to_event(model, images)))
    }

    async fn delete(&self, id: &str) -> StoreResult<bool> {
        let txn = self.db.begin().await?;
        event_images::Entity::delete_many()
            .filter(event_images::Column::EventId.eq(id))
            .exec(&txn)
            .await?;
        let result = events::Entity::delete_by_id(id).exec(&txn).await?;
        if result.rows_affected == 0 {
            return Ok(false);
        }
        txn.commit().await?;
        Ok(true)
    }

    async fn add_image(
        &self,
        event_id: &str,
        mut image: EventImage,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<EventImage>> {
        let txn = self.db.begin().await?;
        let Some(event) = events::Entity::find_by_id(event_id).one(&txn).await? else {
            return Ok(None);
        };
        if filename_in_use(&txn, &image.filename, None).await? {
            return Err(StoreError::DuplicateFilename(image.filename));
        }
        if image_id_in_use(&txn, &image.id, None).await? {
            return Err(StoreError::DuplicateImageId(image.id));
        }
        let last = event_images::Entity::find()
            .filter(event_images::Column::EventId.eq(event_id))
            .order_by_desc(event_images::Column::Position)
            .one(&txn)
            .await?;
        let position = last.as_ref().map_or(0, |last| last.position.saturating_add(1));

        image.is_hero = image.is_hero || last.is_none();
        if image.is_hero {
            clear_hero(&txn, event_id).await?;
        }
        insert_image(&txn, event_id, &image, position).await?;
        let hero_poster = image.is_hero.then(|| image.filename.clone());
        touch(&txn, event, hero_poster, now).await?;
        txn.commit().await?;
        Ok(Some(image))
    }

    async fn update_image(
        &self,
        event_id: &str,
        image_id: &str,
        changes: &ImageChanges,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<EventImage>> {
        let txn = self.db.begin().await?;
        let Some(image) = find_image(&txn, event_id, image_id).await? else {
            return Ok(None);
        };
        let Some(event) = events::Entity::find_by_id(event_id).one(&txn).await? else {
            return Ok(None);
        };

        // (id, filename) of the image that ends up as hero, when it changes
        let new_hero = match changes.is_hero {
            Some(true) => Some((image.id.clone(), image.filename.clone())),
            Some(false) if image.is_hero => event_images::Entity::find()
                .filter(event_images::Column::EventId.eq(event_id))
                .filter(event_images::Column::Id.ne(image_id))
                .order_by_asc(event_images::Column::Position)
                .one(&txn)
                .await?
                .map(|next| (next.id, next.filename)),
            _ => None,
        };

        if let Some(alt) = &changes.alt {
            let mut row: event_images::ActiveModel = image.into();
            row.alt = Set(alt.clone());
            row.update(&txn).await?;
        }
        let hero_poster = match new_hero {
            Some((hero_id, filename)) => {
                assign_hero(&txn, event_id, &hero_id).await?;
                Some(filename)
            }
            None => None,
        };
        touch(&txn, event, hero_poster, now).await?;

        let updated = find_image(&txn, event_id, image_id)
            .await?
            .ok_or_else(|| DbErr::RecordNotFound(format!("image '{image_id}' vanished")))?;
        txn.commit().await?;
        Ok(Some(updated.into()))
    }

    async fn delete_image(
        &self,
        event_id: &str,
        image_id: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let txn = self.db.begin().await?;
        let Some(image) = find_image(&txn, event_id, image_id).await? else {
            return Ok(false);
        };
        let Some(event) = events::Entity::find_by_id(event_id).one(&txn).await? else {
            return Ok(false);
        };
        event_images::Entity::delete_by_id(image_id).exec(&txn).await?;

        let hero_poster = if image.is_hero || event.hero_poster == image.filename {
            match gallery(&txn, event_id).await?.into_iter().next() {
                Some(next) => {
                    assign_hero(&txn, event_id, &next.id).await?;
                    Some(next.filename)
                }
                None => Some(String::new()),
            }
        } else {
            None
        };
        touch(&txn, event, hero_poster, now).await?;
        txn.commit().await?;
        Ok(true)
    }

    async fn set_hero(
        &self,
        event_id: &str,
        image_id: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let txn = self.db.begin().await?;
        let Some(image) = find_image(&txn, event_id, image_id).await? else {
            return Ok(false);
        };
        let Some(event) = events::Entity::find_by_id(event_id).one(&txn).await? else {
            return Ok(false);
        };
        assign_hero(&txn, event_id, &image.id).await?;
        touch(&txn, event, Some(image.filename), now).await?;
        txn.commit().await?;
        Ok(true)
    }

    async fn upsert(&self, event: Event) -> StoreResult<()> {
        let txn = self.db.begin().await?;
        check_unique_images(&txn, &event).await?;

        let exists = events::Entity::find_by_id(event.id.as_str())
            .one(&txn)
            .await?
            .is_some();
        if exists {
            events::Entity::update(event_row(&event)).exec(&txn).await?;
        } else {
            events::Entity::insert(event_row(&event))
                .exec_without_returning(&txn)
                .await?;
        }

        event_images::Entity::delete_many()
            .filter(event_images::Column::EventId.eq(event.id.as_str()))
            .exec(&txn)
            .await?;
        for (index, image) in event.images.iter().enumerate() {
            insert_image(&txn, &event.id, image, position_of(index)).await?;
        }
        txn.commit().await?;
        Ok(())
    }
}
