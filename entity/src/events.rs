use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "events")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub title: String,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    pub date: Date,
    pub category: String,
    pub hero_poster: String,
    pub visible: Option<bool>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::event_images::Entity")]
    EventImages,
}

impl Related<super::event_images::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::EventImages.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
