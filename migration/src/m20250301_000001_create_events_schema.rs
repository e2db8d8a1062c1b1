use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Events::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Events::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Events::Title).string().not_null())
                    .col(ColumnDef::new(Events::Description).text().not_null())
                    .col(ColumnDef::new(Events::Date).date().not_null())
                    .col(ColumnDef::new(Events::Category).string().not_null())
                    .col(
                        ColumnDef::new(Events::HeroPoster)
                            .string()
                            .not_null()
                            .default(""),
                    )
                    // Unset means hidden from public listings
                    .col(ColumnDef::new(Events::Visible).boolean().null())
                    .col(
                        ColumnDef::new(Events::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Events::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(EventImages::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(EventImages::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(EventImages::EventId).string().not_null())
                    .col(
                        ColumnDef::new(EventImages::Filename)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(EventImages::Alt)
                            .string()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(EventImages::IsHero)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(EventImages::Position).integer().not_null())
                    .col(
                        ColumnDef::new(EventImages::UploadedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_event_images_event_id")
                            .from(EventImages::Table, EventImages::EventId)
                            .to(Events::Table, Events::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::NoAction),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_event_images_event_id")
                    .table(EventImages::Table)
                    .col(EventImages::EventId)
                    .col(EventImages::Position)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_events_visible_created_at")
                    .table(Events::Table)
                    .col(Events::Visible)
                    .col(Events::CreatedAt)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(EventImages::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Events::Table).if_exists().to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Events {
    Table,
    Id,
    Title,
    Description,
    Date,
    Category,
    HeroPoster,
    Visible,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum EventImages {
    Table,
    Id,
    EventId,
    Filename,
    Alt,
    IsHero,
    Position,
    UploadedAt,
}
