use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Videos::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Videos::Id).uuid().not_null().primary_key())
                    .col(
                        ColumnDef::new(Videos::VideoId)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Videos::ChannelId).string().not_null())
                    .col(ColumnDef::new(Videos::VideoUrl).string().not_null())
                    .col(ColumnDef::new(Videos::Title).text().null())
                    .col(
                        ColumnDef::new(Videos::PublishedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Videos::Status)
                            .string_len(20)
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        ColumnDef::new(Videos::RetryCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Videos::LastAttemptAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(ColumnDef::new(Videos::LastError).text().null())
                    .col(
                        ColumnDef::new(Videos::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Videos::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // The pipeline picks the oldest pending row on every run.
        manager
            .create_index(
                Index::create()
                    .name("idx-videos-status-published_at")
                    .table(Videos::Table)
                    .col(Videos::Status)
                    .col(Videos::PublishedAt)
                    .if_not_exists()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Videos::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub(super) enum Videos {
    Table,
    Id,
    VideoId,
    ChannelId,
    VideoUrl,
    Title,
    PublishedAt,
    Status,
    RetryCount,
    LastAttemptAt,
    LastError,
    CreatedAt,
    UpdatedAt,
}
