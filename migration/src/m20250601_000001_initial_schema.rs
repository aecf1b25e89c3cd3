use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create responses table
        manager
            .create_table(
                Table::create()
                    .table(Responses::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Responses::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Responses::StatusCode).integer().not_null())
                    .col(ColumnDef::new(Responses::TextHash).string())
                    .col(
                        ColumnDef::new(Responses::HasCompressedText)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Responses::IsCloudflare)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Responses::S3ObjectKey).string())
                    .col(ColumnDef::new(Responses::RedisCacheKey).string())
                    .col(ColumnDef::new(Responses::Headers).json())
                    .col(
                        ColumnDef::new(Responses::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Create requests table
        manager
            .create_table(
                Table::create()
                    .table(Requests::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Requests::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Requests::Url).string().not_null())
                    .col(ColumnDef::new(Requests::LookupKey).string().not_null())
                    .col(ColumnDef::new(Requests::Status).string().not_null())
                    .col(ColumnDef::new(Requests::Source).string())
                    .col(ColumnDef::new(Requests::FetchOptions).json())
                    .col(
                        ColumnDef::new(Requests::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(Requests::NextRetryDate).timestamp_with_time_zone())
                    .col(ColumnDef::new(Requests::ErrorMessage).text())
                    .col(ColumnDef::new(Requests::ResponseId).uuid())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_requests_response_id")
                            .from(Requests::Table, Requests::ResponseId)
                            .to(Responses::Table, Responses::Id),
                    )
                    .to_owned(),
            )
            .await?;

        // Create response_bodies table (inline tier, keyed by content hash)
        manager
            .create_table(
                Table::create()
                    .table(ResponseBodies::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ResponseBodies::Hash)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ResponseBodies::Content)
                            .binary()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ResponseBodies::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Requests::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Responses::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ResponseBodies::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Requests {
    Table,
    Id,
    Url,
    LookupKey,
    Status,
    Source,
    FetchOptions,
    CreatedAt,
    NextRetryDate,
    ErrorMessage,
    ResponseId,
}

#[derive(DeriveIden)]
enum Responses {
    Table,
    Id,
    StatusCode,
    TextHash,
    HasCompressedText,
    IsCloudflare,
    S3ObjectKey,
    RedisCacheKey,
    Headers,
    CreatedAt,
}

#[derive(DeriveIden)]
enum ResponseBodies {
    Table,
    Hash,
    Content,
    CreatedAt,
}
