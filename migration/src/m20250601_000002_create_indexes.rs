use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Latest-request and failure-count queries scan by lookup key and recency
        manager
            .create_index(
                Index::create()
                    .name("idx_requests_lookup_key_created_at")
                    .table(Requests::Table)
                    .col(Requests::LookupKey)
                    .col(Requests::CreatedAt)
                    .to_owned(),
            )
            .await?;

        // Due-request queries scan by retry date
        manager
            .create_index(
                Index::create()
                    .name("idx_requests_next_retry_date")
                    .table(Requests::Table)
                    .col(Requests::NextRetryDate)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_responses_text_hash")
                    .table(Responses::Table)
                    .col(Responses::TextHash)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_requests_lookup_key_created_at")
                    .table(Requests::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name("idx_requests_next_retry_date")
                    .table(Requests::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name("idx_responses_text_hash")
                    .table(Responses::Table)
                    .to_owned(),
            )
            .await
    }
}

#[derive(DeriveIden)]
enum Requests {
    Table,
    LookupKey,
    CreatedAt,
    NextRetryDate,
}

#[derive(DeriveIden)]
enum Responses {
    Table,
    TextHash,
}
