// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use sea_orm::entity::prelude::*;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "requests")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub url: String,
    pub lookup_key: String,
    pub status: String,
    pub source: Option<String>,
    pub fetch_options: Option<Json>,
    pub created_at: ChronoDateTimeWithTimeZone,
    pub next_retry_date: Option<ChronoDateTimeWithTimeZone>,
    pub error_message: Option<String>,
    pub response_id: Option<Uuid>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
