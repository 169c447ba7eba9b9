//! SeaORM entity for the options table

use sea_orm::entity::prelude::*;

/// One stored options record, site or network
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "content_filter_options")]
pub struct Model {
    /// `site` or `network` (part of composite primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub scope: String,

    /// Site identifier; 0 for the network record (part of composite primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub site_id: i64,

    /// Record body as JSON, structured or legacy flat
    pub data: Json,

    /// Last write timestamp
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
