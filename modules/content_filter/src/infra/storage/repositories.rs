//! SeaORM repository implementation

use crate::contract::{NetworkSettings, SiteId, SiteSettings, StoredSiteRecord};
use crate::domain::repository::OptionsRepository;
use anyhow::Result;
use async_trait::async_trait;
use sea_orm::{
    ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect,
};
use std::sync::Arc;

use super::entity;
use super::mapper::{self, NETWORK_ROW_ID, NETWORK_SCOPE, SITE_SCOPE};

pub struct SeaOrmOptionsRepository {
    db: Arc<DatabaseConnection>,
}

impl SeaOrmOptionsRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    async fn find(&self, scope: &str, site_id: i64) -> Result<Option<entity::Model>> {
        Ok(entity::Entity::find_by_id((scope.to_string(), site_id))
            .one(&*self.db)
            .await?)
    }

    async fn upsert(&self, scope: &str, site_id: i64, data: serde_json::Value) -> Result<()> {
        let existing = self.find(scope, site_id).await?;
        let active = entity::ActiveModel {
            scope: Set(scope.to_string()),
            site_id: Set(site_id),
            data: Set(data),
            updated_at: Set(chrono::Utc::now()),
        };

        if existing.is_some() {
            entity::Entity::update(active).exec(&*self.db).await?;
        } else {
            entity::Entity::insert(active)
                .exec_without_returning(&*self.db)
                .await?;
        }
        Ok(())
    }

    async fn delete(&self, scope: &str, site_id: i64) -> Result<()> {
        entity::Entity::delete_by_id((scope.to_string(), site_id))
            .exec(&*self.db)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl OptionsRepository for SeaOrmOptionsRepository {
    async fn find_site(&self, site_id: SiteId) -> Result<Option<StoredSiteRecord>> {
        self.find(SITE_SCOPE, site_id)
            .await?
            .map(|row| mapper::site_record_from_json(row.data))
            .transpose()
    }

    async fn save_site(&self, site_id: SiteId, settings: &SiteSettings) -> Result<()> {
        let data = mapper::site_record_to_json(settings)?;
        self.upsert(SITE_SCOPE, site_id, data).await
    }

    async fn delete_site(&self, site_id: SiteId) -> Result<()> {
        self.delete(SITE_SCOPE, site_id).await
    }

    async fn find_network(&self) -> Result<Option<NetworkSettings>> {
        self.find(NETWORK_SCOPE, NETWORK_ROW_ID)
            .await?
            .map(|row| mapper::network_from_json(row.data))
            .transpose()
    }

    async fn save_network(&self, settings: &NetworkSettings) -> Result<()> {
        self.upsert(NETWORK_SCOPE, NETWORK_ROW_ID, mapper::network_to_json(settings))
            .await
    }

    async fn delete_network(&self) -> Result<()> {
        self.delete(NETWORK_SCOPE, NETWORK_ROW_ID).await
    }

    async fn list_site_ids(&self) -> Result<Vec<SiteId>> {
        let ids = entity::Entity::find()
            .filter(entity::Column::Scope.eq(SITE_SCOPE))
            .order_by_asc(entity::Column::SiteId)
            .select_only()
            .column(entity::Column::SiteId)
            .into_tuple::<i64>()
            .all(&*self.db)
            .await?;
        Ok(ids)
    }
}
