//! Database migrations for the content filter

use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(m20250301_000001_create_content_filter_options::Migration)]
    }
}

mod m20250301_000001_create_content_filter_options {
    use super::*;

    #[derive(DeriveMigrationName)]
    pub struct Migration;

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(ContentFilterOptions::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ContentFilterOptions::Scope)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ContentFilterOptions::SiteId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ContentFilterOptions::Data).json().not_null())
                        .col(
                            ColumnDef::new(ContentFilterOptions::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null()
                                .default(Expr::current_timestamp()),
                        )
                        .primary_key(
                            Index::create()
                                .col(ContentFilterOptions::Scope)
                                .col(ContentFilterOptions::SiteId),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ContentFilterOptions::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum ContentFilterOptions {
        Table,
        Scope,
        SiteId,
        Data,
        UpdatedAt,
    }
}
