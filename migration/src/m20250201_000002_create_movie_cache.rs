use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(MovieCache::Table)
                    .if_not_exists()
                    .col(string(MovieCache::ImdbId).primary_key())
                    .col(string_null(MovieCache::Title))
                    .col(string_null(MovieCache::Year))
                    .col(string_null(MovieCache::Poster))
                    .col(text_null(MovieCache::Plot))
                    .col(string_null(MovieCache::Director))
                    .col(string_null(MovieCache::Actors))
                    .col(string_null(MovieCache::Genre))
                    .col(string_null(MovieCache::Runtime))
                    .col(string_null(MovieCache::ImdbRating))
                    .col(string_null(MovieCache::Rated))
                    .col(big_integer(MovieCache::CachedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_movie_cache_cached_at")
                    .table(MovieCache::Table)
                    .col(MovieCache::CachedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(MovieCache::Table).to_owned()).await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum MovieCache {
    Table,
    ImdbId,
    Title,
    Year,
    Poster,
    Plot,
    Director,
    Actors,
    Genre,
    Runtime,
    ImdbRating,
    Rated,
    CachedAt,
}
