use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(BeerRatings::Table)
                    .if_not_exists()
                    .col(string(BeerRatings::Id).primary_key())
                    .col(string(BeerRatings::ImdbId).unique_key())
                    .col(integer(BeerRatings::ConfusionBeers))
                    .col(integer(BeerRatings::EnhancementBeers))
                    .col(text(BeerRatings::RatingBlurb).default(""))
                    .col(text(BeerRatings::Tags).default("[]"))
                    .col(big_integer(BeerRatings::CreatedAt))
                    .col(big_integer(BeerRatings::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_beer_ratings_created_at")
                    .table(BeerRatings::Table)
                    .col(BeerRatings::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(BeerRatings::Table).to_owned()).await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum BeerRatings {
    Table,
    Id,
    ImdbId,
    ConfusionBeers,
    EnhancementBeers,
    RatingBlurb,
    Tags,
    CreatedAt,
    UpdatedAt,
}
