pub use sea_orm_migration::prelude::*;

mod m20250201_000001_create_beer_ratings;
mod m20250201_000002_create_movie_cache;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250201_000001_create_beer_ratings::Migration),
            Box::new(m20250201_000002_create_movie_cache::Migration),
        ]
    }
}
