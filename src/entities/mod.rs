pub mod beer_rating;
pub mod movie_cache;
