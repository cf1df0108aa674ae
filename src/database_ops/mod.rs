pub mod db;
pub mod exchange;
pub mod models;
pub mod prices;
pub mod reference;
pub mod scraper_runs;
