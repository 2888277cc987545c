//! カタログ検索と商品URLの収集

mod collector;
pub mod selectors;

pub use collector::{CollectReport, ListingCollector};
