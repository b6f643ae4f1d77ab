mod categories;
mod discover;
mod fetcher;
mod items;

pub use categories::resolve_categories;
pub use discover::{discover_feed, Discovery};
pub use fetcher::{resolve_url, HttpFetcher, PageFetcher};
pub use items::list_items;
