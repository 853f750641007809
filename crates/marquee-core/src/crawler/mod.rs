//! Directory-listing crawler.

mod filename;
mod listing;
mod walker;

pub use filename::{
    clean_title_for_search, extract_last_modified, is_extra, is_media, parse_title_year,
    strip_media_ext, ParsedName, MEDIA_EXTS,
};
pub use listing::{as_directory, parse_listing, H5aiListing, ListingEntry, ListingSource};
pub use walker::{CrawlEvent, CrawlOptions, CrawledTitle, Crawler};
