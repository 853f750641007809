#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod crawler;
pub mod error;
pub mod metadata;
pub mod movie;
pub mod network;
pub mod search;
pub mod source;
pub mod storage;
pub mod sync;

pub use config::{AppConfig, ConfigError};
pub use crawler::{
    parse_listing, parse_title_year, CrawlEvent, CrawlOptions, CrawledTitle, Crawler,
    H5aiListing, ListingEntry, ListingSource, ParsedName,
};
pub use error::{Error, Result};
pub use metadata::{
    Credits, MetadataError, MetadataProvider, MovieMetadata, OmdbClient, PosterSource, SearchHit,
    TmdbClient, TmdbConfig,
};
pub use movie::{CastMember, Director, MetadataStatus, Movie, MovieDetail, MovieSummary, NewMovie};
pub use network::{ClientError, HttpClient, NetworkConfig};
pub use search::{GenreMode, SearchPage, SearchParams, SearchQuery, SortField};
pub use source::{CrawlSource, CrawledDirectory, FailedParse, FailureReason};
pub use storage::{CollectionStats, Storage};
pub use sync::{
    missing_report, CrawlJob, CrawlStats, CreditsSelection, Enricher, JobFailure, JobReport,
    MissingEntry, RefreshSelection,
};
