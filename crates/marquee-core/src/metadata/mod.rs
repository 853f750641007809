//! Movie metadata lookups.
//!
//! [`TmdbClient`] is the primary source; [`OmdbClient`] only supplies a
//! poster when TMDB has no match.

mod omdb;
mod provider;
mod tmdb;

pub use omdb::{OmdbClient, OMDB_API_BASE};
pub use provider::{
    best_match, Credits, MetadataError, MetadataProvider, MetadataResult, MovieMetadata,
    PosterSource, SearchHit,
};
pub use tmdb::{TmdbClient, TmdbConfig, TMDB_API_BASE, TMDB_IMAGE_BASE};
