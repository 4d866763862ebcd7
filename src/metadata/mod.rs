//! Movie metadata lookups.
//!
//! The store only needs "title in, canonical record out"; the OMDb client is
//! the production implementation.

mod omdb;

pub use omdb::*;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::Movie;

/// Metadata lookup errors
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Movie not found: {0}")]
    NotFound(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Malformed response: {0}")]
    Malformed(String),
}

/// Canonical record returned by a successful lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct MovieMetadata {
    pub title: String,
    pub director: String,
    pub year: i32,
    pub rating: f64,
    pub poster: String,
    pub plot: String,
}

impl MovieMetadata {
    /// Build the shelf entry for this record.
    pub fn into_movie(self, id: i64) -> Movie {
        Movie {
            id,
            name: self.title,
            director: self.director,
            year: self.year,
            rating: self.rating,
            poster: self.poster,
            plot: self.plot,
        }
    }
}

/// Something that can resolve a user-typed title to a canonical record.
#[async_trait]
pub trait MovieLookup: Send + Sync {
    async fn lookup(&self, title: &str) -> Result<MovieMetadata, MetadataError>;
}
