//! OMDb API client.
//!
//! Looks movies up by exact title (`?t=`). OMDb answers HTTP 200 even when
//! nothing matches, signalling the miss with `"Response": "False"`.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::{MetadataError, MovieLookup, MovieMetadata};
use crate::models::parse_year;

pub const OMDB_DEFAULT_BASE_URL: &str = "http://www.omdbapi.com";
const USER_AGENT: &str = concat!("movie-shelf/", env!("CARGO_PKG_VERSION"));

/// Raw OMDb payload. Every field is optional so a partial answer is
/// reported as malformed instead of failing deserialization.
#[derive(Debug, Default, Deserialize)]
struct OmdbResponse {
    #[serde(rename = "Response")]
    response: Option<String>,
    #[serde(rename = "Error")]
    error: Option<String>,
    #[serde(rename = "Title")]
    title: Option<String>,
    #[serde(rename = "Director")]
    director: Option<String>,
    #[serde(rename = "Year")]
    year: Option<String>,
    #[serde(rename = "imdbRating")]
    imdb_rating: Option<String>,
    #[serde(rename = "Poster")]
    poster: Option<String>,
    #[serde(rename = "Plot")]
    plot: Option<String>,
}

fn required(field: Option<String>, name: &str) -> Result<String, MetadataError> {
    field.ok_or_else(|| MetadataError::Malformed(format!("missing field {}", name)))
}

impl OmdbResponse {
    fn into_metadata(self, requested: &str) -> Result<MovieMetadata, MetadataError> {
        if self.response.as_deref() == Some("False") {
            let reason = self.error.unwrap_or_else(|| "Movie not found!".to_string());
            return Err(MetadataError::NotFound(format!("{} ({})", requested, reason)));
        }

        let title = required(self.title, "Title")?;
        let director = required(self.director, "Director")?;
        let raw_year = required(self.year, "Year")?;
        let raw_rating = required(self.imdb_rating, "imdbRating")?;
        let poster = required(self.poster, "Poster")?;
        let plot = required(self.plot, "Plot")?;

        let year = parse_year(&raw_year)
            .ok_or_else(|| MetadataError::Malformed(format!("invalid Year {:?}", raw_year)))?;
        // serde_json writes NaN and infinities as null, which would not load back
        let rating = raw_rating
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|rating| rating.is_finite())
            .ok_or_else(|| {
                MetadataError::Malformed(format!("invalid imdbRating {:?}", raw_rating))
            })?;

        Ok(MovieMetadata {
            title,
            director,
            year,
            rating,
            poster,
            plot,
        })
    }
}

/// HTTP client for the OMDb API.
pub struct OmdbClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl OmdbClient {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, MetadataError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| MetadataError::Network(e.without_url().to_string()))?;

        Ok(Self {
            http_client,
            base_url: format!("{}/", base_url.trim_end_matches('/')),
            api_key,
        })
    }
}

#[async_trait]
impl MovieLookup for OmdbClient {
    async fn lookup(&self, title: &str) -> Result<MovieMetadata, MetadataError> {
        tracing::debug!(title = %title, "Querying OMDb");

        let mut request = self.http_client.get(&self.base_url).query(&[("t", title)]);
        if let Some(key) = &self.api_key {
            request = request.query(&[("apikey", key.as_str())]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| MetadataError::Network(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(MetadataError::Api(status.as_u16(), error_text));
        }

        let body: OmdbResponse = response
            .json()
            .await
            .map_err(|e| MetadataError::Malformed(e.without_url().to_string()))?;

        let metadata = body.into_metadata(title)?;
        tracing::debug!(
            requested = %title,
            title = %metadata.title,
            year = metadata.year,
            "Resolved movie from OMDb"
        );
        Ok(metadata)
    }
}
