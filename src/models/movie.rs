//! Movie model and partial-update payloads.

use serde::{Deserialize, Deserializer, Serialize};

/// A movie on a user's shelf.
///
/// `id` is scoped to the owning user and is reassigned whenever an earlier
/// movie on the same shelf is deleted, so it must not be stored elsewhere as
/// a reference.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Movie {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub director: String,
    #[serde(deserialize_with = "year_from_number_or_string")]
    pub year: i32,
    pub rating: f64,
    #[serde(default)]
    pub poster: String,
    #[serde(default)]
    pub plot: String,
}

/// Parse a release year from its leading digits.
///
/// Accepts the shapes OMDb hands out: `"2010"`, `"2010–2012"` and `"2019–"`.
pub fn parse_year(raw: &str) -> Option<i32> {
    let digits: String = raw
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .take(4)
        .collect();
    if digits.len() != 4 {
        return None;
    }
    digits.parse().ok()
}

// Older documents stored the year as the raw OMDb string.
fn year_from_number_or_string<'de, D>(deserializer: D) -> Result<i32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawYear {
        Number(i32),
        Text(String),
    }

    match RawYear::deserialize(deserializer)? {
        RawYear::Number(year) => Ok(year),
        RawYear::Text(text) => parse_year(&text)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid year: {:?}", text))),
    }
}

/// Field-level update for a movie. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MovieUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub director: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub poster: Option<String>,
    #[serde(default)]
    pub plot: Option<String>,
}

impl MovieUpdate {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Merge the supplied fields into `movie`.
    pub fn apply(&self, movie: &mut Movie) {
        if let Some(name) = &self.name {
            movie.name = name.clone();
        }
        if let Some(director) = &self.director {
            movie.director = director.clone();
        }
        if let Some(year) = self.year {
            movie.year = year;
        }
        if let Some(rating) = self.rating {
            movie.rating = rating;
        }
        if let Some(poster) = &self.poster {
            movie.poster = poster.clone();
        }
        if let Some(plot) = &self.plot {
            movie.plot = plot.clone();
        }
    }
}

/// Request body for adding a movie by title.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddMovieRequest {
    pub title: String,
}
