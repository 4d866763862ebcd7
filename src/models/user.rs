//! User model.

use serde::{Deserialize, Serialize};

use super::Movie;

/// A user and the movies on their shelf, in insertion order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub movies: Vec<Movie>,
}

impl User {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            movies: Vec::new(),
        }
    }

    /// Id the next movie added to this shelf will get.
    pub fn next_movie_id(&self) -> i64 {
        self.movies.len() as i64 + 1
    }

    pub fn has_movie_named(&self, name: &str) -> bool {
        self.movies.iter().any(|m| m.name == name)
    }

    /// Rewrite movie ids to `1..=N`, keeping the current order.
    pub fn renumber_movies(&mut self) {
        for (index, movie) in self.movies.iter_mut().enumerate() {
            movie.id = index as i64 + 1;
        }
    }
}

/// Request body for creating a new user.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn movie(id: i64, name: &str) -> Movie {
        Movie {
            id,
            name: name.to_string(),
            director: String::new(),
            year: 2000,
            rating: 7.0,
            poster: String::new(),
            plot: String::new(),
        }
    }

    #[test]
    fn test_next_movie_id_counts_from_one() {
        let mut user = User::new(1, "Alice");
        assert_eq!(user.next_movie_id(), 1);
        user.movies.push(movie(1, "Heat"));
        assert_eq!(user.next_movie_id(), 2);
    }

    #[test]
    fn test_renumber_keeps_order() {
        let mut user = User::new(1, "Alice");
        user.movies = vec![movie(1, "A"), movie(3, "C"), movie(7, "D")];
        user.renumber_movies();

        let ids: Vec<i64> = user.movies.iter().map(|m| m.id).collect();
        let names: Vec<&str> = user.movies.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(names, vec!["A", "C", "D"]);
    }

    #[test]
    fn test_has_movie_named_is_case_sensitive() {
        let mut user = User::new(1, "Alice");
        user.movies.push(movie(1, "Inception"));
        assert!(user.has_movie_named("Inception"));
        assert!(!user.has_movie_named("inception"));
    }

    #[test]
    fn test_missing_movies_key_defaults_to_empty() {
        let user: User = serde_json::from_str(r#"{"id": 4, "name": "Olu"}"#).unwrap();
        assert!(user.movies.is_empty());
    }
}
