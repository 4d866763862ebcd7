//! Data store for users and their movie shelves.
//!
//! Every operation reloads the whole document from its backend; nothing is
//! cached between calls. Mutations go through one writer at a time.

mod document;
mod json;
mod sqlite;

pub use json::JsonStore;
pub use sqlite::{init_database, SqliteStore};

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::{Config, StoreBackend};
use crate::metadata::{MetadataError, MovieLookup};
use crate::models::{Movie, MovieUpdate, User};

/// Typed outcome of a failed store operation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("User {0} not found")]
    UserNotFound(i64),

    #[error("Movie {movie_id} not found for user {user_id}")]
    MovieNotFound { user_id: i64, movie_id: i64 },

    #[error("Movie already exists: {0}")]
    DuplicateMovie(String),

    #[error("Metadata lookup failed: {0}")]
    Upstream(#[from] MetadataError),

    #[error("Persistence failure: {0}")]
    Persistence(String),

    #[error("Store has no users")]
    EmptyStore,
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Database error: {:?}", err);
        StoreError::Persistence(format!("Database error: {}", err))
    }
}

/// Read-modify-write contract shared by the JSON file and SQLite backends.
///
/// The read helpers have default implementations on top of [`load`]; backends
/// override them when they can answer more cheaply.
///
/// [`load`]: DataManager::load
#[async_trait]
pub trait DataManager: Send + Sync {
    /// Read the entire document. A store that was never written is empty.
    async fn load(&self) -> Result<Vec<User>, StoreError>;

    /// Replace the entire document.
    async fn persist(&self, users: &[User]) -> Result<(), StoreError>;

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        self.load().await
    }

    async fn list_user_names(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.load().await?.into_iter().map(|u| u.name).collect())
    }

    async fn find_user(&self, user_id: i64) -> Result<bool, StoreError> {
        Ok(self.load().await?.iter().any(|u| u.id == user_id))
    }

    /// `max(id) + 1`; fails with [`StoreError::EmptyStore`] when there are no users.
    async fn next_user_id(&self) -> Result<i64, StoreError> {
        document::next_user_id(&self.load().await?)
    }

    async fn next_movie_id(&self, user_id: i64) -> Result<i64, StoreError> {
        let users = self.load().await?;
        Ok(document::user(&users, user_id)?.next_movie_id())
    }

    async fn list_movies(&self, user_id: i64) -> Result<Vec<Movie>, StoreError> {
        let users = self.load().await?;
        Ok(document::user(&users, user_id)?.movies.clone())
    }

    async fn get_movie(&self, user_id: i64, movie_id: i64) -> Result<Movie, StoreError> {
        let users = self.load().await?;
        document::movie(&users, user_id, movie_id).cloned()
    }

    /// Append a user with an empty shelf. Names need not be unique.
    async fn add_user(&self, name: &str) -> Result<User, StoreError>;

    /// Resolve `title` through `lookup` and put the canonical record on the
    /// user's shelf, unless a movie with that canonical title is already there.
    async fn add_movie(
        &self,
        title: &str,
        user_id: i64,
        lookup: &dyn MovieLookup,
    ) -> Result<Movie, StoreError>;

    /// Remove one movie and renumber the rest of the shelf to `1..N`.
    async fn delete_movie(&self, user_id: i64, movie_id: i64) -> Result<(), StoreError>;

    /// Overwrite only the fields present in `update`.
    async fn update_movie_info(
        &self,
        user_id: i64,
        movie_id: i64,
        update: &MovieUpdate,
    ) -> Result<Movie, StoreError>;
}

/// Open the backend selected in the configuration.
pub async fn open_store(config: &Config) -> Result<Arc<dyn DataManager>, StoreError> {
    match config.store_backend {
        StoreBackend::Json => {
            let store = JsonStore::new(&config.data_path);
            tracing::info!("Using JSON document store at {:?}", store.path());
            Ok(Arc::new(store))
        }
        StoreBackend::Sqlite => {
            tracing::info!("Using SQLite store at {:?}", config.db_path);
            let pool = init_database(&config.db_path).await?;
            Ok(Arc::new(SqliteStore::new(pool)))
        }
    }
}
