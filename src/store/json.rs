//! JSON document backend.
//!
//! The document is a top-level array of users written as one file. Writes go
//! to a sibling `<file name>.tmp` file that is then renamed over the target,
//! so a reader never sees a half-written document.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{document, DataManager, StoreError};
use crate::metadata::MovieLookup;
use crate::models::{Movie, MovieUpdate, User};

/// Flat-file store. Readers go straight to disk; writers are serialized.
pub struct JsonStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

fn persistence_error(action: &str, path: &Path, err: impl std::fmt::Display) -> StoreError {
    tracing::error!("Failed to {} {:?}: {}", action, path, err);
    StoreError::Persistence(format!("Failed to {} {}: {}", action, path.display(), err))
}

impl JsonStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `movies.json` is staged as `movies.json.tmp`.
    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }

    async fn write_document(&self, users: &[User]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| persistence_error("create directory for", &self.path, e))?;
            }
        }

        let json = serde_json::to_vec_pretty(users)
            .map_err(|e| persistence_error("serialize", &self.path, e))?;

        let tmp_path = self.tmp_path();
        tokio::fs::write(&tmp_path, &json)
            .await
            .map_err(|e| persistence_error("write", &tmp_path, e))?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .map_err(|e| persistence_error("replace", &self.path, e))?;

        Ok(())
    }

    /// Load, apply `mutation`, persist. The document is only written when
    /// `mutation` succeeds.
    async fn mutate<T, F>(&self, mutation: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Vec<User>) -> Result<T, StoreError> + Send,
        T: Send,
    {
        let _guard = self.write_lock.lock().await;

        let mut users = self.load().await?;
        let outcome = mutation(&mut users)?;
        self.write_document(&users).await?;
        Ok(outcome)
    }
}

#[async_trait]
impl DataManager for JsonStore {
    async fn load(&self) -> Result<Vec<User>, StoreError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(persistence_error("read", &self.path, e)),
        };

        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        serde_json::from_str(&content).map_err(|e| persistence_error("parse", &self.path, e))
    }

    async fn persist(&self, users: &[User]) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        self.write_document(users).await
    }

    async fn add_user(&self, name: &str) -> Result<User, StoreError> {
        let user = self
            .mutate(|users| Ok(document::insert_user(users, name)))
            .await?;
        tracing::info!(user_id = user.id, name = %user.name, "Added user");
        Ok(user)
    }

    async fn add_movie(
        &self,
        title: &str,
        user_id: i64,
        lookup: &dyn MovieLookup,
    ) -> Result<Movie, StoreError> {
        if !self.find_user(user_id).await? {
            return Err(StoreError::UserNotFound(user_id));
        }

        // Network call stays outside the writer lock.
        let metadata = lookup.lookup(title).await?;

        let movie = self
            .mutate(|users| document::insert_movie(users, user_id, metadata))
            .await?;
        tracing::info!(user_id, movie_id = movie.id, name = %movie.name, "Added movie");
        Ok(movie)
    }

    async fn delete_movie(&self, user_id: i64, movie_id: i64) -> Result<(), StoreError> {
        let removed = self
            .mutate(|users| document::remove_movie(users, user_id, movie_id))
            .await?;
        tracing::info!(user_id, movie_id, name = %removed.name, "Deleted movie");
        Ok(())
    }

    async fn update_movie_info(
        &self,
        user_id: i64,
        movie_id: i64,
        update: &MovieUpdate,
    ) -> Result<Movie, StoreError> {
        let movie = self
            .mutate(|users| document::update_movie(users, user_id, movie_id, update))
            .await?;
        tracing::info!(user_id, movie_id, "Updated movie");
        Ok(movie)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use tempfile::TempDir;

    use super::*;
    use crate::metadata::{MetadataError, MovieMetadata};

    /// Answers every title with a fixed record and counts calls.
    struct StubLookup {
        calls: AtomicUsize,
    }

    impl StubLookup {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl MovieLookup for StubLookup {
        async fn lookup(&self, title: &str) -> Result<MovieMetadata, MetadataError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match title.to_lowercase().as_str() {
                "inception" => Ok(MovieMetadata {
                    title: "Inception".to_string(),
                    director: "Christopher Nolan".to_string(),
                    year: 2010,
                    rating: 8.8,
                    poster: "-".to_string(),
                    plot: "-".to_string(),
                }),
                "unknown" => Err(MetadataError::NotFound(title.to_string())),
                other => Ok(MovieMetadata {
                    title: other.to_string(),
                    director: "Someone".to_string(),
                    year: 1999,
                    rating: 6.0,
                    poster: "-".to_string(),
                    plot: "-".to_string(),
                }),
            }
        }
    }

    fn store_in(dir: &TempDir) -> JsonStore {
        JsonStore::new(dir.path().join("movies.json"))
    }

    #[tokio::test]
    async fn test_load_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        assert!(store.load().await.unwrap().is_empty());
        assert!(store.list_user_names().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_load_blank_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        std::fs::write(store.path(), "  \n").unwrap();
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_load_corrupt_file_is_persistence_error() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        std::fs::write(store.path(), "[{\"id\": 1,").unwrap();
        assert!(matches!(
            store.load().await,
            Err(StoreError::Persistence(_))
        ));
    }

    #[tokio::test]
    async fn test_load_legacy_document() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        std::fs::write(
            store.path(),
            r#"[{"id": 1, "name": "Alice", "movies": [
                {"id": 1, "name": "Inception", "director": "Christopher Nolan", "year": "2010", "rating": 8.8}
            ]}, {"id": 3, "name": "David", "movies": []}]"#,
        )
        .unwrap();

        let users = store.load().await.unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].movies[0].year, 2010);
        assert_eq!(store.next_user_id().await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_persist_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let lookup = StubLookup::new();
        store.add_user("Alice").await.unwrap();
        store.add_movie("Inception", 1, &lookup).await.unwrap();

        let before_bytes = std::fs::read(store.path()).unwrap();
        let loaded = store.load().await.unwrap();
        store.persist(&loaded).await.unwrap();

        assert_eq!(store.load().await.unwrap(), loaded);
        assert_eq!(std::fs::read(store.path()).unwrap(), before_bytes);
        assert!(!store.tmp_path().exists());
    }

    #[tokio::test]
    async fn test_persist_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let store = JsonStore::new(dir.path().join("nested").join("data").join("movies.json"));
        store.persist(&[User::new(1, "Alice")]).await.unwrap();
        assert_eq!(store.list_user_names().await.unwrap(), vec!["Alice"]);
    }

    #[tokio::test]
    async fn test_tmp_path_is_per_file() {
        let dir = TempDir::new().unwrap();
        let json = JsonStore::new(dir.path().join("movies.json"));
        let other = JsonStore::new(dir.path().join("movies.db"));
        let staged = JsonStore::new(dir.path().join("movies.tmp"));

        assert_eq!(json.tmp_path(), dir.path().join("movies.json.tmp"));
        assert_ne!(json.tmp_path(), other.tmp_path());
        assert_ne!(staged.tmp_path().as_path(), staged.path());

        json.persist(&[User::new(1, "Alice")]).await.unwrap();
        other.persist(&[User::new(1, "Bob")]).await.unwrap();
        staged.persist(&[User::new(1, "Carol")]).await.unwrap();

        assert_eq!(json.list_user_names().await.unwrap(), vec!["Alice"]);
        assert_eq!(other.list_user_names().await.unwrap(), vec!["Bob"]);
        assert_eq!(staged.list_user_names().await.unwrap(), vec!["Carol"]);
        assert!(!staged.tmp_path().exists());
    }

    #[tokio::test]
    async fn test_next_user_id_on_empty_store() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        assert!(matches!(
            store.next_user_id().await,
            Err(StoreError::EmptyStore)
        ));
    }

    #[tokio::test]
    async fn test_add_user_ids_follow_max() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store
            .persist(&[User::new(1, "Alice"), User::new(5, "Eve")])
            .await
            .unwrap();

        let user = store.add_user("Frank").await.unwrap();
        assert_eq!(user.id, 6);
        assert!(user.movies.is_empty());
        assert_eq!(
            store.list_user_names().await.unwrap(),
            vec!["Alice", "Eve", "Frank"]
        );
        assert!(store.find_user(6).await.unwrap());
        assert!(!store.find_user(2).await.unwrap());
    }

    #[tokio::test]
    async fn test_add_movie_end_to_end() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let lookup = StubLookup::new();
        store.add_user("Alice").await.unwrap();

        let movie = store.add_movie("inception", 1, &lookup).await.unwrap();
        assert_eq!(movie.id, 1);
        assert_eq!(movie.name, "Inception");
        assert_eq!(movie.director, "Christopher Nolan");
        assert_eq!(movie.year, 2010);
        assert_eq!(movie.rating, 8.8);

        let again = store.add_movie("Inception", 1, &lookup).await;
        assert!(matches!(again, Err(StoreError::DuplicateMovie(_))));
        assert_eq!(store.list_movies(1).await.unwrap(), vec![movie]);
        assert_eq!(store.next_movie_id(1).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_add_movie_unknown_user_skips_lookup() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let lookup = StubLookup::new();

        let result = store.add_movie("Inception", 9, &lookup).await;
        assert!(matches!(result, Err(StoreError::UserNotFound(9))));
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_add_movie_lookup_failure_does_not_write() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let lookup = StubLookup::new();
        store.add_user("Alice").await.unwrap();
        let before = std::fs::read(store.path()).unwrap();

        let result = store.add_movie("unknown", 1, &lookup).await;
        assert!(matches!(
            result,
            Err(StoreError::Upstream(MetadataError::NotFound(_)))
        ));
        assert_eq!(std::fs::read(store.path()).unwrap(), before);
    }

    #[tokio::test]
    async fn test_list_movies_unknown_user() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        assert!(matches!(
            store.list_movies(3).await,
            Err(StoreError::UserNotFound(3))
        ));
    }

    #[tokio::test]
    async fn test_delete_movie_renumbers() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let lookup = StubLookup::new();
        store.add_user("Alice").await.unwrap();
        for title in ["heat", "ronin", "collateral"] {
            store.add_movie(title, 1, &lookup).await.unwrap();
        }

        store.delete_movie(1, 1).await.unwrap();

        let movies = store.list_movies(1).await.unwrap();
        let summary: Vec<(i64, &str)> = movies.iter().map(|m| (m.id, m.name.as_str())).collect();
        assert_eq!(summary, vec![(1, "ronin"), (2, "collateral")]);
    }

    #[tokio::test]
    async fn test_delete_missing_movie() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.add_user("Alice").await.unwrap();

        assert!(matches!(
            store.delete_movie(1, 1).await,
            Err(StoreError::MovieNotFound { .. })
        ));
        assert!(matches!(
            store.delete_movie(2, 1).await,
            Err(StoreError::UserNotFound(2))
        ));
    }

    #[tokio::test]
    async fn test_update_movie_info_rating_only() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let lookup = StubLookup::new();
        store.add_user("Alice").await.unwrap();
        let original = store.add_movie("Inception", 1, &lookup).await.unwrap();

        let update = MovieUpdate {
            rating: Some(9.5),
            ..Default::default()
        };
        let updated = store.update_movie_info(1, 1, &update).await.unwrap();

        assert_eq!(updated.rating, 9.5);
        assert_eq!(
            Movie {
                rating: original.rating,
                ..updated.clone()
            },
            original
        );
        assert_eq!(store.get_movie(1, 1).await.unwrap(), updated);
    }

    #[tokio::test]
    async fn test_update_movie_info_rename_collision() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let lookup = StubLookup::new();
        store.add_user("Alice").await.unwrap();
        store.add_movie("heat", 1, &lookup).await.unwrap();
        store.add_movie("ronin", 1, &lookup).await.unwrap();
        let before_bytes = std::fs::read(store.path()).unwrap();

        let update = MovieUpdate {
            name: Some("heat".to_string()),
            ..Default::default()
        };
        let result = store.update_movie_info(1, 2, &update).await;

        assert!(matches!(result, Err(StoreError::DuplicateMovie(t)) if t == "heat"));
        assert_eq!(std::fs::read(store.path()).unwrap(), before_bytes);
        let names: Vec<String> = store
            .list_movies(1)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.name)
            .collect();
        assert_eq!(names, vec!["heat", "ronin"]);
    }

    #[tokio::test]
    async fn test_concurrent_adds_are_not_lost() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(store_in(&dir));
        let lookup = Arc::new(StubLookup::new());
        store.add_user("Alice").await.unwrap();

        let mut handles = Vec::new();
        for i in 0..10 {
            let store = Arc::clone(&store);
            let lookup = Arc::clone(&lookup);
            handles.push(tokio::spawn(async move {
                store
                    .add_movie(&format!("movie {}", i), 1, lookup.as_ref())
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let movies = store.list_movies(1).await.unwrap();
        assert_eq!(movies.len(), 10);
        let ids: Vec<i64> = movies.iter().map(|m| m.id).collect();
        assert_eq!(ids, (1..=10).collect::<Vec<_>>());
    }
}
