//! SQLite backend.
//!
//! Same contract as the JSON document: `users` rows in id order, each with
//! its `movies` rows numbered `1..N` per user.

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Sqlite, Transaction};
use tokio::sync::Mutex;

use super::{DataManager, StoreError};
use crate::metadata::MovieLookup;
use crate::models::{Movie, MovieUpdate, User};

const MOVIE_COLUMNS: &str = "user_id, id, name, director, year, rating, poster, plot";

/// Initialize the database connection pool and run migrations.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool, sqlx::Error> {
    // Ensure the parent directory exists
    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }

    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    let options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        .foreign_keys(true)
        .busy_timeout(std::time::Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    // No FK-style references to movies.id anywhere: it shifts on delete.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS movies (
            user_id INTEGER NOT NULL REFERENCES users(id),
            id INTEGER NOT NULL,
            name TEXT NOT NULL,
            director TEXT NOT NULL DEFAULT '',
            year INTEGER NOT NULL,
            rating REAL NOT NULL,
            poster TEXT NOT NULL DEFAULT '',
            plot TEXT NOT NULL DEFAULT '',
            UNIQUE (user_id, id)
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_movies_user_name ON movies(user_id, name);")
        .execute(pool)
        .await?;

    Ok(())
}

/// SQLite-backed store. Mutations run in a transaction and are serialized
/// in-process so read-then-write sequences never interleave.
pub struct SqliteStore {
    pool: SqlitePool,
    write_lock: Mutex<()>,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            write_lock: Mutex::new(()),
        }
    }

    async fn user_exists(
        tx: &mut Transaction<'_, Sqlite>,
        user_id: i64,
    ) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT 1 FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&mut **tx)
            .await?;
        Ok(row.is_some())
    }

    async fn fetch_movie(
        tx: &mut Transaction<'_, Sqlite>,
        user_id: i64,
        movie_id: i64,
    ) -> Result<Movie, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM movies WHERE user_id = ? AND id = ?",
            MOVIE_COLUMNS
        ))
        .bind(user_id)
        .bind(movie_id)
        .fetch_optional(&mut **tx)
        .await?;

        if let Some(row) = row {
            return Ok(movie_from_row(&row));
        }
        if Self::user_exists(tx, user_id).await? {
            Err(StoreError::MovieNotFound { user_id, movie_id })
        } else {
            Err(StoreError::UserNotFound(user_id))
        }
    }
}

#[async_trait]
impl DataManager for SqliteStore {
    async fn load(&self) -> Result<Vec<User>, StoreError> {
        let user_rows = sqlx::query("SELECT id, name FROM users ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        let movie_rows = sqlx::query(&format!(
            "SELECT {} FROM movies ORDER BY user_id, id",
            MOVIE_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        let mut shelves: HashMap<i64, Vec<Movie>> = HashMap::new();
        for row in &movie_rows {
            let user_id: i64 = row.get("user_id");
            shelves.entry(user_id).or_default().push(movie_from_row(row));
        }

        Ok(user_rows
            .iter()
            .map(|row| {
                let id: i64 = row.get("id");
                User {
                    id,
                    name: row.get("name"),
                    movies: shelves.remove(&id).unwrap_or_default(),
                }
            })
            .collect())
    }

    async fn persist(&self, users: &[User]) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM movies").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM users").execute(&mut *tx).await?;

        for user in users {
            sqlx::query("INSERT INTO users (id, name) VALUES (?, ?)")
                .bind(user.id)
                .bind(&user.name)
                .execute(&mut *tx)
                .await?;
            for movie in &user.movies {
                insert_movie_row(&mut tx, user.id, movie).await?;
            }
        }

        tx.commit().await?;
        Ok(())
    }

    async fn list_user_names(&self) -> Result<Vec<String>, StoreError> {
        let rows = sqlx::query("SELECT name FROM users ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(|row| row.get("name")).collect())
    }

    async fn find_user(&self, user_id: i64) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT 1 FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn next_user_id(&self) -> Result<i64, StoreError> {
        let row = sqlx::query("SELECT MAX(id) AS max_id FROM users")
            .fetch_one(&self.pool)
            .await?;
        let max_id: Option<i64> = row.get("max_id");
        max_id.map(|id| id + 1).ok_or(StoreError::EmptyStore)
    }

    async fn list_movies(&self, user_id: i64) -> Result<Vec<Movie>, StoreError> {
        if !self.find_user(user_id).await? {
            return Err(StoreError::UserNotFound(user_id));
        }

        let rows = sqlx::query(&format!(
            "SELECT {} FROM movies WHERE user_id = ? ORDER BY id",
            MOVIE_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(movie_from_row).collect())
    }

    async fn add_user(&self, name: &str) -> Result<User, StoreError> {
        let _guard = self.write_lock.lock().await;

        let row = sqlx::query(
            "INSERT INTO users (id, name) VALUES ((SELECT COALESCE(MAX(id), 0) + 1 FROM users), ?) RETURNING id",
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await?;

        let user = User::new(row.get("id"), name);
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

        let metadata = lookup.lookup(title).await?;

        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        if !Self::user_exists(&mut tx, user_id).await? {
            return Err(StoreError::UserNotFound(user_id));
        }

        let duplicate = sqlx::query("SELECT 1 FROM movies WHERE user_id = ? AND name = ?")
            .bind(user_id)
            .bind(&metadata.title)
            .fetch_optional(&mut *tx)
            .await?;
        if duplicate.is_some() {
            return Err(StoreError::DuplicateMovie(metadata.title));
        }

        let count_row = sqlx::query("SELECT COUNT(*) AS movie_count FROM movies WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await?;
        let movie_count: i64 = count_row.get("movie_count");

        let movie = metadata.into_movie(movie_count + 1);
        insert_movie_row(&mut tx, user_id, &movie).await?;
        tx.commit().await?;

        tracing::info!(user_id, movie_id = movie.id, name = %movie.name, "Added movie");
        Ok(movie)
    }

    async fn delete_movie(&self, user_id: i64, movie_id: i64) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("DELETE FROM movies WHERE user_id = ? AND id = ?")
            .bind(user_id)
            .bind(movie_id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            if Self::user_exists(&mut tx, user_id).await? {
                return Err(StoreError::MovieNotFound { user_id, movie_id });
            }
            return Err(StoreError::UserNotFound(user_id));
        }

        // Close the gap in two passes so UNIQUE(user_id, id) holds after
        // every row update regardless of the order SQLite visits rows in.
        sqlx::query("UPDATE movies SET id = -id WHERE user_id = ? AND id > ?")
            .bind(user_id)
            .bind(movie_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE movies SET id = -id - 1 WHERE user_id = ? AND id < 0")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::info!(user_id, movie_id, "Deleted movie");
        Ok(())
    }

    async fn update_movie_info(
        &self,
        user_id: i64,
        movie_id: i64,
        update: &MovieUpdate,
    ) -> Result<Movie, StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        let mut movie = Self::fetch_movie(&mut tx, user_id, movie_id).await?;

        if let Some(name) = &update.name {
            let taken =
                sqlx::query("SELECT 1 FROM movies WHERE user_id = ? AND name = ? AND id <> ?")
                    .bind(user_id)
                    .bind(name)
                    .bind(movie_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            if taken.is_some() {
                return Err(StoreError::DuplicateMovie(name.clone()));
            }
        }

        update.apply(&mut movie);

        sqlx::query(
            "UPDATE movies SET name = ?, director = ?, year = ?, rating = ?, poster = ?, plot = ? WHERE user_id = ? AND id = ?",
        )
        .bind(&movie.name)
        .bind(&movie.director)
        .bind(movie.year)
        .bind(movie.rating)
        .bind(&movie.poster)
        .bind(&movie.plot)
        .bind(user_id)
        .bind(movie_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(user_id, movie_id, "Updated movie");
        Ok(movie)
    }
}

async fn insert_movie_row(
    tx: &mut Transaction<'_, Sqlite>,
    user_id: i64,
    movie: &Movie,
) -> Result<(), StoreError> {
    sqlx::query(&format!(
        "INSERT INTO movies ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        MOVIE_COLUMNS
    ))
    .bind(user_id)
    .bind(movie.id)
    .bind(&movie.name)
    .bind(&movie.director)
    .bind(movie.year)
    .bind(movie.rating)
    .bind(&movie.poster)
    .bind(&movie.plot)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

fn movie_from_row(row: &SqliteRow) -> Movie {
    Movie {
        id: row.get("id"),
        name: row.get("name"),
        director: row.get("director"),
        year: row.get("year"),
        rating: row.get("rating"),
        poster: row.get("poster"),
        plot: row.get("plot"),
    }
}
