//! Movie shelf API endpoints.

use axum::{
    extract::{Path, State},
    Json,
};

use super::{success, ApiResult};
use crate::errors::AppError;
use crate::models::{AddMovieRequest, Movie, MovieUpdate};
use crate::AppState;

/// GET /api/users/:user_id/movies - List a user's movies.
pub async fn list_movies(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> ApiResult<Vec<Movie>> {
    success(state.store.list_movies(user_id).await?)
}

/// GET /api/users/:user_id/movies/:movie_id - Get a single movie.
pub async fn get_movie(
    State(state): State<AppState>,
    Path((user_id, movie_id)): Path<(i64, i64)>,
) -> ApiResult<Movie> {
    success(state.store.get_movie(user_id, movie_id).await?)
}

/// POST /api/users/:user_id/movies - Look a title up and add it to the shelf.
pub async fn add_movie(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Json(request): Json<AddMovieRequest>,
) -> ApiResult<Movie> {
    let title = request.title.trim();
    if title.is_empty() {
        return Err(AppError::Validation("Title is required".to_string()));
    }

    let movie = state
        .store
        .add_movie(title, user_id, state.lookup.as_ref())
        .await?;
    success(movie)
}

/// PUT /api/users/:user_id/movies/:movie_id - Update some fields of a movie.
pub async fn update_movie(
    State(state): State<AppState>,
    Path((user_id, movie_id)): Path<(i64, i64)>,
    Json(update): Json<MovieUpdate>,
) -> ApiResult<Movie> {
    if update.is_empty() {
        return Err(AppError::Validation("No fields to update".to_string()));
    }
    if let Some(name) = &update.name {
        if name.trim().is_empty() {
            return Err(AppError::Validation("Name must not be empty".to_string()));
        }
    }

    success(
        state
            .store
            .update_movie_info(user_id, movie_id, &update)
            .await?,
    )
}

/// DELETE /api/users/:user_id/movies/:movie_id - Remove a movie.
///
/// Later movies on the shelf move down one id.
pub async fn delete_movie(
    State(state): State<AppState>,
    Path((user_id, movie_id)): Path<(i64, i64)>,
) -> ApiResult<()> {
    state.store.delete_movie(user_id, movie_id).await?;
    success(())
}
