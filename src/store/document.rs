//! In-memory operations on a loaded document.
//!
//! These never touch storage; the JSON backend loads, applies one of these,
//! then persists.

use super::StoreError;
use crate::metadata::MovieMetadata;
use crate::models::{Movie, MovieUpdate, User};

pub(crate) fn next_user_id(users: &[User]) -> Result<i64, StoreError> {
    users
        .iter()
        .map(|u| u.id)
        .max()
        .map(|id| id + 1)
        .ok_or(StoreError::EmptyStore)
}

pub(crate) fn user(users: &[User], user_id: i64) -> Result<&User, StoreError> {
    users
        .iter()
        .find(|u| u.id == user_id)
        .ok_or(StoreError::UserNotFound(user_id))
}

fn user_mut(users: &mut [User], user_id: i64) -> Result<&mut User, StoreError> {
    users
        .iter_mut()
        .find(|u| u.id == user_id)
        .ok_or(StoreError::UserNotFound(user_id))
}

pub(crate) fn movie(users: &[User], user_id: i64, movie_id: i64) -> Result<&Movie, StoreError> {
    user(users, user_id)?
        .movies
        .iter()
        .find(|m| m.id == movie_id)
        .ok_or(StoreError::MovieNotFound { user_id, movie_id })
}

pub(crate) fn insert_user(users: &mut Vec<User>, name: &str) -> User {
    let id = next_user_id(users).unwrap_or(1);
    let user = User::new(id, name);
    users.push(user.clone());
    user
}

pub(crate) fn insert_movie(
    users: &mut [User],
    user_id: i64,
    metadata: MovieMetadata,
) -> Result<Movie, StoreError> {
    let user = user_mut(users, user_id)?;
    if user.has_movie_named(&metadata.title) {
        return Err(StoreError::DuplicateMovie(metadata.title));
    }

    let movie = metadata.into_movie(user.next_movie_id());
    user.movies.push(movie.clone());
    Ok(movie)
}

pub(crate) fn remove_movie(
    users: &mut [User],
    user_id: i64,
    movie_id: i64,
) -> Result<Movie, StoreError> {
    let user = user_mut(users, user_id)?;
    let position = user
        .movies
        .iter()
        .position(|m| m.id == movie_id)
        .ok_or(StoreError::MovieNotFound { user_id, movie_id })?;

    let removed = user.movies.remove(position);
    user.renumber_movies();
    Ok(removed)
}

pub(crate) fn update_movie(
    users: &mut [User],
    user_id: i64,
    movie_id: i64,
    update: &MovieUpdate,
) -> Result<Movie, StoreError> {
    let user = user_mut(users, user_id)?;
    if !user.movies.iter().any(|m| m.id == movie_id) {
        return Err(StoreError::MovieNotFound { user_id, movie_id });
    }
    if let Some(name) = &update.name {
        if user.movies.iter().any(|m| m.id != movie_id && &m.name == name) {
            return Err(StoreError::DuplicateMovie(name.clone()));
        }
    }

    let movie = user
        .movies
        .iter_mut()
        .find(|m| m.id == movie_id)
        .ok_or(StoreError::MovieNotFound { user_id, movie_id })?;
    update.apply(movie);
    Ok(movie.clone())
}
