//! User API endpoints.

use axum::{
    extract::{Path, State},
    Json,
};

use super::{success, ApiResult};
use crate::errors::AppError;
use crate::models::{CreateUserRequest, User};
use crate::AppState;

/// GET /api/users - List all users with their shelves.
pub async fn list_users(State(state): State<AppState>) -> ApiResult<Vec<User>> {
    success(state.store.list_users().await?)
}

/// GET /api/users/names - List user names in storage order.
pub async fn list_user_names(State(state): State<AppState>) -> ApiResult<Vec<String>> {
    success(state.store.list_user_names().await?)
}

/// GET /api/users/:user_id - Get a single user.
pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> ApiResult<User> {
    let user = state
        .store
        .list_users()
        .await?
        .into_iter()
        .find(|u| u.id == user_id)
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))?;
    success(user)
}

/// POST /api/users - Create a new user.
pub async fn create_user(
    State(state): State<AppState>,
    Json(request): Json<CreateUserRequest>,
) -> ApiResult<User> {
    if request.name.trim().is_empty() {
        return Err(AppError::Validation("Name is required".to_string()));
    }

    success(state.store.add_user(&request.name).await?)
}
