use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    Json,
};
use diesel::prelude::*;
use serde::Serialize;
use serde_json::Value;

use crate::error::{AppError, AppResult};
use crate::models::{NewUser, User};
use crate::schema::user;
use crate::state::AppState;
use crate::utils::json::{non_empty_str, parse_object};

#[derive(Serialize)]
pub struct UserResponse {
    pub id: i32,
    pub username: String,
    pub role: String,
}

pub fn to_user_response(user: User) -> UserResponse {
    UserResponse {
        id: user.id,
        username: user.username,
        role: user.role,
    }
}

pub async fn list_users(State(state): State<AppState>) -> AppResult<Json<Vec<UserResponse>>> {
    let mut conn = state.db()?;

    let users: Vec<User> = user::table.load(&mut conn)?;

    Ok(Json(users.into_iter().map(to_user_response).collect()))
}

pub async fn create_user(
    State(state): State<AppState>,
    body: Bytes,
) -> AppResult<(StatusCode, Json<UserResponse>)> {
    let data = parse_object(&body).map_err(AppError::bad_request)?;

    let Some(username) = non_empty_str(&data, "username") else {
        return Err(AppError::bad_request("Username is required"));
    };

    let mut conn = state.db()?;

    let existing: Option<User> = user::table
        .filter(user::username.eq(username))
        .first(&mut conn)
        .optional()?;
    if existing.is_some() {
        return Err(AppError::bad_request("Username already exists"));
    }

    // No default and no validation for role: a payload without it fails the
    // NOT NULL constraint at the store, as the frontend contract has it.
    let role = data.get("role").and_then(Value::as_str);
    let new_user = NewUser { username, role };

    let created: User = match diesel::insert_into(user::table)
        .values(&new_user)
        .get_result(&mut conn)
    {
        Ok(created) => created,
        Err(diesel::result::Error::DatabaseError(
            diesel::result::DatabaseErrorKind::UniqueViolation,
            _,
        )) => {
            return Err(AppError::bad_request("Username already exists"));
        }
        Err(err) => return Err(AppError::from(err).with_context("Failed to create user")),
    };

    Ok((StatusCode::CREATED, Json(to_user_response(created))))
}
