use std::sync::LazyLock;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use chrono::Utc;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use super::error::ApiError;
use super::extract::ClientIp;
use super::AppState;
use crate::auth::{hash_password, verify_password};
use crate::persistence::{User, UserId};
use crate::utils::error::StoreError;

pub const MIN_PASSWORD_LEN: usize = 4;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("email pattern compiles")
});

#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub user_id: UserId,
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user_email: String,
    pub user_id: UserId,
    pub token: String,
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

fn validate(credentials: &Credentials) -> Result<(), ApiError> {
    if !is_valid_email(&credentials.email) {
        return Err(ApiError::bad_request("Invalid email"));
    }
    if credentials.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::bad_request(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters long"
        )));
    }
    Ok(())
}

/// `POST /register`
pub async fn register(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    if !state.login_limiter.allow(&ip) {
        warn!(%ip, "register rate limited");
        return Err(ApiError::TooManyRequests(
            "Too many register attempts. Please try again later.",
        ));
    }

    let Json(credentials) = payload?;
    validate(&credentials)?;

    let cost = state.bcrypt_cost;
    let password = credentials.password;
    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password, cost))
        .await
        .map_err(|err| {
            error!(error = %err, "password hashing task failed");
            ApiError::Internal("Cannot hash password")
        })?
        .map_err(|err| {
            error!(error = %err, "password hashing failed");
            ApiError::Internal("Cannot hash password")
        })?;

    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4(),
        email: credentials.email,
        password_hash,
        created_at: now,
        updated_at: now,
    };

    match state.users.create_user(&user) {
        Ok(()) => {}
        Err(StoreError::Conflict(_)) => {
            return Err(ApiError::Conflict("Email already registered"));
        }
        Err(err) => {
            error!(error = %err, "cannot save user");
            return Err(ApiError::Internal("Cannot save user"));
        }
    }

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user_id: user.id,
            email: user.email,
        }),
    ))
}

/// `POST /login`
pub async fn login(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    if !state.login_limiter.allow(&ip) {
        warn!(%ip, "login rate limited");
        return Err(ApiError::TooManyRequests(
            "Too many login attempts. Please try again later.",
        ));
    }

    let Json(credentials) = payload?;
    validate(&credentials)?;

    let user = match state.users.get_user_by_email(&credentials.email) {
        Ok(user) => user,
        Err(StoreError::NotFound) => return Err(ApiError::InvalidCredentials),
        Err(err) => {
            error!(error = %err, "cannot load user");
            return Err(ApiError::Internal("Cannot load user"));
        }
    };

    let hash = user.password_hash.clone();
    let password = credentials.password;
    let matches = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .unwrap_or(false);
    if !matches {
        return Err(ApiError::InvalidCredentials);
    }

    let token = state.jwt.issue(user.id).map_err(|err| {
        error!(error = %err, "cannot create token");
        ApiError::Internal("Cannot create token")
    })?;

    info!(user_id = %user.id, "user logged in");
    Ok(Json(LoginResponse {
        user_email: user.email,
        user_id: user.id,
        token,
    }))
}
