use actix_web::{web, HttpResponse};
use serde::Deserialize;
use validator::Validate;

use crate::middleware::jwt_auth::UserId;
use crate::services::credentials;
use crate::{AppState, Result};

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email)]
    pub email: String,

    #[validate(length(min = 8))]
    pub password: String,

    #[validate(length(min = 1, max = 120))]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,

    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RefreshRequest {
    #[validate(length(min = 1))]
    pub refresh_token: String,
}

/// POST /api/v1/auth/register
pub async fn register(
    state: web::Data<AppState>,
    req: web::Json<RegisterRequest>,
) -> Result<HttpResponse> {
    req.validate()?;

    let session =
        credentials::register(&state, &req.email, &req.password, req.name.as_deref()).await?;
    Ok(HttpResponse::Created().json(session))
}

/// POST /api/v1/auth/login
pub async fn login(
    state: web::Data<AppState>,
    req: web::Json<LoginRequest>,
) -> Result<HttpResponse> {
    req.validate()?;

    let session = credentials::login(&state, &req.email, &req.password).await?;
    Ok(HttpResponse::Ok().json(session))
}

/// POST /api/v1/auth/refresh
pub async fn refresh(
    state: web::Data<AppState>,
    req: web::Json<RefreshRequest>,
) -> Result<HttpResponse> {
    req.validate()?;

    let session = credentials::refresh(&state, &req.refresh_token).await?;
    Ok(HttpResponse::Ok().json(session))
}

/// POST /api/v1/auth/logout
pub async fn logout(state: web::Data<AppState>, user: UserId) -> Result<HttpResponse> {
    credentials::logout(&state, user.0).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// GET /api/v1/auth/me
pub async fn me(state: web::Data<AppState>, user: UserId) -> Result<HttpResponse> {
    let profile = credentials::current_user(&state, user.0).await?;
    Ok(HttpResponse::Ok().json(profile))
}
