/// Account and session handling: register, login, refresh rotation, logout.
use serde::Serialize;
use uuid::Uuid;

use crate::db::user_repo;
use crate::error::{AppError, Result};
use crate::models::OwnerProfile;
use crate::security::password;
use crate::AppState;

/// Response body for register, login and refresh.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user: OwnerProfile,
    pub access_token: String,
    pub refresh_token: String,
}

pub async fn register(
    state: &AppState,
    email: &str,
    plaintext: &str,
    name: Option<&str>,
) -> Result<SessionResponse> {
    if user_repo::find_by_email(&state.db, email).await?.is_some() {
        return Err(AppError::Conflict("Email is already registered".to_string()));
    }

    let password_hash = password::hash_password(plaintext)?;
    // The pre-check races the unique index; a concurrent duplicate insert
    // still surfaces as Conflict, not as a database fault.
    let user = user_repo::create_user(&state.db, email, &password_hash, name)
        .await
        .map_err(|e| AppError::conflict_on_unique(e, "Email is already registered"))?;

    tracing::info!(user_id = %user.id, "user registered");
    open_session(state, user.id, &user.email, OwnerProfile::from(&user)).await
}

pub async fn login(state: &AppState, email: &str, plaintext: &str) -> Result<SessionResponse> {
    // Same message whether the email or the password is wrong
    let user = user_repo::find_by_email(&state.db, email)
        .await?
        .ok_or_else(|| AppError::Authentication("Invalid email or password".to_string()))?;

    password::verify_password(plaintext, &user.password_hash)?;

    tracing::info!(user_id = %user.id, "user logged in");
    open_session(state, user.id, &user.email, OwnerProfile::from(&user)).await
}

/// Rotate a refresh token. The presented token must validate against the
/// refresh secret AND match the one stored on the user row, so logout and
/// rotation both revoke older tokens server-side.
pub async fn refresh(state: &AppState, refresh_token: &str) -> Result<SessionResponse> {
    let claims = state.tokens.validate_refresh(refresh_token)?;
    let user_id = crate::security::jwt::subject_id(&claims)?;

    let user = user_repo::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| AppError::Authentication("Session is no longer valid".to_string()))?;

    let stored = user
        .refresh_token
        .as_deref()
        .ok_or_else(|| AppError::Authentication("Session is no longer valid".to_string()))?;
    if stored != refresh_token {
        return Err(AppError::Authentication("Session is no longer valid".to_string()));
    }
    match user.refresh_token_expires_at {
        Some(expires_at) if expires_at > chrono::Utc::now() => {}
        _ => return Err(AppError::Authentication("Session is no longer valid".to_string())),
    }

    open_session(state, user.id, &user.email, OwnerProfile::from(&user)).await
}

/// Clear the stored refresh token. Idempotent.
pub async fn logout(state: &AppState, user_id: Uuid) -> Result<()> {
    user_repo::update_refresh_token(&state.db, user_id, None, None).await?;
    tracing::info!(user_id = %user_id, "user logged out");
    Ok(())
}

pub async fn current_user(state: &AppState, user_id: Uuid) -> Result<OwnerProfile> {
    let user = user_repo::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    Ok(OwnerProfile::from(&user))
}

/// Issue a token pair and persist the refresh half for revocation.
async fn open_session(
    state: &AppState,
    user_id: Uuid,
    email: &str,
    user: OwnerProfile,
) -> Result<SessionResponse> {
    let pair = state.tokens.issue_pair(user_id, email)?;
    user_repo::update_refresh_token(
        &state.db,
        user_id,
        Some(&pair.refresh_token),
        Some(pair.refresh_expires_at),
    )
    .await?;

    Ok(SessionResponse {
        user,
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
    })
}
