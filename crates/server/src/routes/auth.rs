use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    db::models::{Role, User},
    error::{AppError, Result},
    middleware::auth::MaybeAuthUser,
    services::{mailer::reset_link, oauth::OAuthProvider},
    AppState,
};

const MIN_PASSWORD_LEN: usize = 6;
const RESET_TOKEN_TTL_MINUTES: i64 = 60;
const OAUTH_STATE_TTL_MINUTES: i64 = 10;
const EMAIL_IN_USE: &str = "This email is already in use. Please try logging in.";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/me", get(me))
        .route("/password-reset", post(request_password_reset))
        .route("/password-reset/confirm", post(confirm_password_reset))
        .route("/oauth/:provider", get(start_oauth))
        .route("/oauth/:provider/callback", post(finish_oauth))
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub role: Role,
    pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserResponse,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub username: String,
    pub role: Role,
    pub auth_provider: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            username: user.username,
            role: user.role,
            auth_provider: user.auth_provider,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PasswordResetRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct PasswordResetConfirm {
    pub token: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct OAuthStartResponse {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct OAuthCallbackRequest {
    pub code: String,
    pub state: String,
    /// Role for a first-time sign-in; existing accounts keep theirs.
    pub role: Option<Role>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user id
    pub email: String,
    pub role: Role,
    pub exp: usize,
}

fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|_| AppError::Internal("Failed to hash password".to_string()))
}

fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|_| AppError::Internal("Invalid password hash".to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

fn create_token(user: &User, secret: &str, ttl_days: i64) -> Result<String> {
    let expiration = Utc::now()
        .checked_add_signed(Duration::days(ttl_days))
        .ok_or_else(|| AppError::Internal("Token expiry out of range".to_string()))?
        .timestamp() as usize;

    let claims = Claims {
        sub: user.id.clone(),
        email: user.email.clone(),
        role: user.role,
        exp: expiration,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|_| AppError::Internal("Failed to create token".to_string()))
}

fn validate_email(email: &str) -> Result<()> {
    let valid = email
        .split_once('@')
        .map(|(local, domain)| !local.is_empty() && domain.contains('.') && !domain.starts_with('.'))
        .unwrap_or(false);

    if valid && !email.contains(char::is_whitespace) {
        Ok(())
    } else {
        Err(AppError::Validation(
            "The email address is not valid. Please enter a valid email.".to_string(),
        ))
    }
}

fn validate_password(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(
            "The password is too weak. Please use at least 6 characters.".to_string(),
        ));
    }
    Ok(())
}

pub async fn find_user(pool: &sqlx::SqlitePool, user_id: &str) -> Result<User> {
    sqlx::query_as::<_, User>(
        "SELECT id, email, username, role, auth_provider, password_hash, created_at FROM users WHERE id = ?",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

/// Inserts a new account. A concurrent signup with the same email surfaces as
/// a conflict, not a database error.
async fn insert_user(pool: &sqlx::SqlitePool, user: &User) -> Result<()> {
    sqlx::query(
        "INSERT INTO users (id, email, username, role, auth_provider, password_hash, created_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&user.id)
    .bind(&user.email)
    .bind(&user.username)
    .bind(user.role)
    .bind(&user.auth_provider)
    .bind(&user.password_hash)
    .bind(&user.created_at)
    .execute(pool)
    .await
    .map_err(|e| {
        if e.as_database_error().is_some_and(|d| d.is_unique_violation()) {
            AppError::Conflict(EMAIL_IN_USE.to_string())
        } else {
            AppError::Database(e)
        }
    })?;

    Ok(())
}

async fn find_user_by_email(pool: &sqlx::SqlitePool, email: &str) -> Result<Option<User>> {
    Ok(sqlx::query_as::<_, User>(
        "SELECT id, email, username, role, auth_provider, password_hash, created_at FROM users WHERE email = ?",
    )
    .bind(email)
    .fetch_optional(pool)
    .await?)
}

fn username_from_email(email: &str) -> String {
    email.split('@').next().unwrap_or_default().to_string()
}

async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>)> {
    let email = body.email.trim().to_lowercase();
    validate_email(&email)?;
    validate_password(&body.password)?;

    // Check if user already exists
    let existing = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE email = ?")
        .bind(&email)
        .fetch_one(&state.db.pool)
        .await?;

    if existing > 0 {
        return Err(AppError::Conflict(EMAIL_IN_USE.to_string()));
    }

    let password_hash = hash_password(&body.password)?;

    let username = body
        .username
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .unwrap_or_else(|| username_from_email(&email));

    let user = User {
        id: Uuid::new_v4().to_string(),
        email,
        username,
        role: body.role,
        auth_provider: "password".to_string(),
        password_hash,
        created_at: Utc::now().to_rfc3339(),
    };

    insert_user(&state.db.pool, &user).await?;

    tracing::info!(user_id = %user.id, role = ?user.role, "account created");

    let token = create_token(&user, &state.config.jwt_secret, state.config.token_ttl_days)?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            user: user.into(),
        }),
    ))
}

async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<AuthResponse>> {
    let email = body.email.trim().to_lowercase();

    let user = find_user_by_email(&state.db.pool, &email)
        .await?
        .ok_or(AppError::Unauthorized)?;

    // Accounts created through a provider have no password until they reset one
    if user.password_hash.is_empty() || !verify_password(&body.password, &user.password_hash)? {
        return Err(AppError::Unauthorized);
    }

    let token = create_token(&user, &state.config.jwt_secret, state.config.token_ttl_days)?;

    Ok(Json(AuthResponse {
        token,
        user: user.into(),
    }))
}

async fn me(State(state): State<AppState>, caller: MaybeAuthUser) -> Result<Json<UserResponse>> {
    let caller = caller.0.ok_or(AppError::Unauthorized)?;
    let user = find_user(&state.db.pool, &caller.id).await?;
    Ok(Json(user.into()))
}

// Always 202 so the endpoint does not reveal which emails have accounts
async fn request_password_reset(
    State(state): State<AppState>,
    Json(body): Json<PasswordResetRequest>,
) -> Result<StatusCode> {
    let email = body.email.trim().to_lowercase();

    let user_id = sqlx::query_scalar::<_, String>("SELECT id FROM users WHERE email = ?")
        .bind(&email)
        .fetch_optional(&state.db.pool)
        .await?;

    let Some(user_id) = user_id else {
        tracing::debug!("password reset requested for unknown email");
        return Ok(StatusCode::ACCEPTED);
    };

    let token = Uuid::new_v4().to_string();
    let expires_at = (Utc::now() + Duration::minutes(RESET_TOKEN_TTL_MINUTES)).to_rfc3339();

    sqlx::query("INSERT INTO password_resets (token, user_id, expires_at, used) VALUES (?, ?, ?, 0)")
        .bind(&token)
        .bind(&user_id)
        .bind(&expires_at)
        .execute(&state.db.pool)
        .await?;

    tracing::info!(%user_id, "password reset token issued");

    let link = reset_link(&state.config.public_url, &token);
    if let Err(e) = state.mailer.send_password_reset(&email, &link).await {
        tracing::warn!(%user_id, "failed to send password reset email: {e}");
    }

    Ok(StatusCode::ACCEPTED)
}

async fn confirm_password_reset(
    State(state): State<AppState>,
    Json(body): Json<PasswordResetConfirm>,
) -> Result<StatusCode> {
    validate_password(&body.password)?;

    let reset = sqlx::query_as::<_, (String, String, bool)>(
        "SELECT user_id, expires_at, used FROM password_resets WHERE token = ?",
    )
    .bind(&body.token)
    .fetch_optional(&state.db.pool)
    .await?;

    let invalid = || AppError::BadRequest("This reset link is invalid or has expired.".to_string());

    let (user_id, expires_at, used) = reset.ok_or_else(invalid)?;
    let expired = chrono::DateTime::parse_from_rfc3339(&expires_at)
        .map(|t| t < Utc::now())
        .unwrap_or(true);

    if used || expired {
        return Err(invalid());
    }

    let password_hash = hash_password(&body.password)?;

    let mut tx = state.db.pool.begin().await?;

    // Claim the token first so a replay loses the race
    let claimed = sqlx::query("UPDATE password_resets SET used = 1 WHERE token = ? AND used = 0")
        .bind(&body.token)
        .execute(&mut *tx)
        .await?;
    if claimed.rows_affected() == 0 {
        return Err(invalid());
    }

    sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
        .bind(&password_hash)
        .bind(&user_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(%user_id, "password reset completed");

    Ok(StatusCode::NO_CONTENT)
}

fn provider_from_path(slug: &str) -> Result<OAuthProvider> {
    OAuthProvider::from_slug(slug)
        .ok_or_else(|| AppError::NotFound(format!("Unknown sign-in provider: {slug}")))
}

async fn start_oauth(
    State(state): State<AppState>,
    Path(provider): Path<String>,
) -> Result<Json<OAuthStartResponse>> {
    let provider = provider_from_path(&provider)?;
    let request = state.identity.authorize(provider)?;
    let expires_at = (Utc::now() + Duration::minutes(OAUTH_STATE_TTL_MINUTES)).to_rfc3339();

    sqlx::query(
        "INSERT INTO oauth_states (state, provider, pkce_verifier, expires_at) VALUES (?, ?, ?, ?)",
    )
    .bind(&request.state)
    .bind(provider.as_str())
    .bind(&request.pkce_verifier)
    .bind(&expires_at)
    .execute(&state.db.pool)
    .await?;

    Ok(Json(OAuthStartResponse { url: request.url }))
}

async fn finish_oauth(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Json(body): Json<OAuthCallbackRequest>,
) -> Result<Json<AuthResponse>> {
    let provider = provider_from_path(&provider)?;
    let invalid =
        || AppError::BadRequest("This sign-in link is invalid or has expired.".to_string());

    // Each state is claimed at most once
    let pending = sqlx::query_as::<_, (String, String)>(
        "DELETE FROM oauth_states WHERE state = ? AND provider = ? RETURNING pkce_verifier, expires_at",
    )
    .bind(&body.state)
    .bind(provider.as_str())
    .fetch_optional(&state.db.pool)
    .await?;

    let (pkce_verifier, expires_at) = pending.ok_or_else(invalid)?;
    let expired = chrono::DateTime::parse_from_rfc3339(&expires_at)
        .map(|t| t < Utc::now())
        .unwrap_or(true);
    if expired {
        return Err(invalid());
    }

    let identity = state
        .identity
        .exchange(provider, &body.code, &pkce_verifier)
        .await?;
    let email = identity.email.trim().to_lowercase();
    validate_email(&email)?;

    let username = Some(identity.name.trim())
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| username_from_email(&email));

    // First sign-in creates the account; later ones reuse it
    sqlx::query(
        "INSERT INTO users (id, email, username, role, auth_provider, password_hash, created_at) VALUES (?, ?, ?, ?, ?, '', ?) ON CONFLICT(email) DO NOTHING",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(&email)
    .bind(&username)
    .bind(body.role.unwrap_or(Role::Student))
    .bind(provider.as_str())
    .bind(Utc::now().to_rfc3339())
    .execute(&state.db.pool)
    .await?;

    let user = find_user_by_email(&state.db.pool, &email)
        .await?
        .ok_or_else(|| AppError::Internal("Account vanished after sign-in".to_string()))?;

    tracing::info!(user_id = %user.id, provider = provider.as_str(), "signed in with provider");

    let token = create_token(&user, &state.config.jwt_secret, state.config.token_ttl_days)?;

    Ok(Json(AuthResponse {
        token,
        user: user.into(),
    }))
}
