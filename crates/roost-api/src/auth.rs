use std::sync::Arc;
use std::time::Instant;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};

use roost_db::Database;
use roost_types::api::{AuthResponse, Envelope, LoginRequest, RegisterRequest};

use crate::error::ApiError;
use crate::extract::Json;
use crate::middleware::Claims;
use crate::users;

pub type AppState = Arc<AppStateInner>;

/// Shared state handed to every handler: the storage handle and the token
/// signing secret, passed in at construction rather than read from globals.
pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub started_at: Instant,
}

const TOKEN_LIFETIME_DAYS: i64 = 7;
const MIN_PASSWORD_LEN: usize = 6;

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // Validate input
    let username = req.username.trim().to_string();
    let email = req.email.trim().to_lowercase();
    if username.is_empty() || email.is_empty() || req.password.is_empty() {
        return Err(ApiError::validation(
            "username, email and password are required",
        ));
    }
    if req.password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::validation(
            "Password must be at least 6 characters",
        ));
    }

    // Check both unique handles up front for precise error messages
    if state.db.user_by_email(&email).await?.is_some() {
        return Err(ApiError::conflict("User with this email already exists"));
    }
    if state.db.user_by_username(&username).await?.is_some() {
        return Err(ApiError::conflict("User with this username already exists"));
    }

    // Hash password with Argon2id
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {e}"))?
        .to_string();

    let user = match state.db.create_user(&username, &email, &password_hash).await {
        Ok(user) => user,
        // Lost an insert race against an identical registration; the unique
        // indexes are the authority, the checks above only improve messages.
        Err(err) if roost_db::is_duplicate_key_error(&err) => {
            return Err(ApiError::conflict(
                "User with this username or email already exists",
            ));
        }
        Err(err) => return Err(err.into()),
    };

    let token = create_token(&state.jwt_secret, &user.id.to_hex(), &user.username)?;

    Ok((
        StatusCode::CREATED,
        Json(Envelope::ok(AuthResponse {
            token,
            user: users::profile(&user),
        })),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let identifier = req.email_or_username.trim();
    if identifier.is_empty() || req.password.is_empty() {
        return Err(ApiError::validation(
            "emailOrUsername and password are required",
        ));
    }

    // An identifier with an @ is an email, anything else a username
    let user = if identifier.contains('@') {
        state.db.user_by_email(&identifier.to_lowercase()).await?
    } else {
        state.db.user_by_username(identifier).await?
    }
    .ok_or_else(|| ApiError::unauthorized("Invalid credentials"))?;

    // Verify password
    let parsed_hash = PasswordHash::new(&user.password_hash)
        .map_err(|e| anyhow::anyhow!("stored password hash unparseable: {e}"))?;

    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::unauthorized("Invalid credentials"))?;

    let token = create_token(&state.jwt_secret, &user.id.to_hex(), &user.username)?;

    Ok(Json(Envelope::ok(AuthResponse {
        token,
        user: users::profile(&user),
    })))
}

fn create_token(secret: &str, user_id: &str, username: &str) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id.to_string(),
        username: username.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::days(TOKEN_LIFETIME_DAYS)).timestamp()
            as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

#[cfg(test)]
mod tests {
    use jsonwebtoken::{DecodingKey, Validation, decode};

    use super::*;

    #[test]
    fn token_round_trip_preserves_identity() {
        let token = create_token("test-secret", "64f0aa0000000000000000aa", "ada").unwrap();

        let data = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(b"test-secret"),
            &Validation::default(),
        )
        .unwrap();
        assert_eq!(data.claims.sub, "64f0aa0000000000000000aa");
        assert_eq!(data.claims.username, "ada");
    }

    #[test]
    fn token_rejects_wrong_secret() {
        let token = create_token("secret-a", "64f0aa0000000000000000aa", "ada").unwrap();

        let result = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(b"secret-b"),
            &Validation::default(),
        );
        assert!(result.is_err());
    }
}
