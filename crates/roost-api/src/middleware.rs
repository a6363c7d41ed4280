use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use bson::oid::ObjectId;
use jsonwebtoken::{DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};

use crate::auth::AppState;
use crate::error::ApiError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user's id in hex.
    pub sub: String,
    pub username: String,
    pub exp: usize,
}

/// The verified requester, inserted as a request extension for handlers.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub id: ObjectId,
}

/// Resolve an Authorization header value into the requester it vouches for.
fn authenticate(header: Option<&str>, secret: &str) -> Result<AuthUser, ApiError> {
    let header = header.ok_or_else(|| ApiError::unauthorized("Authorization header is missing"))?;

    let token = header.strip_prefix("Bearer ").ok_or_else(|| {
        ApiError::unauthorized("Invalid Authorization header format. Expected: Bearer <token>")
    })?;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| ApiError::unauthorized("Invalid or expired token"))?;

    let id = token_data
        .claims
        .sub
        .parse::<ObjectId>()
        .map_err(|_| ApiError::unauthorized("Invalid or expired token"))?;

    Ok(AuthUser { id })
}

/// Extract and validate the JWT from the Authorization header, then stash
/// the resolved identity. The signing secret comes from shared state, not
/// the process environment.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let auth = authenticate(auth_header, &state.jwt_secret)?;

    req.extensions_mut().insert(auth);
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use jsonwebtoken::{EncodingKey, Header, encode};

    use super::*;

    fn token(sub: &str, secret: &str) -> String {
        let claims = Claims {
            sub: sub.into(),
            username: "wren".into(),
            exp: 4102444800,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn bearer_token_resolves_the_requester() {
        let id = ObjectId::new();
        let header = format!("Bearer {}", token(&id.to_hex(), "s3cret"));

        let auth = authenticate(Some(&header), "s3cret").unwrap();
        assert_eq!(auth.id, id);
    }

    #[test]
    fn missing_header_is_rejected() {
        let err = authenticate(None, "s3cret").unwrap_err();
        assert_eq!(err.to_string(), "Authorization header is missing");
    }

    #[test]
    fn non_bearer_header_is_rejected() {
        let err = authenticate(Some("Basic dXNlcg=="), "s3cret").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid Authorization header format. Expected: Bearer <token>"
        );
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let id = ObjectId::new();
        let header = format!("Bearer {}", token(&id.to_hex(), "one"));

        let err = authenticate(Some(&header), "two").unwrap_err();
        assert_eq!(err.to_string(), "Invalid or expired token");
    }

    #[test]
    fn non_id_subject_is_rejected() {
        let header = format!("Bearer {}", token("not-a-hex-id", "s3cret"));

        let err = authenticate(Some(&header), "s3cret").unwrap_err();
        assert_eq!(err.to_string(), "Invalid or expired token");
    }
}
