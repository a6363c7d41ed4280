use axum::{
    Extension,
    extract::{Path, State},
    response::IntoResponse,
};
use serde::Deserialize;

use roost_db::models::UserDoc;
use roost_types::api::{Envelope, Paginated, UpdateProfileRequest, UserProfile, UserSummary};

use crate::auth::AppState;
use crate::error::{ApiError, parse_object_id};
use crate::extract::{Json, Query};
use crate::middleware::AuthUser;
use crate::pagination::Page;

const DEFAULT_SEARCH_LIMIT: u32 = 20;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub query: String,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// Strip a user document down to what the API exposes. The credential hash
/// stays behind on purpose.
pub(crate) fn profile(user: &UserDoc) -> UserProfile {
    UserProfile {
        id: user.id.to_hex(),
        username: user.username.clone(),
        email: user.email.clone(),
        bio: user.bio.clone(),
        avatar_url: user.avatar_url.clone(),
        created_at: user.created_at.to_chrono(),
        updated_at: user.updated_at.to_chrono(),
    }
}

/// The public fields other users see.
pub(crate) fn summary(user: &UserDoc) -> UserSummary {
    UserSummary {
        id: user.id.to_hex(),
        username: user.username.clone(),
        avatar_url: user.avatar_url.clone(),
    }
}

pub async fn me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .db
        .user_by_id(auth.id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(Envelope::ok(profile(&user))))
}

pub async fn update_me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // A username change has to stay unique; bio and avatar are free-form
    let username = match &req.username {
        Some(raw) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return Err(ApiError::validation("username cannot be empty"));
            }
            if state.db.username_taken(trimmed, auth.id).await? {
                return Err(ApiError::conflict("Username is already taken"));
            }
            Some(trimmed.to_string())
        }
        None => None,
    };

    let updated = state
        .db
        .update_profile(
            auth.id,
            username.as_deref(),
            req.bio.as_deref(),
            req.avatar_url.as_deref(),
        )
        .await;

    let user = match updated {
        Ok(Some(user)) => user,
        Ok(None) => return Err(ApiError::not_found("User not found")),
        // Raced another rename to the same name between check and write
        Err(err) if roost_db::is_duplicate_key_error(&err) => {
            return Err(ApiError::conflict("Username is already taken"));
        }
        Err(err) => return Err(err.into()),
    };

    Ok(Json(Envelope::ok(profile(&user))))
}

pub async fn by_id(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_object_id(&id, "user id")?;
    let user = state
        .db
        .user_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(Envelope::ok(profile(&user))))
}

pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = Page::clamp(query.page, query.limit, DEFAULT_SEARCH_LIMIT);
    let (users, total) = state
        .db
        .search_users(query.query.trim(), page.skip(), page.limit)
        .await?;

    let items: Vec<UserProfile> = users.iter().map(profile).collect();
    Ok(Json(Envelope::ok(Paginated {
        items,
        page: page.page,
        limit: page.limit,
        total,
    })))
}

#[cfg(test)]
mod tests {
    use bson::DateTime;
    use bson::oid::ObjectId;

    use super::*;

    fn user_doc() -> UserDoc {
        UserDoc {
            id: ObjectId::from_bytes([7; 12]),
            username: "ada".into(),
            email: "ada@example.com".into(),
            password_hash: "$argon2id$v=19$m=19456,t=2,p=1$abc$def".into(),
            bio: "hello".into(),
            avatar_url: String::new(),
            created_at: DateTime::now(),
            updated_at: DateTime::now(),
        }
    }

    #[test]
    fn profile_never_carries_the_hash() {
        let value = serde_json::to_value(profile(&user_doc())).unwrap();
        assert_eq!(value["username"], "ada");
        assert_eq!(value["email"], "ada@example.com");
        assert!(value.get("passwordHash").is_none());
        assert!(value.get("password_hash").is_none());
    }

    #[test]
    fn summary_exposes_only_public_fields() {
        let value = serde_json::to_value(summary(&user_doc())).unwrap();
        assert_eq!(value["id"], ObjectId::from_bytes([7; 12]).to_hex());
        assert_eq!(value["username"], "ada");
        assert!(value.get("email").is_none());
        assert!(value.get("bio").is_none());
    }
}
