use std::collections::HashMap;

use axum::{
    Extension,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use bson::oid::ObjectId;
use serde::Deserialize;

use roost_db::models::{CommentDoc, PostDoc, UserDoc};
use roost_types::api::{
    CommentCreatedResponse, CommentRequest, CommentResponse, CreatePostRequest, Envelope,
    LikeResponse, PostResponse,
};

use crate::auth::AppState;
use crate::error::{ApiError, parse_object_id};
use crate::extract::{Json, Query};
use crate::middleware::AuthUser;
use crate::pagination::Page;
use crate::users;

const DEFAULT_FEED_LIMIT: u32 = 20;
const DEFAULT_COMMENTS_SHOWN: u32 = 3;
const MAX_COMMENTS_SHOWN: u32 = 50;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    /// How many trailing comments to ship per feed post.
    pub comments_limit: Option<u32>,
}

/// The newest `limit` comments in stored (oldest-first) order: the tail of
/// the embedded list.
fn last_comments(comments: &[CommentDoc], limit: usize) -> &[CommentDoc] {
    let start = comments.len().saturating_sub(limit);
    &comments[start..]
}

fn comment_response(
    comment: &CommentDoc,
    authors: &HashMap<ObjectId, UserDoc>,
) -> CommentResponse {
    CommentResponse {
        id: comment.id.to_hex(),
        author: authors.get(&comment.author).map(users::summary),
        text: comment.text.clone(),
        created_at: comment.created_at.to_chrono(),
    }
}

/// Assemble the response shape: author ids swapped for public summaries,
/// comments cut to the last `comments_limit` when one is given. An author
/// whose account no longer resolves becomes null rather than an error.
fn post_response(
    post: &PostDoc,
    authors: &HashMap<ObjectId, UserDoc>,
    comments_limit: Option<usize>,
) -> PostResponse {
    let shown = match comments_limit {
        Some(limit) => last_comments(&post.comments, limit),
        None => &post.comments[..],
    };

    PostResponse {
        id: post.id.to_hex(),
        author: authors.get(&post.author).map(users::summary),
        content: post.content.clone(),
        likes: post.likes.iter().map(|id| id.to_hex()).collect(),
        comments: shown
            .iter()
            .map(|comment| comment_response(comment, authors))
            .collect(),
        created_at: post.created_at.to_chrono(),
        updated_at: post.updated_at.to_chrono(),
    }
}

/// Gather every author id a page of posts will render (post authors plus
/// the authors of the comments actually shown) for one batched lookup.
async fn load_authors(
    state: &AppState,
    posts: &[PostDoc],
    comments_limit: Option<usize>,
) -> Result<HashMap<ObjectId, UserDoc>, ApiError> {
    let mut ids: Vec<ObjectId> = Vec::new();
    for post in posts {
        ids.push(post.author);
        let shown = match comments_limit {
            Some(limit) => last_comments(&post.comments, limit),
            None => &post.comments[..],
        };
        ids.extend(shown.iter().map(|comment| comment.author));
    }
    ids.sort_unstable();
    ids.dedup();

    Ok(state.db.users_by_ids(&ids).await?)
}

pub async fn create(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<CreatePostRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let content = req.content.trim();
    if content.is_empty() {
        return Err(ApiError::validation("Content is required"));
    }

    let post = state.db.create_post(auth.id, content).await?;
    let authors = load_authors(&state, std::slice::from_ref(&post), None).await?;

    Ok((
        StatusCode::CREATED,
        Json(Envelope::ok(post_response(&post, &authors, None))),
    ))
}

pub async fn feed(
    State(state): State<AppState>,
    Query(query): Query<FeedQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = Page::clamp(query.page, query.limit, DEFAULT_FEED_LIMIT);
    let comments_limit = query
        .comments_limit
        .unwrap_or(DEFAULT_COMMENTS_SHOWN)
        .clamp(1, MAX_COMMENTS_SHOWN) as usize;

    let posts = state.db.feed_page(page.skip(), page.limit).await?;
    let authors = load_authors(&state, &posts, Some(comments_limit)).await?;

    let items: Vec<PostResponse> = posts
        .iter()
        .map(|post| post_response(post, &authors, Some(comments_limit)))
        .collect();
    Ok(Json(Envelope::ok(items)))
}

pub async fn by_id(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_object_id(&id, "post id")?;
    let post = state
        .db
        .post_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Post not found"))?;

    let authors = load_authors(&state, std::slice::from_ref(&post), None).await?;
    Ok(Json(Envelope::ok(post_response(&post, &authors, None))))
}

pub async fn like(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_object_id(&id, "post id")?;
    let post = state
        .db
        .add_like(id, auth.id)
        .await?
        .ok_or_else(|| ApiError::not_found("Post not found"))?;

    Ok(Json(Envelope::ok(LikeResponse {
        post_id: post.id.to_hex(),
        likes_count: post.likes.len(),
    })))
}

pub async fn unlike(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_object_id(&id, "post id")?;
    let post = state
        .db
        .remove_like(id, auth.id)
        .await?
        .ok_or_else(|| ApiError::not_found("Post not found"))?;

    Ok(Json(Envelope::ok(LikeResponse {
        post_id: post.id.to_hex(),
        likes_count: post.likes.len(),
    })))
}

pub async fn comment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(req): Json<CommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_object_id(&id, "post id")?;
    let text = req.text.trim();
    if text.is_empty() {
        return Err(ApiError::validation("Text is required"));
    }

    let (post, comment) = state
        .db
        .push_comment(id, auth.id, text)
        .await?
        .ok_or_else(|| ApiError::not_found("Post not found"))?;

    let authors = state.db.users_by_ids(&[comment.author]).await?;
    Ok((
        StatusCode::CREATED,
        Json(Envelope::ok(CommentCreatedResponse {
            post_id: post.id.to_hex(),
            comment: comment_response(&comment, &authors),
        })),
    ))
}

/// All of one user's posts, newest first.
pub async fn user_posts(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_object_id(&id, "user id")?;
    if state.db.user_by_id(id).await?.is_none() {
        return Err(ApiError::not_found("User not found"));
    }

    let posts = state.db.posts_by_author(id).await?;
    let authors = load_authors(&state, &posts, None).await?;

    let items: Vec<PostResponse> = posts
        .iter()
        .map(|post| post_response(post, &authors, None))
        .collect();
    Ok(Json(Envelope::ok(items)))
}

#[cfg(test)]
mod tests {
    use bson::DateTime;

    use super::*;

    fn oid(byte: u8) -> ObjectId {
        ObjectId::from_bytes([byte; 12])
    }

    fn user_doc(id: ObjectId, name: &str) -> UserDoc {
        UserDoc {
            id,
            username: name.into(),
            email: format!("{name}@example.com"),
            password_hash: "hash".into(),
            bio: String::new(),
            avatar_url: String::new(),
            created_at: DateTime::now(),
            updated_at: DateTime::now(),
        }
    }

    fn comment_doc(author: ObjectId, text: &str) -> CommentDoc {
        CommentDoc {
            id: ObjectId::new(),
            author,
            text: text.into(),
            created_at: DateTime::now(),
        }
    }

    fn post_doc(author: ObjectId, comments: Vec<CommentDoc>) -> PostDoc {
        PostDoc {
            id: oid(100),
            author,
            content: "first post".into(),
            likes: vec![oid(41), oid(42)],
            comments,
            created_at: DateTime::now(),
            updated_at: DateTime::now(),
        }
    }

    #[test]
    fn trim_keeps_only_the_newest_comments() {
        let comments: Vec<CommentDoc> = (0..5)
            .map(|i| comment_doc(oid(1), &format!("c{i}")))
            .collect();

        let kept = last_comments(&comments, 3);
        assert_eq!(kept.len(), 3);
        assert_eq!(kept[0].text, "c2");
        assert_eq!(kept[2].text, "c4");
    }

    #[test]
    fn trim_shorter_than_limit_keeps_everything() {
        let comments = vec![comment_doc(oid(1), "only")];
        assert_eq!(last_comments(&comments, 3).len(), 1);
        assert!(last_comments(&[], 3).is_empty());
    }

    #[test]
    fn response_swaps_ids_for_summaries_and_truncates() {
        let author = oid(1);
        let commenter = oid(2);
        let comments: Vec<CommentDoc> = (0..4)
            .map(|i| comment_doc(commenter, &format!("c{i}")))
            .collect();
        let post = post_doc(author, comments);

        let authors = HashMap::from([
            (author, user_doc(author, "ada")),
            (commenter, user_doc(commenter, "bob")),
        ]);

        let response = post_response(&post, &authors, Some(2));
        assert_eq!(response.author.as_ref().unwrap().username, "ada");
        assert_eq!(response.likes, vec![oid(41).to_hex(), oid(42).to_hex()]);
        assert_eq!(response.comments.len(), 2);
        assert_eq!(response.comments[0].text, "c2");
        assert_eq!(
            response.comments[0].author.as_ref().unwrap().username,
            "bob"
        );
    }

    #[test]
    fn missing_author_renders_as_null_not_error() {
        let post = post_doc(oid(1), vec![comment_doc(oid(2), "hi")]);
        let response = post_response(&post, &HashMap::new(), None);
        assert!(response.author.is_none());
        assert!(response.comments[0].author.is_none());
    }
}
