use std::collections::HashMap;

use axum::{
    Extension,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use bson::oid::ObjectId;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::warn;

use roost_db::models::{ConversationDoc, MessageDoc, UserDoc};
use roost_types::api::{
    ConversationPreview, CreateConversationRequest, Envelope, MarkReadRequest, MessageResponse,
    Paginated, ReadReceiptResponse, SendMessageRequest, SendMessageResponse, UnreadCountResponse,
};
use roost_types::models::ParticipantPair;

use crate::auth::AppState;
use crate::error::{ApiError, parse_object_id};
use crate::extract::{Json, Query};
use crate::middleware::AuthUser;
use crate::pagination::Page;
use crate::users;

const DEFAULT_CONVERSATIONS_LIMIT: u32 = 20;
const DEFAULT_MESSAGES_LIMIT: u32 = 30;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// Project a conversation into what one participant's client renders: the
/// *other* side's public fields, the last-message snapshot, and the
/// requester's own unread counter.
fn conversation_preview(
    conversation: &ConversationDoc,
    requester: ObjectId,
    loaded_users: &HashMap<ObjectId, UserDoc>,
) -> ConversationPreview {
    let other_participant = conversation
        .participants
        .other(requester)
        .and_then(|id| loaded_users.get(&id))
        .map(users::summary);

    ConversationPreview {
        id: conversation.id.to_hex(),
        other_participant,
        last_message_at: conversation.last_message_at.map(|at| at.to_chrono()),
        last_message_text: conversation.last_message_text.clone(),
        last_message_author: conversation.last_message_author.map(|id| id.to_hex()),
        unread_count: conversation.unread_for(requester),
    }
}

fn message_response(message: &MessageDoc) -> MessageResponse {
    MessageResponse {
        id: message.id.to_hex(),
        conversation: message.conversation.to_hex(),
        sender: message.sender.to_hex(),
        recipient: message.recipient.to_hex(),
        text: message.text.clone(),
        read_at: message.read_at.map(|at| at.to_chrono()),
        created_at: message.created_at.to_chrono(),
        updated_at: message.updated_at.to_chrono(),
    }
}

/// Fetch a conversation and check the requester belongs to it. Existence is
/// checked first: an unknown id is 404, a known id without membership 403.
async fn member_conversation(
    state: &AppState,
    id: &str,
    requester: ObjectId,
) -> Result<ConversationDoc, ApiError> {
    let id = parse_object_id(id, "conversation id")?;
    let conversation = state
        .db
        .conversation_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Conversation not found"))?;

    if !conversation.participants.contains(requester) {
        return Err(ApiError::forbidden("Access denied: not a participant"));
    }
    Ok(conversation)
}

/// RFC 3339 cutoff from a request body; absent or blank means no cutoff.
fn parse_cutoff(raw: Option<&str>) -> Result<Option<DateTime<Utc>>, ApiError> {
    match raw {
        None => Ok(None),
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(|_| ApiError::validation("Invalid before date")),
    }
}

pub async fn list_conversations(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = Page::clamp(query.page, query.limit, DEFAULT_CONVERSATIONS_LIMIT);
    let (conversations, total) = state
        .db
        .conversations_page(auth.id, page.skip(), page.limit)
        .await?;

    // One batched lookup covers every "other participant" on the page
    let other_ids: Vec<ObjectId> = conversations
        .iter()
        .filter_map(|c| c.participants.other(auth.id))
        .collect();
    let loaded = state.db.users_by_ids(&other_ids).await?;

    let items: Vec<ConversationPreview> = conversations
        .iter()
        .map(|c| conversation_preview(c, auth.id, &loaded))
        .collect();

    Ok(Json(Envelope::ok(Paginated {
        items,
        page: page.page,
        limit: page.limit,
        total,
    })))
}

/// Resolve the conversation with another user, creating it on first
/// contact. Calling this twice, or from the other side, lands on the same
/// conversation.
pub async fn create_or_get_conversation(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<CreateConversationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let participant_id = req
        .participant_id
        .parse::<ObjectId>()
        .map_err(|_| ApiError::validation("Invalid participantId"))?;

    let pair = ParticipantPair::new(auth.id, participant_id)
        .ok_or_else(|| ApiError::validation("Cannot create conversation with yourself"))?;

    let participant = state
        .db
        .user_by_id(participant_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Participant not found"))?;

    let conversation = state.db.find_or_create_conversation(pair).await?;

    let loaded = HashMap::from([(participant.id, participant)]);
    Ok(Json(Envelope::ok(conversation_preview(
        &conversation,
        auth.id,
        &loaded,
    ))))
}

pub async fn get_conversation(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let conversation = member_conversation(&state, &id, auth.id).await?;

    let other_ids: Vec<ObjectId> = conversation
        .participants
        .other(auth.id)
        .into_iter()
        .collect();
    let loaded = state.db.users_by_ids(&other_ids).await?;

    Ok(Json(Envelope::ok(conversation_preview(
        &conversation,
        auth.id,
        &loaded,
    ))))
}

pub async fn list_messages(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let conversation = member_conversation(&state, &id, auth.id).await?;

    let page = Page::clamp(query.page, query.limit, DEFAULT_MESSAGES_LIMIT);
    let (messages, total) = state
        .db
        .messages_page(conversation.id, page.skip(), page.limit)
        .await?;

    let items: Vec<MessageResponse> = messages.iter().map(message_response).collect();
    Ok(Json(Envelope::ok(Paginated {
        items,
        page: page.page,
        limit: page.limit,
        total,
    })))
}

pub async fn send_message(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let text = req.text.trim();
    if text.is_empty() {
        return Err(ApiError::validation("Text is required"));
    }

    let conversation = member_conversation(&state, &id, auth.id).await?;
    let recipient = conversation
        .participants
        .other(auth.id)
        .ok_or_else(|| anyhow::anyhow!("participant set lost its second member"))?;

    let message = state
        .db
        .insert_message(conversation.id, auth.id, recipient, text)
        .await?;

    // Second half of the two-document write; not transactional with the
    // insert. If it is lost, the recipient's counter under-counts until
    // their next read-mark recomputes it from the messages themselves.
    let refreshed = match state.db.apply_message_to_conversation(&message).await? {
        Some(updated) => updated,
        None => {
            warn!(
                "conversation {} disappeared during post-send update",
                conversation.id
            );
            conversation
        }
    };

    let loaded = state.db.users_by_ids(&[recipient]).await?;
    Ok((
        StatusCode::CREATED,
        Json(Envelope::ok(SendMessageResponse {
            message: message_response(&message),
            conversation: conversation_preview(&refreshed, auth.id, &loaded),
        })),
    ))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(req): Json<MarkReadRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let before = parse_cutoff(req.before.as_deref())?;
    let conversation = member_conversation(&state, &id, auth.id).await?;

    state
        .db
        .mark_messages_read(conversation.id, auth.id, before)
        .await?;

    // Recompute from the message store and overwrite. Counting is what
    // keeps the cached counter honest across lost increments and repeated
    // or partial read-marks.
    let unread = state.db.count_unread(conversation.id, auth.id).await? as i64;
    state
        .db
        .set_unread_count(conversation.id, auth.id, unread)
        .await?;

    Ok(Json(Envelope::ok(ReadReceiptResponse {
        conversation_id: conversation.id.to_hex(),
        unread_count: unread,
    })))
}

/// Total unread across every conversation the requester participates in,
/// summed from the stored counters without touching the messages.
pub async fn unread_count(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let conversations = state.db.conversations_for(auth.id).await?;
    let total: i64 = conversations.iter().map(|c| c.unread_for(auth.id)).sum();

    Ok(Json(Envelope::ok(UnreadCountResponse { unread: total })))
}
