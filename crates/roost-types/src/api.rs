use serde::{Deserialize, Serialize};

// -- Envelope --

/// Wire shape every endpoint responds with: `{"success": ..., "data": ...}`
/// on the happy path, `{"success": false, "error": ...}` otherwise. Absent
/// branches are omitted rather than sent as null.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

impl Envelope<()> {
    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Listing payload carried inside the envelope's `data` branch.
#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub page: u64,
    pub limit: i64,
    pub total: u64,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LoginRequest {
    pub email_or_username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserProfile,
}

// -- Users --

/// Public fields embedded wherever another user is referenced: post authors,
/// comment authors, conversation previews.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: String,
    pub username: String,
    pub avatar_url: String,
}

/// A user's own record as the API exposes it. The credential hash never
/// appears here.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub username: String,
    pub email: String,
    pub bio: String,
    pub avatar_url: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateProfileRequest {
    pub username: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
}

// -- Posts --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreatePostRequest {
    pub content: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommentRequest {
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentResponse {
    pub id: String,
    pub author: Option<UserSummary>,
    pub text: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostResponse {
    pub id: String,
    pub author: Option<UserSummary>,
    pub content: String,
    pub likes: Vec<String>,
    pub comments: Vec<CommentResponse>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeResponse {
    pub post_id: String,
    pub likes_count: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentCreatedResponse {
    pub post_id: String,
    pub comment: CommentResponse,
}

// -- Messaging --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateConversationRequest {
    pub participant_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub text: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MarkReadRequest {
    pub before: Option<String>,
}

/// One conversation as rendered for one participant: the *other* side's
/// public fields, the last-message snapshot, and the requester's own unread
/// counter.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationPreview {
    pub id: String,
    pub other_participant: Option<UserSummary>,
    pub last_message_at: Option<chrono::DateTime<chrono::Utc>>,
    pub last_message_text: String,
    pub last_message_author: Option<String>,
    pub unread_count: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    pub id: String,
    pub conversation: String,
    pub sender: String,
    pub recipient: String,
    pub text: String,
    pub read_at: Option<chrono::DateTime<chrono::Utc>>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Send returns both the stored message and the refreshed preview so the
/// client can update its conversation list without a second request.
#[derive(Debug, Serialize)]
pub struct SendMessageResponse {
    pub message: MessageResponse,
    pub conversation: ConversationPreview,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadReceiptResponse {
    pub conversation_id: String,
    pub unread_count: i64,
}

#[derive(Debug, Serialize)]
pub struct UnreadCountResponse {
    pub unread: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_omits_absent_branches() {
        let ok = serde_json::to_value(Envelope::ok(5)).unwrap();
        assert_eq!(ok["success"], true);
        assert_eq!(ok["data"], 5);
        assert!(ok.get("error").is_none());

        let err = serde_json::to_value(Envelope::err("nope")).unwrap();
        assert_eq!(err["success"], false);
        assert_eq!(err["error"], "nope");
        assert!(err.get("data").is_none());
    }

    #[test]
    fn preview_serializes_camel_case() {
        let preview = ConversationPreview {
            id: "c1".into(),
            other_participant: None,
            last_message_at: None,
            last_message_text: String::new(),
            last_message_author: None,
            unread_count: 2,
        };
        let value = serde_json::to_value(&preview).unwrap();
        assert_eq!(value["unreadCount"], 2);
        assert!(value.get("otherParticipant").is_some());
        assert!(value.get("lastMessageText").is_some());
        assert!(value["lastMessageAt"].is_null());
    }

    #[test]
    fn requests_reject_unknown_fields() {
        let raw = serde_json::json!({ "text": "hi", "extra": 1 });
        assert!(serde_json::from_value::<SendMessageRequest>(raw).is_err());

        let raw = serde_json::json!({ "content": "x", "authorId": "abc" });
        assert!(serde_json::from_value::<CreatePostRequest>(raw).is_err());
    }

    #[test]
    fn mark_read_body_may_omit_the_cutoff() {
        let req: MarkReadRequest = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(req.before.is_none());
    }
}
