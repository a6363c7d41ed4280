//! Document types as they live in MongoDB. Field names are camelCase on
//! disk; the API layer maps these into response DTOs and never serializes
//! them directly.

use std::collections::HashMap;

use bson::DateTime;
use bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use roost_types::models::ParticipantPair;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDoc {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub avatar_url: String,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentDoc {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub author: ObjectId,
    pub text: String,
    pub created_at: DateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostDoc {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub author: ObjectId,
    pub content: String,
    /// Distinct likers. `$addToSet` on the write path keeps it a set.
    #[serde(default)]
    pub likes: Vec<ObjectId>,
    /// Embedded, oldest first. Pages of the feed only ship the tail.
    #[serde(default)]
    pub comments: Vec<CommentDoc>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationDoc {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub participants: ParticipantPair,
    /// `participants` flattened to a scalar so a plain unique index can hold
    /// the one-conversation-per-pair invariant. A unique index over the
    /// array itself would be multikey and constrain individual users.
    pub pair_key: String,
    #[serde(default)]
    pub last_message_at: Option<DateTime>,
    #[serde(default)]
    pub last_message_text: String,
    #[serde(default)]
    pub last_message_author: Option<ObjectId>,
    /// Unread counters keyed by participant hex id. A cache of what
    /// counting unread messages would return, maintained by `$inc` on send
    /// and overwritten with a fresh count on read-mark.
    #[serde(default)]
    pub unread_count_by_user: HashMap<String, i64>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl ConversationDoc {
    /// Stored unread counter for one participant; a missing entry reads as
    /// zero.
    pub fn unread_for(&self, user: ObjectId) -> i64 {
        self.unread_count_by_user
            .get(&user.to_hex())
            .copied()
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDoc {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub conversation: ObjectId,
    pub sender: ObjectId,
    pub recipient: ObjectId,
    pub text: String,
    /// Null until the recipient marks the conversation read.
    #[serde(default)]
    pub read_at: Option<DateTime>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oid(byte: u8) -> ObjectId {
        ObjectId::from_bytes([byte; 12])
    }

    #[test]
    fn unread_for_missing_entry_is_zero() {
        let pair = ParticipantPair::new(oid(1), oid(2)).unwrap();
        let conversation = ConversationDoc {
            id: oid(3),
            participants: pair,
            pair_key: pair.key(),
            last_message_at: None,
            last_message_text: String::new(),
            last_message_author: None,
            unread_count_by_user: HashMap::from([(oid(1).to_hex(), 4)]),
            created_at: DateTime::now(),
            updated_at: DateTime::now(),
        };
        assert_eq!(conversation.unread_for(oid(1)), 4);
        assert_eq!(conversation.unread_for(oid(2)), 0);
    }

    #[test]
    fn documents_round_trip_through_bson() {
        let message = MessageDoc {
            id: oid(1),
            conversation: oid(2),
            sender: oid(3),
            recipient: oid(4),
            text: "hello".into(),
            read_at: None,
            created_at: DateTime::now(),
            updated_at: DateTime::now(),
        };
        let doc = bson::to_document(&message).unwrap();
        assert!(doc.contains_key("_id"));
        assert!(doc.contains_key("readAt"));
        assert!(doc.contains_key("createdAt"));

        let back: MessageDoc = bson::from_document(doc).unwrap();
        assert_eq!(back.text, "hello");
        assert!(back.read_at.is_none());
    }
}
