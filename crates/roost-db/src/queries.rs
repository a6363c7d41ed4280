use std::collections::HashMap;

use anyhow::{Result, anyhow};
use bson::oid::ObjectId;
use bson::{Bson, DateTime, Document, doc};
use futures_util::TryStreamExt;
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::ReturnDocument;

use crate::Database;
use crate::models::{CommentDoc, ConversationDoc, MessageDoc, PostDoc, UserDoc};
use roost_types::models::ParticipantPair;

impl Database {
    // -- Users --

    pub async fn create_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<UserDoc> {
        let now = DateTime::now();
        let user = UserDoc {
            id: ObjectId::new(),
            username: username.to_string(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            bio: String::new(),
            avatar_url: String::new(),
            created_at: now,
            updated_at: now,
        };
        self.users.insert_one(&user).await?;
        Ok(user)
    }

    pub async fn user_by_id(&self, id: ObjectId) -> Result<Option<UserDoc>> {
        Ok(self.users.find_one(doc! { "_id": id }).await?)
    }

    pub async fn user_by_username(&self, username: &str) -> Result<Option<UserDoc>> {
        Ok(self.users.find_one(doc! { "username": username }).await?)
    }

    pub async fn user_by_email(&self, email: &str) -> Result<Option<UserDoc>> {
        Ok(self.users.find_one(doc! { "email": email }).await?)
    }

    /// Whether a *different* user already holds `username`.
    pub async fn username_taken(&self, username: &str, excluding: ObjectId) -> Result<bool> {
        let found = self
            .users
            .find_one(doc! { "username": username, "_id": { "$ne": excluding } })
            .await?;
        Ok(found.is_some())
    }

    pub async fn update_profile(
        &self,
        id: ObjectId,
        username: Option<&str>,
        bio: Option<&str>,
        avatar_url: Option<&str>,
    ) -> Result<Option<UserDoc>> {
        let mut set = doc! { "updatedAt": DateTime::now() };
        if let Some(username) = username {
            set.insert("username", username);
        }
        if let Some(bio) = bio {
            set.insert("bio", bio);
        }
        if let Some(avatar_url) = avatar_url {
            set.insert("avatarUrl", avatar_url);
        }

        let updated = self
            .users
            .find_one_and_update(doc! { "_id": id }, doc! { "$set": set })
            .return_document(ReturnDocument::After)
            .await?;
        Ok(updated)
    }

    /// Case-insensitive substring search on username, alphabetical. The
    /// needle is regex-escaped so user input always matches literally; an
    /// empty needle matches everyone.
    pub async fn search_users(
        &self,
        query: &str,
        skip: u64,
        limit: i64,
    ) -> Result<(Vec<UserDoc>, u64)> {
        let filter = if query.is_empty() {
            doc! {}
        } else {
            doc! { "username": { "$regex": escape_regex(query), "$options": "i" } }
        };

        let total = self.users.count_documents(filter.clone()).await?;
        let items = self
            .users
            .find(filter)
            .sort(doc! { "username": 1 })
            .skip(skip)
            .limit(limit)
            .await?
            .try_collect()
            .await?;
        Ok((items, total))
    }

    /// Batch-fetch users for response assembly, keyed by id. Ids with no
    /// matching user are simply absent from the map.
    pub async fn users_by_ids(&self, ids: &[ObjectId]) -> Result<HashMap<ObjectId, UserDoc>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let users: Vec<UserDoc> = self
            .users
            .find(doc! { "_id": { "$in": ids.to_vec() } })
            .await?
            .try_collect()
            .await?;
        Ok(users.into_iter().map(|u| (u.id, u)).collect())
    }

    // -- Posts --

    pub async fn create_post(&self, author: ObjectId, content: &str) -> Result<PostDoc> {
        let now = DateTime::now();
        let post = PostDoc {
            id: ObjectId::new(),
            author,
            content: content.to_string(),
            likes: Vec::new(),
            comments: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        self.posts.insert_one(&post).await?;
        Ok(post)
    }

    pub async fn post_by_id(&self, id: ObjectId) -> Result<Option<PostDoc>> {
        Ok(self.posts.find_one(doc! { "_id": id }).await?)
    }

    /// Global feed page, newest first.
    pub async fn feed_page(&self, skip: u64, limit: i64) -> Result<Vec<PostDoc>> {
        let posts = self
            .posts
            .find(doc! {})
            .sort(doc! { "createdAt": -1 })
            .skip(skip)
            .limit(limit)
            .await?
            .try_collect()
            .await?;
        Ok(posts)
    }

    pub async fn posts_by_author(&self, author: ObjectId) -> Result<Vec<PostDoc>> {
        let posts = self
            .posts
            .find(doc! { "author": author })
            .sort(doc! { "createdAt": -1 })
            .await?
            .try_collect()
            .await?;
        Ok(posts)
    }

    /// `$addToSet` keeps the like list duplicate-free however many times the
    /// same user sends a like.
    pub async fn add_like(&self, post: ObjectId, user: ObjectId) -> Result<Option<PostDoc>> {
        let updated = self
            .posts
            .find_one_and_update(
                doc! { "_id": post },
                doc! {
                    "$addToSet": { "likes": user },
                    "$set": { "updatedAt": DateTime::now() },
                },
            )
            .return_document(ReturnDocument::After)
            .await?;
        Ok(updated)
    }

    pub async fn remove_like(&self, post: ObjectId, user: ObjectId) -> Result<Option<PostDoc>> {
        let updated = self
            .posts
            .find_one_and_update(
                doc! { "_id": post },
                doc! {
                    "$pull": { "likes": user },
                    "$set": { "updatedAt": DateTime::now() },
                },
            )
            .return_document(ReturnDocument::After)
            .await?;
        Ok(updated)
    }

    /// Append a comment to a post's embedded list. Returns the updated post
    /// together with the comment as stored, or `None` if the post is gone.
    pub async fn push_comment(
        &self,
        post: ObjectId,
        author: ObjectId,
        text: &str,
    ) -> Result<Option<(PostDoc, CommentDoc)>> {
        let comment = CommentDoc {
            id: ObjectId::new(),
            author,
            text: text.to_string(),
            created_at: DateTime::now(),
        };

        let updated = self
            .posts
            .find_one_and_update(
                doc! { "_id": post },
                doc! {
                    "$push": { "comments": bson::to_bson(&comment)? },
                    "$set": { "updatedAt": DateTime::now() },
                },
            )
            .return_document(ReturnDocument::After)
            .await?;
        Ok(updated.map(|post| (post, comment)))
    }

    // -- Conversations --

    pub async fn conversation_by_id(&self, id: ObjectId) -> Result<Option<ConversationDoc>> {
        Ok(self.conversations.find_one(doc! { "_id": id }).await?)
    }

    /// Resolve the single conversation for a pair, creating it on first
    /// contact. A duplicate-key failure on insert means a concurrent request
    /// created it between our lookup and write; re-resolve to the winner.
    pub async fn find_or_create_conversation(
        &self,
        pair: ParticipantPair,
    ) -> Result<ConversationDoc> {
        if let Some(existing) = self
            .conversations
            .find_one(doc! { "pairKey": pair.key() })
            .await?
        {
            return Ok(existing);
        }

        let now = DateTime::now();
        let [a, b] = pair.ids();
        let conversation = ConversationDoc {
            id: ObjectId::new(),
            participants: pair,
            pair_key: pair.key(),
            last_message_at: Some(now),
            last_message_text: String::new(),
            last_message_author: None,
            unread_count_by_user: HashMap::from([(a.to_hex(), 0), (b.to_hex(), 0)]),
            created_at: now,
            updated_at: now,
        };

        match self.conversations.insert_one(&conversation).await {
            Ok(_) => Ok(conversation),
            Err(err) if is_duplicate_key(&err) => self
                .conversations
                .find_one(doc! { "pairKey": pair.key() })
                .await?
                .ok_or_else(|| anyhow!("conversation missing after duplicate-key insert")),
            Err(err) => Err(err.into()),
        }
    }

    /// A user's conversations, most recently active first.
    pub async fn conversations_page(
        &self,
        user: ObjectId,
        skip: u64,
        limit: i64,
    ) -> Result<(Vec<ConversationDoc>, u64)> {
        let filter = doc! { "participants": user };
        let total = self.conversations.count_documents(filter.clone()).await?;
        let items = self
            .conversations
            .find(filter)
            .sort(doc! { "lastMessageAt": -1, "updatedAt": -1 })
            .skip(skip)
            .limit(limit)
            .await?
            .try_collect()
            .await?;
        Ok((items, total))
    }

    /// Every conversation a user participates in, for the unread total.
    pub async fn conversations_for(&self, user: ObjectId) -> Result<Vec<ConversationDoc>> {
        let conversations = self
            .conversations
            .find(doc! { "participants": user })
            .await?
            .try_collect()
            .await?;
        Ok(conversations)
    }

    /// The conversation-side half of sending: refresh the last-message
    /// snapshot and bump the recipient's unread counter, atomically within
    /// the one document.
    pub async fn apply_message_to_conversation(
        &self,
        message: &MessageDoc,
    ) -> Result<Option<ConversationDoc>> {
        let mut inc = Document::new();
        inc.insert(unread_field(message.recipient), 1_i64);

        let updated = self
            .conversations
            .find_one_and_update(
                doc! { "_id": message.conversation },
                doc! {
                    "$set": {
                        "lastMessageAt": message.created_at,
                        "lastMessageText": message.text.as_str(),
                        "lastMessageAuthor": message.sender,
                        "updatedAt": DateTime::now(),
                    },
                    "$inc": inc,
                },
            )
            .return_document(ReturnDocument::After)
            .await?;
        Ok(updated)
    }

    /// Overwrite one participant's stored unread counter with a freshly
    /// counted value. Overwriting rather than decrementing is what lets the
    /// counter self-heal after a lost increment.
    pub async fn set_unread_count(
        &self,
        conversation: ObjectId,
        user: ObjectId,
        count: i64,
    ) -> Result<()> {
        let mut set = doc! { "updatedAt": DateTime::now() };
        set.insert(unread_field(user), count);

        self.conversations
            .update_one(doc! { "_id": conversation }, doc! { "$set": set })
            .await?;
        Ok(())
    }

    // -- Messages --

    pub async fn insert_message(
        &self,
        conversation: ObjectId,
        sender: ObjectId,
        recipient: ObjectId,
        text: &str,
    ) -> Result<MessageDoc> {
        let now = DateTime::now();
        let message = MessageDoc {
            id: ObjectId::new(),
            conversation,
            sender,
            recipient,
            text: text.to_string(),
            read_at: None,
            created_at: now,
            updated_at: now,
        };
        self.messages.insert_one(&message).await?;
        Ok(message)
    }

    /// Oldest-first page of a conversation's messages.
    pub async fn messages_page(
        &self,
        conversation: ObjectId,
        skip: u64,
        limit: i64,
    ) -> Result<(Vec<MessageDoc>, u64)> {
        let filter = doc! { "conversation": conversation };
        let total = self.messages.count_documents(filter.clone()).await?;
        let items = self
            .messages
            .find(filter)
            .sort(doc! { "createdAt": 1 })
            .skip(skip)
            .limit(limit)
            .await?
            .try_collect()
            .await?;
        Ok((items, total))
    }

    /// Stamp `readAt` on the recipient's unread messages in a conversation,
    /// optionally only those created at or before `before`. Messages already
    /// read keep their earlier stamp. Returns how many changed.
    pub async fn mark_messages_read(
        &self,
        conversation: ObjectId,
        recipient: ObjectId,
        before: Option<chrono::DateTime<chrono::Utc>>,
    ) -> Result<u64> {
        let mut filter = doc! {
            "conversation": conversation,
            "recipient": recipient,
            "readAt": Bson::Null,
        };
        if let Some(cutoff) = before {
            filter.insert("createdAt", doc! { "$lte": DateTime::from_chrono(cutoff) });
        }

        let result = self
            .messages
            .update_many(
                filter,
                doc! { "$set": { "readAt": DateTime::now(), "updatedAt": DateTime::now() } },
            )
            .await?;
        Ok(result.modified_count)
    }

    /// Count a recipient's still-unread messages in one conversation. This
    /// is the ground truth the stored per-conversation counter caches.
    pub async fn count_unread(&self, conversation: ObjectId, recipient: ObjectId) -> Result<u64> {
        let count = self
            .messages
            .count_documents(doc! {
                "conversation": conversation,
                "recipient": recipient,
                "readAt": Bson::Null,
            })
            .await?;
        Ok(count)
    }
}

/// Dotted update path for one participant's unread counter.
fn unread_field(user: ObjectId) -> String {
    format!("unreadCountByUser.{}", user.to_hex())
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    match *err.kind {
        ErrorKind::Write(WriteFailure::WriteError(ref write_error)) => write_error.code == 11000,
        _ => false,
    }
}

/// Whether an error returned by this crate was caused by a unique-index
/// violation, without callers having to know driver error types.
pub fn is_duplicate_key_error(err: &anyhow::Error) -> bool {
    err.downcast_ref::<mongodb::error::Error>()
        .is_some_and(is_duplicate_key)
}

/// Escape regex metacharacters so a search needle matches literally.
pub(crate) fn escape_regex(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(
            c,
            '.' | '^' | '$' | '*' | '+' | '?' | '(' | ')' | '[' | ']' | '{' | '}' | '|' | '\\' | '/'
        ) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_regex_neutralizes_metacharacters() {
        assert_eq!(escape_regex("a.b*c"), "a\\.b\\*c");
        assert_eq!(escape_regex("(x|y)"), "\\(x\\|y\\)");
        assert_eq!(escape_regex("plain"), "plain");
        assert_eq!(escape_regex(""), "");
    }

    #[test]
    fn unread_field_builds_dotted_path() {
        let user = ObjectId::from_bytes([0xab; 12]);
        assert_eq!(
            unread_field(user),
            format!("unreadCountByUser.{}", user.to_hex())
        );
        assert!(unread_field(user).starts_with("unreadCountByUser."));
    }
}
