pub mod indexes;
pub mod models;
pub mod queries;

use anyhow::Result;
use mongodb::{Client, Collection};
use tracing::info;

use models::{ConversationDoc, MessageDoc, PostDoc, UserDoc};

pub use queries::is_duplicate_key_error;

/// Typed handle over the MongoDB collections the application uses.
pub struct Database {
    pub(crate) users: Collection<UserDoc>,
    pub(crate) posts: Collection<PostDoc>,
    pub(crate) conversations: Collection<ConversationDoc>,
    pub(crate) messages: Collection<MessageDoc>,
}

impl Database {
    /// Connect, pick the database, and make sure the schema's indexes exist
    /// before anything queries through the handle.
    pub async fn connect(uri: &str, db_name: &str) -> Result<Self> {
        let client = Client::with_uri_str(uri).await?;
        let db = client.database(db_name);

        let database = Self {
            users: db.collection("users"),
            posts: db.collection("posts"),
            conversations: db.collection("conversations"),
            messages: db.collection("messages"),
        };

        indexes::ensure(&database).await?;

        info!("Connected to MongoDB database '{}'", db_name);
        Ok(database)
    }
}
