use anyhow::Result;
use bson::doc;
use mongodb::IndexModel;
use mongodb::options::IndexOptions;
use tracing::info;

use crate::Database;

/// Create the indexes the schema relies on. Runs on every startup;
/// `createIndexes` is a no-op for indexes that already exist.
pub(crate) async fn ensure(db: &Database) -> Result<()> {
    let unique = || IndexOptions::builder().unique(true).build();

    db.users
        .create_indexes(vec![
            IndexModel::builder()
                .keys(doc! { "username": 1 })
                .options(unique())
                .build(),
            IndexModel::builder()
                .keys(doc! { "email": 1 })
                .options(unique())
                .build(),
        ])
        .await?;

    db.posts
        .create_indexes(vec![
            IndexModel::builder().keys(doc! { "author": 1 }).build(),
            IndexModel::builder().keys(doc! { "createdAt": -1 }).build(),
        ])
        .await?;

    db.conversations
        .create_indexes(vec![
            // One conversation per normalized pair, enforced on the scalar
            // key rather than the participants array.
            IndexModel::builder()
                .keys(doc! { "pairKey": 1 })
                .options(unique())
                .build(),
            IndexModel::builder().keys(doc! { "participants": 1 }).build(),
            IndexModel::builder()
                .keys(doc! { "lastMessageAt": -1 })
                .build(),
        ])
        .await?;

    db.messages
        .create_indexes(vec![
            IndexModel::builder()
                .keys(doc! { "conversation": 1, "createdAt": 1 })
                .build(),
            // Serves both the unread count and the read-mark update.
            IndexModel::builder()
                .keys(doc! { "conversation": 1, "recipient": 1, "readAt": 1 })
                .build(),
        ])
        .await?;

    info!("Database indexes ensured");
    Ok(())
}
