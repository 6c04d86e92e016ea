use std::time::Duration;

use anyhow::Context;
use bson::{doc, Document};
use futures::TryStreamExt;
use mongodb::error::ErrorKind;
use mongodb::{options::IndexOptions, Collection, Database, IndexModel};
use tracing::{info, warn};

/// Name shared by every incarnation of the ttl index.
pub const TTL_INDEX_NAME: &str = "ttl";

/// Documents expire one minute after their createdAt timestamp.
pub const TTL_EXPIRY: Duration = Duration::from_secs(60);

const NAMESPACE_NOT_FOUND: i32 = 26;
const INDEX_NOT_FOUND: i32 = 27;

/// Drops any index already declared under the ttl name and recreates it
/// on `createdAt` with a one minute expiry. Safe to invoke repeatedly,
/// the end state is always a single ttl index.
pub async fn ensure_ttl_index(db: &Database, collection: &str) -> anyhow::Result<()> {
    let coll = db.collection::<Document>(collection);

    drop_stale_ttl_indexes(&coll).await?;

    let model = IndexModel::builder()
        .keys(doc! { "createdAt": 1 })
        .options(ttl_options())
        .build();
    coll.create_index(model, None)
        .await
        .with_context(|| format!("could not create ttl index on {}", collection))?;

    info!(
        collection = collection,
        index = TTL_INDEX_NAME,
        "ttl index in place"
    );
    Ok(())
}

/// Removes every index named ttl on the collection. An index under that
/// name may exist with a different definition, and create_index rejects
/// a definition mismatch instead of replacing it.
async fn drop_stale_ttl_indexes(coll: &Collection<Document>) -> anyhow::Result<()> {
    let mut indexes = match coll.list_indexes(None).await {
        Ok(cursor) => cursor,
        // collection has not been created yet, nothing to drop
        Err(ref err) if command_error_code(err) == Some(NAMESPACE_NOT_FOUND) => return Ok(()),
        Err(err) => return Err(err).context("could not list indexes"),
    };

    while let Some(index) = indexes.try_next().await? {
        if declared_name(&index) != Some(TTL_INDEX_NAME) {
            continue;
        }

        info!(
            collection = coll.name(),
            index = TTL_INDEX_NAME,
            "dropping stale ttl index"
        );
        match coll.drop_index(TTL_INDEX_NAME, None).await {
            Ok(_) => {}
            // raced with another drop, already gone
            Err(ref err) if command_error_code(err) == Some(INDEX_NOT_FOUND) => {
                warn!(collection = coll.name(), "ttl index vanished before drop")
            }
            Err(err) => return Err(err).context("could not drop stale ttl index"),
        }
    }

    Ok(())
}

fn ttl_options() -> IndexOptions {
    IndexOptions::builder()
        .name(TTL_INDEX_NAME.to_string())
        .expire_after(TTL_EXPIRY)
        .build()
}

/// Name the index was created under, as reported by listIndexes. Matching
/// on the declared name keeps indexes that merely key on a field called
/// ttl out of the drop.
fn declared_name(index: &IndexModel) -> Option<&str> {
    index
        .options
        .as_ref()
        .and_then(|options| options.name.as_deref())
}

fn command_error_code(err: &mongodb::error::Error) -> Option<i32> {
    match *err.kind {
        ErrorKind::Command(ref command) => Some(command.code),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declared_name_uses_index_name_not_keys() {
        let ttl = IndexModel::builder()
            .keys(doc! { "createdAt": 1 })
            .options(IndexOptions::builder().name(TTL_INDEX_NAME.to_string()).build())
            .build();
        assert_eq!(Some(TTL_INDEX_NAME), declared_name(&ttl));

        // an index keyed on a field called ttl is not the ttl index
        let keyed = IndexModel::builder()
            .keys(doc! { "ttl": 1 })
            .options(IndexOptions::builder().name("ttl_1".to_string()).build())
            .build();
        assert_eq!(Some("ttl_1"), declared_name(&keyed));

        let nameless = IndexModel::builder().keys(doc! { "_id": 1 }).build();
        assert_eq!(None, declared_name(&nameless));
    }

    #[test]
    fn test_ttl_options_expire_after_one_minute() {
        let options = ttl_options();

        assert_eq!(Some(TTL_INDEX_NAME.to_string()), options.name);
        assert_eq!(Some(Duration::from_secs(60)), options.expire_after);
    }

    #[test]
    fn test_ttl_model_keys_on_created_at() {
        let model = IndexModel::builder()
            .keys(doc! { "createdAt": 1 })
            .options(ttl_options())
            .build();

        assert_eq!(doc! { "createdAt": 1 }, model.keys);
    }
}
