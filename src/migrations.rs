use crate::changelog::{ChangeSet, Changelog};
use crate::indexes;
use mongodb::Database;

/// Collection the frontend stores inventory linking queries in.
pub const ILE_QUERIES_COLLECTION: &str = "ileQueries";

/// Older application code created the ttl index itself on repository
/// startup, this change set replaces it with the one minute expiry.
const ADD_TTL_OF_1_MIN: ChangeSet = ChangeSet {
    order: "001",
    id: "Add ttl of 1 min",
    author: "exports",
};

/// Applies every pending change set, oldest first.
pub async fn run(db: &Database) -> anyhow::Result<()> {
    let changelog = Changelog::new(db);

    changelog
        .apply(&ADD_TTL_OF_1_MIN, || {
            indexes::ensure_ttl_index(db, ILE_QUERIES_COLLECTION)
        })
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::ADD_TTL_OF_1_MIN;

    // recorded histories key on the id, renaming it would rerun the step
    #[test]
    fn test_change_set_identity_is_stable() {
        assert_eq!("001", ADD_TTL_OF_1_MIN.order);
        assert_eq!("Add ttl of 1 min", ADD_TTL_OF_1_MIN.id);
    }
}
