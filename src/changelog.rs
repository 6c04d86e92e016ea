use std::future::Future;

use anyhow::Context;
use bson::{doc, DateTime};
use futures::TryStreamExt;
use mongodb::{options::FindOptions, Collection, Database};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Collection holding one record per executed change set.
pub const CHANGELOG_COLLECTION: &str = "dbchangelog";

/// Describes a single migration step. `order` sequences steps within the
/// changelog, `id` is the stable identity a run is recorded under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeSet {
    pub order: &'static str,
    pub id: &'static str,
    pub author: &'static str,
}

/// Record persisted after a change set ran. Field names follow the
/// layout earlier deployments wrote, so an existing history keeps its
/// change sets from running twice.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeLogEntry {
    pub change_id: String,
    pub author: String,
    pub timestamp: DateTime,
}

impl ChangeLogEntry {
    /// Freshly stamped record for an executed change set.
    fn record(change_set: &ChangeSet) -> Self {
        Self {
            change_id: change_set.id.to_string(),
            author: change_set.author.to_string(),
            timestamp: DateTime::now(),
        }
    }
}

/// Gate that makes change sets run at most once per database.
pub struct Changelog {
    records: Collection<ChangeLogEntry>,
}

impl Changelog {
    pub fn new(db: &Database) -> Self {
        Self {
            records: db.collection(CHANGELOG_COLLECTION),
        }
    }

    /// Runs `op` unless a record for the change set already exists and
    /// records the run afterwards. A failing `op` propagates before
    /// anything is recorded, so the change set stays pending.
    pub async fn apply<F, Fut>(&self, change_set: &ChangeSet, op: F) -> anyhow::Result<bool>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<()>>,
    {
        if self.has_run(change_set).await? {
            info!(
                change_id = change_set.id,
                "change set already recorded, skipping"
            );
            return Ok(false);
        }

        op().await?;

        self.records
            .insert_one(ChangeLogEntry::record(change_set), None)
            .await
            .with_context(|| format!("could not record change set {}", change_set.id))?;
        info!(
            order = change_set.order,
            change_id = change_set.id,
            "change set applied"
        );
        Ok(true)
    }

    pub async fn has_run(&self, change_set: &ChangeSet) -> anyhow::Result<bool> {
        let found = self
            .records
            .find_one(doc! { "changeId": change_set.id }, None)
            .await?;
        Ok(found.is_some())
    }

    /// All recorded runs, oldest first.
    pub async fn entries(&self) -> anyhow::Result<Vec<ChangeLogEntry>> {
        let options = FindOptions::builder()
            .sort(doc! { "timestamp": 1 })
            .build();
        let mut cursor = self.records.find(None, options).await?;

        let mut entries = vec![];
        while let Some(entry) = cursor.try_next().await? {
            entries.push(entry);
        }
        Ok(entries)
    }
}
