//! Search index seam
//!
//! The external full-text index is a collaborator behind the `SearchIndex`
//! trait. The in-memory implementation does naive substring matching over
//! the same fields the real index receives.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::proposal::ProposalStatus;

/// Denormalized proposal record pushed to the index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposalSearchRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: String,
    pub status: ProposalStatus,
    pub author_name: String,
    pub tag_ids: Vec<Uuid>,
    pub tag_names: Vec<String>,
}

/// Filters applied alongside a full-text query
#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    pub status: Option<ProposalStatus>,
    pub user_id: Option<Uuid>,
    pub tag_ids: Vec<Uuid>,
}

#[async_trait]
pub trait SearchIndex: Send + Sync {
    async fn upsert(&self, record: ProposalSearchRecord) -> anyhow::Result<()>;
    async fn remove(&self, id: Uuid) -> anyhow::Result<()>;
    /// Ranked proposal ids matching the query text and filters
    async fn query(&self, text: &str, filters: &SearchFilters) -> anyhow::Result<Vec<Uuid>>;
}

/// In-memory search index
pub struct InMemorySearchIndex {
    records: RwLock<HashMap<Uuid, ProposalSearchRecord>>,
}

impl InMemorySearchIndex {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    fn matches_text(record: &ProposalSearchRecord, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        record.title.to_lowercase().contains(&needle)
            || record.description.to_lowercase().contains(&needle)
            || record.author_name.to_lowercase().contains(&needle)
            || record
                .tag_names
                .iter()
                .any(|t| t.to_lowercase().contains(&needle))
    }

    fn matches_filters(record: &ProposalSearchRecord, filters: &SearchFilters) -> bool {
        if let Some(status) = filters.status {
            if record.status != status {
                return false;
            }
        }
        if let Some(user_id) = filters.user_id {
            if record.user_id != user_id {
                return false;
            }
        }
        if !filters.tag_ids.is_empty()
            && !filters.tag_ids.iter().any(|t| record.tag_ids.contains(t))
        {
            return false;
        }
        true
    }
}

impl Default for InMemorySearchIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SearchIndex for InMemorySearchIndex {
    async fn upsert(&self, record: ProposalSearchRecord) -> anyhow::Result<()> {
        let mut records = self.records.write().await;
        records.insert(record.id, record);
        Ok(())
    }

    async fn remove(&self, id: Uuid) -> anyhow::Result<()> {
        let mut records = self.records.write().await;
        records.remove(&id);
        Ok(())
    }

    async fn query(&self, text: &str, filters: &SearchFilters) -> anyhow::Result<Vec<Uuid>> {
        let records = self.records.read().await;
        let mut hits: Vec<&ProposalSearchRecord> = records
            .values()
            .filter(|r| Self::matches_text(r, text) && Self::matches_filters(r, filters))
            .collect();
        // Title hits rank above body/tag hits
        let needle = text.to_lowercase();
        hits.sort_by_key(|r| {
            let title_hit = r.title.to_lowercase().contains(&needle);
            (!title_hit, r.title.clone())
        });
        Ok(hits.into_iter().map(|r| r.id).collect())
    }
}
