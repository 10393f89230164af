//! In-process vector index, used for tests and `index.backend: memory`.

use crate::vector_index::{
    batch_dimensions, cosine_distance, rank_by_distance, CollectionInfo, DistanceMetric,
    IndexHit, IndexItem, VectorIndex,
};
use chrono::{DateTime, Utc};
use meeple_core::{AppError, AppResult};
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Debug)]
struct StoredCollection {
    items: Vec<IndexItem>,
    dimensions: Option<usize>,
    updated_at: DateTime<Utc>,
}

/// Vector index held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryIndex {
    collections: RwLock<HashMap<String, StoredCollection>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> AppError {
    AppError::Index("Memory index lock poisoned".to_string())
}

#[async_trait::async_trait]
impl VectorIndex for MemoryIndex {
    fn metric(&self) -> DistanceMetric {
        DistanceMetric::Cosine
    }

    async fn upsert_collection(&self, name: &str, items: Vec<IndexItem>) -> AppResult<()> {
        let dimensions = batch_dimensions(&items, None)?;
        let mut collections = self.collections.write().map_err(poisoned)?;
        collections.insert(
            name.to_string(),
            StoredCollection {
                items,
                dimensions,
                updated_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn append_to_collection(&self, name: &str, items: Vec<IndexItem>) -> AppResult<()> {
        let mut collections = self.collections.write().map_err(poisoned)?;
        let dimensions = batch_dimensions(&items, collections.get(name).and_then(|c| c.dimensions))?;

        let stored = collections
            .entry(name.to_string())
            .or_insert_with(|| StoredCollection {
                items: Vec::new(),
                dimensions: None,
                updated_at: Utc::now(),
            });

        stored.dimensions = dimensions;
        stored.items.extend(items);
        stored.updated_at = Utc::now();
        Ok(())
    }

    async fn query(&self, name: &str, vector: &[f32], k: usize) -> AppResult<Vec<IndexHit>> {
        let collections = self.collections.read().map_err(poisoned)?;
        let stored = collections
            .get(name)
            .ok_or_else(|| AppError::CollectionNotFound(name.to_string()))?;

        let scored = stored
            .items
            .iter()
            .enumerate()
            .map(|(position, item)| Ok((position, cosine_distance(vector, &item.vector)?, item)))
            .collect::<AppResult<Vec<_>>>()?;

        Ok(rank_by_distance(scored, k)
            .into_iter()
            .map(|(distance, item)| IndexHit {
                id: item.id.clone(),
                text: item.text.clone(),
                metadata: item.metadata.clone(),
                distance,
            })
            .collect())
    }

    async fn collection_exists(&self, name: &str) -> AppResult<bool> {
        Ok(self
            .collections
            .read()
            .map_err(poisoned)?
            .contains_key(name))
    }

    async fn list_collections(&self) -> AppResult<Vec<String>> {
        let mut names: Vec<String> = self
            .collections
            .read()
            .map_err(poisoned)?
            .keys()
            .cloned()
            .collect();
        names.sort();
        Ok(names)
    }

    async fn collection_info(&self, name: &str) -> AppResult<Option<CollectionInfo>> {
        Ok(self
            .collections
            .read()
            .map_err(poisoned)?
            .get(name)
            .map(|stored| CollectionInfo {
                name: name.to_string(),
                count: stored.items.len(),
                dimensions: stored.dimensions,
                updated_at: stored.updated_at,
            }))
    }
}
