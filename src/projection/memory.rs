// Copyright (c) 2025 - Cowboy AI, Inc.
//! Reference [`ProjectionRepository`] backed by an in-process `RwLock<HashMap>`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

use crate::errors::{LibraryError, LibraryResult};
use crate::projection::{FindManyOptions, PaginatedResult, Pagination, ProjectionDocument, ProjectionRepository, SortOrder};

pub struct InMemoryProjectionStore<D> {
    documents: RwLock<HashMap<Uuid, D>>,
}

impl<D> Default for InMemoryProjectionStore<D> {
    fn default() -> Self {
        InMemoryProjectionStore { documents: RwLock::new(HashMap::new()) }
    }
}

impl<D> InMemoryProjectionStore<D> {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Soft-delete invariant (§4.4): every read implicitly excludes `deletedAt`.
fn is_visible<D: ProjectionDocument>(doc: &D) -> bool {
    doc.deleted_at().is_none()
}

#[async_trait]
impl<D> ProjectionRepository<D> for InMemoryProjectionStore<D>
where
    D: ProjectionDocument + 'static,
{
    async fn save(&self, doc: D) -> LibraryResult<()> {
        let mut docs = self.documents.write().map_err(|_| LibraryError::Internal("projection store lock poisoned".to_string()))?;
        docs.insert(doc.id(), doc);
        Ok(())
    }

    async fn update_versioned(&self, id: Uuid, new_version: u64, patch: Box<dyn FnOnce(D) -> D + Send>) -> LibraryResult<()> {
        let mut docs = self.documents.write().map_err(|_| LibraryError::Internal("projection store lock poisoned".to_string()))?;
        let doc = docs.get(&id).cloned().ok_or_else(|| LibraryError::NotFound(format!("projection {id} not found")))?;
        if doc.version() < new_version {
            let mut updated = patch(doc);
            updated.set_version(new_version);
            docs.insert(id, updated);
        }
        Ok(())
    }

    async fn update_simple(&self, id: Uuid, patch: Box<dyn FnOnce(D) -> D + Send>, throw_if_not_found: bool) -> LibraryResult<()> {
        let mut docs = self.documents.write().map_err(|_| LibraryError::Internal("projection store lock poisoned".to_string()))?;
        match docs.get(&id).cloned() {
            Some(doc) => {
                docs.insert(id, patch(doc));
                Ok(())
            }
            None if throw_if_not_found => Err(LibraryError::NotFound(format!("projection {id} not found"))),
            None => {
                tracing::warn!(%id, "update_simple: projection not found, ignoring");
                Ok(())
            }
        }
    }

    async fn mark_deleted(&self, id: Uuid, new_version: u64, at: DateTime<Utc>) -> LibraryResult<()> {
        let mut docs = self.documents.write().map_err(|_| LibraryError::Internal("projection store lock poisoned".to_string()))?;
        let doc = docs.get_mut(&id).ok_or_else(|| LibraryError::NotFound(format!("projection {id} not found")))?;
        if doc.version() < new_version {
            doc.set_deleted_at(Some(at));
            doc.set_version(new_version);
        }
        Ok(())
    }

    async fn find_one(&self, filter: &(dyn Fn(D) -> bool + Send + Sync)) -> LibraryResult<Option<D>> {
        let snapshot: Vec<D> = {
            let docs = self.documents.read().map_err(|_| LibraryError::Internal("projection store lock poisoned".to_string()))?;
            docs.values().cloned().collect()
        };
        Ok(snapshot.into_iter().find(|d| is_visible(d) && filter(d.clone())))
    }

    async fn find_many(&self, filter: &(dyn Fn(D) -> bool + Send + Sync), options: FindManyOptions) -> LibraryResult<Vec<D>> {
        let snapshot: Vec<D> = {
            let docs = self.documents.read().map_err(|_| LibraryError::Internal("projection store lock poisoned".to_string()))?;
            docs.values().cloned().collect()
        };
        let mut matched: Vec<D> = snapshot.into_iter().filter(|d| is_visible(d) && filter(d.clone())).collect();

        if options.sort_by.is_some() {
            matched.sort_by_key(|d| d.version());
            if options.sort_order == Some(SortOrder::Desc) {
                matched.reverse();
            }
        }

        let skipped: Vec<D> = matched.into_iter().skip(options.skip).collect();
        Ok(match options.limit {
            Some(limit) => skipped.into_iter().take(limit).collect(),
            None => skipped,
        })
    }

    async fn count(&self, filter: &(dyn Fn(D) -> bool + Send + Sync)) -> LibraryResult<usize> {
        let snapshot: Vec<D> = {
            let docs = self.documents.read().map_err(|_| LibraryError::Internal("projection store lock poisoned".to_string()))?;
            docs.values().cloned().collect()
        };
        Ok(snapshot.into_iter().filter(|d| is_visible(d) && filter(d.clone())).count())
    }

    async fn execute_paginated_query(&self, filter: &(dyn Fn(D) -> bool + Send + Sync), page: usize, limit: usize) -> LibraryResult<PaginatedResult<D>> {
        let page = page.max(1);
        let total = self.count(filter).await?;
        let options = FindManyOptions { skip: (page - 1) * limit.max(1), limit: Some(limit.max(1)), sort_by: None, sort_order: None };
        let data = self.find_many(filter, options).await?;
        Ok(PaginatedResult { data, pagination: Pagination::new(total, page, limit) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Doc {
        id: Uuid,
        version: u64,
        deleted_at: Option<DateTime<Utc>>,
        label: String,
    }

    impl ProjectionDocument for Doc {
        fn id(&self) -> Uuid {
            self.id
        }
        fn version(&self) -> u64 {
            self.version
        }
        fn set_version(&mut self, version: u64) {
            self.version = version;
        }
        fn deleted_at(&self) -> Option<DateTime<Utc>> {
            self.deleted_at
        }
        fn set_deleted_at(&mut self, at: Option<DateTime<Utc>>) {
            self.deleted_at = at;
        }
    }

    fn doc(label: &str) -> Doc {
        Doc { id: Uuid::now_v7(), version: 1, deleted_at: None, label: label.to_string() }
    }

    #[tokio::test]
    async fn save_then_find_one_round_trips() {
        let store = InMemoryProjectionStore::new();
        let d = doc("a");
        store.save(d.clone()).await.unwrap();
        let found = store.find_one(&|x| x.id == d.id).await.unwrap().unwrap();
        assert_eq!(found.label, "a");
    }

    #[tokio::test]
    async fn update_versioned_drops_stale_updates() {
        let store = InMemoryProjectionStore::new();
        let d = doc("a");
        store.save(d.clone()).await.unwrap();
        store
            .update_versioned(
                d.id,
                5,
                Box::new(|mut x| {
                    x.label = "b".to_string();
                    x
                }),
            )
            .await
            .unwrap();
        store
            .update_versioned(
                d.id,
                2,
                Box::new(|mut x| {
                    x.label = "stale".to_string();
                    x
                }),
            )
            .await
            .unwrap();
        let found = store.find_one(&|x| x.id == d.id).await.unwrap().unwrap();
        assert_eq!(found.label, "b");
        assert_eq!(found.version, 5);
    }

    #[tokio::test]
    async fn mark_deleted_hides_from_reads() {
        let store = InMemoryProjectionStore::new();
        let d = doc("a");
        store.save(d.clone()).await.unwrap();
        store.mark_deleted(d.id, 2, Utc::now()).await.unwrap();
        assert!(store.find_one(&|x| x.id == d.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn paginated_query_reports_correct_metadata() {
        let store = InMemoryProjectionStore::new();
        for i in 0..25 {
            store.save(doc(&i.to_string())).await.unwrap();
        }
        let page = store.execute_paginated_query(&|_| true, 2, 10).await.unwrap();
        assert_eq!(page.data.len(), 10);
        assert_eq!(page.pagination.total, 25);
        assert_eq!(page.pagination.pages, 3);
        assert!(page.pagination.has_next);
        assert!(page.pagination.has_prev);
    }

    #[tokio::test]
    async fn update_simple_logs_and_ignores_missing_by_default() {
        let store: InMemoryProjectionStore<Doc> = InMemoryProjectionStore::new();
        let missing = Uuid::now_v7();
        store
            .update_simple(
                missing,
                Box::new(|mut x| {
                    x.label = "x".to_string();
                    x
                }),
                false,
            )
            .await
            .unwrap();
        assert!(store
            .update_simple(
                missing,
                Box::new(|mut x| {
                    x.label = "x".to_string();
                    x
                }),
                true,
            )
            .await
            .is_err());
    }
}
