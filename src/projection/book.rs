// Copyright (c) 2025 - Cowboy AI, Inc.
//! Book projection record and C6 event handler.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::cache::CachePort;
use crate::domain::money::Money;
use crate::domain::{BookEvent, BookPatch};
use crate::errors::LibraryResult;
use crate::event::EventRecord;
use crate::projection::{ProjectionDocument, ProjectionRepository};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookProjection {
    pub id: Uuid,
    pub version: u64,
    pub isbn: String,
    pub title: String,
    pub author: String,
    pub publication_year: u32,
    pub publisher: String,
    pub price: Money,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl ProjectionDocument for BookProjection {
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

fn apply_patch(doc: &mut BookProjection, patch: &BookPatch) {
    if let Some(t) = &patch.title {
        doc.title = t.clone();
    }
    if let Some(a) = &patch.author {
        doc.author = a.clone();
    }
    if let Some(y) = patch.publication_year {
        doc.publication_year = y;
    }
    if let Some(p) = &patch.publisher {
        doc.publisher = p.clone();
    }
    if let Some(price) = patch.price {
        doc.price = price;
    }
}

/// Exactly one handler per (Books context, event type), per §4.5.
pub struct BookProjectionHandler<R, C> {
    repository: Arc<R>,
    cache: Arc<C>,
}

impl<R, C> BookProjectionHandler<R, C>
where
    R: ProjectionRepository<BookProjection>,
    C: CachePort,
{
    pub fn new(repository: Arc<R>, cache: Arc<C>) -> Self {
        BookProjectionHandler { repository, cache }
    }

    /// Translate one book event into a repository call, then invalidate the
    /// affected cache keys. Unknown/future variants fall through a `match`
    /// that is total over the current `BookEvent` set.
    pub async fn handle(&self, record: &EventRecord<BookEvent>) -> LibraryResult<()> {
        let id = record.aggregate_id;
        match &record.payload {
            BookEvent::BookCreated(created) => {
                self.repository
                    .save(BookProjection {
                        id,
                        version: record.version,
                        isbn: created.isbn.clone(),
                        title: created.title.clone(),
                        author: created.author.clone(),
                        publication_year: created.publication_year,
                        publisher: created.publisher.clone(),
                        price: created.price,
                        deleted_at: None,
                    })
                    .await?;
            }
            BookEvent::BookUpdated(updated) => {
                let patch = updated.patch.clone();
                self.repository
                    .update_versioned(
                        id,
                        record.version,
                        Box::new(move |mut doc| {
                            apply_patch(&mut doc, &patch);
                            doc
                        }),
                    )
                    .await?;
            }
            BookEvent::BookDeleted(_) => {
                self.repository.mark_deleted(id, record.version, record.timestamp).await?;
            }
        }

        self.cache.del(&format!("book:get:{id}")).await;
        self.cache.del_pattern("catalog:list:*").await;
        Ok(())
    }
}

#[async_trait::async_trait]
impl<R, C> crate::bus::EventHandler for BookProjectionHandler<R, C>
where
    R: ProjectionRepository<BookProjection>,
    C: CachePort,
{
    async fn handle(&self, _event_type: &str, payload: &[u8]) -> LibraryResult<()> {
        let record: EventRecord<BookEvent> = serde_json::from_slice(payload)?;
        self.handle(&record).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryCache;
    use crate::domain::book::{BookCreated, BookUpdated};
    use crate::projection::InMemoryProjectionStore;

    fn ts() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z").unwrap().with_timezone(&Utc)
    }

    fn record(id: Uuid, version: u64, event: BookEvent) -> EventRecord<BookEvent> {
        let mut r = EventRecord::pending(id, ts(), event, Uuid::now_v7(), None);
        r.version = version;
        r.global_version = version;
        r
    }

    #[tokio::test]
    async fn created_event_saves_projection() {
        let repo = Arc::new(InMemoryProjectionStore::new());
        let cache = Arc::new(InMemoryCache::new());
        let handler = BookProjectionHandler::new(repo.clone(), cache);

        let id = Uuid::now_v7();
        let created = BookEvent::BookCreated(BookCreated { isbn: "X".into(), title: "T".into(), author: "A".into(), publication_year: 2020, publisher: "P".into(), price: Money::ZERO });
        handler.handle(&record(id, 1, created)).await.unwrap();

        let found = repo.find_one(&|d| d.id == id).await.unwrap().unwrap();
        assert_eq!(found.title, "T");
    }

    #[tokio::test]
    async fn updated_event_is_idempotent_under_redelivery() {
        let repo = Arc::new(InMemoryProjectionStore::new());
        let cache = Arc::new(InMemoryCache::new());
        let handler = BookProjectionHandler::new(repo.clone(), cache);

        let id = Uuid::now_v7();
        let created = BookEvent::BookCreated(BookCreated { isbn: "X".into(), title: "T".into(), author: "A".into(), publication_year: 2020, publisher: "P".into(), price: Money::ZERO });
        handler.handle(&record(id, 1, created)).await.unwrap();

        let updated = BookEvent::BookUpdated(BookUpdated { patch: BookPatch { title: Some("New".into()), ..Default::default() } });
        handler.handle(&record(id, 2, updated.clone())).await.unwrap();
        // Redelivery of the same event must not re-apply.
        handler.handle(&record(id, 2, updated)).await.unwrap();

        let found = repo.find_one(&|d| d.id == id).await.unwrap().unwrap();
        assert_eq!(found.title, "New");
        assert_eq!(found.version, 2);
    }

    #[tokio::test]
    async fn deleted_event_hides_from_reads() {
        let repo = Arc::new(InMemoryProjectionStore::new());
        let cache = Arc::new(InMemoryCache::new());
        let handler = BookProjectionHandler::new(repo.clone(), cache);

        let id = Uuid::now_v7();
        let created = BookEvent::BookCreated(BookCreated { isbn: "X".into(), title: "T".into(), author: "A".into(), publication_year: 2020, publisher: "P".into(), price: Money::ZERO });
        handler.handle(&record(id, 1, created)).await.unwrap();
        handler.handle(&record(id, 2, BookEvent::BookDeleted(crate::domain::book::BookDeleted {}))).await.unwrap();

        assert!(repo.find_one(&|d| d.id == id).await.unwrap().is_none());
    }
}
