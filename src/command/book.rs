// Copyright (c) 2025 - Cowboy AI, Inc.
//! Book commands and queries (C7): `createBook`, `updateBook`, `deleteBook`,
//! `getBook`, `searchCatalog`.

use uuid::Uuid;

use crate::bus::EventBus;
use crate::cache::CachePort;
use crate::command::{execute_with_retry, publish_record, CommandAck};
use crate::config::Config;
use crate::domain::book::BookPatch;
use crate::domain::{Book, Money};
use crate::errors::{LibraryError, LibraryResult};
use crate::event_store::EventStore;
use crate::projection::book::BookProjection;
use crate::projection::{PaginatedResult, ProjectionRepository};
use crate::subjects::BoundedContext;

#[allow(clippy::too_many_arguments)]
pub async fn create_book<S, R>(
    store: &S,
    bus: &dyn EventBus,
    repository: &R,
    config: &Config,
    isbn: String,
    title: String,
    author: String,
    publication_year: u32,
    publisher: String,
    price: Money,
) -> LibraryResult<CommandAck>
where
    S: EventStore<crate::domain::book::BookEvent>,
    R: ProjectionRepository<BookProjection>,
{
    if repository.find_one(&|d| d.isbn == isbn).await?.is_some() {
        return Err(LibraryError::Conflict(format!("a book with isbn {isbn} already exists")));
    }

    let aggregate_id = Uuid::now_v7();
    let correlation_id = Uuid::now_v7();

    let (ack, record) = execute_with_retry(store, aggregate_id, correlation_id, None, config.event_store_max_retry_attempts, |events| {
        if !events.is_empty() {
            return Err(LibraryError::Conflict("book already exists".to_string()));
        }
        let (_, event) = Book::create(aggregate_id, isbn.clone(), title.clone(), author.clone(), publication_year, publisher.clone(), price)?;
        Ok(event)
    })
    .await?;

    publish_record(bus, BoundedContext::Book, &record).await?;
    Ok(ack)
}

pub async fn update_book<S>(store: &S, bus: &dyn EventBus, config: &Config, book_id: Uuid, patch: BookPatch) -> LibraryResult<CommandAck>
where
    S: EventStore<crate::domain::book::BookEvent>,
{
    let correlation_id = Uuid::now_v7();
    let (ack, record) = execute_with_retry(store, book_id, correlation_id, None, config.event_store_max_retry_attempts, |events| {
        if events.is_empty() {
            return Err(LibraryError::NotFound(format!("book {book_id} not found")));
        }
        let book = Book::rehydrate(book_id, events)?;
        let (_, event) = book.update(patch.clone())?;
        Ok(event)
    })
    .await?;

    publish_record(bus, BoundedContext::Book, &record).await?;
    Ok(ack)
}

pub async fn delete_book<S>(store: &S, bus: &dyn EventBus, config: &Config, book_id: Uuid) -> LibraryResult<CommandAck>
where
    S: EventStore<crate::domain::book::BookEvent>,
{
    let correlation_id = Uuid::now_v7();
    let (ack, record) = execute_with_retry(store, book_id, correlation_id, None, config.event_store_max_retry_attempts, |events| {
        if events.is_empty() {
            return Err(LibraryError::NotFound(format!("book {book_id} not found")));
        }
        let book = Book::rehydrate(book_id, events)?;
        let (_, event) = book.delete()?;
        Ok(event)
    })
    .await?;

    publish_record(bus, BoundedContext::Book, &record).await?;
    Ok(ack)
}

const CACHE_TTL_SECS: u64 = 300;

/// Read-through `getBook`: cache hit avoids the projection read entirely.
pub async fn get_book<R, C>(repository: &R, cache: &C, book_id: Uuid) -> LibraryResult<Option<BookProjection>>
where
    R: ProjectionRepository<BookProjection>,
    C: CachePort,
{
    let key = format!("book:get:{book_id}");
    if let Some(cached) = cache.get(&key).await {
        if let Ok(doc) = serde_json::from_str::<BookProjection>(&cached) {
            return Ok(Some(doc));
        }
    }

    let found = repository.find_one(&|d| d.id == book_id).await?;
    if let Some(doc) = &found {
        if let Ok(serialized) = serde_json::to_string(doc) {
            cache.set(&key, serialized, Some(std::time::Duration::from_secs(CACHE_TTL_SECS))).await;
        }
    }
    Ok(found)
}

/// `searchCatalog`: paginated, non-mutating browse over the book projection.
pub async fn search_catalog<R>(repository: &R, query: Option<String>, page: usize, limit: usize) -> LibraryResult<PaginatedResult<BookProjection>>
where
    R: ProjectionRepository<BookProjection>,
{
    match query {
        Some(q) => {
            let needle = q.to_lowercase();
            repository.execute_paginated_query(&|d| d.title.to_lowercase().contains(&needle) || d.author.to_lowercase().contains(&needle), page, limit).await
        }
        None => repository.execute_paginated_query(&|_| true, page, limit).await,
    }
}
