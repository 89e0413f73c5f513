// Copyright (c) 2025 - Cowboy AI, Inc.
//! Projection repository base (C5): a versioned, soft-deleting read-model
//! store. The trait is the stable boundary; this core ships one in-process,
//! `RwLock`-guarded reference implementation and no external storage engine.

pub mod book;
pub mod memory;
pub mod reservation;
pub mod wallet;

pub use book::{BookProjection, BookProjectionHandler};
pub use memory::InMemoryProjectionStore;
pub use reservation::{ReservationProjection, ReservationProjectionHandler};
pub use wallet::{WalletProjection, WalletProjectionHandler};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::LibraryResult;

/// Minimum shape every projected document must carry: an id, a version used
/// for idempotent updates, and an optional soft-delete marker.
pub trait ProjectionDocument: Clone + Send + Sync {
    fn id(&self) -> Uuid;
    fn version(&self) -> u64;
    fn set_version(&mut self, version: u64);
    fn deleted_at(&self) -> Option<chrono::DateTime<chrono::Utc>>;
    fn set_deleted_at(&mut self, at: Option<chrono::DateTime<chrono::Utc>>);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

/// Options accepted by [`ProjectionRepository::find_many`].
#[derive(Debug, Clone, Default)]
pub struct FindManyOptions {
    pub skip: usize,
    pub limit: Option<usize>,
    pub sort_by: Option<String>,
    pub sort_order: Option<SortOrder>,
}

/// Pagination metadata returned alongside a page of results (§4.7).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub total: usize,
    pub page: usize,
    pub limit: usize,
    pub pages: usize,
    pub has_next: bool,
    pub has_prev: bool,
}

impl Pagination {
    pub fn new(total: usize, page: usize, limit: usize) -> Self {
        let limit = limit.max(1);
        let pages = total.div_ceil(limit).max(1);
        Pagination {
            total,
            page,
            limit,
            pages,
            has_next: page < pages,
            has_prev: page > 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PaginatedResult<T> {
    pub data: Vec<T>,
    pub pagination: Pagination,
}

/// Versioned read-model store (C5). `D` is the stored document; `filter` is
/// a predicate over `D` rather than a query DSL (Non-goal: per-field query
/// language).
#[async_trait]
pub trait ProjectionRepository<D>: Send + Sync
where
    D: ProjectionDocument + 'static,
{
    async fn save(&self, doc: D) -> LibraryResult<()>;

    /// Applies `patch` only if `stored.version < new_version`; otherwise a
    /// no-op. Fails `NotFound` only when no document exists at `id` at all.
    async fn update_versioned(&self, id: Uuid, new_version: u64, patch: Box<dyn FnOnce(D) -> D + Send>) -> LibraryResult<()>;

    /// Unconditional patch for cross-context maintenance events.
    async fn update_simple(&self, id: Uuid, patch: Box<dyn FnOnce(D) -> D + Send>, throw_if_not_found: bool) -> LibraryResult<()>;

    async fn mark_deleted(&self, id: Uuid, new_version: u64, at: chrono::DateTime<chrono::Utc>) -> LibraryResult<()>;

    async fn find_one(&self, filter: &(dyn Fn(D) -> bool + Send + Sync)) -> LibraryResult<Option<D>>;

    async fn find_many(&self, filter: &(dyn Fn(D) -> bool + Send + Sync), options: FindManyOptions) -> LibraryResult<Vec<D>>;

    async fn count(&self, filter: &(dyn Fn(D) -> bool + Send + Sync)) -> LibraryResult<usize>;

    async fn execute_paginated_query(&self, filter: &(dyn Fn(D) -> bool + Send + Sync), page: usize, limit: usize) -> LibraryResult<PaginatedResult<D>>;
}
