// Copyright (c) 2025 - Cowboy AI, Inc.
//! Reservation projection record and C6 event handler.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::cache::CachePort;
use crate::domain::money::Money;
use crate::domain::{ReservationEvent, ReservationStatus};
use crate::errors::LibraryResult;
use crate::event::EventRecord;
use crate::projection::{ProjectionDocument, ProjectionRepository};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReservationProjection {
    pub id: Uuid,
    pub version: u64,
    pub user_id: String,
    pub book_id: Uuid,
    pub due_date: DateTime<Utc>,
    pub status: ReservationStatus,
    pub retail_price: Option<Money>,
    pub fee_charged: Option<Money>,
    pub rejection_reason: Option<String>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl ProjectionDocument for ReservationProjection {
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

impl ReservationProjection {
    /// Reservations whose saga has not yet reached a resting state;
    /// mirrors [`crate::domain::reservation::Reservation::is_active`].
    pub fn is_active(&self) -> bool {
        matches!(self.status, ReservationStatus::Validating | ReservationStatus::PendingPayment | ReservationStatus::Reserved)
    }
}

pub struct ReservationProjectionHandler<R, C> {
    repository: Arc<R>,
    cache: Arc<C>,
}

impl<R, C> ReservationProjectionHandler<R, C>
where
    R: ProjectionRepository<ReservationProjection>,
    C: CachePort,
{
    pub fn new(repository: Arc<R>, cache: Arc<C>) -> Self {
        ReservationProjectionHandler { repository, cache }
    }

    pub async fn handle(&self, record: &EventRecord<ReservationEvent>) -> LibraryResult<()> {
        let id = record.aggregate_id;
        match &record.payload {
            ReservationEvent::ReservationCreated(created) => {
                self.repository
                    .save(ReservationProjection {
                        id,
                        version: record.version,
                        user_id: created.user_id.clone(),
                        book_id: created.book_id,
                        due_date: created.due_date,
                        status: ReservationStatus::Validating,
                        retail_price: None,
                        fee_charged: None,
                        rejection_reason: None,
                        deleted_at: None,
                    })
                    .await?;
            }
            ReservationEvent::ReservationRetailPriceSet(e) => {
                let retail_price = e.retail_price;
                self.repository
                    .update_versioned(
                        id,
                        record.version,
                        Box::new(move |mut doc| {
                            doc.retail_price = Some(retail_price);
                            doc
                        }),
                    )
                    .await?;
            }
            ReservationEvent::ReservationPendingPayment(e) => {
                let amount = e.amount;
                self.repository
                    .update_versioned(
                        id,
                        record.version,
                        Box::new(move |mut doc| {
                            doc.status = ReservationStatus::PendingPayment;
                            doc.fee_charged = Some(amount);
                            doc
                        }),
                    )
                    .await?;
            }
            ReservationEvent::ReservationConfirmed(_) => {
                self.repository
                    .update_versioned(
                        id,
                        record.version,
                        Box::new(|mut doc| {
                            doc.status = ReservationStatus::Reserved;
                            doc
                        }),
                    )
                    .await?;
            }
            ReservationEvent::ReservationRejected(e) => {
                let reason = e.reason.clone();
                self.repository
                    .update_versioned(
                        id,
                        record.version,
                        Box::new(move |mut doc| {
                            doc.status = ReservationStatus::Rejected;
                            doc.rejection_reason = Some(reason);
                            doc
                        }),
                    )
                    .await?;
            }
            ReservationEvent::ReservationReturned(_) => {
                self.repository
                    .update_versioned(
                        id,
                        record.version,
                        Box::new(|mut doc| {
                            doc.status = ReservationStatus::Returned;
                            doc
                        }),
                    )
                    .await?;
            }
            ReservationEvent::ReservationBookBrought(_) => {
                self.repository
                    .update_versioned(
                        id,
                        record.version,
                        Box::new(|mut doc| {
                            doc.status = ReservationStatus::Brought;
                            doc
                        }),
                    )
                    .await?;
            }
            ReservationEvent::ReservationCancelled(_) => {
                self.repository
                    .update_versioned(
                        id,
                        record.version,
                        Box::new(|mut doc| {
                            doc.status = ReservationStatus::Cancelled;
                            doc
                        }),
                    )
                    .await?;
            }
            ReservationEvent::ReservationDeleted(_) => {
                self.repository.mark_deleted(id, record.version, record.timestamp).await?;
            }
        }

        self.cache.del(&format!("reservation:get:{id}")).await;
        self.cache.del_pattern("reservation:list:*").await;
        Ok(())
    }
}

#[async_trait::async_trait]
impl<R, C> crate::bus::EventHandler for ReservationProjectionHandler<R, C>
where
    R: ProjectionRepository<ReservationProjection>,
    C: CachePort,
{
    async fn handle(&self, _event_type: &str, payload: &[u8]) -> LibraryResult<()> {
        let record: EventRecord<ReservationEvent> = serde_json::from_slice(payload)?;
        self.handle(&record).await
    }
}
