// Copyright (c) 2025 - Cowboy AI, Inc.
//! Wallet projection record and C6 event handler.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::cache::CachePort;
use crate::domain::money::Money;
use crate::domain::WalletEvent;
use crate::errors::LibraryResult;
use crate::event::EventRecord;
use crate::projection::{ProjectionDocument, ProjectionRepository};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletProjection {
    pub id: Uuid,
    pub version: u64,
    pub user_id: String,
    pub balance: Money,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl ProjectionDocument for WalletProjection {
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

pub struct WalletProjectionHandler<R, C> {
    repository: Arc<R>,
    cache: Arc<C>,
}

impl<R, C> WalletProjectionHandler<R, C>
where
    R: ProjectionRepository<WalletProjection>,
    C: CachePort,
{
    pub fn new(repository: Arc<R>, cache: Arc<C>) -> Self {
        WalletProjectionHandler { repository, cache }
    }

    pub async fn handle(&self, record: &EventRecord<WalletEvent>) -> LibraryResult<()> {
        let id = record.aggregate_id;
        match &record.payload {
            WalletEvent::WalletCreated(created) => {
                self.repository
                    .save(WalletProjection { id, version: record.version, user_id: created.user_id.clone(), balance: created.initial_balance, deleted_at: None })
                    .await?;
            }
            WalletEvent::WalletBalanceUpdated(updated) => {
                let new_balance = updated.new_balance;
                self.repository
                    .update_versioned(
                        id,
                        record.version,
                        Box::new(move |mut doc| {
                            doc.balance = new_balance;
                            doc
                        }),
                    )
                    .await?;
            }
            WalletEvent::WalletLateFeeApplied(applied) => {
                let fee = applied.fee;
                self.repository
                    .update_versioned(
                        id,
                        record.version,
                        Box::new(move |mut doc| {
                            doc.balance = doc.balance - fee;
                            doc
                        }),
                    )
                    .await?;
            }
            WalletEvent::WalletPaymentSuccess(success) => {
                let amount = success.amount;
                self.repository
                    .update_versioned(
                        id,
                        record.version,
                        Box::new(move |mut doc| {
                            doc.balance = doc.balance - amount;
                            doc
                        }),
                    )
                    .await?;
            }
            // A decline does not change the balance; the version still
            // advances so a later redelivery of the same event is a no-op.
            WalletEvent::WalletPaymentDeclined(_) => {
                self.repository.update_versioned(id, record.version, Box::new(|doc| doc)).await?;
            }
        }

        self.cache.del(&format!("wallet:get:{id}")).await;
        Ok(())
    }
}

#[async_trait::async_trait]
impl<R, C> crate::bus::EventHandler for WalletProjectionHandler<R, C>
where
    R: ProjectionRepository<WalletProjection>,
    C: CachePort,
{
    async fn handle(&self, _event_type: &str, payload: &[u8]) -> LibraryResult<()> {
        let record: EventRecord<WalletEvent> = serde_json::from_slice(payload)?;
        self.handle(&record).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryCache;
    use crate::domain::wallet::WalletCreated;
    use crate::projection::InMemoryProjectionStore;

    fn ts() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z").unwrap().with_timezone(&Utc)
    }

    fn record(id: Uuid, version: u64, event: WalletEvent) -> EventRecord<WalletEvent> {
        let mut r = EventRecord::pending(id, ts(), event, Uuid::now_v7(), None);
        r.version = version;
        r.global_version = version;
        r
    }

    #[tokio::test]
    async fn payment_success_debits_balance() {
        let repo = Arc::new(InMemoryProjectionStore::new());
        let cache = Arc::new(InMemoryCache::new());
        let handler = WalletProjectionHandler::new(repo.clone(), cache);

        let id = Uuid::now_v7();
        let created = WalletEvent::WalletCreated(WalletCreated { user_id: "U1".into(), initial_balance: Money::from_major_str("50.00").unwrap() });
        handler.handle(&record(id, 1, created)).await.unwrap();

        let (_, success_event) = crate::domain::Wallet::create(id, "U1", Money::from_major_str("50.00").unwrap());
        let _ = success_event;
        let paid = WalletEvent::WalletPaymentSuccess(crate::domain::wallet::WalletPaymentSuccess { reservation_id: Uuid::now_v7(), payment_ref: Uuid::now_v7(), method: "internal".into(), amount: Money::from_major_str("3.00").unwrap() });
        handler.handle(&record(id, 2, paid)).await.unwrap();

        let found = repo.find_one(&|d| d.id == id).await.unwrap().unwrap();
        assert_eq!(found.balance.minor_units(), 4700);
    }

    #[tokio::test]
    async fn payment_declined_leaves_balance_unchanged() {
        let repo = Arc::new(InMemoryProjectionStore::new());
        let cache = Arc::new(InMemoryCache::new());
        let handler = WalletProjectionHandler::new(repo.clone(), cache);

        let id = Uuid::now_v7();
        let created = WalletEvent::WalletCreated(WalletCreated { user_id: "U1".into(), initial_balance: Money::from_major_str("2.00").unwrap() });
        handler.handle(&record(id, 1, created)).await.unwrap();

        let declined = WalletEvent::WalletPaymentDeclined(crate::domain::wallet::WalletPaymentDeclined { reservation_id: Uuid::now_v7(), reason: "insufficient funds".into(), amount: Money::from_major_str("3.00").unwrap() });
        handler.handle(&record(id, 2, declined)).await.unwrap();

        let found = repo.find_one(&|d| d.id == id).await.unwrap().unwrap();
        assert_eq!(found.balance.minor_units(), 200);
        assert_eq!(found.version, 2);
    }
}
