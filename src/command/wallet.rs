// Copyright (c) 2025 - Cowboy AI, Inc.
//! Wallet commands and queries (C7): `getWallet`, `updateWalletBalance`, and
//! the wallet side of the reservation saga (§4.8 steps 4 and 7).

use uuid::Uuid;

use crate::bus::EventBus;
use crate::cache::CachePort;
use crate::command::{execute_with_retry, publish_record, CommandAck};
use crate::config::Config;
use crate::domain::money::Money;
use crate::domain::wallet::WalletEvent;
use crate::domain::Wallet;
use crate::errors::{LibraryError, LibraryResult};
use crate::event_store::EventStore;
use crate::projection::wallet::WalletProjection;
use crate::projection::ProjectionRepository;
use crate::subjects::BoundedContext;

/// Creates the wallet on first touch (lazily, as §4.8 step 4 describes for
/// the saga) if it does not already have any events.
pub async fn update_wallet_balance<S>(store: &S, bus: &dyn EventBus, config: &Config, wallet_id: Uuid, user_id: &str, delta: Money) -> LibraryResult<CommandAck>
where
    S: EventStore<WalletEvent>,
{
    let correlation_id = Uuid::now_v7();
    let (ack, record) = execute_with_retry(store, wallet_id, correlation_id, None, config.event_store_max_retry_attempts, |events| {
        if events.is_empty() {
            let (_, event) = Wallet::create(wallet_id, user_id, delta);
            return Ok(event);
        }
        let wallet = Wallet::rehydrate(wallet_id, events)?;
        let (_, event) = wallet.update_balance(delta)?;
        Ok(event)
    })
    .await?;

    publish_record(bus, BoundedContext::Wallet, &record).await?;
    Ok(ack)
}

/// Finds the user's existing wallet by natural key (`userId`), or lazily
/// creates one with a zero balance — §4.8 step 4's "loads or creates wallet".
pub async fn ensure_wallet<S>(store: &S, bus: &dyn EventBus, config: &Config, user_id: &str) -> LibraryResult<Uuid>
where
    S: EventStore<WalletEvent>,
{
    let needle = user_id.to_string();
    let existing = store.find_latest_by_predicate("WalletCreated", &|event: WalletEvent| matches!(event, WalletEvent::WalletCreated(c) if c.user_id == needle)).await?;
    if let Some(id) = existing {
        return Ok(id);
    }

    let wallet_id = Uuid::now_v7();
    let correlation_id = Uuid::now_v7();
    let (_, record) = execute_with_retry(store, wallet_id, correlation_id, None, config.event_store_max_retry_attempts, |events| {
        if !events.is_empty() {
            return Err(LibraryError::Conflict("wallet already exists".to_string()));
        }
        let (_, event) = Wallet::create(wallet_id, user_id, Money::ZERO);
        Ok(event)
    })
    .await?;

    publish_record(bus, BoundedContext::Wallet, &record).await?;
    Ok(wallet_id)
}

/// §4.8 step 4: attempts to debit `amount` from `userId`'s wallet on behalf
/// of `reservationId`. The correlation id is pinned to `reservationId` so
/// the whole cross-context hop shares one causal thread.
pub async fn attempt_wallet_payment<S>(store: &S, bus: &dyn EventBus, config: &Config, user_id: &str, reservation_id: Uuid, amount: Money) -> LibraryResult<WalletEvent>
where
    S: EventStore<WalletEvent>,
{
    let wallet_id = ensure_wallet(store, bus, config, user_id).await?;
    let payment_ref = Uuid::now_v7();
    let (_, record) = execute_with_retry(store, wallet_id, reservation_id, Some(reservation_id), config.event_store_max_retry_attempts, |events| {
        let wallet = Wallet::rehydrate(wallet_id, events)?;
        let (_, event) = wallet.attempt_payment(reservation_id, amount, payment_ref, "internal")?;
        Ok(event)
    })
    .await?;

    publish_record(bus, BoundedContext::Wallet, &record).await?;
    Ok(record.payload)
}

/// §4.8 step 7: debits the late fee computed by the reservation saga.
pub async fn apply_wallet_late_fee<S>(store: &S, bus: &dyn EventBus, config: &Config, wallet_id: Uuid, reservation_id: Uuid, days_late: i64, retail_price: Money) -> LibraryResult<WalletEvent>
where
    S: EventStore<WalletEvent>,
{
    let (_, record) = execute_with_retry(store, wallet_id, reservation_id, Some(reservation_id), config.event_store_max_retry_attempts, |events| {
        let wallet = Wallet::rehydrate(wallet_id, events)?;
        let (_, event) = wallet.apply_late_fee(reservation_id, days_late, retail_price, Money::from_minor_units(config.late_fee_per_day))?;
        Ok(event)
    })
    .await?;

    publish_record(bus, BoundedContext::Wallet, &record).await?;
    Ok(record.payload)
}

const CACHE_TTL_SECS: u64 = 300;

pub async fn get_wallet<R, C>(repository: &R, cache: &C, wallet_id: Uuid) -> LibraryResult<Option<WalletProjection>>
where
    R: ProjectionRepository<WalletProjection>,
    C: CachePort,
{
    let key = format!("wallet:get:{wallet_id}");
    if let Some(cached) = cache.get(&key).await {
        if let Ok(doc) = serde_json::from_str::<WalletProjection>(&cached) {
            return Ok(Some(doc));
        }
    }

    let found = repository.find_one(&|d| d.id == wallet_id).await?;
    if let Some(doc) = &found {
        if let Ok(serialized) = serde_json::to_string(doc) {
            cache.set(&key, serialized, Some(std::time::Duration::from_secs(CACHE_TTL_SECS))).await;
        }
    }
    Ok(found)
}
