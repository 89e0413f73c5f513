// Copyright (c) 2025 - Cowboy AI, Inc.
//! Reservation commands/queries and the cross-context saga handlers (C8,
//! §4.8). The saga is modelled as a handful of [`crate::bus::EventHandler`]
//! adapters wired onto the bus by [`wire_saga`]; each one reacts to exactly
//! one cross-context event type and drives the next transition.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::bus::{EventBus, EventHandler};
use crate::cache::CachePort;
use crate::command::wallet::{apply_wallet_late_fee, attempt_wallet_payment, ensure_wallet};
use crate::command::{execute_with_retry, publish_message, publish_record, CommandAck};
use crate::config::Config;
use crate::domain::money::Money;
use crate::domain::reservation::ReservationEvent;
use crate::domain::wallet::WalletEvent;
use crate::domain::{BookEvent, Reservation};
use crate::errors::{LibraryError, LibraryResult};
use crate::event::EventRecord;
use crate::event_store::EventStore;
use crate::projection::book::BookProjection;
use crate::projection::reservation::ReservationProjection;
use crate::projection::{PaginatedResult, ProjectionRepository};
use crate::subjects::BoundedContext;

/// §4.8 step 1: transient message, not backed by any event-store record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookValidationRequested {
    pub reservation_id: Uuid,
    pub book_id: Uuid,
}

/// §4.8 step 2: the Book context's answer to a validation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookValidationResult {
    pub reservation_id: Uuid,
    pub book_id: Uuid,
    pub is_valid: bool,
    pub reason: Option<String>,
    pub retail_price: Option<Money>,
}

/// §4.8 step 1: `CreateReservation(userId, bookId)`.
pub async fn create_reservation<S>(store: &S, bus: &dyn EventBus, config: &Config, user_id: String, book_id: Uuid, now: DateTime<Utc>) -> LibraryResult<CommandAck>
where
    S: EventStore<ReservationEvent>,
{
    let reservation_id = Uuid::now_v7();
    let due_date = now + chrono::Duration::days(config.book_return_due_date_days);

    let (ack, record) = execute_with_retry(store, reservation_id, reservation_id, None, config.event_store_max_retry_attempts, |events| {
        if !events.is_empty() {
            return Err(LibraryError::Conflict("reservation already exists".to_string()));
        }
        let (_, event) = Reservation::create(reservation_id, user_id.clone(), book_id, due_date);
        Ok(event)
    })
    .await?;

    publish_record(bus, BoundedContext::Reservation, &record).await?;
    publish_message(bus, BoundedContext::Book, book_id, "BookValidationRequested", &BookValidationRequested { reservation_id, book_id }).await?;
    Ok(ack)
}

/// §4.8 step 7: `ReturnReservation(reservationId)`.
pub async fn return_reservation<S>(store: &S, bus: &dyn EventBus, config: &Config, reservation_id: Uuid, now: DateTime<Utc>) -> LibraryResult<CommandAck>
where
    S: EventStore<ReservationEvent>,
{
    let (ack, record) = execute_with_retry(store, reservation_id, reservation_id, None, config.event_store_max_retry_attempts, |events| {
        if events.is_empty() {
            return Err(LibraryError::NotFound(format!("reservation {reservation_id} not found")));
        }
        let reservation = Reservation::rehydrate(reservation_id, events)?;
        let (_, event) = reservation.return_book(now)?;
        Ok(event)
    })
    .await?;

    publish_record(bus, BoundedContext::Reservation, &record).await?;
    Ok(ack)
}

const CACHE_TTL_SECS: u64 = 300;

pub async fn get_reservation<R, C>(repository: &R, cache: &C, reservation_id: Uuid) -> LibraryResult<Option<ReservationProjection>>
where
    R: ProjectionRepository<ReservationProjection>,
    C: CachePort,
{
    let key = format!("reservation:get:{reservation_id}");
    if let Some(cached) = cache.get(&key).await {
        if let Ok(doc) = serde_json::from_str::<ReservationProjection>(&cached) {
            return Ok(Some(doc));
        }
    }

    let found = repository.find_one(&|d| d.id == reservation_id).await?;
    if let Some(doc) = &found {
        if let Ok(serialized) = serde_json::to_string(doc) {
            cache.set(&key, serialized, Some(std::time::Duration::from_secs(CACHE_TTL_SECS))).await;
        }
    }
    Ok(found)
}

/// Paginated browse of a user's reservations (§4.7 query handler).
pub async fn get_reservation_history<R>(repository: &R, user_id: String, page: usize, limit: usize) -> LibraryResult<PaginatedResult<ReservationProjection>>
where
    R: ProjectionRepository<ReservationProjection>,
{
    repository.execute_paginated_query(&|d| d.user_id == user_id, page, limit).await
}

/// §4.8 step 2: Book context reacts to `BookValidationRequested` by reading
/// its own projection and answering with `BookValidationResult`.
pub struct BookValidationRequestedHandler<RB> {
    book_repository: Arc<RB>,
    bus: Arc<dyn EventBus>,
}

impl<RB> BookValidationRequestedHandler<RB>
where
    RB: ProjectionRepository<BookProjection>,
{
    pub fn new(book_repository: Arc<RB>, bus: Arc<dyn EventBus>) -> Self {
        BookValidationRequestedHandler { book_repository, bus }
    }
}

#[async_trait::async_trait]
impl<RB> EventHandler for BookValidationRequestedHandler<RB>
where
    RB: ProjectionRepository<BookProjection> + 'static,
{
    async fn handle(&self, _event_type: &str, payload: &[u8]) -> LibraryResult<()> {
        let requested: BookValidationRequested = serde_json::from_slice(payload)?;
        let book = self.book_repository.find_one(&|d| d.id == requested.book_id).await?;
        let result = match book {
            Some(doc) => BookValidationResult { reservation_id: requested.reservation_id, book_id: requested.book_id, is_valid: true, reason: None, retail_price: Some(doc.price) },
            None => BookValidationResult { reservation_id: requested.reservation_id, book_id: requested.book_id, is_valid: false, reason: Some("BookNotFound".to_string()), retail_price: None },
        };
        publish_message(self.bus.as_ref(), BoundedContext::Reservation, requested.reservation_id, "BookValidationResult", &result).await
    }
}

/// §4.8 step 3: the Reservation side of the validation answer. Enforces the
/// per-user reservation cap, then either rejects or advances to
/// `PendingPayment` via two separately-persisted-and-published events.
pub struct BookValidationResultHandler<S, RR> {
    store: Arc<S>,
    reservation_repository: Arc<RR>,
    bus: Arc<dyn EventBus>,
    config: Arc<Config>,
}

impl<S, RR> BookValidationResultHandler<S, RR>
where
    S: EventStore<ReservationEvent>,
    RR: ProjectionRepository<ReservationProjection>,
{
    pub fn new(store: Arc<S>, reservation_repository: Arc<RR>, bus: Arc<dyn EventBus>, config: Arc<Config>) -> Self {
        BookValidationResultHandler { store, reservation_repository, bus, config }
    }
}

#[async_trait::async_trait]
impl<S, RR> EventHandler for BookValidationResultHandler<S, RR>
where
    S: EventStore<ReservationEvent> + 'static,
    RR: ProjectionRepository<ReservationProjection> + 'static,
{
    async fn handle(&self, _event_type: &str, payload: &[u8]) -> LibraryResult<()> {
        let result: BookValidationResult = serde_json::from_slice(payload)?;
        let reservation_id = result.reservation_id;

        let current = self
            .reservation_repository
            .find_one(&|d| d.id == reservation_id)
            .await?
            .ok_or_else(|| LibraryError::NotFound(format!("reservation {reservation_id} not found")))?;

        let current_user_id = current.user_id.clone();
        let active_count = self.reservation_repository.count(&|d| d.user_id == current_user_id && d.is_active()).await?;
        let over_limit = active_count > self.config.max_reservations_per_user as usize;

        let (is_valid, reason) = if over_limit { (false, Some("ReservationBookLimitReached".to_string())) } else { (result.is_valid, result.reason.clone()) };

        if !is_valid {
            let reason = reason.unwrap_or_else(|| "BookValidationFailed".to_string());
            let (_, record) = execute_with_retry(self.store.as_ref(), reservation_id, reservation_id, None, self.config.event_store_max_retry_attempts, |events| {
                let reservation = Reservation::rehydrate(reservation_id, events)?;
                let (_, event) = reservation.reject(reason.clone())?;
                Ok(event)
            })
            .await?;
            return publish_record(self.bus.as_ref(), BoundedContext::Reservation, &record).await;
        }

        let retail_price = result.retail_price.ok_or_else(|| LibraryError::Internal("BookValidationResult marked valid without a retail price".to_string()))?;
        let (_, priced) = execute_with_retry(self.store.as_ref(), reservation_id, reservation_id, None, self.config.event_store_max_retry_attempts, |events| {
            let reservation = Reservation::rehydrate(reservation_id, events)?;
            let (_, event) = reservation.set_retail_price(retail_price)?;
            Ok(event)
        })
        .await?;
        publish_record(self.bus.as_ref(), BoundedContext::Reservation, &priced).await?;

        let fee = Money::from_minor_units(self.config.book_reservation_fee);
        let (_, pending) = execute_with_retry(self.store.as_ref(), reservation_id, reservation_id, None, self.config.event_store_max_retry_attempts, |events| {
            let reservation = Reservation::rehydrate(reservation_id, events)?;
            let (_, event) = reservation.request_payment(fee)?;
            Ok(event)
        })
        .await?;
        publish_record(self.bus.as_ref(), BoundedContext::Reservation, &pending).await
    }
}

/// §4.8 step 4: Wallet context reacts to `ReservationPendingPayment` by
/// loading/creating the payer's wallet and attempting to debit the fee.
pub struct ReservationPendingPaymentHandler<SW, RR> {
    wallet_store: Arc<SW>,
    reservation_repository: Arc<RR>,
    bus: Arc<dyn EventBus>,
    config: Arc<Config>,
}

impl<SW, RR> ReservationPendingPaymentHandler<SW, RR>
where
    SW: EventStore<WalletEvent>,
    RR: ProjectionRepository<ReservationProjection>,
{
    pub fn new(wallet_store: Arc<SW>, reservation_repository: Arc<RR>, bus: Arc<dyn EventBus>, config: Arc<Config>) -> Self {
        ReservationPendingPaymentHandler { wallet_store, reservation_repository, bus, config }
    }
}

#[async_trait::async_trait]
impl<SW, RR> EventHandler for ReservationPendingPaymentHandler<SW, RR>
where
    SW: EventStore<WalletEvent> + 'static,
    RR: ProjectionRepository<ReservationProjection> + 'static,
{
    async fn handle(&self, _event_type: &str, payload: &[u8]) -> LibraryResult<()> {
        let record: EventRecord<ReservationEvent> = serde_json::from_slice(payload)?;
        let ReservationEvent::ReservationPendingPayment(pending) = &record.payload else {
            return Ok(());
        };
        let reservation_id = record.aggregate_id;
        let reservation = self
            .reservation_repository
            .find_one(&|d| d.id == reservation_id)
            .await?
            .ok_or_else(|| LibraryError::NotFound(format!("reservation {reservation_id} not found")))?;

        attempt_wallet_payment(self.wallet_store.as_ref(), self.bus.as_ref(), &self.config, &reservation.user_id, reservation_id, pending.amount).await.map(|_| ())
    }
}

/// §4.8 steps 5-6: Reservation reacts to the wallet's payment outcome.
pub struct WalletPaymentOutcomeHandler<S> {
    reservation_store: Arc<S>,
    bus: Arc<dyn EventBus>,
    config: Arc<Config>,
}

impl<S> WalletPaymentOutcomeHandler<S>
where
    S: EventStore<ReservationEvent>,
{
    pub fn new(reservation_store: Arc<S>, bus: Arc<dyn EventBus>, config: Arc<Config>) -> Self {
        WalletPaymentOutcomeHandler { reservation_store, bus, config }
    }
}

#[async_trait::async_trait]
impl<S> EventHandler for WalletPaymentOutcomeHandler<S>
where
    S: EventStore<ReservationEvent> + 'static,
{
    async fn handle(&self, _event_type: &str, payload: &[u8]) -> LibraryResult<()> {
        let record: EventRecord<WalletEvent> = serde_json::from_slice(payload)?;
        let (reservation_id, record) = match &record.payload {
            WalletEvent::WalletPaymentSuccess(success) => {
                let reservation_id = success.reservation_id;
                let payment_ref = success.payment_ref;
                let method = success.method.clone();
                let amount = success.amount;
                let (_, record) = execute_with_retry(self.reservation_store.as_ref(), reservation_id, reservation_id, None, self.config.event_store_max_retry_attempts, |events| {
                    let reservation = Reservation::rehydrate(reservation_id, events)?;
                    let (_, event) = reservation.confirm(payment_ref, method.clone(), amount)?;
                    Ok(event)
                })
                .await?;
                (reservation_id, record)
            }
            WalletEvent::WalletPaymentDeclined(declined) => {
                let reservation_id = declined.reservation_id;
                let reason = declined.reason.clone();
                let (_, record) = execute_with_retry(self.reservation_store.as_ref(), reservation_id, reservation_id, None, self.config.event_store_max_retry_attempts, |events| {
                    let reservation = Reservation::rehydrate(reservation_id, events)?;
                    let (_, event) = reservation.reject(reason.clone())?;
                    Ok(event)
                })
                .await?;
                (reservation_id, record)
            }
            _ => return Ok(()),
        };
        let _ = reservation_id;
        publish_record(self.bus.as_ref(), BoundedContext::Reservation, &record).await
    }
}

/// §4.8 step 7: Wallet reacts to `ReservationReturned` by applying the late
/// fee computed from `daysLate`/`retailPrice`.
pub struct ReservationReturnedHandler<SW, RR> {
    wallet_store: Arc<SW>,
    reservation_repository: Arc<RR>,
    bus: Arc<dyn EventBus>,
    config: Arc<Config>,
}

impl<SW, RR> ReservationReturnedHandler<SW, RR>
where
    SW: EventStore<WalletEvent>,
    RR: ProjectionRepository<ReservationProjection>,
{
    pub fn new(wallet_store: Arc<SW>, reservation_repository: Arc<RR>, bus: Arc<dyn EventBus>, config: Arc<Config>) -> Self {
        ReservationReturnedHandler { wallet_store, reservation_repository, bus, config }
    }
}

#[async_trait::async_trait]
impl<SW, RR> EventHandler for ReservationReturnedHandler<SW, RR>
where
    SW: EventStore<WalletEvent> + 'static,
    RR: ProjectionRepository<ReservationProjection> + 'static,
{
    async fn handle(&self, _event_type: &str, payload: &[u8]) -> LibraryResult<()> {
        let record: EventRecord<ReservationEvent> = serde_json::from_slice(payload)?;
        let ReservationEvent::ReservationReturned(returned) = &record.payload else {
            return Ok(());
        };
        if returned.days_late <= 0 {
            return Ok(());
        }
        let reservation_id = record.aggregate_id;
        let reservation = self
            .reservation_repository
            .find_one(&|d| d.id == reservation_id)
            .await?
            .ok_or_else(|| LibraryError::NotFound(format!("reservation {reservation_id} not found")))?;

        let wallet_id = ensure_wallet(self.wallet_store.as_ref(), self.bus.as_ref(), &self.config, &reservation.user_id).await?;
        apply_wallet_late_fee(self.wallet_store.as_ref(), self.bus.as_ref(), &self.config, wallet_id, reservation_id, returned.days_late, returned.retail_price).await.map(|_| ())
    }
}

/// §4.8 step 7 tail: Reservation reacts to `WalletLateFeeApplied`, turning a
/// purchase-triggering fee into `ReservationBookBrought`.
pub struct WalletLateFeeAppliedHandler<S> {
    reservation_store: Arc<S>,
    bus: Arc<dyn EventBus>,
    config: Arc<Config>,
}

impl<S> WalletLateFeeAppliedHandler<S>
where
    S: EventStore<ReservationEvent>,
{
    pub fn new(reservation_store: Arc<S>, bus: Arc<dyn EventBus>, config: Arc<Config>) -> Self {
        WalletLateFeeAppliedHandler { reservation_store, bus, config }
    }
}

#[async_trait::async_trait]
impl<S> EventHandler for WalletLateFeeAppliedHandler<S>
where
    S: EventStore<ReservationEvent> + 'static,
{
    async fn handle(&self, _event_type: &str, payload: &[u8]) -> LibraryResult<()> {
        let record: EventRecord<WalletEvent> = serde_json::from_slice(payload)?;
        let WalletEvent::WalletLateFeeApplied(applied) = &record.payload else {
            return Ok(());
        };
        if !applied.book_purchased {
            return Ok(());
        }
        let reservation_id = applied.reservation_id;
        let (_, record) = execute_with_retry(self.reservation_store.as_ref(), reservation_id, reservation_id, None, self.config.event_store_max_retry_attempts, |events| {
            let reservation = Reservation::rehydrate(reservation_id, events)?;
            let (_, event) = reservation.book_brought()?;
            Ok(event)
        })
        .await?;
        publish_record(self.bus.as_ref(), BoundedContext::Reservation, &record).await
    }
}

/// Subscribes every saga handler onto `bus`. Call once at service start-up,
/// after `bus.init()`.
#[allow(clippy::too_many_arguments)]
pub async fn wire_saga<SB, SW, SR, RB, RW, RR>(
    bus: Arc<dyn EventBus>,
    book_store: Arc<SB>,
    wallet_store: Arc<SW>,
    reservation_store: Arc<SR>,
    book_repository: Arc<RB>,
    _wallet_repository: Arc<RW>,
    reservation_repository: Arc<RR>,
    config: Arc<Config>,
) -> LibraryResult<()>
where
    SB: EventStore<BookEvent> + 'static,
    SW: EventStore<WalletEvent> + 'static,
    SR: EventStore<ReservationEvent> + 'static,
    RB: ProjectionRepository<BookProjection> + 'static,
    RW: ProjectionRepository<crate::projection::wallet::WalletProjection> + 'static,
    RR: ProjectionRepository<ReservationProjection> + 'static,
{
    let _ = book_store;

    bus.subscribe(BoundedContext::Book, "BookValidationRequested", Arc::new(BookValidationRequestedHandler::new(book_repository, bus.clone()))).await?;

    bus.subscribe(
        BoundedContext::Reservation,
        "BookValidationResult",
        Arc::new(BookValidationResultHandler::new(reservation_store.clone(), reservation_repository.clone(), bus.clone(), config.clone())),
    )
    .await?;

    bus.subscribe(
        BoundedContext::Reservation,
        "ReservationPendingPayment",
        Arc::new(ReservationPendingPaymentHandler::new(wallet_store.clone(), reservation_repository.clone(), bus.clone(), config.clone())),
    )
    .await?;

    let outcome_handler: Arc<dyn EventHandler> = Arc::new(WalletPaymentOutcomeHandler::new(reservation_store.clone(), bus.clone(), config.clone()));
    bus.subscribe(BoundedContext::Wallet, "WalletPaymentSuccess", outcome_handler.clone()).await?;
    bus.subscribe(BoundedContext::Wallet, "WalletPaymentDeclined", outcome_handler).await?;

    bus.subscribe(
        BoundedContext::Reservation,
        "ReservationReturned",
        Arc::new(ReservationReturnedHandler::new(wallet_store, reservation_repository, bus.clone(), config.clone())),
    )
    .await?;

    bus.subscribe(BoundedContext::Wallet, "WalletLateFeeApplied", Arc::new(WalletLateFeeAppliedHandler::new(reservation_store, bus.clone(), config))).await?;

    Ok(())
}
