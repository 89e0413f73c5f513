// Copyright (c) 2025 - Cowboy AI, Inc.
//! End-to-end scenarios (§8 S1-S6) run against in-memory implementations of
//! the store/bus/cache: command handler -> event store -> bus -> projection
//! handler -> saga, with no live NATS server.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use cim_library_core::bus::{EventBus, InMemoryEventBus};
use cim_library_core::cache::InMemoryCache;
use cim_library_core::command::book::create_book;
use cim_library_core::command::reservation::{create_reservation, get_reservation, return_reservation, wire_saga};
use cim_library_core::command::wallet::{get_wallet, update_wallet_balance};
use cim_library_core::config::Config;
use cim_library_core::domain::money::Money;
use cim_library_core::domain::reservation::ReservationStatus;
use cim_library_core::event_store::{EventStore, InMemoryEventStore};
use cim_library_core::projection::book::{BookProjection, BookProjectionHandler};
use cim_library_core::projection::reservation::{ReservationProjection, ReservationProjectionHandler};
use cim_library_core::projection::wallet::{WalletProjection, WalletProjectionHandler};
use cim_library_core::projection::{InMemoryProjectionStore, ProjectionRepository};

fn ts() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z").unwrap().with_timezone(&Utc)
}

struct Harness {
    bus: Arc<InMemoryEventBus>,
    book_store: Arc<InMemoryEventStore<cim_library_core::domain::BookEvent>>,
    wallet_store: Arc<InMemoryEventStore<cim_library_core::domain::wallet::WalletEvent>>,
    reservation_store: Arc<InMemoryEventStore<cim_library_core::domain::reservation::ReservationEvent>>,
    book_repository: Arc<InMemoryProjectionStore<BookProjection>>,
    wallet_repository: Arc<InMemoryProjectionStore<WalletProjection>>,
    reservation_repository: Arc<InMemoryProjectionStore<ReservationProjection>>,
    cache: Arc<InMemoryCache>,
    config: Arc<Config>,
}

impl Harness {
    async fn new(config: Config) -> Self {
        let bus = Arc::new(InMemoryEventBus::new());
        let book_store = Arc::new(InMemoryEventStore::new());
        let wallet_store = Arc::new(InMemoryEventStore::new());
        let reservation_store = Arc::new(InMemoryEventStore::new());
        let book_repository = Arc::new(InMemoryProjectionStore::new());
        let wallet_repository = Arc::new(InMemoryProjectionStore::new());
        let reservation_repository = Arc::new(InMemoryProjectionStore::new());
        let cache = Arc::new(InMemoryCache::new());
        let config = Arc::new(config);

        let book_handler = Arc::new(BookProjectionHandler::new(book_repository.clone(), cache.clone()));
        bus.subscribe_all(cim_library_core::subjects::BoundedContext::Book, &["BookCreated", "BookUpdated", "BookDeleted"], book_handler).await.unwrap();

        let wallet_handler = Arc::new(WalletProjectionHandler::new(wallet_repository.clone(), cache.clone()));
        bus.subscribe_all(
            cim_library_core::subjects::BoundedContext::Wallet,
            &["WalletCreated", "WalletBalanceUpdated", "WalletLateFeeApplied", "WalletPaymentSuccess", "WalletPaymentDeclined"],
            wallet_handler,
        )
        .await
        .unwrap();

        let reservation_handler = Arc::new(ReservationProjectionHandler::new(reservation_repository.clone(), cache.clone()));
        bus.subscribe_all(
            cim_library_core::subjects::BoundedContext::Reservation,
            &[
                "ReservationCreated",
                "ReservationRetailPriceSet",
                "ReservationPendingPayment",
                "ReservationConfirmed",
                "ReservationRejected",
                "ReservationReturned",
                "ReservationBookBrought",
                "ReservationCancelled",
                "ReservationDeleted",
            ],
            reservation_handler,
        )
        .await
        .unwrap();

        wire_saga(
            bus.clone() as Arc<dyn EventBus>,
            book_store.clone(),
            wallet_store.clone(),
            reservation_store.clone(),
            book_repository.clone(),
            wallet_repository.clone(),
            reservation_repository.clone(),
            config.clone(),
        )
        .await
        .unwrap();

        Harness { bus, book_store, wallet_store, reservation_store, book_repository, wallet_repository, reservation_repository, cache, config }
    }
}

async fn seed_book(h: &Harness, isbn: &str, price: &str) -> Uuid {
    let ack = create_book(
        h.book_store.as_ref(),
        h.bus.as_ref(),
        h.book_repository.as_ref(),
        &h.config,
        isbn.to_string(),
        "Title".to_string(),
        "Author".to_string(),
        2020,
        "Publisher".to_string(),
        Money::from_major_str(price).unwrap(),
    )
    .await
    .unwrap();
    ack.aggregate_id
}

async fn seed_wallet(h: &Harness, user_id: &str, balance: &str) -> Uuid {
    let ack = update_wallet_balance(h.wallet_store.as_ref(), h.bus.as_ref(), &h.config, Uuid::now_v7(), user_id, Money::from_major_str(balance).unwrap()).await.unwrap();
    ack.aggregate_id
}

#[tokio::test]
async fn s1_happy_path_reservation() {
    let h = Harness::new(Config::default()).await;
    let book_id = seed_book(&h, "978-3-16-148410-0", "29.99").await;
    let user_id = "U1";
    seed_wallet(&h, user_id, "50.00").await;

    let ack = create_reservation(h.reservation_store.as_ref(), h.bus.as_ref(), &h.config, user_id.to_string(), book_id, ts()).await.unwrap();

    let reservation = get_reservation(h.reservation_repository.as_ref(), h.cache.as_ref(), ack.aggregate_id).await.unwrap().unwrap();
    assert_eq!(reservation.status, ReservationStatus::Reserved);
    assert_eq!(reservation.version, 4);
    assert_eq!(reservation.retail_price.unwrap().minor_units(), 2999);
    assert_eq!(reservation.fee_charged.unwrap().minor_units(), 300);

    let wallet_id = h.wallet_repository.find_one(&|d: WalletProjection| d.user_id == user_id).await.unwrap().unwrap().id;
    let wallet = get_wallet(h.wallet_repository.as_ref(), h.cache.as_ref(), wallet_id).await.unwrap().unwrap();
    assert_eq!(wallet.balance.minor_units(), 4700);
}

#[tokio::test]
async fn s2_reservation_limit_rejects() {
    let config = Config { max_reservations_per_user: 3, ..Default::default() };
    let h = Harness::new(config).await;

    let user_id = "U1";
    seed_wallet(&h, user_id, "100.00").await;
    let mut book_ids = Vec::new();
    for i in 0..4 {
        let isbn = format!("ISBN-{i}");
        seed_book(&h, &isbn, "10.00").await;
        let id = h.book_repository.find_one(&|d: BookProjection| d.isbn == isbn.clone()).await.unwrap().unwrap().id;
        book_ids.push(id);
    }

    for &book_id in &book_ids[0..3] {
        let ack = create_reservation(h.reservation_store.as_ref(), h.bus.as_ref(), &h.config, user_id.to_string(), book_id, ts()).await.unwrap();
        let reservation = get_reservation(h.reservation_repository.as_ref(), h.cache.as_ref(), ack.aggregate_id).await.unwrap().unwrap();
        assert_eq!(reservation.status, ReservationStatus::Reserved);
    }

    let ack = create_reservation(h.reservation_store.as_ref(), h.bus.as_ref(), &h.config, user_id.to_string(), book_ids[3], ts()).await.unwrap();
    let reservation = get_reservation(h.reservation_repository.as_ref(), h.cache.as_ref(), ack.aggregate_id).await.unwrap().unwrap();
    assert_eq!(reservation.status, ReservationStatus::Rejected);
    assert_eq!(reservation.rejection_reason.as_deref(), Some("ReservationBookLimitReached"));
}

#[tokio::test]
async fn s3_late_return_purchases_book() {
    let config = Config {
        late_fee_per_day: 20, // 0.20
        book_return_due_date_days: 0, // due date == creation time, so daysLate == days since return call
        ..Default::default()
    };
    let h = Harness::new(config).await;

    let user_id = "U1";
    seed_wallet(&h, user_id, "15.00").await;
    seed_book(&h, "ISBN-LATE", "10.00").await;
    let book_id = h.book_repository.find_one(&|d: BookProjection| d.isbn == "ISBN-LATE").await.unwrap().unwrap().id;

    let due = ts();
    let ack = create_reservation(h.reservation_store.as_ref(), h.bus.as_ref(), &h.config, user_id.to_string(), book_id, due).await.unwrap();
    let reservation = get_reservation(h.reservation_repository.as_ref(), h.cache.as_ref(), ack.aggregate_id).await.unwrap().unwrap();
    assert_eq!(reservation.status, ReservationStatus::Reserved);

    let returned_at = due + chrono::Duration::days(60);
    return_reservation(h.reservation_store.as_ref(), h.bus.as_ref(), &h.config, ack.aggregate_id, returned_at).await.unwrap();

    let reservation = get_reservation(h.reservation_repository.as_ref(), h.cache.as_ref(), ack.aggregate_id).await.unwrap().unwrap();
    assert_eq!(reservation.status, ReservationStatus::Brought);

    // 15.00 initial, minus the 3.00 reservation fee paid at confirmation,
    // minus the 12.00 late fee (60 days * 0.20) applied on return.
    let wallet_id = h.wallet_repository.find_one(&|d: WalletProjection| d.user_id == user_id).await.unwrap().unwrap().id;
    let wallet = get_wallet(h.wallet_repository.as_ref(), h.cache.as_ref(), wallet_id).await.unwrap().unwrap();
    assert_eq!(wallet.balance.minor_units(), 0);
}

#[tokio::test]
async fn s4_concurrent_book_updates_both_land_contiguously() {
    let h = Harness::new(Config::default()).await;
    let book_id = seed_book(&h, "ISBN-CONC", "10.00").await;

    let patch_a = cim_library_core::domain::book::BookPatch { title: Some("A".to_string()), ..Default::default() };
    let patch_b = cim_library_core::domain::book::BookPatch { title: Some("B".to_string()), ..Default::default() };

    let (a, b) = tokio::join!(
        cim_library_core::command::book::update_book(h.book_store.as_ref(), h.bus.as_ref(), &h.config, book_id, patch_a),
        cim_library_core::command::book::update_book(h.book_store.as_ref(), h.bus.as_ref(), &h.config, book_id, patch_b),
    );
    a.unwrap();
    b.unwrap();

    let events = h.book_store.load(book_id).await.unwrap();
    let versions: Vec<u64> = events.iter().map(|e| e.version).collect();
    assert_eq!(versions, vec![1, 2, 3]);
}

#[tokio::test]
async fn s5_duplicate_isbn_creation_fails_with_no_new_events() {
    let h = Harness::new(Config::default()).await;
    seed_book(&h, "ISBN-DUP", "10.00").await;

    let result = create_book(
        h.book_store.as_ref(),
        h.bus.as_ref(),
        h.book_repository.as_ref(),
        &h.config,
        "ISBN-DUP".to_string(),
        "Other title".to_string(),
        "Other author".to_string(),
        2021,
        "Other publisher".to_string(),
        Money::from_major_str("5.00").unwrap(),
    )
    .await;

    assert!(result.is_err());
    assert_eq!(result.unwrap_err().kind(), cim_library_core::errors::ErrorKind::Conflict);
}

#[tokio::test]
async fn s6_wallet_payment_decline_rejects_reservation() {
    let h = Harness::new(Config::default()).await;
    let user_id = "U1";
    seed_wallet(&h, user_id, "2.00").await;
    let book_id = seed_book(&h, "ISBN-DECLINE", "10.00").await;

    let ack = create_reservation(h.reservation_store.as_ref(), h.bus.as_ref(), &h.config, user_id.to_string(), book_id, ts()).await.unwrap();

    let reservation = get_reservation(h.reservation_repository.as_ref(), h.cache.as_ref(), ack.aggregate_id).await.unwrap().unwrap();
    assert_eq!(reservation.status, ReservationStatus::Rejected);

    let wallet_id = h.wallet_repository.find_one(&|d: WalletProjection| d.user_id == user_id).await.unwrap().unwrap().id;
    let wallet = get_wallet(h.wallet_repository.as_ref(), h.cache.as_ref(), wallet_id).await.unwrap().unwrap();
    assert_eq!(wallet.balance.minor_units(), 200);
}
