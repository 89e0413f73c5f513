// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-based checks for §8 invariants 1-3 and 7, generating a random
//! sequence of updates per aggregate and asserting the invariant holds after
//! replay. Run against [`InMemoryEventStore`] directly (C2), bypassing the
//! command-handler retry loop since these sequences are single-threaded.

use chrono::{DateTime, Utc};
use proptest::prelude::*;
use uuid::Uuid;

use cim_library_core::domain::book::{Book, BookEvent, BookPatch};
use cim_library_core::event_store::{EventStore, InMemoryEventStore};

fn ts() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z").unwrap().with_timezone(&Utc)
}

fn titles_strategy() -> impl Strategy<Value = Vec<String>> {
    proptest::collection::vec("[a-zA-Z]{1,12}", 0..15)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Invariant 1 (version contiguity) and invariant 3 (rehydration
    /// soundness): after any sequence of successful updates the stored
    /// versions are exactly `1..N` and `rehydrate(load(id))` matches the
    /// state folded by hand from the same patches.
    #[test]
    fn version_contiguity_and_rehydration_soundness(titles in titles_strategy()) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let store = InMemoryEventStore::<BookEvent>::new();
            let id = Uuid::now_v7();
            let (mut book, created) = Book::create(id, "ISBN-PROP", "seed", "A", 2000, "P", cim_library_core::domain::money::Money::ZERO).unwrap();
            store.append(id, vec![created], 0, ts(), Uuid::now_v7(), None).await.unwrap();

            for title in &titles {
                let patch = BookPatch { title: Some(title.clone()), ..Default::default() };
                if patch.title.as_deref() == Some(book.title.as_str()) {
                    continue; // would be a no-op patch; update() rejects it
                }
                let expected_version = book.version;
                let (next, event) = book.update(patch).unwrap();
                store.append(id, vec![event], expected_version, ts(), Uuid::now_v7(), None).await.unwrap();
                book = next;
            }

            let events = store.load(id).await.unwrap();
            let versions: Vec<u64> = events.iter().map(|e| e.version).collect();
            let expected: Vec<u64> = (1..=versions.len() as u64).collect();
            prop_assert_eq!(versions, expected);

            let rehydrated = Book::rehydrate(id, &events).unwrap();
            prop_assert_eq!(rehydrated.title, book.title);
            prop_assert_eq!(rehydrated.version, book.version);
            Ok(())
        })?;
    }

    /// Invariant 2 (global monotonicity): interleaving commands against two
    /// distinct aggregates still yields a strictly increasing, gap-free
    /// global sequence across the whole store.
    #[test]
    fn global_version_strictly_increases_across_interleaved_aggregates(left in titles_strategy(), right in titles_strategy()) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let store = InMemoryEventStore::<BookEvent>::new();
            let id_a = Uuid::now_v7();
            let id_b = Uuid::now_v7();
            let (mut book_a, created_a) = Book::create(id_a, "ISBN-A", "a", "A", 2000, "P", cim_library_core::domain::money::Money::ZERO).unwrap();
            let (mut book_b, created_b) = Book::create(id_b, "ISBN-B", "b", "A", 2000, "P", cim_library_core::domain::money::Money::ZERO).unwrap();

            let mut observed_global_versions = Vec::new();
            observed_global_versions.push(store.append(id_a, vec![created_a], 0, ts(), Uuid::now_v7(), None).await.unwrap()[0].global_version);
            observed_global_versions.push(store.append(id_b, vec![created_b], 0, ts(), Uuid::now_v7(), None).await.unwrap()[0].global_version);

            for (title_a, title_b) in left.iter().zip(right.iter()) {
                if title_a != &book_a.title {
                    let expected = book_a.version;
                    let (next, event) = book_a.update(BookPatch { title: Some(title_a.clone()), ..Default::default() }).unwrap();
                    let committed = store.append(id_a, vec![event], expected, ts(), Uuid::now_v7(), None).await.unwrap();
                    observed_global_versions.push(committed[0].global_version);
                    book_a = next;
                }
                if title_b != &book_b.title {
                    let expected = book_b.version;
                    let (next, event) = book_b.update(BookPatch { title: Some(title_b.clone()), ..Default::default() }).unwrap();
                    let committed = store.append(id_b, vec![event], expected, ts(), Uuid::now_v7(), None).await.unwrap();
                    observed_global_versions.push(committed[0].global_version);
                    book_b = next;
                }
            }

            for pair in observed_global_versions.windows(2) {
                prop_assert!(pair[1] > pair[0]);
            }
            let mut sorted = observed_global_versions.clone();
            sorted.sort_unstable();
            sorted.dedup();
            prop_assert_eq!(sorted.len(), observed_global_versions.len());
            Ok(())
        })?;
    }
}
