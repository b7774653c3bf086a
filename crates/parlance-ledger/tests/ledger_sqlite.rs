// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Credit ledger against a real SQLite database.

use std::sync::Arc;

use parlance_config::model::StorageConfig;
use parlance_core::ParlanceError;
use parlance_core::types::{TransactionKind, UserId};
use parlance_ledger::CreditLedger;
use parlance_storage::adapter::SqliteStorage;
use tempfile::TempDir;

async fn ledger() -> (CreditLedger<SqliteStorage>, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let config = StorageConfig {
        database_path: dir.path().join("ledger.db").to_string_lossy().into_owned(),
        wal_mode: true,
    };
    let storage = SqliteStorage::open(config).await.unwrap();
    (CreditLedger::new(Arc::new(storage)), dir)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_charges_never_overdraw() {
    let (ledger, _dir) = ledger().await;
    let user = UserId("racer".into());
    ledger.initialize(&user, 8).await.unwrap();

    let a = {
        let ledger = ledger.clone();
        let user = user.clone();
        tokio::spawn(async move { ledger.charge(&user, 5, "audio turn", Some("m-a")).await })
    };
    let b = {
        let ledger = ledger.clone();
        let user = user.clone();
        tokio::spawn(async move { ledger.charge(&user, 5, "audio turn", Some("m-b")).await })
    };
    let results = [a.await.unwrap(), b.await.unwrap()];

    let succeeded = results.iter().filter(|r| r.is_ok()).count();
    let rejected = results
        .iter()
        .filter(|r| matches!(r, Err(ParlanceError::InsufficientCredits { available: 3, .. })))
        .count();
    assert_eq!((succeeded, rejected), (1, 1));
    assert_eq!(ledger.balance(&user).await.unwrap(), 3);
    assert_eq!(ledger.verify_balance(&user).await.unwrap(), 3);
}

#[tokio::test]
async fn history_is_newest_first_and_sums_to_balance() {
    let (ledger, _dir) = ledger().await;
    let user = UserId("u1".into());
    ledger.initialize(&user, 20).await.unwrap();
    ledger.charge(&user, 1, "text turn", None).await.unwrap();
    ledger.charge(&user, 5, "audio turn", Some("m1")).await.unwrap();
    ledger.top_up(&user, 10, "purchase", Some("order-7")).await.unwrap();

    let history = ledger.history(&user, 10).await.unwrap();
    let kinds: Vec<_> = history.iter().map(|t| t.kind).collect();
    assert_eq!(
        kinds,
        vec![
            TransactionKind::Credit,
            TransactionKind::Debit,
            TransactionKind::Debit,
            TransactionKind::Grant,
        ]
    );
    assert_eq!(history.iter().map(|t| t.amount).sum::<i64>(), 24);
    assert_eq!(history[0].balance_after, 24);
    assert_eq!(ledger.verify_balance(&user).await.unwrap(), 24);

    let credits = ledger.credits(&user).await.unwrap();
    assert_eq!(credits.used_this_period, 6);
}

#[tokio::test]
async fn rejected_charge_leaves_database_untouched() {
    let (ledger, _dir) = ledger().await;
    let user = UserId("u1".into());
    ledger.initialize(&user, 4).await.unwrap();

    let err = ledger.charge(&user, 5, "audio turn", None).await.unwrap_err();
    assert!(matches!(err, ParlanceError::InsufficientCredits { required: 5, .. }));
    assert_eq!(ledger.history(&user, 10).await.unwrap().len(), 1);
    assert_eq!(ledger.credits(&user).await.unwrap().used_this_period, 0);
}
