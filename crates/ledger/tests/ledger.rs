use chrono::{Duration, Utc};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Statement};

use ledger::{
    Amount, Channel, Ledger, LedgerError, MovementKind, OpeningBalanceCmd, RecordCmd, Reference,
    ReferenceKind,
};
use migration::MigratorTrait;
use uuid::Uuid;

async fn ledger_with_db() -> (Ledger, DatabaseConnection) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let ledger = Ledger::builder()
        .database(db.clone())
        .build()
        .await
        .unwrap();
    (ledger, db)
}

fn amount(raw: &str) -> Amount {
    raw.parse().unwrap()
}

fn movement(loc: &str, cur: &str, kind: MovementKind, raw: &str) -> RecordCmd {
    RecordCmd::new(
        loc,
        cur,
        kind,
        amount(raw),
        "alice",
        Reference::new(ReferenceKind::ManualAdjustment, Uuid::new_v4().to_string()),
        Utc::now(),
    )
}

async fn set_cached(db: &DatabaseConnection, loc: &str, cur: &str, minor: i64) {
    let backend = db.get_database_backend();
    db.execute(Statement::from_sql_and_values(
        backend,
        "UPDATE cached_balances SET quantity = ? WHERE location_id = ? AND currency_id = ?",
        vec![minor.into(), loc.into(), cur.into()],
    ))
    .await
    .unwrap();
}

async fn count_movements(db: &DatabaseConnection) -> i64 {
    let backend = db.get_database_backend();
    let row = db
        .query_one(Statement::from_string(
            backend,
            "SELECT COUNT(*) AS n FROM movements",
        ))
        .await
        .unwrap()
        .unwrap();
    row.try_get::<i64>("", "n").unwrap()
}

#[tokio::test]
async fn opening_income_expense_then_drift_is_repaired() {
    let (ledger, db) = ledger_with_db().await;

    ledger
        .assign_opening_balance(OpeningBalanceCmd::new("L1", "USD", amount("100"), "alice"))
        .await
        .unwrap();
    assert_eq!(
        ledger.cached_balance("L1", "USD").await.unwrap().quantity,
        amount("100")
    );

    ledger
        .record(movement("L1", "USD", MovementKind::Income, "50"))
        .await
        .unwrap();
    assert_eq!(
        ledger.cached_balance("L1", "USD").await.unwrap().quantity,
        amount("150")
    );

    let entry = ledger
        .record(movement("L1", "USD", MovementKind::Expense, "30"))
        .await
        .unwrap();
    assert_eq!(entry.signed_amount, amount("-30"));
    assert_eq!(entry.snapshot().before, amount("150"));
    assert_eq!(entry.snapshot().after, amount("120"));
    assert_eq!(
        ledger.cached_balance("L1", "USD").await.unwrap().quantity,
        amount("120")
    );

    let err = ledger
        .record(movement("L1", "USD", MovementKind::Expense, "200"))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        LedgerError::InsufficientBalance {
            location_id: "L1".to_string(),
            currency_id: "USD".to_string(),
            available: amount("120"),
            requested: amount("200"),
        }
    );
    assert_eq!(count_movements(&db).await, 2);

    set_cached(&db, "L1", "USD", amount("500").minor()).await;
    let outcome = ledger.reconcile("L1", "USD", "auditor").await.unwrap();
    assert_eq!(outcome.previous_cached, amount("500"));
    assert_eq!(outcome.projected, amount("120"));
    assert_eq!(outcome.delta, amount("380"));
    assert!(outcome.corrected);

    let cached = ledger.cached_balance("L1", "USD").await.unwrap();
    assert_eq!(cached.quantity, amount("120"));
    assert_eq!(cached.reconciled_by.as_deref(), Some("auditor"));
    assert!(cached.reconciled_at.is_some());
}

#[tokio::test]
async fn record_normalizes_sign_from_kind() {
    let (ledger, _db) = ledger_with_db().await;

    let income = ledger
        .record(movement("L1", "EUR", MovementKind::Income, "-40"))
        .await
        .unwrap();
    assert_eq!(income.signed_amount, amount("40"));

    let expense = ledger
        .record(movement("L1", "EUR", MovementKind::Expense, "15"))
        .await
        .unwrap();
    assert_eq!(expense.signed_amount, amount("-15"));

    let adjustment = ledger
        .record(movement("L1", "EUR", MovementKind::Adjustment, "-5"))
        .await
        .unwrap();
    assert_eq!(adjustment.signed_amount, amount("-5"));

    assert_eq!(
        ledger.cached_balance("L1", "EUR").await.unwrap().quantity,
        amount("20")
    );
}

#[tokio::test]
async fn zero_amount_is_rejected_before_writing() {
    let (ledger, db) = ledger_with_db().await;

    let err = ledger
        .record(movement("L1", "EUR", MovementKind::Income, "0"))
        .await
        .unwrap_err();
    assert_eq!(err, LedgerError::ZeroAmountNotAllowed(MovementKind::Income));
    assert_eq!(count_movements(&db).await, 0);
    assert_eq!(ledger.tracked_locations().await.unwrap(), Vec::<String>::new());
}

#[tokio::test]
async fn blank_identifiers_are_rejected() {
    let (ledger, _db) = ledger_with_db().await;

    let err = ledger
        .record(movement("  ", "EUR", MovementKind::Income, "10"))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidAmount(_)));
}

#[tokio::test]
async fn failed_expense_leaves_cache_and_log_untouched() {
    let (ledger, db) = ledger_with_db().await;
    ledger
        .record(movement("L1", "USD", MovementKind::Income, "10"))
        .await
        .unwrap();
    let before = ledger.cached_balance("L1", "USD").await.unwrap();

    let err = ledger
        .record(movement("L1", "USD", MovementKind::Expense, "10.01"))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InsufficientBalance { .. }));

    let after = ledger.cached_balance("L1", "USD").await.unwrap();
    assert_eq!(after, before);
    assert_eq!(count_movements(&db).await, 1);
}

#[tokio::test]
async fn projection_ignores_stored_snapshots() {
    let (ledger, db) = ledger_with_db().await;
    ledger
        .record(movement("L1", "USD", MovementKind::Income, "70"))
        .await
        .unwrap();
    ledger
        .record(movement("L1", "USD", MovementKind::Expense, "20"))
        .await
        .unwrap();

    let first = ledger.project("L1", "USD", None).await.unwrap();
    let backend = db.get_database_backend();
    db.execute(Statement::from_string(
        backend,
        "UPDATE movements SET balance_before = 999999, balance_after = -999999",
    ))
    .await
    .unwrap();
    let second = ledger.project("L1", "USD", None).await.unwrap();

    assert_eq!(first, amount("50"));
    assert_eq!(second, first);
}

#[tokio::test]
async fn projection_as_of_cuts_later_movements() {
    let (ledger, _db) = ledger_with_db().await;
    let earlier = Utc::now() - Duration::hours(2);
    let mut first = movement("L1", "USD", MovementKind::Income, "40");
    first.occurred_at = earlier;
    ledger.record(first).await.unwrap();
    ledger
        .record(movement("L1", "USD", MovementKind::Income, "60"))
        .await
        .unwrap();

    assert_eq!(
        ledger.project("L1", "USD", Some(earlier)).await.unwrap(),
        amount("40")
    );
    assert_eq!(
        ledger
            .project("L1", "USD", Some(earlier - Duration::seconds(1)))
            .await
            .unwrap(),
        Amount::ZERO
    );
    assert_eq!(
        ledger.project("L1", "USD", None).await.unwrap(),
        amount("100")
    );
}

#[tokio::test]
async fn projection_of_unknown_pair_is_zero() {
    let (ledger, _db) = ledger_with_db().await;
    assert_eq!(
        ledger.project("nowhere", "XAU", None).await.unwrap(),
        Amount::ZERO
    );
    let cached = ledger.cached_balance("nowhere", "XAU").await.unwrap();
    assert_eq!(cached.quantity, Amount::ZERO);
    assert_eq!(cached.version, 0);
}

#[tokio::test]
async fn reconcile_converges_and_is_idempotent() {
    let (ledger, db) = ledger_with_db().await;
    ledger
        .record(movement("L1", "USD", MovementKind::Income, "250"))
        .await
        .unwrap();
    set_cached(&db, "L1", "USD", amount("999").minor()).await;
    let movements_before = count_movements(&db).await;

    let first = ledger.reconcile("L1", "USD", "auditor").await.unwrap();
    assert!(first.corrected);
    assert_eq!(first.previous_cached, amount("999"));
    assert_eq!(first.projected, amount("250"));

    let second = ledger.reconcile("L1", "USD", "auditor").await.unwrap();
    assert!(!second.corrected);
    assert_eq!(second.delta, Amount::ZERO);

    assert_eq!(count_movements(&db).await, movements_before);
    assert_eq!(
        ledger.cached_balance("L1", "USD").await.unwrap().quantity,
        amount("250")
    );
}

#[tokio::test]
async fn reconcile_respects_tolerance() {
    let (ledger, db) = ledger_with_db().await;
    ledger
        .record(movement("L1", "USD", MovementKind::Income, "10"))
        .await
        .unwrap();

    set_cached(&db, "L1", "USD", amount("10.01").minor()).await;
    let within = ledger.reconcile("L1", "USD", "auditor").await.unwrap();
    assert!(!within.corrected);
    assert_eq!(within.delta, amount("0.01"));
    assert_eq!(
        ledger.cached_balance("L1", "USD").await.unwrap().quantity,
        amount("10.01")
    );

    set_cached(&db, "L1", "USD", amount("10.02").minor()).await;
    let outside = ledger.reconcile("L1", "USD", "auditor").await.unwrap();
    assert!(outside.corrected);
    assert_eq!(
        ledger.cached_balance("L1", "USD").await.unwrap().quantity,
        amount("10")
    );
}

#[tokio::test]
async fn reconcile_keeps_channel_split() {
    let (ledger, db) = ledger_with_db().await;
    ledger
        .record(movement("L1", "USD", MovementKind::Income, "30"))
        .await
        .unwrap();
    ledger
        .record(movement("L1", "USD", MovementKind::Income, "20").channel(Channel::Bank))
        .await
        .unwrap();
    set_cached(&db, "L1", "USD", 0).await;

    ledger.reconcile("L1", "USD", "auditor").await.unwrap();
    let cached = ledger.cached_balance("L1", "USD").await.unwrap();
    assert_eq!(cached.quantity, amount("50"));
    assert_eq!(cached.cash_quantity, amount("30"));
    assert_eq!(cached.bank_quantity, amount("20"));
}

#[tokio::test]
async fn reconcile_all_handles_each_currency_independently() {
    let (ledger, db) = ledger_with_db().await;
    for cur in ["ARS", "EUR", "USD"] {
        ledger
            .record(movement("L1", cur, MovementKind::Income, "10"))
            .await
            .unwrap();
    }
    ledger
        .record(movement("L2", "USD", MovementKind::Income, "10"))
        .await
        .unwrap();
    set_cached(&db, "L1", "EUR", amount("13").minor()).await;
    set_cached(&db, "L2", "USD", amount("13").minor()).await;

    let outcomes = ledger.reconcile_all("L1", "auditor").await.unwrap();
    let currencies: Vec<_> = outcomes.iter().map(|o| o.currency_id.as_str()).collect();
    assert_eq!(currencies, ["ARS", "EUR", "USD"]);
    let corrected: Vec<_> = outcomes
        .iter()
        .filter(|o| o.result.as_ref().unwrap().corrected)
        .map(|o| o.currency_id.as_str())
        .collect();
    assert_eq!(corrected, ["EUR"]);

    // other locations are left alone
    assert_eq!(
        ledger.cached_balance("L2", "USD").await.unwrap().quantity,
        amount("13")
    );
    assert_eq!(
        ledger.tracked_locations().await.unwrap(),
        vec!["L1".to_string(), "L2".to_string()]
    );
}

#[tokio::test]
async fn report_lists_drift_without_fixing_it() {
    let (ledger, db) = ledger_with_db().await;
    ledger
        .record(movement("L1", "USD", MovementKind::Income, "10"))
        .await
        .unwrap();
    ledger
        .record(movement("L1", "EUR", MovementKind::Income, "10"))
        .await
        .unwrap();
    set_cached(&db, "L1", "USD", amount("12").minor()).await;

    let report = ledger.build_inconsistency_report().await.unwrap();
    assert_eq!(report.len(), 1);
    assert_eq!(report[0].currency_id, "USD");
    assert_eq!(report[0].cached, amount("12"));
    assert_eq!(report[0].projected, amount("10"));
    assert_eq!(report[0].delta, amount("2"));
    assert_eq!(report[0].excluded_legacy_entries, 0);

    assert_eq!(
        ledger.cached_balance("L1", "USD").await.unwrap().quantity,
        amount("12")
    );
}

#[tokio::test]
async fn legacy_kinds_are_skipped_and_counted() {
    let (ledger, db) = ledger_with_db().await;
    ledger
        .record(movement("L1", "USD", MovementKind::Income, "10"))
        .await
        .unwrap();

    let backend = db.get_database_backend();
    let now = Utc::now();
    db.execute(Statement::from_sql_and_values(
        backend,
        "INSERT INTO movements (id, location_id, currency_id, kind, signed_amount, \
         balance_before, balance_after, reference_kind, reference_id, channel, description, \
         actor_id, occurred_at, recorded_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        vec![
            Uuid::new_v4().to_string().into(),
            "L1".into(),
            "USD".into(),
            "currency_swap".into(),
            500_i64.into(),
            1000_i64.into(),
            1500_i64.into(),
            "legacy".into(),
            "old-1".into(),
            "cash".into(),
            sea_orm::Value::String(None),
            "import".into(),
            now.into(),
            now.into(),
        ],
    ))
    .await
    .unwrap();
    set_cached(&db, "L1", "USD", amount("15").minor()).await;

    assert_eq!(
        ledger.project("L1", "USD", None).await.unwrap(),
        amount("10")
    );
    let listed = ledger.movements("L1", "USD").await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].kind, MovementKind::Income);

    let report = ledger.build_inconsistency_report().await.unwrap();
    assert_eq!(report.len(), 1);
    assert_eq!(report[0].excluded_legacy_entries, 1);
    assert_eq!(report[0].delta, amount("5"));
}

#[tokio::test]
async fn concurrent_expenses_never_overdraw() {
    let (ledger, _db) = ledger_with_db().await;
    ledger
        .record(movement("L1", "USD", MovementKind::Income, "100"))
        .await
        .unwrap();

    let mut tasks = tokio::task::JoinSet::new();
    for _ in 0..5 {
        let ledger = ledger.clone();
        tasks.spawn(async move {
            ledger
                .record(movement("L1", "USD", MovementKind::Expense, "30"))
                .await
        });
    }

    let mut ok = 0;
    let mut rejected = 0;
    while let Some(joined) = tasks.join_next().await {
        match joined.unwrap() {
            Ok(_) => ok += 1,
            Err(LedgerError::InsufficientBalance { .. }) => rejected += 1,
            Err(err) => panic!("unexpected error: {err}"),
        }
    }
    assert_eq!(ok, 3);
    assert_eq!(rejected, 2);

    let cached = ledger.cached_balance("L1", "USD").await.unwrap();
    assert_eq!(cached.quantity, amount("10"));
    assert_eq!(
        ledger.project("L1", "USD", None).await.unwrap(),
        cached.quantity
    );
}

#[tokio::test]
async fn concurrent_records_chain_snapshots() {
    let (ledger, _db) = ledger_with_db().await;

    let (a, b, c) = tokio::join!(
        ledger.record(movement("L1", "USD", MovementKind::Income, "1")),
        ledger.record(movement("L1", "USD", MovementKind::Income, "2")),
        ledger.record(movement("L1", "EUR", MovementKind::Income, "3")),
    );
    a.unwrap();
    b.unwrap();
    c.unwrap();

    let mut entries = ledger.movements("L1", "USD").await.unwrap();
    entries.sort_by_key(|entry| entry.snapshot().before);
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].snapshot().before, Amount::ZERO);
    assert_eq!(entries[1].snapshot().before, entries[0].snapshot().after);
    assert_eq!(entries[1].snapshot().after, amount("3"));
    assert_eq!(
        ledger.cached_balance("L1", "USD").await.unwrap().quantity,
        amount("3")
    );
}

#[tokio::test]
async fn concurrent_reconciles_correct_once() {
    let (ledger, db) = ledger_with_db().await;
    ledger
        .record(movement("L1", "USD", MovementKind::Income, "250"))
        .await
        .unwrap();
    set_cached(&db, "L1", "USD", amount("999").minor()).await;

    let (a, b) = tokio::join!(
        ledger.reconcile("L1", "USD", "auditor"),
        ledger.reconcile("L1", "USD", "auditor"),
    );
    let (a, b) = (a.unwrap(), b.unwrap());
    assert!(a.corrected ^ b.corrected);
    let first = if a.corrected { &a } else { &b };
    assert_eq!(first.previous_cached, amount("999"));
    assert_eq!(first.delta, amount("749"));

    let cached = ledger.cached_balance("L1", "USD").await.unwrap();
    assert_eq!(cached.quantity, amount("250"));
    assert_eq!(cached.reconciled_by.as_deref(), Some("auditor"));
    assert_eq!(count_movements(&db).await, 1);
}

#[tokio::test]
async fn reconcile_rejects_delta_outside_amount_range() {
    let (ledger, db) = ledger_with_db().await;
    ledger
        .record(movement("L1", "USD", MovementKind::Adjustment, "-5"))
        .await
        .unwrap();
    set_cached(&db, "L1", "USD", i64::MAX).await;

    let err = ledger.reconcile("L1", "USD", "auditor").await.unwrap_err();
    assert!(matches!(err, LedgerError::InvalidAmount(_)));
    assert_eq!(
        ledger.cached_balance("L1", "USD").await.unwrap().quantity,
        Amount::new(i64::MAX)
    );

    let err = ledger.build_inconsistency_report().await.unwrap_err();
    assert!(matches!(err, LedgerError::InvalidAmount(_)));
}
