mod common;

use assert_matches::assert_matches;
use chrono::Duration;
use common::{in_window, window_end, window_start, TestApp};
use promo_service::{
    errors::ServiceError,
    services::promo_engine::{ProcessTransaction, PROGRAM_NOT_FOUND},
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

fn transaction(code: &str, quantity_origin: i32, act_trx: Decimal) -> ProcessTransaction {
    ProcessTransaction {
        transaction_id: Uuid::new_v4(),
        customer_id: Uuid::new_v4(),
        promo_code: code.to_string(),
        transaction_time: in_window(),
        act_trx,
        quantity_origin,
    }
}

/// Tiers for PROMO1, quantity 2: [50000, 500000) at 5%, open from 1000000 at 7%.
async fn promo1(app: &TestApp) {
    app.seed_program("PROMO1", 100).await;
    app.seed_config("PROMO1", 2, dec!(50000), Some(dec!(500000)), dec!(5))
        .await;
    app.seed_config("PROMO1", 2, dec!(1000000), None, dec!(7))
        .await;
    app.seed_config("PROMO1", 3, dec!(10000), Some(dec!(500000)), dec!(1.2))
        .await;
}

#[tokio::test]
async fn matching_tier_scores_the_transaction() {
    let app = TestApp::new().await;
    promo1(&app).await;

    let stored = app
        .state
        .services
        .engine
        .process(transaction("PROMO1", 2, dec!(100000)))
        .await
        .expect("processed");

    assert_eq!(stored.prosentase, dec!(5));
    assert_eq!(stored.point, 5000);
    assert_eq!(stored.quantity, 2);
    assert_eq!(stored.quantity_origin, 2);
}

#[tokio::test]
async fn unmatched_transaction_is_stored_with_zero_point() {
    let app = TestApp::new().await;
    promo1(&app).await;

    let request = transaction("PROMO1", 2, dec!(49999));
    let id = request.transaction_id;
    let stored = app
        .state
        .services
        .engine
        .process(request)
        .await
        .expect("processed");

    assert_eq!(stored.transaction_id, id);
    assert_eq!(stored.prosentase, Decimal::ZERO);
    assert_eq!(stored.point, 0);

    let remaining = app.state.services.quota.remaining("PROMO1").await.unwrap();
    assert_eq!(remaining.total, 1);
}

#[tokio::test]
async fn quantity_above_top_tier_is_clamped() {
    let app = TestApp::new().await;
    promo1(&app).await;

    let stored = app
        .state
        .services
        .engine
        .process(transaction("PROMO1", 10, dec!(1000)))
        .await
        .unwrap();

    // quantity 3 tier starts at 10000
    assert_eq!(stored.quantity_origin, 10);
    assert_eq!(stored.quantity, 3);
    assert_eq!(stored.point, 0);

    let stored = app
        .state
        .services
        .engine
        .process(transaction("PROMO1", 10, dec!(1000)))
        .await;
    assert!(stored.is_ok());

    let stored = app
        .state
        .services
        .engine
        .process(transaction("PROMO1", 7, dec!(20000)))
        .await
        .unwrap();
    assert_eq!(stored.quantity, 3);
    assert_eq!(stored.prosentase, dec!(1.2));
    assert_eq!(stored.point, 240);
}

#[tokio::test]
async fn amounts_at_or_above_threshold_use_open_tier() {
    let app = TestApp::new().await;
    promo1(&app).await;

    let stored = app
        .state
        .services
        .engine
        .process(transaction("PROMO1", 2, dec!(1000000)))
        .await
        .unwrap();
    assert_eq!(stored.prosentase, dec!(7));
    assert_eq!(stored.point, 70000);

    // Between the bounded tier's max and the threshold nothing applies
    let stored = app
        .state
        .services
        .engine
        .process(transaction("PROMO1", 2, dec!(600000)))
        .await
        .unwrap();
    assert_eq!(stored.point, 0);
}

#[tokio::test]
async fn bounded_tier_excludes_its_max() {
    let app = TestApp::new().await;
    promo1(&app).await;

    let stored = app
        .state
        .services
        .engine
        .process(transaction("PROMO1", 2, dec!(500000)))
        .await
        .unwrap();
    assert_eq!(stored.point, 0);

    let stored = app
        .state
        .services
        .engine
        .process(transaction("PROMO1", 2, dec!(50000)))
        .await
        .unwrap();
    assert_eq!(stored.point, 2500);
}

#[tokio::test]
async fn narrow_tier_scores_its_range_and_stops_at_max() {
    let app = TestApp::new().await;
    app.seed_program("PROMO2", 100).await;
    app.seed_config("PROMO2", 2, dec!(50000), Some(dec!(200000)), dec!(5))
        .await;
    let engine = &app.state.services.engine;

    let stored = engine
        .process(transaction("PROMO2", 2, dec!(100000)))
        .await
        .unwrap();
    assert_eq!(stored.prosentase, dec!(5));
    assert_eq!(stored.point, 5000);

    let stored = engine
        .process(transaction("PROMO2", 2, dec!(49999)))
        .await
        .unwrap();
    assert_eq!(stored.prosentase, Decimal::ZERO);
    assert_eq!(stored.point, 0);

    let stored = engine
        .process(transaction("PROMO2", 2, dec!(200000)))
        .await
        .unwrap();
    assert_eq!(stored.prosentase, Decimal::ZERO);
    assert_eq!(stored.point, 0);

    let stored = engine
        .process(transaction("PROMO2", 2, dec!(199999)))
        .await
        .unwrap();
    assert_eq!(stored.prosentase, dec!(5));
    assert_eq!(stored.point, 10000);

    let remaining = app.state.services.quota.remaining("PROMO2").await.unwrap();
    assert_eq!(remaining.total, 4);
    assert_eq!(remaining.remain, 96);
}

#[tokio::test]
async fn program_window_is_inclusive() {
    let app = TestApp::new().await;
    promo1(&app).await;
    let resolver = app.state.services.configs.clone();

    for instant in [window_start(), window_end()] {
        let found = resolver
            .eligible_config(2, dec!(100000), instant, "PROMO1")
            .await
            .unwrap();
        assert!(found.is_some(), "expected a match at {instant}");
    }

    for instant in [
        window_start() - Duration::seconds(1),
        window_end() + Duration::seconds(1),
    ] {
        let found = resolver
            .eligible_config(2, dec!(100000), instant, "PROMO1")
            .await
            .unwrap();
        assert!(found.is_none(), "expected no match at {instant}");
    }
}

#[tokio::test]
async fn resolving_twice_gives_the_same_config() {
    let app = TestApp::new().await;
    promo1(&app).await;
    let configs = &app.state.services.configs;

    let first = configs
        .eligible_config(2, dec!(100000), in_window(), "PROMO1")
        .await
        .unwrap()
        .expect("config");
    let second = configs
        .eligible_config(2, dec!(100000), in_window(), "PROMO1")
        .await
        .unwrap()
        .expect("config");

    assert_eq!(first.id, second.id);
    assert_eq!(first.prosentase, dec!(5));
}

#[tokio::test]
async fn duplicate_transaction_id_is_a_conflict() {
    let app = TestApp::new().await;
    promo1(&app).await;

    let request = transaction("PROMO1", 2, dec!(100000));
    let again = request.clone();

    app.state.services.engine.process(request).await.unwrap();
    let err = app.state.services.engine.process(again).await.unwrap_err();
    assert_matches!(err, ServiceError::Conflict(_));

    let remaining = app.state.services.quota.remaining("PROMO1").await.unwrap();
    assert_eq!(remaining.total, 1);
}

#[tokio::test]
async fn unknown_program_writes_nothing() {
    let app = TestApp::new().await;
    promo1(&app).await;

    let err = app
        .state
        .services
        .engine
        .process(transaction("NOPE", 2, dec!(100000)))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(ref msg) if msg == PROGRAM_NOT_FOUND);

    let remaining = app.state.services.quota.remaining("PROMO1").await.unwrap();
    assert_eq!(remaining.total, 0);
}

#[tokio::test]
async fn remaining_quota_counts_every_stored_transaction() {
    let app = TestApp::new().await;
    promo1(&app).await;
    let engine = &app.state.services.engine;

    for amount in [dec!(100000), dec!(49999), dec!(1000000), dec!(75000)] {
        engine
            .process(transaction("PROMO1", 2, amount))
            .await
            .unwrap();
    }

    let remaining = app.state.services.quota.remaining("PROMO1").await.unwrap();
    assert_eq!(remaining.quota, 100);
    assert_eq!(remaining.total, 4);
    assert_eq!(remaining.remain, 96);
}

#[tokio::test]
async fn remaining_quota_can_go_negative() {
    let app = TestApp::new().await;
    app.seed_program("TINY", 1).await;
    let engine = &app.state.services.engine;

    for _ in 0..3 {
        engine
            .process(transaction("TINY", 1, dec!(10)))
            .await
            .unwrap();
    }

    let remaining = app.state.services.quota.remaining("TINY").await.unwrap();
    assert_eq!(remaining.remain, -2);
}

#[tokio::test]
async fn soft_deleted_program_is_hidden() {
    let app = TestApp::new().await;
    promo1(&app).await;
    let programs = &app.state.services.programs;

    let deleted = programs.delete_program("PROMO1").await.unwrap();
    assert!(deleted.deleted_at.is_some());

    assert_matches!(
        programs.get_program("PROMO1").await,
        Err(ServiceError::NotFound(_))
    );
    assert_matches!(
        app.state.services.quota.remaining("PROMO1").await,
        Err(ServiceError::NotFound(_))
    );
    assert_matches!(
        app.state
            .services
            .engine
            .process(transaction("PROMO1", 2, dec!(100000)))
            .await,
        Err(ServiceError::NotFound(_))
    );
    let found = app
        .state
        .services
        .configs
        .eligible_config(2, dec!(100000), in_window(), "PROMO1")
        .await
        .unwrap();
    assert!(found.is_none());
}

#[tokio::test]
async fn program_code_is_unique() {
    let app = TestApp::new().await;
    app.seed_program("PROMO1", 100).await;

    let err = app
        .state
        .services
        .programs
        .create_program(promo_service::repositories::NewProgram {
            code_key: "PROMO1".into(),
            quota: 5,
            period_start: window_start(),
            period_end: window_end(),
        })
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Conflict(_));
}
