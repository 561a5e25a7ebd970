//! Integration tests for cancellation, billing cycle day changes and
//! charged-through dates.

mod common;

use common::{catalog, day, ts, TestApp, OIL_SLICK, REMOTE_CONTROL, SPORTS};
use std::collections::HashMap;
use subscription_service::error::SubscriptionError;
use subscription_service::models::{BillingActionPolicy, BillingAlignment, EntitlementState};
use uuid::Uuid;

#[tokio::test]
async fn test_cancelling_base_cancels_live_addons() {
    let app = TestApp::spawn().await;
    let created = app
        .create_bundle(ts(2026, 3, 1), "car-1", &[SPORTS, OIL_SLICK, REMOTE_CONTROL])
        .await;
    let ctx = app.ctx(ts(2026, 3, 10));

    let cancelled = app
        .api
        .cancel_base_subscriptions(
            &ctx,
            &[created.subscriptions[0].subscription_id],
            BillingActionPolicy::Immediate,
            None,
        )
        .await
        .unwrap();
    assert_eq!(cancelled.len(), 1);
    assert_eq!(cancelled[0].end_date, Some(ts(2026, 3, 10)));

    let listed = app
        .api
        .get_subscriptions_for_bundle(&ctx, created.bundle.bundle_id)
        .await
        .unwrap();
    assert_eq!(listed.len(), 3);
    for subscription in &listed {
        assert_eq!(subscription.state, EntitlementState::Cancelled);
        assert_eq!(subscription.end_date, Some(ts(2026, 3, 10)));
    }
}

#[tokio::test]
async fn test_end_of_term_cancellation_waits_for_charged_through_date() {
    let app = TestApp::spawn().await;
    let created = app.create_bundle(ts(2026, 3, 1), "car-1", &[SPORTS]).await;
    let base_id = created.subscriptions[0].subscription_id;
    let ctx = app.ctx(ts(2026, 3, 10));

    app.api
        .set_charged_through_date(&ctx, base_id, ts(2026, 4, 1))
        .await
        .unwrap();
    let cancelled = app
        .api
        .cancel_base_subscriptions(&ctx, &[base_id], BillingActionPolicy::EndOfTerm, None)
        .await
        .unwrap();

    assert_eq!(cancelled[0].end_date, Some(ts(2026, 4, 1)));
    assert_eq!(cancelled[0].state, EntitlementState::Active);
    assert_eq!(cancelled[0].charged_through_date, Some(ts(2026, 4, 1)));
}

#[tokio::test]
async fn test_cancelling_twice_leaves_the_first_cancellation() {
    let app = TestApp::spawn().await;
    let created = app.create_bundle(ts(2026, 3, 1), "car-1", &[SPORTS]).await;
    let base_id = created.subscriptions[0].subscription_id;

    app.api
        .cancel_base_subscriptions(&app.ctx(ts(2026, 3, 5)), &[base_id], BillingActionPolicy::Immediate, None)
        .await
        .unwrap();
    let again = app
        .api
        .cancel_base_subscriptions(&app.ctx(ts(2026, 3, 9)), &[base_id], BillingActionPolicy::Immediate, None)
        .await
        .unwrap();

    assert_eq!(again[0].end_date, Some(ts(2026, 3, 5)));
}

#[tokio::test]
async fn test_illegal_cancellation_policy_is_rejected() {
    let app = TestApp::spawn().await;
    let created = app.create_bundle(ts(2026, 3, 1), "car-1", &[SPORTS]).await;
    let ctx = app.ctx(ts(2026, 3, 10));

    let result = app
        .api
        .cancel_base_subscriptions(
            &ctx,
            &[created.subscriptions[0].subscription_id],
            BillingActionPolicy::Illegal,
            None,
        )
        .await;
    assert!(matches!(result, Err(SubscriptionError::IllegalPlanChange { .. })));
}

#[tokio::test]
async fn test_update_bcd_immediate_and_scheduled() {
    let app = TestApp::spawn().await;
    let created = app.create_bundle(ts(2026, 3, 1), "car-1", &[SPORTS]).await;
    let base_id = created.subscriptions[0].subscription_id;
    let ctx = app.ctx(ts(2026, 3, 10));

    // Same day as today and no explicit date: effective right away.
    let effective = app.api.update_bcd(&ctx, base_id, 10, None).await.unwrap();
    assert_eq!(effective, ts(2026, 3, 10));
    let base = app.api.get_subscription_from_id(&ctx, base_id).await.unwrap();
    assert_eq!(base.bill_cycle_day_local, Some(10));

    // An earlier day moves to next month.
    let effective = app.api.update_bcd(&ctx, base_id, 5, None).await.unwrap();
    assert_eq!(effective, ts(2026, 4, 5));

    // An explicit date matching the day is scheduled, not immediate.
    let effective = app
        .api
        .update_bcd(&ctx, base_id, 10, Some(day(2026, 3, 10)))
        .await
        .unwrap();
    assert_eq!(effective, ts(2026, 3, 10));

    let base = app.api.get_subscription_from_id(&ctx, base_id).await.unwrap();
    assert_eq!(base.bill_cycle_day_local, Some(10));
    let later = app
        .api
        .get_subscription_from_id(&app.ctx(ts(2026, 4, 6)), base_id)
        .await
        .unwrap();
    assert_eq!(later.bill_cycle_day_local, Some(5));
}

#[tokio::test]
async fn test_update_bcd_rejects_invalid_day_and_unknown_subscription() {
    let app = TestApp::spawn().await;
    let created = app.create_bundle(ts(2026, 3, 1), "car-1", &[SPORTS]).await;
    let ctx = app.ctx(ts(2026, 3, 10));

    assert_eq!(
        app.api
            .update_bcd(&ctx, created.subscriptions[0].subscription_id, 0, None)
            .await,
        Err(SubscriptionError::InvalidBillCycleDay(0))
    );

    let unknown = Uuid::new_v4();
    assert_eq!(
        app.api.update_bcd(&ctx, unknown, 3, None).await,
        Err(SubscriptionError::InvalidSubscriptionId(unknown))
    );
}

#[tokio::test]
async fn test_charged_through_date_for_unknown_subscription() {
    let app = TestApp::spawn().await;
    let ctx = app.ctx(ts(2026, 3, 10));
    let unknown = Uuid::new_v4();

    assert_eq!(
        app.api
            .set_charged_through_date(&ctx, unknown, ts(2026, 4, 1))
            .await,
        Err(SubscriptionError::InvalidSubscriptionId(unknown))
    );
}

#[tokio::test]
async fn test_default_bill_cycle_day_follows_alignment() {
    let app = TestApp::spawn().await;
    let created = app.create_bundle(ts(2026, 3, 1), "car-1", &[SPORTS]).await;
    let ctx = app.ctx(ts(2026, 3, 10));
    let base = app
        .api
        .get_subscription_from_id(&ctx, created.subscriptions[0].subscription_id)
        .await
        .unwrap();

    let account_aligned = catalog();
    let mut cache = HashMap::new();
    let bcd = app
        .api
        .default_bill_cycle_day_local(&ctx, &account_aligned, &mut cache, &base, None, Some(15))
        .unwrap();
    assert_eq!(bcd, 15);

    // Memoised per subscription for the rest of the request.
    let bcd = app
        .api
        .default_bill_cycle_day_local(&ctx, &account_aligned, &mut cache, &base, None, Some(20))
        .unwrap();
    assert_eq!(bcd, 15);

    let subscription_aligned = catalog().with_billing_alignment(BillingAlignment::Subscription);
    let bcd = app
        .api
        .default_bill_cycle_day_local(
            &ctx,
            &subscription_aligned,
            &mut HashMap::new(),
            &base,
            None,
            Some(15),
        )
        .unwrap();
    assert_eq!(bcd, 1);
}
