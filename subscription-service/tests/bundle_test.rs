//! Integration tests for bundle lookups, external keys and identity resolution.

mod common;

use common::{catalog, ts, TestApp, OIL_SLICK, REFILL, SPORTS};
use subscription_service::config::SubscriptionConfig;
use subscription_service::error::SubscriptionError;
use subscription_service::models::{BillingActionPolicy, ProductCategory};
use uuid::Uuid;

#[tokio::test]
async fn test_identity_lookups_resolve_both_hops() {
    let app = TestApp::spawn().await;
    let created = app.create_bundle(ts(2026, 3, 1), "car-1", &[SPORTS, OIL_SLICK]).await;
    let bundle_id = created.bundle.bundle_id;
    let addon_id = created.subscriptions[1].subscription_id;

    assert_eq!(
        app.api.get_bundle_id_from_subscription_id(addon_id).await.unwrap(),
        bundle_id
    );
    assert_eq!(
        app.api.get_account_id_from_bundle_id(bundle_id).await.unwrap(),
        app.account_id
    );
    assert_eq!(
        app.api.get_account_id_from_subscription_id(addon_id).await.unwrap(),
        app.account_id
    );
}

#[tokio::test]
async fn test_identity_lookups_fail_for_unknown_ids() {
    let app = TestApp::spawn().await;
    let unknown = Uuid::new_v4();

    assert_eq!(
        app.api.get_account_id_from_subscription_id(unknown).await,
        Err(SubscriptionError::NoBundleForSubscription(unknown))
    );
    assert_eq!(
        app.api.get_account_id_from_bundle_id(unknown).await,
        Err(SubscriptionError::InvalidBundleId(unknown))
    );
}

#[tokio::test]
async fn test_identity_lookups_work_without_cache() {
    let mut config = SubscriptionConfig::default();
    config.identity_cache.enabled = false;
    let app = TestApp::spawn_with(catalog(), config).await;
    let created = app.create_bundle(ts(2026, 3, 1), "car-1", &[SPORTS]).await;

    let account_id = app
        .api
        .get_account_id_from_subscription_id(created.subscriptions[0].subscription_id)
        .await
        .unwrap();
    assert_eq!(account_id, app.account_id);
}

#[tokio::test]
async fn test_reads_report_unknown_ids() {
    let app = TestApp::spawn().await;
    let ctx = app.ctx(ts(2026, 3, 1));
    let unknown = Uuid::new_v4();

    assert_eq!(
        app.api.get_subscription_from_id(&ctx, unknown).await,
        Err(SubscriptionError::InvalidSubscriptionId(unknown))
    );
    assert_eq!(
        app.api.get_bundle_from_id(unknown).await,
        Err(SubscriptionError::InvalidBundleId(unknown))
    );
    assert_eq!(
        app.api.get_base_subscription(&ctx, unknown).await,
        Err(SubscriptionError::NoSuchBaseSubscription(unknown))
    );
}

#[tokio::test]
async fn test_base_subscription_and_account_listing() {
    let app = TestApp::spawn().await;
    let ctx = app.ctx(ts(2026, 3, 1));
    let car = app.create_bundle(ts(2026, 3, 1), "car-1", &[SPORTS, OIL_SLICK]).await;
    let refills = app.create_bundle(ts(2026, 3, 1), "refills", &[REFILL]).await;

    let base = app.api.get_base_subscription(&ctx, car.bundle.bundle_id).await.unwrap();
    assert_eq!(base.subscription_id, car.subscriptions[0].subscription_id);

    let by_bundle = app.api.get_subscriptions_for_account(&ctx).await.unwrap();
    assert_eq!(by_bundle.len(), 2);
    assert_eq!(by_bundle[&car.bundle.bundle_id].len(), 2);
    assert_eq!(by_bundle[&car.bundle.bundle_id][0].category, ProductCategory::Base);
    assert_eq!(by_bundle[&refills.bundle.bundle_id].len(), 1);

    let transitions = app.api.get_all_transitions(&base);
    // Create, then the move from trial to evergreen.
    assert_eq!(transitions.len(), 2);
    assert_eq!(transitions[0].event_type, "create");
    assert_eq!(transitions[1].event_type, "phase");
    assert_eq!(transitions[1].effective_date, ts(2026, 3, 31));
    assert!(transitions.iter().all(|t| t.alignment_start_date == base.align_start_date));
}

#[tokio::test]
async fn test_update_external_key_checks_length_and_bundle() {
    let app = TestApp::spawn().await;
    let ctx = app.ctx(ts(2026, 3, 2));
    let created = app.create_bundle(ts(2026, 3, 1), "car-1", &[SPORTS]).await;
    let bundle_id = created.bundle.bundle_id;

    app.api.update_external_key(&ctx, bundle_id, "car-renamed").await.unwrap();
    let bundle = app.api.get_bundle_from_id(bundle_id).await.unwrap();
    assert_eq!(bundle.external_key.as_deref(), Some("car-renamed"));
    assert_eq!(bundle.updated_utc, ts(2026, 3, 2));

    let writes = app.store.write_count();
    let too_long = "k".repeat(300);
    assert_eq!(
        app.api.update_external_key(&ctx, bundle_id, &too_long).await,
        Err(SubscriptionError::ExternalKeyTooLong {
            length: 300,
            max: 255
        })
    );
    assert_eq!(app.store.write_count(), writes);

    let unknown = Uuid::new_v4();
    assert_eq!(
        app.api.update_external_key(&ctx, unknown, "x").await,
        Err(SubscriptionError::InvalidBundleId(unknown))
    );
}

#[tokio::test]
async fn test_shorter_configured_key_limit_applies() {
    let mut config = SubscriptionConfig::default();
    config.bundles.max_external_key_length = 8;
    let app = TestApp::spawn_with(catalog(), config).await;
    let ctx = app.ctx(ts(2026, 3, 1));

    let result = app
        .api
        .create_bundle_for_account(&ctx, app.account_id, Some("nine-char"), false)
        .await;
    assert_eq!(
        result,
        Err(SubscriptionError::ExternalKeyTooLong { length: 9, max: 8 })
    );
}

#[tokio::test]
async fn test_active_bundle_for_key_ignores_cancelled_bundles() {
    let app = TestApp::spawn().await;
    let ctx = app.ctx(ts(2026, 3, 1));
    let created = app.create_bundle(ts(2026, 3, 1), "car-1", &[SPORTS, OIL_SLICK]).await;

    let active = app.api.get_active_bundle_for_key(&ctx, "car-1").await.unwrap();
    assert_eq!(active.map(|b| b.bundle_id), Some(created.bundle.bundle_id));

    app.api
        .cancel_base_subscriptions(
            &ctx,
            &[created.subscriptions[0].subscription_id],
            BillingActionPolicy::Immediate,
            None,
        )
        .await
        .unwrap();

    let active = app.api.get_active_bundle_for_key(&ctx, "car-1").await.unwrap();
    assert!(active.is_none());
}

#[tokio::test]
async fn test_non_addon_subscription_ids_for_key() {
    let app = TestApp::spawn().await;
    let created = app.create_bundle(ts(2026, 3, 1), "car-1", &[SPORTS, OIL_SLICK]).await;

    let ids = app
        .api
        .get_non_addon_subscription_ids_for_key("car-1")
        .await
        .unwrap();
    assert_eq!(ids, vec![created.subscriptions[0].subscription_id]);
}

#[tokio::test]
async fn test_bundle_listing_and_search() {
    let app = TestApp::spawn().await;
    let ctx = app.ctx(ts(2026, 3, 1));
    for key in ["alpha-1", "alpha-2", "beta-1"] {
        app.create_bundle(ts(2026, 3, 1), key, &[SPORTS]).await;
    }

    let first = app.api.get_bundles(0, 2).await.unwrap();
    assert_eq!(first.items.len(), 2);
    assert_eq!(first.total_count, 3);
    assert_eq!(first.next_offset(), Some(2));

    let found = app.api.search_bundles("alpha-2", 0, 10).await.unwrap();
    assert_eq!(found.items.len(), 1);
    assert_eq!(found.items[0].external_key.as_deref(), Some("alpha-2"));

    assert_eq!(app.api.get_bundles_for_account(&ctx).await.unwrap().len(), 3);
    assert_eq!(
        app.api
            .get_bundles_for_account_and_key(&ctx, "beta-1")
            .await
            .unwrap()
            .len(),
        1
    );
}
