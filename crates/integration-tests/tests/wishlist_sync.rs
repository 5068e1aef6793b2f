//! End-to-end tests for the wishlist mirror and catalog over HTTP.

use bazaar_core::{ProductId, ProductQuery};
use bazaar_integration_tests::{FakeGateway, FakeProduct};
use bazaar_storefront::gateway::RestGateway;
use bazaar_storefront::notify::NoticeLevel;
use bazaar_storefront::sync::{SyncStatus, Toggled};
use bazaar_storefront::{Storefront, SyncError};
use rust_decimal_macros::dec;
use serde_json::json;

async fn setup() -> (FakeGateway, Storefront<RestGateway>) {
    let fake = FakeGateway::start([
        FakeProduct::new("p1", "Brass Lamp", dec!(100)).with_discount(dec!(10)),
        FakeProduct::new("p2", "Cotton Throw", dec!(50)),
        FakeProduct::new("p3", "Clay Pot", dec!(20)).in_category("pottery"),
    ])
    .await;
    let storefront = Storefront::connect(&fake.config()).expect("storefront connects");
    (fake, storefront)
}

#[tokio::test]
async fn test_total_value_uses_discounted_prices() {
    let (_fake, storefront) = setup().await;
    let wishlist = storefront.wishlist();

    wishlist.add(&ProductId::new("p1")).await.expect("add");
    wishlist.add(&ProductId::new("p2")).await.expect("add");

    assert_eq!(wishlist.item_count(), 2);
    assert_eq!(wishlist.total_value(), dec!(140));
}

#[tokio::test]
async fn test_toggle_twice_leaves_membership_unchanged() {
    let (_fake, storefront) = setup().await;
    let wishlist = storefront.wishlist();
    let p2 = ProductId::new("p2");
    wishlist.load().await.expect("load");

    assert_eq!(wishlist.toggle(&p2).await.expect("toggle"), Toggled::Added);
    assert!(wishlist.is_in_wishlist(&p2));
    assert_eq!(wishlist.toggle(&p2).await.expect("toggle"), Toggled::Removed);
    assert!(!wishlist.is_in_wishlist(&p2));

    wishlist.load().await.expect("load");
    assert!(wishlist.wishlist().is_empty());
}

#[tokio::test]
async fn test_adding_saved_product_again_keeps_one_entry() {
    let (_fake, storefront) = setup().await;
    let wishlist = storefront.wishlist();
    let p1 = ProductId::new("p1");

    wishlist.add(&p1).await.expect("add");
    wishlist.add(&p1).await.expect("re-add");

    assert_eq!(wishlist.item_count(), 1);
}

#[tokio::test]
async fn test_failed_add_sets_error_and_keeps_snapshot() {
    let (fake, storefront) = setup().await;
    let wishlist = storefront.wishlist();
    wishlist.add(&ProductId::new("p1")).await.expect("add");
    let before = wishlist.wishlist();
    let mut notices = storefront.notices();
    fake.fail_next(
        503,
        &json!({"success": false, "error": "Wishlist service unavailable"}),
    );

    let err = wishlist
        .add(&ProductId::new("p2"))
        .await
        .expect_err("scripted failure");

    assert!(matches!(err, SyncError::Gateway(_)));
    assert_eq!(wishlist.wishlist(), before);
    assert_eq!(
        wishlist.status(),
        SyncStatus::Error("Wishlist service unavailable".to_string())
    );
    let notice = notices.recv().await.expect("notice published");
    assert_eq!(notice.level, NoticeLevel::Error);

    wishlist.load().await.expect("load succeeds");
    assert_eq!(wishlist.error(), None);
}

#[tokio::test]
async fn test_failed_load_keeps_last_good_wishlist() {
    let (fake, storefront) = setup().await;
    let wishlist = storefront.wishlist();
    wishlist.add(&ProductId::new("p3")).await.expect("add");
    fake.respond_next_raw(502, "Bad Gateway");

    let err = wishlist.load().await.expect_err("scripted failure");

    assert!(matches!(err, SyncError::Gateway(_)));
    assert!(wishlist.is_in_wishlist(&ProductId::new("p3")));
    assert!(wishlist.error().is_some());
}

#[tokio::test]
async fn test_storefront_load_reads_both_collections() {
    let (fake, storefront) = setup().await;

    storefront.load().await.expect("load succeeds");

    let mut paths: Vec<String> = fake.requests().into_iter().map(|r| r.path).collect();
    paths.sort();
    assert_eq!(paths, vec!["/rest/v1/cart", "/rest/v1/wishlist"]);
}

#[tokio::test]
async fn test_catalog_caches_unfiltered_reads() {
    let (fake, storefront) = setup().await;
    let catalog = storefront.catalog();
    let p3 = ProductId::new("p3");

    let first = catalog.product(&p3).await.expect("product loads");
    let second = catalog.product(&p3).await.expect("product loads");
    assert_eq!(first, second);

    let all = ProductQuery::default();
    let pottery = ProductQuery {
        category: Some("pottery".to_string()),
        ..ProductQuery::default()
    };
    assert_eq!(catalog.products(&all).await.expect("list").len(), 3);
    assert_eq!(catalog.products(&all).await.expect("list").len(), 3);
    assert_eq!(catalog.products(&pottery).await.expect("list").len(), 1);
    assert_eq!(catalog.products(&pottery).await.expect("list").len(), 1);

    // One product read, one unfiltered listing, two filtered listings
    assert_eq!(fake.request_count(), 4);
}
