//! Engine behavior against in-memory backends.

mod common;

use common::*;

use bazaar_core::{Cart, LineItem, Money, ProductId, ProductSnapshot};
use bazaar_sync::{
    CartError, CartFailure, KeyValueStorage, RemoteCartStore, RemoteOp, SyncPhase, CART_KEY,
};

async fn yield_a_few() {
    for _ in 0..5 {
        tokio::task::yield_now().await;
    }
}

// =============================================================================
// Resolution
// =============================================================================

#[tokio::test]
async fn test_starts_resolving_and_rejects_mutations() {
    let h = harness();
    let view = h.engine.view();

    assert_eq!(view.phase, SyncPhase::Resolving);
    assert!(view.cart.is_empty());
    assert!(matches!(h.engine.add(tee()).await, Err(CartError::NotReady)));
    assert!(matches!(h.engine.clear().await, Err(CartError::NotReady)));
    assert!(matches!(h.engine.reload().await, Err(CartError::NotReady)));
    assert_eq!(h.remote.write_count(), 0);
}

#[tokio::test]
async fn test_resolve_anonymous_loads_device_cart() {
    let h = harness();
    let mut cart = Cart::new();
    cart.add_product(&sock()).unwrap();
    h.local.write(&cart);

    h.engine.resolve(None).await.unwrap();

    let view = h.engine.view();
    assert_eq!(view.phase, SyncPhase::Anonymous);
    assert_eq!(view.cart, cart);
    assert!(!view.loading);
    assert_eq!(h.remote.read_count(), 0);
}

#[tokio::test]
async fn test_resolve_authenticated_loads_remote_cart() {
    let h = harness();
    let u = user("u-1");
    h.remote.seed_row(&u, &pid("runner"), 2);

    h.engine.resolve(Some(u.clone())).await.unwrap();

    let view = h.engine.view();
    assert_eq!(view.phase, SyncPhase::Authenticated(u));
    assert_eq!(view.cart.quantity_of(&pid("runner")), 2);
    assert_eq!(view.totals().subtotal.cents(), 14400);
    assert!(!view.loading);
    assert_eq!(view.last_error, None);
}

#[tokio::test]
async fn test_failed_load_shows_empty_cart_with_load_error() {
    let h = harness();
    let u = user("u-1");
    h.remote.seed_row(&u, &pid("tee"), 1);
    h.local.write(&Cart::from_items(vec![LineItem::new(sock(), 3)]));
    h.remote.set_fail_reads(true);

    let err = h.engine.resolve(Some(u.clone())).await.unwrap_err();
    assert_eq!(err.failure(), CartFailure::LoadFailed);
    assert_eq!(err.user_message(), "Could not load your cart.");

    let view = h.engine.view();
    assert_eq!(view.phase, SyncPhase::Authenticated(u));
    assert!(view.cart.is_empty(), "device cart must not leak into the account view");
    assert_eq!(view.last_error, Some(CartFailure::LoadFailed));

    h.remote.set_fail_reads(false);
    h.engine.reload().await.unwrap();

    let view = h.engine.view();
    assert_eq!(view.cart.quantity_of(&pid("tee")), 1);
    assert_eq!(view.last_error, None);
}

#[tokio::test]
async fn test_mutation_after_failed_load_reads_first() {
    let h = harness();
    let u = user("u-1");
    h.remote.seed_row(&u, &pid("tee"), 3);
    h.remote.set_fail_reads(true);
    let _ = h.engine.resolve(Some(u.clone())).await;

    h.remote.set_fail_reads(false);
    h.engine.add(tee()).await.unwrap();

    // 3 + 1, not a fresh line of 1 computed from the empty view.
    assert_eq!(h.remote.rows(&u), vec![(pid("tee"), 4)]);
    assert_eq!(h.engine.cart_count(), 4);
}

// =============================================================================
// Anonymous Path
// =============================================================================

#[tokio::test]
async fn test_anonymous_add_twice_merges_line() {
    let h = harness();
    h.engine.resolve(None).await.unwrap();

    h.engine.add(tee()).await.unwrap();
    h.engine.add(tee()).await.unwrap();

    let view = h.engine.view();
    assert_eq!(view.cart.line_count(), 1);
    assert_eq!(view.cart.items()[0].product.id, pid("tee"));
    assert_eq!(view.cart.items()[0].quantity, 2);
    assert_eq!(h.local.read(), view.cart);
    assert_eq!(h.remote.write_count(), 0);
}

#[tokio::test]
async fn test_anonymous_set_zero_removes_everywhere() {
    let h = harness();
    h.engine.resolve(None).await.unwrap();
    h.engine.add(tee()).await.unwrap();
    h.engine.add(sock()).await.unwrap();

    h.engine.set_quantity(pid("tee"), 0).await.unwrap();

    assert!(!h.engine.view().cart.contains(&pid("tee")));
    assert!(!h.local.read().contains(&pid("tee")));
    assert!(h.local.read().contains(&pid("sock")));
}

#[tokio::test]
async fn test_anonymous_set_quantity_and_remove() {
    let h = harness();
    h.engine.resolve(None).await.unwrap();
    h.engine.add(runner()).await.unwrap();

    h.engine.set_quantity(pid("runner"), 5).await.unwrap();
    assert_eq!(h.engine.cart_count(), 5);

    // Absent product: nothing happens.
    h.engine.set_quantity(pid("sock"), 3).await.unwrap();
    assert!(!h.engine.view().cart.contains(&pid("sock")));

    h.engine.remove(pid("runner")).await.unwrap();
    assert!(h.engine.view().cart.is_empty());
    assert!(h.local.read().is_empty());
}

#[tokio::test]
async fn test_anonymous_clear() {
    let h = harness();
    h.engine.resolve(None).await.unwrap();
    h.engine.add(tee()).await.unwrap();

    h.engine.clear().await.unwrap();

    assert!(h.engine.view().cart.is_empty());
    assert_eq!(h.storage.get(CART_KEY).unwrap(), None);
}

#[tokio::test]
async fn test_quantity_limit_leaves_view_alone() {
    let h = harness();
    h.engine.resolve(None).await.unwrap();
    h.engine.add(tee()).await.unwrap();
    let before = h.engine.view();

    let err = h.engine.set_quantity(pid("tee"), 1000).await.unwrap_err();
    assert!(matches!(err, CartError::Domain(_)));
    assert_eq!(err.failure(), CartFailure::SaveFailed);
    assert_eq!(h.engine.view(), before);
}

#[tokio::test]
async fn test_storage_failure_keeps_session_view() {
    let h = harness();
    h.engine.resolve(None).await.unwrap();
    h.storage.set_fail_writes(true);

    h.engine.add(tee()).await.unwrap();

    assert_eq!(h.engine.cart_count(), 1);
    assert!(h.local.read().is_empty());
}

#[tokio::test]
async fn test_garbage_device_cart_resolves_empty() {
    let h = harness();
    h.storage.set(CART_KEY, "<<definitely not json>>").unwrap();

    h.engine.resolve(None).await.unwrap();

    let view = h.engine.view();
    assert_eq!(view.phase, SyncPhase::Anonymous);
    assert!(view.cart.is_empty());
    assert_eq!(view.last_error, None);
}

// =============================================================================
// Authenticated Path
// =============================================================================

#[tokio::test]
async fn test_authenticated_add_upserts_next_quantity() {
    let h = harness();
    let u = user("u-1");
    h.engine.resolve(Some(u.clone())).await.unwrap();

    h.engine.add(tee()).await.unwrap();
    h.engine.add(tee()).await.unwrap();
    h.engine.add(sock()).await.unwrap();

    assert_eq!(h.remote.rows(&u), vec![(pid("tee"), 2), (pid("sock"), 1)]);
    assert_eq!(h.engine.view().cart, h.remote.read(&u).await.unwrap());
    assert!(h.local.read().is_empty());
}

#[tokio::test]
async fn test_authenticated_view_refreshed_from_remote() {
    let h = harness();
    let u = user("u-1");
    h.engine.resolve(Some(u.clone())).await.unwrap();

    // Another device adds a line behind our back.
    h.remote.seed_row(&u, &pid("runner"), 1);
    h.engine.add(tee()).await.unwrap();

    let view = h.engine.view();
    assert!(view.cart.contains(&pid("runner")));
    assert!(view.cart.contains(&pid("tee")));
}

#[tokio::test]
async fn test_authenticated_remove_empties_view() {
    let h = harness();
    let u = user("u-1");
    h.remote.seed_row(&u, &pid("sock"), 1);
    h.engine.resolve(Some(u.clone())).await.unwrap();

    h.engine.remove(pid("sock")).await.unwrap();

    assert!(h.remote.rows(&u).is_empty());
    assert!(h.remote.read(&u).await.unwrap().is_empty());
    assert!(h.engine.view().cart.is_empty());
}

#[tokio::test]
async fn test_authenticated_set_quantity() {
    let h = harness();
    let u = user("u-1");
    h.remote.seed_row(&u, &pid("tee"), 1);
    h.engine.resolve(Some(u.clone())).await.unwrap();

    h.engine.set_quantity(pid("tee"), 6).await.unwrap();
    assert_eq!(h.remote.rows(&u), vec![(pid("tee"), 6)]);
    assert_eq!(h.engine.cart_count(), 6);

    h.engine.set_quantity(pid("tee"), -1).await.unwrap();
    assert!(h.remote.rows(&u).is_empty());
    assert!(h.engine.view().cart.is_empty());
}

#[tokio::test]
async fn test_authenticated_set_quantity_absent_is_noop() {
    let h = harness();
    let u = user("u-1");
    h.engine.resolve(Some(u.clone())).await.unwrap();
    let reads = h.remote.read_count();

    h.engine.set_quantity(pid("tee"), 4).await.unwrap();

    // Absent from the view, so the remote cart is checked once before giving up.
    assert_eq!(h.remote.read_count(), reads + 1);
    assert_eq!(h.remote.write_count(), 0);
    assert!(h.remote.rows(&u).is_empty());
}

#[tokio::test]
async fn test_set_quantity_reaches_row_added_elsewhere() {
    let h = harness();
    let u = user("u-1");
    h.engine.resolve(Some(u.clone())).await.unwrap();

    // Another device adds the row after this view was loaded.
    h.remote.seed_row(&u, &pid("tee"), 1);
    h.engine.set_quantity(pid("tee"), 5).await.unwrap();

    assert_eq!(h.remote.rows(&u), vec![(pid("tee"), 5)]);
    assert_eq!(h.remote.write_count(), 1);
    assert_eq!(h.engine.cart_count(), 5);
    assert_view_consistent(&h.engine);
}

#[tokio::test]
async fn test_authenticated_set_quantity_over_limit_touches_nothing() {
    let h = harness();
    let u = user("u-1");
    h.remote.seed_row(&u, &pid("tee"), 1);
    h.engine.resolve(Some(u.clone())).await.unwrap();
    let reads = h.remote.read_count();

    let err = h.engine.set_quantity(pid("tee"), 1000).await.unwrap_err();

    assert!(matches!(err, CartError::Domain(_)));
    assert_eq!(h.remote.read_count(), reads);
    assert_eq!(h.remote.rows(&u), vec![(pid("tee"), 1)]);
}

#[tokio::test]
async fn test_resolving_same_identity_keeps_cart_visible() {
    let h = harness();
    let u = user("u-1");
    h.remote.seed_row(&u, &pid("tee"), 2);
    h.engine.resolve(Some(u.clone())).await.unwrap();

    h.remote.set_fail_reads(true);
    let err = h.engine.resolve(Some(u.clone())).await.unwrap_err();
    assert_eq!(err.op(), Some(RemoteOp::Read));

    let view = h.engine.view();
    assert_eq!(view.phase, SyncPhase::Authenticated(u.clone()));
    assert_eq!(view.count(), 2);
    assert_eq!(view.last_error, Some(CartFailure::LoadFailed));

    h.remote.set_fail_reads(false);
    h.remote.seed_row(&u, &pid("sock"), 1);
    h.engine.resolve(Some(u)).await.unwrap();

    let view = h.engine.view();
    assert_eq!(view.count(), 3);
    assert_eq!(view.last_error, None);
    assert!(!view.loading);
}

#[tokio::test]
async fn test_authenticated_clear() {
    let h = harness();
    let u = user("u-1");
    h.remote.seed_row(&u, &pid("tee"), 2);
    h.remote.seed_row(&u, &pid("sock"), 1);
    h.engine.resolve(Some(u.clone())).await.unwrap();

    h.engine.clear().await.unwrap();

    assert!(h.remote.rows(&u).is_empty());
    assert_eq!(h.engine.cart_count(), 0);
}

#[tokio::test]
async fn test_unknown_product_is_rejected_not_retried() {
    let h = harness();
    h.engine.resolve(Some(user("u-1"))).await.unwrap();
    let ghost = ProductSnapshot::new("ghost", "Discontinued", Money::from_cents(100));

    let err = h.engine.add(ghost).await.unwrap_err();
    assert!(matches!(err, CartError::Rejected { op: RemoteOp::Upsert, .. }));
    assert!(!err.is_retryable());
}

// =============================================================================
// Properties
// =============================================================================

#[tokio::test]
async fn test_upsert_is_idempotent() {
    let h = harness();
    let u = user("u-1");
    h.engine.resolve(Some(u.clone())).await.unwrap();
    h.engine.add(tee()).await.unwrap();

    h.engine.set_quantity(pid("tee"), 3).await.unwrap();
    h.engine.set_quantity(pid("tee"), 3).await.unwrap();

    assert_eq!(h.remote.rows(&u), vec![(pid("tee"), 3)]);
}

#[tokio::test]
async fn test_count_matches_lines_and_no_zero_lines() {
    let h = harness();

    h.engine.resolve(None).await.unwrap();
    let steps: Vec<(ProductId, i64)> = vec![
        (pid("tee"), 4),
        (pid("sock"), -3),
        (pid("tee"), 0),
        (pid("runner"), 2),
        (pid("sock"), 1),
    ];

    h.engine.add(tee()).await.unwrap();
    h.engine.add(sock()).await.unwrap();
    h.engine.add(runner()).await.unwrap();
    assert_view_consistent(&h.engine);

    for (product_id, quantity) in &steps {
        h.engine.set_quantity(product_id.clone(), *quantity).await.unwrap();
        assert_view_consistent(&h.engine);
        assert!(h.local.read().items().iter().all(|line| line.quantity > 0));
    }

    h.engine.resolve(Some(user("u-1"))).await.unwrap();
    h.engine.add(tee()).await.unwrap();
    h.engine.add(runner()).await.unwrap();
    for (product_id, quantity) in &steps {
        h.engine.set_quantity(product_id.clone(), *quantity).await.unwrap();
        assert_view_consistent(&h.engine);
    }
}

#[tokio::test]
async fn test_view_never_mixes_backends() {
    let h = harness();
    let u = user("u-1");
    h.remote.seed_row(&u, &pid("runner"), 1);

    h.engine.resolve(None).await.unwrap();
    h.engine.add(tee()).await.unwrap();
    let device_cart = h.engine.view().cart;

    h.engine.resolve(Some(u.clone())).await.unwrap();
    assert_eq!(h.engine.view().cart, h.remote.read(&u).await.unwrap());
    assert!(!h.engine.view().cart.contains(&pid("tee")));

    h.engine.resolve(None).await.unwrap();
    assert_eq!(h.engine.view().cart, device_cart);
    assert!(!h.engine.view().cart.contains(&pid("runner")));
}

#[tokio::test]
async fn test_failed_remote_write_leaves_view_unchanged() {
    let h = harness();
    let u = user("u-1");
    h.remote.seed_row(&u, &pid("tee"), 2);
    h.engine.resolve(Some(u.clone())).await.unwrap();
    let before = h.engine.view();

    h.remote.set_fail_writes(true);

    for result in [
        h.engine.add(sock()).await,
        h.engine.set_quantity(pid("tee"), 5).await,
        h.engine.remove(pid("tee")).await,
        h.engine.clear().await,
    ] {
        let err = result.unwrap_err();
        assert_eq!(err.failure(), CartFailure::SaveFailed);
        assert_eq!(err.user_message(), "Could not save your change.");
        assert!(err.is_retryable());
        assert_eq!(h.engine.view(), before);
    }
    assert_eq!(h.remote.rows(&u), vec![(pid("tee"), 2)]);
}

#[tokio::test]
async fn test_refresh_failure_after_write_reports_load() {
    let h = harness();
    let u = user("u-1");
    h.engine.resolve(Some(u.clone())).await.unwrap();
    let before = h.engine.view().cart;

    h.remote.set_fail_reads(true);
    let err = h.engine.add(tee()).await.unwrap_err();

    assert!(matches!(err, CartError::RemoteUnavailable { op: RemoteOp::Read, .. }));
    assert_eq!(err.failure(), CartFailure::LoadFailed);
    assert_eq!(h.remote.rows(&u), vec![(pid("tee"), 1)]);

    let view = h.engine.view();
    assert_eq!(view.cart, before);
    assert_eq!(view.last_error, Some(CartFailure::LoadFailed));
    assert!(!view.loading);
}

// =============================================================================
// Transitions
// =============================================================================

#[tokio::test]
async fn test_sign_in_does_not_merge_guest_cart() {
    let h = harness();
    h.engine.resolve(None).await.unwrap();
    h.engine.add(tee()).await.unwrap();
    h.engine.add(tee()).await.unwrap();

    let u = user("u-1");
    h.engine.resolve(Some(u.clone())).await.unwrap();

    assert!(h.engine.view().cart.is_empty());
    assert!(h.remote.rows(&u).is_empty());
    let stored = h.local.read();
    assert_eq!(stored.line_count(), 1);
    assert_eq!(stored.quantity_of(&pid("tee")), 2);
}

#[tokio::test]
async fn test_sign_out_restores_device_cart() {
    let h = harness();
    h.engine.resolve(None).await.unwrap();
    h.engine.add(sock()).await.unwrap();

    let u = user("u-1");
    h.engine.resolve(Some(u.clone())).await.unwrap();
    h.engine.add(runner()).await.unwrap();

    h.engine.resolve(None).await.unwrap();

    let view = h.engine.view();
    assert_eq!(view.phase, SyncPhase::Anonymous);
    assert_eq!(view.cart.quantity_of(&pid("sock")), 1);
    assert!(!view.cart.contains(&pid("runner")));
    assert_eq!(h.remote.rows(&u), vec![(pid("runner"), 1)]);
}

#[tokio::test]
async fn test_switching_users_switches_carts() {
    let h = harness();
    let alice = user("alice");
    let bob = user("bob");
    h.remote.seed_row(&alice, &pid("tee"), 1);
    h.remote.seed_row(&bob, &pid("sock"), 2);

    h.engine.resolve(Some(alice)).await.unwrap();
    assert!(h.engine.view().cart.contains(&pid("tee")));

    h.engine.resolve(Some(bob.clone())).await.unwrap();
    let view = h.engine.view();
    assert_eq!(view.phase, SyncPhase::Authenticated(bob));
    assert!(!view.cart.contains(&pid("tee")));
    assert_eq!(view.cart.quantity_of(&pid("sock")), 2);
}

// =============================================================================
// Ordering
// =============================================================================

#[tokio::test]
async fn test_mutations_are_serialized() {
    let h = harness();
    let u = user("u-1");
    h.engine.resolve(Some(u.clone())).await.unwrap();

    let gate = h.remote.hold_upserts().await;

    let engine = h.engine.clone();
    let first = tokio::spawn(async move { engine.add(tee()).await });
    h.remote.upsert_started().await;

    let engine = h.engine.clone();
    let second = tokio::spawn(async move { engine.add(tee()).await });
    yield_a_few().await;

    assert!(h.remote.rows(&u).is_empty());
    drop(gate);

    first.await.unwrap().unwrap();
    second.await.unwrap().unwrap();

    // The second add saw the first one's refreshed view.
    assert_eq!(h.remote.rows(&u), vec![(pid("tee"), 2)]);
    assert_eq!(h.engine.cart_count(), 2);
}

#[tokio::test]
async fn test_sign_out_during_write_discards_stale_refresh() {
    let h = harness();
    h.engine.resolve(None).await.unwrap();
    h.engine.add(sock()).await.unwrap();

    let u = user("u-1");
    h.engine.resolve(Some(u.clone())).await.unwrap();
    let reads_before = h.remote.read_count();

    let gate = h.remote.hold_upserts().await;

    let engine = h.engine.clone();
    let add = tokio::spawn(async move { engine.add(tee()).await });
    h.remote.upsert_started().await;

    let engine = h.engine.clone();
    let sign_out = tokio::spawn(async move { engine.resolve(None).await });
    yield_a_few().await;

    // Still waiting behind the write.
    assert_eq!(h.engine.phase(), SyncPhase::Authenticated(u.clone()));
    drop(gate);

    add.await.unwrap().unwrap();
    sign_out.await.unwrap().unwrap();

    // The write landed on the backend it was issued against...
    assert_eq!(h.remote.rows(&u), vec![(pid("tee"), 1)]);
    // ...but its refresh was skipped and never shown.
    assert_eq!(h.remote.read_count(), reads_before);

    let view = h.engine.view();
    assert_eq!(view.phase, SyncPhase::Anonymous);
    assert_eq!(view.cart, h.local.read());
    assert!(!view.cart.contains(&pid("tee")));
}

#[tokio::test]
async fn test_subscribers_see_final_state() {
    let h = harness();
    let mut views = h.engine.subscribe();

    h.engine.resolve(None).await.unwrap();
    h.engine.add(tee()).await.unwrap();

    assert!(views.has_changed().unwrap());
    let seen = views.borrow_and_update().clone();
    assert_eq!(seen.phase, SyncPhase::Anonymous);
    assert_eq!(seen.count(), 1);
}
