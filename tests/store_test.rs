//! OrderStore contract against the in-memory implementation.

use orderq::error::Error;
use orderq::model::{NewOrder, OrderId, Status};
use orderq::store::{MemoryOrderStore, OrderStore};

fn id(s: &str) -> OrderId {
    OrderId::new(s)
}

#[tokio::test]
async fn create_records_pending_undeleted_order() {
    let store = MemoryOrderStore::new();
    let order = store
        .create(id("o1"), &NewOrder::new("user-1", "https://x", 3))
        .await
        .unwrap();

    assert_eq!(order.identity, id("o1"));
    assert_eq!(order.status, Status::Pending);
    assert!(!order.deleted);
    assert_eq!(order.url, "https://x");
    assert_eq!(order.count, 3);
    assert_eq!(store.get(&id("o1")).await.unwrap(), order);
}

#[tokio::test]
async fn duplicate_identity_is_a_conflict() {
    let store = MemoryOrderStore::new();
    let new = NewOrder::new("user-1", "https://x", 3);
    store.create(id("o1"), &new).await.unwrap();

    let err = store.create(id("o1"), &new).await.unwrap_err();
    assert!(matches!(err, Error::Conflict(_)), "got {err:?}");
}

#[tokio::test]
async fn create_rejects_invalid_payload() {
    let store = MemoryOrderStore::new();
    let err = store
        .create(id("o1"), &NewOrder::new("user-1", "https://x", 0))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    assert!(matches!(store.get(&id("o1")).await, Err(Error::NotFound(_))));
}

#[tokio::test]
async fn get_unknown_is_not_found() {
    let store = MemoryOrderStore::new();
    assert!(matches!(store.get(&id("nope")).await, Err(Error::NotFound(_))));
}

#[tokio::test]
async fn transition_is_compare_and_set() {
    let store = MemoryOrderStore::new();
    store
        .create(id("o1"), &NewOrder::new("user-1", "https://x", 3))
        .await
        .unwrap();

    assert!(
        store
            .transition(&id("o1"), Status::Pending, Status::Processing)
            .await
            .unwrap()
    );
    // Second claim observes processing, not pending.
    assert!(
        !store
            .transition(&id("o1"), Status::Pending, Status::Processing)
            .await
            .unwrap()
    );
    assert!(
        store
            .transition(&id("o1"), Status::Processing, Status::Failed)
            .await
            .unwrap()
    );
    assert!(
        !store
            .transition(&id("o1"), Status::Processing, Status::Succeeded)
            .await
            .unwrap()
    );

    assert_eq!(store.get(&id("o1")).await.unwrap().status, Status::Failed);
    assert_eq!(
        store.history(&id("o1")).await,
        vec![Status::Pending, Status::Processing, Status::Failed]
    );
}

#[tokio::test]
async fn transition_outside_table_is_rejected_without_change() {
    let store = MemoryOrderStore::new();
    store
        .create(id("o1"), &NewOrder::new("user-1", "https://x", 3))
        .await
        .unwrap();

    let err = store
        .transition(&id("o1"), Status::Pending, Status::Succeeded)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidTransition { .. }));
    assert_eq!(store.get(&id("o1")).await.unwrap().status, Status::Pending);
}

#[tokio::test]
async fn transition_of_unknown_order_reports_false() {
    let store = MemoryOrderStore::new();
    assert!(
        !store
            .transition(&id("ghost"), Status::Pending, Status::Processing)
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn deleted_order_cannot_be_claimed_but_in_flight_one_finishes() {
    let store = MemoryOrderStore::new();
    let new = NewOrder::new("user-1", "https://x", 3);
    store.create(id("a"), &new).await.unwrap();
    store.create(id("b"), &new).await.unwrap();

    assert!(store.mark_deleted(&id("a")).await.unwrap());
    assert!(
        !store
            .transition(&id("a"), Status::Pending, Status::Processing)
            .await
            .unwrap()
    );

    assert!(
        store
            .transition(&id("b"), Status::Pending, Status::Processing)
            .await
            .unwrap()
    );
    assert!(store.mark_deleted(&id("b")).await.unwrap());
    assert!(
        store
            .transition(&id("b"), Status::Processing, Status::Succeeded)
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn mark_deleted_only_once() {
    let store = MemoryOrderStore::new();
    store
        .create(id("o1"), &NewOrder::new("user-1", "https://x", 3))
        .await
        .unwrap();

    assert!(store.mark_deleted(&id("o1")).await.unwrap());
    assert!(!store.mark_deleted(&id("o1")).await.unwrap());
    assert!(!store.mark_deleted(&id("missing")).await.unwrap());

    let order = store.get(&id("o1")).await.unwrap();
    assert!(order.deleted);
    assert_eq!(order.status, Status::Pending);
}

#[tokio::test]
async fn pending_identities_exclude_deleted_and_claimed() {
    let store = MemoryOrderStore::new();
    let new = NewOrder::new("user-1", "https://x", 3);
    for name in ["first", "second", "third", "fourth"] {
        store.create(id(name), &new).await.unwrap();
    }
    store.mark_deleted(&id("second")).await.unwrap();
    store
        .transition(&id("third"), Status::Pending, Status::Processing)
        .await
        .unwrap();

    assert_eq!(
        store.list_pending_identities().await.unwrap(),
        vec![id("first"), id("fourth")]
    );
}

#[tokio::test]
async fn list_by_owner_hides_deleted_and_other_owners() {
    let store = MemoryOrderStore::new();
    store
        .create(id("a"), &NewOrder::new("alice", "https://a", 1))
        .await
        .unwrap();
    store
        .create(id("b"), &NewOrder::new("alice", "https://b", 2))
        .await
        .unwrap();
    store
        .create(id("c"), &NewOrder::new("bob", "https://c", 3))
        .await
        .unwrap();
    store.mark_deleted(&id("a")).await.unwrap();

    let alice = store.list_by_owner("alice").await.unwrap();
    assert_eq!(alice.len(), 1);
    assert_eq!(alice[0].identity, id("b"));
    assert!(store.list_by_owner("carol").await.unwrap().is_empty());
}
