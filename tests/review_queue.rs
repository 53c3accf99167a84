//! Review queue claim, timeout, and ordering behavior.

use std::sync::Barrier;

use leaseflow::models::ReviewStatus;
use leaseflow::repository::{ReviewQueueError, ReviewQueueRepository};
use leaseflow::services::ReviewQueueService;
use leaseflow::tenant::TenantContext;

fn temp_db() -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("leaseflow.db");
    (dir, db)
}

#[test]
fn concurrent_claims_have_exactly_one_winner() {
    let (_dir, db) = temp_db();
    let repo = ReviewQueueRepository::new(&db).unwrap();
    let item = repo.enqueue("t1", "doc1", "ex1", 30).unwrap();

    const REVIEWERS: usize = 4;
    let barrier = Barrier::new(REVIEWERS);

    let outcomes: Vec<Result<(), ReviewQueueError>> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..REVIEWERS)
            .map(|i| {
                let repo = ReviewQueueRepository::new(&db).unwrap();
                let barrier = &barrier;
                let item_id = item.id.clone();
                scope.spawn(move || {
                    barrier.wait();
                    repo.claim("t1", &item_id, &format!("reviewer-{i}"))
                        .map(|_| ())
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let winners = outcomes.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1, "exactly one claim must win: {outcomes:?}");
    for outcome in &outcomes {
        if let Err(e) = outcome {
            assert!(
                matches!(e, ReviewQueueError::AlreadyClaimed { .. }),
                "losers must see AlreadyClaimed, got {e:?}"
            );
        }
    }
}

#[test]
fn stale_claim_is_released_by_list() {
    let (_dir, db) = temp_db();
    let repo = ReviewQueueRepository::new(&db).unwrap();
    let item = repo.enqueue("t1", "doc1", "ex1", 30).unwrap();
    repo.claim("t1", &item.id, "alice").unwrap();

    // A zero-minute timeout makes every claim immediately stale
    let service = ReviewQueueService::new(ReviewQueueRepository::new(&db).unwrap(), 0);
    let ctx = TenantContext::new("t1");

    let listed = service.list(&ctx).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, item.id);
    assert_eq!(listed[0].status, ReviewStatus::Pending);
    assert!(listed[0].claimed_by.is_none());
    assert!(listed[0].claimed_at.is_none());

    // The released item can be claimed by someone else
    service.claim(&ctx, &item.id, "bob").unwrap();
}

#[test]
fn fresh_claim_survives_list() {
    let (_dir, db) = temp_db();
    let repo = ReviewQueueRepository::new(&db).unwrap();
    let item = repo.enqueue("t1", "doc1", "ex1", 30).unwrap();
    repo.claim("t1", &item.id, "alice").unwrap();

    let service = ReviewQueueService::new(ReviewQueueRepository::new(&db).unwrap(), 30);
    let ctx = TenantContext::new("t1");

    assert!(service.list(&ctx).unwrap().is_empty());
    let held = service.get(&ctx, &item.id).unwrap();
    assert_eq!(held.status, ReviewStatus::Claimed);
    assert_eq!(held.claimed_by.as_deref(), Some("alice"));
}

#[test]
fn completed_item_never_reappears_in_pending() {
    let (_dir, db) = temp_db();
    let repo = ReviewQueueRepository::new(&db).unwrap();
    let service = ReviewQueueService::new(ReviewQueueRepository::new(&db).unwrap(), 30);
    let ctx = TenantContext::new("t1");

    let item = repo.enqueue("t1", "doc1", "ex1", 30).unwrap();
    service.claim(&ctx, &item.id, "alice").unwrap();
    service.complete(&ctx, &item.id, "alice").unwrap();

    assert!(service.list(&ctx).unwrap().is_empty());

    // Re-evaluating the extraction must not resurrect the finished item
    let after = repo.enqueue("t1", "doc1", "ex1", 99).unwrap();
    assert_eq!(after.status, ReviewStatus::Completed);
    assert!(service.list(&ctx).unwrap().is_empty());
}

#[test]
fn claim_complete_lifecycle_enforces_ownership() {
    let (_dir, db) = temp_db();
    let service = ReviewQueueService::new(ReviewQueueRepository::new(&db).unwrap(), 30);
    let repo = ReviewQueueRepository::new(&db).unwrap();
    let ctx = TenantContext::new("t1");

    let item = repo.enqueue("t1", "doc1", "ex1", 30).unwrap();
    service.claim(&ctx, &item.id, "alice").unwrap();

    assert!(matches!(
        service.complete(&ctx, &item.id, "bob"),
        Err(ReviewQueueError::NotClaimOwner { .. })
    ));
    assert!(matches!(
        service.skip(&ctx, &item.id, "bob"),
        Err(ReviewQueueError::NotClaimOwner { .. })
    ));

    let done = service.complete(&ctx, &item.id, "alice").unwrap();
    assert_eq!(done.status, ReviewStatus::Completed);

    // Completing twice is an invalid transition, not a silent no-op
    assert!(matches!(
        service.complete(&ctx, &item.id, "alice"),
        Err(ReviewQueueError::InvalidState { .. })
    ));
}

#[test]
fn listing_orders_by_priority_then_creation() {
    let (_dir, db) = temp_db();
    let repo = ReviewQueueRepository::new(&db).unwrap();
    let service = ReviewQueueService::new(ReviewQueueRepository::new(&db).unwrap(), 30);
    let ctx = TenantContext::new("t1");

    let older_tie = repo.enqueue("t1", "doc1", "ex1", 30).unwrap();
    std::thread::sleep(std::time::Duration::from_millis(5));
    let newer_tie = repo.enqueue("t1", "doc2", "ex2", 30).unwrap();
    let urgent = repo.enqueue("t1", "doc3", "ex3", 70).unwrap();

    let listed = service.list(&ctx).unwrap();
    let ids: Vec<_> = listed.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(
        ids,
        vec![urgent.id.as_str(), older_tie.id.as_str(), newer_tie.id.as_str()]
    );
}

#[test]
fn concurrent_sweeps_release_each_claim_once() {
    let (_dir, db) = temp_db();
    let repo = ReviewQueueRepository::new(&db).unwrap();
    let item = repo.enqueue("t1", "doc1", "ex1", 30).unwrap();
    repo.claim("t1", &item.id, "alice").unwrap();

    const SWEEPERS: usize = 4;
    let barrier = Barrier::new(SWEEPERS);

    let released: usize = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..SWEEPERS)
            .map(|_| {
                let repo = ReviewQueueRepository::new(&db).unwrap();
                let barrier = &barrier;
                scope.spawn(move || {
                    barrier.wait();
                    repo.release_stale("t1", chrono::Duration::zero()).unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).sum()
    });

    assert_eq!(released, 1, "a stale claim is released exactly once");
    let after = repo.get("t1", &item.id).unwrap();
    assert_eq!(after.status, ReviewStatus::Pending);
}

#[test]
fn skipping_pending_item_is_terminal() {
    let (_dir, db) = temp_db();
    let repo = ReviewQueueRepository::new(&db).unwrap();
    let service = ReviewQueueService::new(ReviewQueueRepository::new(&db).unwrap(), 30);
    let ctx = TenantContext::new("t1");

    let item = repo.enqueue("t1", "doc1", "ex1", 30).unwrap();
    let skipped = service.skip(&ctx, &item.id, "alice").unwrap();
    assert_eq!(skipped.status, ReviewStatus::Skipped);

    assert!(matches!(
        service.claim(&ctx, &item.id, "bob"),
        Err(ReviewQueueError::InvalidState { .. })
    ));
}
