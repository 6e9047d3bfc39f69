mod common;

use std::collections::HashSet;
use std::time::Duration;

use common::*;
use starling::{CallError, PoolError, WorkerState};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_calls_queue_behind_busy_workers() {
    let probe = Probe::default();
    let pool = pool_of(2, &probe).await;

    let calls: Vec<_> = ["a", "b", "c", "d"]
        .into_iter()
        .map(|input| {
            let pool = pool.clone();
            tokio::spawn(async move { pool.call(sleepy(input, 100)).await })
        })
        .collect();

    let mut outcomes = Vec::new();
    for call in calls {
        outcomes.push(call.await.unwrap().unwrap());
    }

    let texts: HashSet<_> = outcomes.iter().map(|o| o.text.clone()).collect();
    assert_eq!(texts, HashSet::from(["a", "b", "c", "d"].map(String::from)));

    outcomes.sort_by_key(|o| o.started);
    let first_done = outcomes[0].finished.min(outcomes[1].finished);
    assert_ne!(outcomes[0].serial, outcomes[1].serial);
    assert!(outcomes[2].started >= first_done);
    assert!(outcomes[3].started >= first_done);

    assert_eq!(probe.spawned(), 2);
    assert!(pool.snapshot().is_consistent());
    pool.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_n_calls_occupy_n_distinct_workers() {
    let probe = Probe::default();
    let pool = pool_of(3, &probe).await;

    let calls: Vec<_> = (0..3)
        .map(|i| {
            let pool = pool.clone();
            tokio::spawn(async move { pool.call(sleepy(&i.to_string(), 200)).await })
        })
        .collect();

    let snapshot = tokio::time::timeout(STATE_TIMEOUT, pool.watch_until(|s| s.busy_count() == 3))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(snapshot.idle_count(), 0);
    for worker in &snapshot.busy {
        assert_eq!(pool.worker_state(*worker), Some(WorkerState::Busy));
        assert!(pool.is_busy(*worker));
    }

    let serials: HashSet<_> = serials_of(calls).await;
    assert_eq!(serials.len(), 3);
    pool.shutdown().await;
}

async fn serials_of(
    calls: Vec<tokio::task::JoinHandle<Result<Outcome, CallError<JobFailed>>>>,
) -> HashSet<usize> {
    let mut serials = HashSet::new();
    for call in calls {
        serials.insert(call.await.unwrap().unwrap().serial);
    }
    serials
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_extra_call_blocks_until_a_worker_frees() {
    let probe = Probe::default();
    let pool = pool_of(2, &probe).await;

    let slow: Vec<_> = (0..2)
        .map(|_| {
            let pool = pool.clone();
            tokio::spawn(async move { pool.call(sleepy("slow", 300)).await })
        })
        .collect();
    tokio::time::timeout(STATE_TIMEOUT, pool.watch_until(|s| s.busy_count() == 2))
        .await
        .unwrap()
        .unwrap();

    let blocked = tokio::time::timeout(Duration::from_millis(100), pool.call(Job::Echo("late".into()))).await;
    assert!(blocked.is_err(), "third call should wait for a free worker");

    let late = pool.call(Job::Echo("late".into())).await.unwrap();
    assert_eq!(late.text, "late");
    for call in slow {
        assert_eq!(call.await.unwrap().unwrap().text, "slow");
    }

    // The abandoned wait did not leak a worker.
    let snapshot = pool.snapshot();
    assert_eq!(snapshot.idle_count(), 2);
    assert_eq!(snapshot.busy_count(), 0);
    pool.shutdown().await;
}

#[tokio::test]
async fn test_idle_workers_are_served_in_fifo_order() {
    let probe = Probe::default();
    let pool = pool_of(3, &probe).await;

    let mut serials = Vec::new();
    for _ in 0..4 {
        serials.push(pool.call(Job::Identify).await.unwrap().serial);
    }
    assert_eq!(serials, vec![0, 1, 2, 0]);
    pool.shutdown().await;
}

#[tokio::test]
async fn test_operation_error_is_returned_unchanged() {
    let probe = Probe::default();
    let pool = pool_of(2, &probe).await;

    let err = pool.call(Job::Fail("bad input".into())).await.unwrap_err();
    assert!(err.is_operation());
    assert_eq!(err.into_operation(), Some(JobFailed("bad input".into())));

    // The worker stays in service.
    assert_eq!(pool.idle_count(), 2);
    assert_eq!(probe.spawned(), 2);
    assert_eq!(pool.call(Job::Echo("next".into())).await.unwrap().text, "next");
    pool.shutdown().await;
}

#[tokio::test]
async fn test_private_operation_is_rejected_before_provisioning() {
    let probe = Probe::default();
    let pool = pool_of(2, &probe).await;

    let err = pool.call(Job::Rehash).await.unwrap_err();
    match err.as_pool() {
        Some(PoolError::UnsupportedOperation { operation, .. }) => assert_eq!(operation, "rehash"),
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(probe.handled(), 0);
    assert_eq!(probe.spawned(), 2);
    assert_eq!(pool.busy_count(), 0);

    assert!(matches!(pool.future(Job::Rehash), Err(PoolError::UnsupportedOperation { .. })));
    assert!(matches!(pool.cast(Job::Rehash), Err(PoolError::UnsupportedOperation { .. })));
    assert_eq!(probe.handled(), 0);
    pool.shutdown().await;
}

#[tokio::test]
async fn test_protected_operation_is_dispatchable() {
    let probe = Probe::default();
    let pool = pool_of(2, &probe).await;
    assert_eq!(pool.call(Job::Ping).await.unwrap().text, "pong");
    pool.shutdown().await;
}

#[tokio::test]
async fn test_capability_queries_need_no_worker() {
    let probe = Probe::default();
    let pool = pool_of(2, &probe).await;

    assert!(pool.responds_to("echo"));
    assert!(pool.responds_to("sleepy_echo"));
    assert!(pool.responds_to("ping"));
    assert!(!pool.responds_to("rehash"));
    assert!(!pool.responds_to("launch"));

    assert!(pool.responds_to_private("rehash"));
    assert!(pool.responds_to_private("echo"));
    assert!(!pool.responds_to_private("launch"));

    assert_eq!(pool.operations().len(), 9);
    assert_eq!(probe.handled(), 0);
    pool.shutdown().await;
}

#[tokio::test]
async fn test_future_resolves_to_the_call_result() {
    let probe = Probe::default();
    let pool = pool_of(2, &probe).await;

    let deferred = pool.future(sleepy("later", 50)).unwrap();
    let failing = pool.future(Job::Fail("nope".into())).unwrap();

    assert_eq!(deferred.value().await.unwrap().text, "later");
    assert!(failing.value().await.unwrap_err().is_operation());
    pool.shutdown().await;
}

#[tokio::test]
async fn test_dropped_future_still_reclaims_worker() {
    let probe = Probe::default();
    let pool = pool_of(2, &probe).await;

    let deferred = pool.future(sleepy("ignored", 50)).unwrap();
    drop(deferred);

    eventually(|| probe.handled() == 1).await;
    let snapshot = tokio::time::timeout(STATE_TIMEOUT, pool.watch_until(|s| s.idle_count() == 2))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(snapshot.busy_count(), 0);
    pool.shutdown().await;
}

#[tokio::test]
async fn test_cast_runs_in_background() {
    let probe = Probe::default();
    let pool = pool_of(2, &probe).await;

    pool.cast(Job::Echo("fire".into())).unwrap();
    pool.cast(Job::Fail("logged".into())).unwrap();
    eventually(|| probe.handled() == 2).await;
    pool.shutdown().await;
}

#[tokio::test]
async fn test_inspect_forwards_to_a_worker() {
    let probe = Probe::default();
    let pool = pool_of(2, &probe).await;

    assert_eq!(pool.inspect().await.unwrap(), "#<TestWorker serial=0>");
    assert_eq!(pool.inspect().await.unwrap(), "#<TestWorker serial=1>");
    assert_eq!(pool.idle_count(), 2);
    pool.shutdown().await;
}

#[tokio::test]
async fn test_workers_lists_idle_then_busy() {
    let probe = Probe::default();
    let pool = pool_of(3, &probe).await;

    let workers = pool.workers();
    assert_eq!(workers.len(), 3);
    assert!(workers.iter().all(|w| pool.is_idle(*w)));
    assert_eq!(pool.worker_state(starling::WorkerId::new()), None);
    pool.shutdown().await;
}
