mod common;

use common::*;
use starling::runtime::{spawn_linked, Link, LinkEvent, LinkEvents};
use starling::PoolError;

async fn next_event(events: &mut LinkEvents) -> LinkEvent {
    tokio::time::timeout(STATE_TIMEOUT, events.recv())
        .await
        .expect("no link event in time")
        .expect("link closed")
}

#[tokio::test]
async fn test_call_reply_travels_through_the_owner() {
    init_test_logging();
    let (link, mut events) = Link::channel();
    let handle = spawn_linked::<TestWorker>(Probe::default(), link).await.unwrap();
    assert!(handle.is_alive());
    assert!(handle.is_linked());

    let call = {
        let handle = handle.clone();
        tokio::spawn(async move { handle.call(Job::Echo("hi".into())).await })
    };

    // The reply is held until the owner delivers it.
    match next_event(&mut events).await {
        LinkEvent::Completed { worker, delivery } => {
            assert_eq!(worker, handle.id());
            assert!(!call.is_finished());
            delivery.deliver();
        }
        other => panic!("unexpected event: {:?}", other),
    }
    let outcome = call.await.unwrap().unwrap().unwrap();
    assert_eq!(outcome.text, "hi");
}

#[tokio::test]
async fn test_reply_is_delivered_directly_without_an_owner() {
    init_test_logging();
    let (link, events) = Link::channel();
    drop(events);
    let handle = spawn_linked::<TestWorker>(Probe::default(), link).await.unwrap();
    assert!(!handle.owner().is_open());

    let outcome = handle.call(Job::Echo("direct".into())).await.unwrap().unwrap();
    assert_eq!(outcome.text, "direct");
}

#[tokio::test]
async fn test_operation_error_is_not_a_crash() {
    init_test_logging();
    let (link, events) = Link::channel();
    drop(events);
    let handle = spawn_linked::<TestWorker>(Probe::default(), link).await.unwrap();

    let outcome = handle.call(Job::Fail("nope".into())).await.unwrap();
    assert_eq!(outcome.unwrap_err(), JobFailed("nope".into()));
    assert!(handle.is_alive());
}

#[tokio::test]
async fn test_panic_reports_crash_and_termination_reason() {
    init_test_logging();
    let (link, mut events) = Link::channel();
    let handle = spawn_linked::<TestWorker>(Probe::default(), link).await.unwrap();

    let crashed = handle.call(Job::Crash).await.unwrap_err();
    assert_eq!(crashed.worker, handle.id());
    assert!(crashed.reason.contains("crashed on purpose"));

    match next_event(&mut events).await {
        LinkEvent::Terminated { worker, reason } => {
            assert_eq!(worker, handle.id());
            assert!(reason.unwrap().contains("crashed on purpose"));
        }
        other => panic!("unexpected event: {:?}", other),
    }
    handle.exited().await;
    assert!(!handle.is_alive());

    // Later calls see the dead worker as crashed as well.
    assert!(handle.call(Job::Echo("after".into())).await.is_err());
}

#[tokio::test]
async fn test_terminate_is_reported_without_reason() {
    init_test_logging();
    let probe = Probe::default();
    let (link, mut events) = Link::channel();
    let handle = spawn_linked::<TestWorker>(probe.clone(), link).await.unwrap();

    handle.terminate().unwrap();
    match next_event(&mut events).await {
        LinkEvent::Terminated { reason, .. } => assert!(reason.is_none()),
        other => panic!("unexpected event: {:?}", other),
    }
    handle.exited().await;
    assert_eq!(probe.stopped(), 1);

    let err = handle.terminate().unwrap_err();
    assert!(matches!(err, PoolError::DeadHandle(id) if id == handle.id()));
}

#[tokio::test]
async fn test_unlinked_worker_terminates_silently() {
    init_test_logging();
    let (link, mut events) = Link::channel();
    let handle = spawn_linked::<TestWorker>(Probe::default(), link).await.unwrap();

    handle.unlink();
    assert!(!handle.is_linked());
    handle.terminate().unwrap();
    handle.exited().await;

    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn test_start_failure_is_a_spawn_error() {
    init_test_logging();
    let (link, _events) = Link::channel();
    let err = spawn_linked::<TestWorker>(Probe::failing_from(0), link).await.unwrap_err();
    assert!(matches!(err, PoolError::SpawnFailed(_)));
}

#[tokio::test]
async fn test_describe_answers_with_the_worker_representation() {
    init_test_logging();
    let (link, mut events) = Link::channel();
    let handle = spawn_linked::<TestWorker>(Probe::default(), link).await.unwrap();

    let describe = {
        let handle = handle.clone();
        tokio::spawn(async move { handle.describe().await })
    };
    if let LinkEvent::Completed { delivery, .. } = next_event(&mut events).await {
        delivery.deliver();
    }
    assert_eq!(describe.await.unwrap().unwrap(), "#<TestWorker serial=0>");
}
