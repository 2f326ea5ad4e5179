//! Shutdown Coordination Tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use keystone_domain::ports::lifecycle::ShutdownCoordinator;
use keystone_infrastructure::constants::WORKER_POLL_INTERVAL;
use keystone_infrastructure::lifecycle::{
    BackgroundWorker, DefaultShutdownCoordinator, sleep_unless_cancelled,
};
use tokio_util::sync::CancellationToken;

fn polling_worker(name: &str, ticks: Arc<AtomicUsize>) -> BackgroundWorker {
    BackgroundWorker::spawn(name, CancellationToken::new(), move |token| {
        while !token.is_cancelled() {
            ticks.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(5));
        }
    })
    .unwrap()
}

#[test]
fn test_actions_run_in_reverse_order_once() {
    let coordinator = DefaultShutdownCoordinator::new();
    let order = Arc::new(Mutex::new(Vec::new()));
    for name in ["first", "second", "third"] {
        let order = Arc::clone(&order);
        coordinator.register_action(name, Box::new(move || order.lock().unwrap().push(name)));
    }
    assert_eq!(coordinator.pending_actions(), 3);

    coordinator.signal_shutdown();
    coordinator.signal_shutdown();

    assert!(coordinator.is_shutting_down());
    assert_eq!(*order.lock().unwrap(), vec!["third", "second", "first"]);
    assert_eq!(coordinator.pending_actions(), 0);
}

#[test]
fn test_action_registered_after_shutdown_runs_immediately() {
    let coordinator = DefaultShutdownCoordinator::new();
    coordinator.signal_shutdown();
    let runs = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&runs);

    coordinator.register_action("late", Box::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    }));

    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(coordinator.pending_actions(), 0);
}

#[test]
fn test_worker_stops_on_shutdown_signal() {
    let coordinator = DefaultShutdownCoordinator::new();
    let ticks = Arc::new(AtomicUsize::new(0));
    let worker = Arc::new(polling_worker("ticker", Arc::clone(&ticks)));
    worker.stop_on_shutdown(&coordinator);
    assert_eq!(worker.name(), "ticker");
    assert!(worker.is_running());

    coordinator.signal_shutdown();

    assert!(!worker.is_running());
    let after_stop = ticks.load(Ordering::SeqCst);
    std::thread::sleep(WORKER_POLL_INTERVAL / 10);
    assert_eq!(ticks.load(Ordering::SeqCst), after_stop);
}

#[test]
fn test_dropping_worker_stops_thread() {
    let coordinator = DefaultShutdownCoordinator::new();
    let ticks = Arc::new(AtomicUsize::new(0));
    let worker = Arc::new(polling_worker("dropped", Arc::clone(&ticks)));
    worker.stop_on_shutdown(&coordinator);

    drop(worker);
    let after_drop = ticks.load(Ordering::SeqCst);
    std::thread::sleep(Duration::from_millis(20));

    assert_eq!(ticks.load(Ordering::SeqCst), after_drop);
    // The registered action finds nothing left to stop
    coordinator.signal_shutdown();
}

#[test]
fn test_released_workers_do_not_accumulate_actions() {
    let coordinator = DefaultShutdownCoordinator::new();
    for generation in 0..5 {
        let worker = Arc::new(polling_worker(
            &format!("rebuilt-{generation}"),
            Arc::new(AtomicUsize::new(0)),
        ));
        worker.stop_on_shutdown(&coordinator);
        drop(worker);
    }
    let live = Arc::new(polling_worker("live", Arc::new(AtomicUsize::new(0))));

    live.stop_on_shutdown(&coordinator);

    assert_eq!(coordinator.pending_actions(), 1);
    coordinator.signal_shutdown();
    assert!(!live.is_running());
}

#[test]
fn test_plain_actions_are_never_pruned() {
    let coordinator = DefaultShutdownCoordinator::new();
    coordinator.register_action("plain", Box::new(|| {}));
    coordinator.register_owned("orphan", Box::new(|| false), Box::new(|| {}));

    coordinator.register_action("another", Box::new(|| {}));

    assert_eq!(coordinator.pending_actions(), 2);
}

#[test]
fn test_sleep_unless_cancelled() {
    let token = CancellationToken::new();

    assert!(sleep_unless_cancelled(&token, Duration::from_millis(5)));

    token.cancel();
    assert!(!sleep_unless_cancelled(&token, Duration::from_secs(60)));
}
