use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::time::{sleep, Duration};

use booking_queue_cell::*;

#[derive(Default)]
struct CountingTask {
    ticks: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    saw_shutdown: AtomicBool,
    work: Duration,
}

impl CountingTask {
    fn with_work(work: Duration) -> Self {
        Self {
            work,
            ..Self::default()
        }
    }

    fn ticks(&self) -> usize {
        self.ticks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PollTask for CountingTask {
    async fn tick(&self, shutdown: &watch::Receiver<bool>) {
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);
        self.ticks.fetch_add(1, Ordering::SeqCst);

        if !self.work.is_zero() {
            sleep(self.work).await;
        }
        if *shutdown.borrow() {
            self.saw_shutdown.store(true, Ordering::SeqCst);
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

fn poller(interval_ms: u64) -> QueuePoller {
    QueuePoller::new(PollerConfig {
        poller_id: "test-poller".to_string(),
        interval_ms,
        shutdown_timeout_ms: 5000,
    })
}

#[tokio::test(start_paused = true)]
async fn test_poller_ticks_on_interval() {
    let task = Arc::new(CountingTask::default());
    let mut poller = poller(1000);

    poller.start(task.clone());
    assert!(poller.is_running());

    // No tick at start; the caller loads before polling begins.
    sleep(Duration::from_millis(500)).await;
    assert_eq!(task.ticks(), 0);

    sleep(Duration::from_millis(3000)).await;
    assert_eq!(task.ticks(), 3);

    poller.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_stopped_poller_does_not_tick() {
    let task = Arc::new(CountingTask::default());
    let mut poller = poller(1000);
    let signal = poller.shutdown_signal();

    poller.start(task.clone());
    sleep(Duration::from_millis(1500)).await;
    poller.stop().await;

    let ticks = task.ticks();
    sleep(Duration::from_millis(5000)).await;

    assert_eq!(task.ticks(), ticks);
    assert!(!poller.is_running());
    assert!(*signal.borrow());
}

#[tokio::test(start_paused = true)]
async fn test_slow_ticks_never_overlap() {
    let task = Arc::new(CountingTask::with_work(Duration::from_millis(2500)));
    let mut poller = poller(1000);

    poller.start(task.clone());
    sleep(Duration::from_millis(10_000)).await;
    poller.stop().await;

    assert_eq!(task.max_in_flight.load(Ordering::SeqCst), 1);
    // Ticks start at 1s, 4.5s and 8s: a full interval after each slow tick ends.
    assert_eq!(task.ticks(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_in_flight_tick_observes_stop() {
    let task = Arc::new(CountingTask::with_work(Duration::from_millis(800)));
    let mut poller = poller(1000);

    poller.start(task.clone());
    sleep(Duration::from_millis(1200)).await;
    poller.stop().await;

    assert!(task.saw_shutdown.load(Ordering::SeqCst));
}

#[tokio::test(start_paused = true)]
async fn test_stopped_poller_cannot_restart() {
    let task = Arc::new(CountingTask::default());
    let mut poller = poller(1000);

    poller.stop().await;
    poller.start(task.clone());
    sleep(Duration::from_millis(3000)).await;

    assert!(!poller.is_running());
    assert_eq!(task.ticks(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_dropping_poller_cancels_task() {
    let task = Arc::new(CountingTask::default());
    let mut poller = poller(1000);

    poller.start(task.clone());
    sleep(Duration::from_millis(1500)).await;
    drop(poller);

    let ticks = task.ticks();
    sleep(Duration::from_millis(5000)).await;

    assert_eq!(task.ticks(), ticks);
    assert_eq!(Arc::strong_count(&task), 1);
}

#[test]
fn test_default_poller_config() {
    let config = PollerConfig::default();

    assert_eq!(config.interval_ms, 5000);
    assert!(config.poller_id.starts_with("poller-"));
}
