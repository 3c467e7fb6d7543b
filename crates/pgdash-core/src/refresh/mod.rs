//! Live-refresh scheduler.
//!
//! Periodically re-fetches data for one subject (a server id, a database name)
//! and publishes `{ data, error, is_loading }` to observers.
//!
//! Properties:
//! - at most one fetch per subscription is in flight;
//! - the period is measured from the moment a fetch settles, so a slow backend
//!   stretches the cycle instead of piling up requests;
//! - a failed fetch keeps the last successful data and records the error;
//! - after disable, dispose, or a subject switch, no late result from the old
//!   state ever reaches observers.
//!
//! Each subscription runs as one tokio task. Observers read snapshots through
//! [`RefreshHandle::state`] or wait on [`RefreshHandle::changed`].

mod subscription;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use subscription::Subscription;

/// Default refresh period.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);

/// Boxed future returned by a type-erased fetch function.
pub type FetchFuture<T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'static>>;

/// Type-erased fetch function, shared between successive subscriptions of a handle.
pub type FetchFn<K, T, E> = Arc<dyn Fn(K) -> FetchFuture<T, E> + Send + Sync>;

/// Scheduling options for one feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshOptions {
    /// Delay between a fetch settling and the next fetch starting.
    pub interval: Duration,
    /// When false, no timer-driven fetch is issued.
    pub enabled: bool,
}

impl Default for RefreshOptions {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            enabled: true,
        }
    }
}

impl RefreshOptions {
    pub fn every(interval: Duration) -> Self {
        Self {
            interval,
            enabled: true,
        }
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Snapshot of a feed as seen by observers.
#[derive(Debug)]
pub struct FeedState<T, E> {
    /// Last successful result, kept across failures.
    pub data: Option<Arc<T>>,
    /// Error of the most recent fetch, cleared by the next success.
    pub error: Option<E>,
    pub is_loading: bool,
}

impl<T, E: Clone> Clone for FeedState<T, E> {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            error: self.error.clone(),
            is_loading: self.is_loading,
        }
    }
}

impl<T, E> Default for FeedState<T, E> {
    fn default() -> Self {
        Self {
            data: None,
            error: None,
            is_loading: false,
        }
    }
}

/// Owner of a live feed. Dropping the handle disposes the current subscription.
pub struct RefreshHandle<K, T, E> {
    subject: K,
    fetch: FetchFn<K, T, E>,
    options: RefreshOptions,
    current: Subscription<T, E>,
}

/// Starts a feed for `subject`. When `options.enabled`, the first fetch is
/// issued immediately.
///
/// # Panics
/// Panics when called outside a tokio runtime.
pub fn start<K, T, E, F, Fut>(subject: K, fetch: F, options: RefreshOptions) -> RefreshHandle<K, T, E>
where
    K: Clone + fmt::Debug + Send + Sync + 'static,
    T: Send + Sync + 'static,
    E: Clone + fmt::Display + Send + Sync + 'static,
    F: Fn(K) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
{
    let fetch: FetchFn<K, T, E> = Arc::new(move |k| Box::pin(fetch(k)) as FetchFuture<T, E>);
    RefreshHandle::with_fetch_fn(subject, fetch, options)
}

impl<K, T, E> RefreshHandle<K, T, E>
where
    K: Clone + fmt::Debug + Send + Sync + 'static,
    T: Send + Sync + 'static,
    E: Clone + fmt::Display + Send + Sync + 'static,
{
    pub fn with_fetch_fn(subject: K, fetch: FetchFn<K, T, E>, options: RefreshOptions) -> Self {
        let current = Subscription::spawn(subject.clone(), fetch.clone(), options);
        Self {
            subject,
            fetch,
            options,
            current,
        }
    }

    /// Abandons the current subscription and starts a fresh one for `subject`.
    ///
    /// The new subscription starts with no data and inherits the enabled flag.
    /// Results of fetches issued for the old subject are discarded.
    pub fn switch_subject(&mut self, subject: K) {
        self.current.dispose();
        self.current = Subscription::spawn(subject.clone(), self.fetch.clone(), self.options);
        self.subject = subject;
    }
}

impl<K, T, E: Clone> RefreshHandle<K, T, E> {
    pub fn subject(&self) -> &K {
        &self.subject
    }

    pub fn state(&self) -> FeedState<T, E> {
        self.current.receiver().borrow().clone()
    }

    pub fn data(&self) -> Option<Arc<T>> {
        self.current.receiver().borrow().data.clone()
    }

    pub fn is_enabled(&self) -> bool {
        self.options.enabled
    }

    pub fn interval(&self) -> Duration {
        self.options.interval
    }

    /// Number of fetches issued by the current subscription.
    pub fn fetch_count(&self) -> u64 {
        self.current.fetch_count()
    }

    /// Enables or disables timer-driven fetching.
    ///
    /// Disabling stops the timer and discards the result of a pending fetch
    /// (the fetch itself is not cancelled). Enabling from disabled fetches
    /// immediately unless a fetch is still pending.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.options.enabled = enabled;
        self.current.set_enabled(enabled);
    }

    /// Fetches now, even while disabled. Returns `false` when coalesced into
    /// a fetch that is already pending. A fetch whose result will be discarded
    /// (pending across a disable) does not count: the new fetch starts as
    /// soon as it settles.
    pub fn refetch_now(&self) -> bool {
        self.current.refetch_now()
    }

    /// Stops the feed. Idempotent; also runs on drop.
    pub fn dispose(&self) {
        self.current.dispose();
    }

    /// Waits until the published state changes.
    ///
    /// Pends forever once the subscription is disposed.
    pub async fn changed(&mut self) {
        if self.current.receiver_mut().changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

impl<K: fmt::Debug, T, E> fmt::Debug for RefreshHandle<K, T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshHandle")
            .field("subject", &self.subject)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::{mpsc, oneshot};
    use tokio::time::Instant;

    struct Request {
        subject: String,
        reply: oneshot::Sender<Result<u32, String>>,
    }

    impl Request {
        /// Returns false when the fetch future was dropped.
        fn resolve(self, result: Result<u32, String>) -> bool {
            self.reply.send(result).is_ok()
        }
    }

    #[derive(Clone)]
    struct FetchGate {
        in_flight: Arc<AtomicUsize>,
        max_in_flight: Arc<AtomicUsize>,
        tx: mpsc::UnboundedSender<Request>,
    }

    struct Requests(mpsc::UnboundedReceiver<Request>);

    impl Requests {
        async fn next(&mut self) -> Request {
            tokio::time::timeout(Duration::from_secs(120), self.0.recv())
                .await
                .expect("no fetch issued")
                .expect("gate dropped")
        }

        fn try_next(&mut self) -> Option<Request> {
            self.0.try_recv().ok()
        }
    }

    fn fetch_gate() -> (FetchGate, Requests) {
        let (tx, rx) = mpsc::unbounded_channel();
        let gate = FetchGate {
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
            tx,
        };
        (gate, Requests(rx))
    }

    fn feed(
        gate: &FetchGate,
        subject: &str,
        options: RefreshOptions,
    ) -> RefreshHandle<String, u32, String> {
        let p = gate.clone();
        start(
            subject.to_string(),
            move |subject: String| {
                let p = p.clone();
                async move {
                    let now = p.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    p.max_in_flight.fetch_max(now, Ordering::SeqCst);
                    let (reply, rx) = oneshot::channel();
                    let _ = p.tx.send(Request { subject, reply });
                    let result = rx.await.unwrap_or_else(|_| Err("dropped".to_string()));
                    p.in_flight.fetch_sub(1, Ordering::SeqCst);
                    result
                }
            },
            options,
        )
    }

    async fn wait_until(
        handle: &mut RefreshHandle<String, u32, String>,
        pred: impl Fn(&FeedState<u32, String>) -> bool,
    ) {
        tokio::time::timeout(Duration::from_secs(120), async {
            loop {
                if pred(&handle.state()) {
                    return;
                }
                handle.changed().await;
            }
        })
        .await
        .expect("state never matched");
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    fn value(state: &FeedState<u32, String>) -> Option<u32> {
        state.data.as_deref().copied()
    }

    #[tokio::test(start_paused = true)]
    async fn first_fetch_is_immediate_and_publishes_data() {
        let (gate, mut reqs) = fetch_gate();
        let mut handle = feed(&gate, "db1", RefreshOptions::default());

        let started = Instant::now();
        let req = reqs.next().await;
        assert_eq!(req.subject, "db1");
        assert_eq!(Instant::now(), started);
        assert!(handle.state().is_loading);

        assert!(req.resolve(Ok(7)));
        wait_until(&mut handle, |s| !s.is_loading).await;
        let state = handle.state();
        assert_eq!(value(&state), Some(7));
        assert!(state.error.is_none());
        assert_eq!(handle.fetch_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_fetch_delays_next_cycle_without_overlap() {
        let (gate, mut reqs) = fetch_gate();
        let mut handle = feed(&gate, "db1", RefreshOptions::every(Duration::from_secs(5)));

        let first = reqs.next().await;
        tokio::time::sleep(Duration::from_secs(8)).await;
        first.resolve(Ok(1));
        let settled = Instant::now();
        wait_until(&mut handle, |s| value(s) == Some(1)).await;

        let second = reqs.next().await;
        let gap = Instant::now() - settled;
        assert!(gap >= Duration::from_secs(5), "gap was {gap:?}");
        assert!(gap < Duration::from_secs(6), "gap was {gap:?}");
        second.resolve(Ok(2));
        wait_until(&mut handle, |s| value(s) == Some(2)).await;

        assert_eq!(gate.max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_keeps_stale_data_and_success_clears_error() {
        let (gate, mut reqs) = fetch_gate();
        let mut handle = feed(&gate, "db1", RefreshOptions::default());

        reqs.next().await.resolve(Ok(1));
        wait_until(&mut handle, |s| value(s) == Some(1)).await;

        reqs.next().await.resolve(Err("boom".to_string()));
        wait_until(&mut handle, |s| s.error.is_some()).await;
        let state = handle.state();
        assert_eq!(value(&state), Some(1));
        assert_eq!(state.error.as_deref(), Some("boom"));
        assert!(!state.is_loading);

        // Still scheduled after a failure.
        let third = reqs.next().await;
        assert!(handle.state().is_loading);
        assert_eq!(handle.state().error.as_deref(), Some("boom"));
        third.resolve(Ok(3));
        wait_until(&mut handle, |s| value(s) == Some(3)).await;
        assert!(handle.state().error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn disable_stops_timer_and_enable_fetches_immediately() {
        let (gate, mut reqs) = fetch_gate();
        let mut handle = feed(&gate, "db1", RefreshOptions::default());

        reqs.next().await.resolve(Ok(1));
        wait_until(&mut handle, |s| value(s) == Some(1)).await;

        handle.set_enabled(false);
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(reqs.try_next().is_none());
        assert_eq!(handle.fetch_count(), 1);

        handle.set_enabled(true);
        let enabled_at = Instant::now();
        let req = reqs.next().await;
        assert_eq!(Instant::now(), enabled_at);
        req.resolve(Ok(2));
        wait_until(&mut handle, |s| value(s) == Some(2)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn disable_mid_fetch_discards_result_without_cancelling() {
        let (gate, mut reqs) = fetch_gate();
        let handle = &mut feed(&gate, "db1", RefreshOptions::default());

        let req = reqs.next().await;
        handle.set_enabled(false);
        assert!(!handle.state().is_loading);

        assert!(req.resolve(Ok(5)), "pending fetch must not be cancelled");
        settle().await;

        let state = handle.state();
        assert!(state.data.is_none());
        assert!(state.error.is_none());
        assert!(!state.is_loading);
        assert_eq!(gate.in_flight.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(reqs.try_next().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn refetch_after_pause_mid_fetch_is_issued_once_pending_settles() {
        let (gate, mut reqs) = fetch_gate();
        let mut handle = feed(&gate, "db1", RefreshOptions::default());

        let first = reqs.next().await;
        handle.set_enabled(false);
        // The pending fetch is already stale, so it cannot absorb the request.
        assert!(handle.refetch_now());
        assert!(!handle.refetch_now());
        settle().await;
        assert!(reqs.try_next().is_none());

        assert!(first.resolve(Ok(1)));
        let second = reqs.next().await;
        assert!(handle.state().data.is_none());
        second.resolve(Ok(2));
        wait_until(&mut handle, |s| value(s) == Some(2)).await;

        assert!(!handle.is_enabled());
        assert_eq!(gate.max_in_flight.load(Ordering::SeqCst), 1);
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(reqs.try_next().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn reenable_during_pending_fetch_never_overlaps() {
        let (gate, mut reqs) = fetch_gate();
        let mut handle = feed(&gate, "db1", RefreshOptions::default());

        let first = reqs.next().await;
        handle.set_enabled(false);
        handle.set_enabled(true);
        settle().await;
        assert!(reqs.try_next().is_none());
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(reqs.try_next().is_none());

        // The stale result is dropped and the next fetch follows immediately.
        assert!(first.resolve(Ok(1)));
        let settled_at = Instant::now();
        let second = reqs.next().await;
        assert_eq!(Instant::now(), settled_at);
        assert!(handle.state().data.is_none());
        second.resolve(Ok(2));
        wait_until(&mut handle, |s| value(s) == Some(2)).await;

        assert_eq!(gate.max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(handle.fetch_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn subject_switch_discards_old_subject_results() {
        let (gate, mut reqs) = fetch_gate();
        let mut handle = feed(&gate, "a", RefreshOptions::default());

        let a = reqs.next().await;
        assert_eq!(a.subject, "a");

        handle.switch_subject("b".to_string());
        assert_eq!(handle.subject(), "b");
        let state = handle.state();
        assert!(state.data.is_none());
        assert!(state.is_loading);

        let b = reqs.next().await;
        assert_eq!(b.subject, "b");
        b.resolve(Ok(2));
        wait_until(&mut handle, |s| value(s) == Some(2)).await;

        // The old fetch settles last; it must not overwrite the new subject's data.
        assert!(a.resolve(Ok(1)));
        settle().await;
        assert_eq!(value(&handle.state()), Some(2));

        // Only the new subject keeps being polled.
        let next = reqs.next().await;
        assert_eq!(next.subject, "b");
    }

    #[tokio::test(start_paused = true)]
    async fn dispose_is_idempotent_and_silences_the_feed() {
        let (gate, mut reqs) = fetch_gate();
        let handle = feed(&gate, "db1", RefreshOptions::default());

        let req = reqs.next().await;
        handle.dispose();
        handle.dispose();

        req.resolve(Ok(9));
        settle().await;
        assert!(handle.state().data.is_none());

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(reqs.try_next().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_handle_stops_polling() {
        let (gate, mut reqs) = fetch_gate();
        let handle = feed(&gate, "db1", RefreshOptions::default());
        reqs.next().await.resolve(Ok(1));
        settle().await;

        drop(handle);
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(reqs.try_next().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn refetch_now_coalesces_with_pending_fetch() {
        let (gate, mut reqs) = fetch_gate();
        let mut handle = feed(&gate, "db1", RefreshOptions::default());

        let first = reqs.next().await;
        assert!(!handle.refetch_now());
        first.resolve(Ok(1));
        wait_until(&mut handle, |s| value(s) == Some(1)).await;

        // Idle: a manual refetch runs now instead of waiting for the timer.
        let asked_at = Instant::now();
        assert!(handle.refetch_now());
        assert!(!handle.refetch_now());
        let second = reqs.next().await;
        assert_eq!(Instant::now(), asked_at);
        second.resolve(Ok(2));
        wait_until(&mut handle, |s| value(s) == Some(2)).await;

        assert_eq!(gate.max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(handle.fetch_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn starting_disabled_fetches_only_on_demand() {
        let (gate, mut reqs) = fetch_gate();
        let mut handle = feed(&gate, "db1", RefreshOptions::default().with_enabled(false));
        assert!(!handle.is_enabled());
        assert!(!handle.state().is_loading);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(reqs.try_next().is_none());

        assert!(handle.refetch_now());
        reqs.next().await.resolve(Ok(4));
        wait_until(&mut handle, |s| value(s) == Some(4)).await;

        // Manual fetch does not restart the timer.
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(reqs.try_next().is_none());
    }

    #[test]
    #[should_panic(expected = "tokio runtime")]
    fn start_outside_runtime_panics() {
        let _ = start(
            "db1".to_string(),
            |_s: String| async { Ok::<u32, String>(1) },
            RefreshOptions::default(),
        );
    }
}
