//! One subscription: a spawned task that owns the timer for a single subject.
//!
//! The task fetches, waits for the fetch to settle, applies the result, and only
//! then arms the next timer. A settled result is applied under the control lock,
//! so a concurrent disable or dispose either happens strictly before (result
//! discarded) or strictly after (result visible) the application.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::{Notify, watch};
use tokio::time::Instant;
use tracing::{debug, warn};

use super::{FeedState, FetchFn, RefreshOptions};

/// Mutable scheduling flags, owned by the subscription.
#[derive(Debug, Default)]
struct Control {
    enabled: bool,
    disposed: bool,
    in_flight: bool,
    /// Epoch the in-flight fetch was issued under.
    in_flight_epoch: u64,
    /// Fetch requested ahead of the timer (initial fetch, manual refetch, re-enable).
    kick: bool,
    /// Bumped on disable and dispose. A fetch issued under an older epoch is discarded.
    epoch: u64,
}

pub(crate) struct Shared<T, E> {
    control: Mutex<Control>,
    wake: Notify,
    state_tx: watch::Sender<FeedState<T, E>>,
    fetches: AtomicU64,
}

impl<T, E> Shared<T, E> {
    fn control(&self) -> MutexGuard<'_, Control> {
        // Control holds plain flags; a poisoned lock still has consistent values.
        self.control.lock().unwrap_or_else(|e| e.into_inner())
    }
}

pub(crate) struct Subscription<T, E> {
    shared: Arc<Shared<T, E>>,
    state_rx: watch::Receiver<FeedState<T, E>>,
}

impl<T, E> Subscription<T, E>
where
    T: Send + Sync + 'static,
    E: Clone + fmt::Display + Send + Sync + 'static,
{
    /// Spawns the subscription task on the current tokio runtime.
    ///
    /// # Panics
    /// Panics when called outside a tokio runtime.
    pub(crate) fn spawn<K>(subject: K, fetch: FetchFn<K, T, E>, options: RefreshOptions) -> Self
    where
        K: Clone + fmt::Debug + Send + Sync + 'static,
    {
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => panic!("refresh::start must be called from within a tokio runtime"),
        };

        let (state_tx, state_rx) = watch::channel(FeedState {
            data: None,
            error: None,
            is_loading: options.enabled,
        });
        let shared = Arc::new(Shared {
            control: Mutex::new(Control {
                enabled: options.enabled,
                kick: options.enabled,
                ..Control::default()
            }),
            wake: Notify::new(),
            state_tx,
            fetches: AtomicU64::new(0),
        });

        runtime.spawn(run(subject, fetch, options.interval, shared.clone()));

        Self { shared, state_rx }
    }
}

impl<T, E> Subscription<T, E> {
    pub(crate) fn receiver(&self) -> &watch::Receiver<FeedState<T, E>> {
        &self.state_rx
    }

    pub(crate) fn receiver_mut(&mut self) -> &mut watch::Receiver<FeedState<T, E>> {
        &mut self.state_rx
    }

    pub(crate) fn fetch_count(&self) -> u64 {
        self.shared.fetches.load(Ordering::Relaxed)
    }

    pub(crate) fn set_enabled(&self, enabled: bool) {
        let mut c = self.shared.control();
        if c.disposed || c.enabled == enabled {
            return;
        }
        c.enabled = enabled;
        if enabled {
            // A pending fetch re-arms on its own once it settles.
            if !c.in_flight {
                c.kick = true;
            }
        } else {
            c.kick = false;
            c.epoch += 1;
            if c.in_flight {
                self.shared.state_tx.send_modify(|s| s.is_loading = false);
            }
        }
        drop(c);
        self.shared.wake.notify_one();
    }

    /// Requests an immediate fetch. Returns `false` when coalesced into a
    /// fetch that is already pending or requested.
    ///
    /// A fetch left pending by a disable will be discarded, so it does not
    /// absorb the request: the new fetch is issued once it settles.
    pub(crate) fn refetch_now(&self) -> bool {
        let mut c = self.shared.control();
        let live_fetch = c.in_flight && c.in_flight_epoch == c.epoch;
        if c.disposed || live_fetch || c.kick {
            return false;
        }
        c.kick = true;
        drop(c);
        self.shared.wake.notify_one();
        true
    }

    pub(crate) fn dispose(&self) {
        let mut c = self.shared.control();
        if c.disposed {
            return;
        }
        c.disposed = true;
        c.kick = false;
        c.epoch += 1;
        drop(c);
        self.shared.wake.notify_one();
    }
}

impl<T, E> Drop for Subscription<T, E> {
    fn drop(&mut self) {
        self.dispose();
    }
}

async fn run<K, T, E>(
    subject: K,
    fetch: FetchFn<K, T, E>,
    interval: Duration,
    shared: Arc<Shared<T, E>>,
) where
    K: Clone + fmt::Debug + Send + Sync + 'static,
    T: Send + Sync + 'static,
    E: Clone + fmt::Display + Send + Sync + 'static,
{
    let mut due: Option<Instant> = None;

    loop {
        // Idle / Disabled: wait for the timer, a kick, or a control change.
        let epoch = loop {
            {
                let mut c = shared.control();
                if c.disposed {
                    return;
                }
                let timer_fired = c.enabled && due.is_some_and(|d| Instant::now() >= d);
                if c.kick || timer_fired {
                    c.kick = false;
                    c.in_flight = true;
                    c.in_flight_epoch = c.epoch;
                    shared.state_tx.send_modify(|s| s.is_loading = true);
                    break c.epoch;
                }
                if !c.enabled {
                    due = None;
                }
            }
            match due {
                Some(deadline) => {
                    tokio::select! {
                        _ = tokio::time::sleep_until(deadline) => {}
                        _ = shared.wake.notified() => {}
                    }
                }
                None => shared.wake.notified().await,
            }
        };

        // Pending: the only suspension point that awaits the backend.
        let n = shared.fetches.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(subject = ?subject, fetch = n, "refresh fetch started");
        let started = Instant::now();
        let result = fetch(subject.clone()).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        // Settled: apply or discard.
        {
            let mut c = shared.control();
            c.in_flight = false;
            if c.disposed {
                debug!(subject = ?subject, duration_ms, "subscription disposed, result discarded");
                return;
            }
            if c.epoch != epoch {
                debug!(subject = ?subject, duration_ms, "refresh disabled mid-fetch, result discarded");
                // Re-enabled or manually requested while pending: fetch again now.
                if c.enabled {
                    c.kick = true;
                }
                due = None;
                continue;
            }
            match result {
                Ok(value) => {
                    debug!(subject = ?subject, duration_ms, "refresh fetch succeeded");
                    shared.state_tx.send_modify(|s| {
                        s.data = Some(Arc::new(value));
                        s.error = None;
                        s.is_loading = false;
                    });
                }
                Err(e) => {
                    warn!(subject = ?subject, duration_ms, error = %e, "refresh fetch failed");
                    shared.state_tx.send_modify(|s| {
                        s.error = Some(e);
                        s.is_loading = false;
                    });
                }
            }
        }

        // Trailing re-arm: the period starts after the fetch settled.
        due = Some(Instant::now() + interval);
    }
}
