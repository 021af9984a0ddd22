//! Named one-shot / repeating timers on top of the Tokio runtime
//!
//! Each armed timer is a spawned task that waits for its interval and then
//! runs the owner-supplied async callback. Stopping a timer cancels future
//! firings; a callback that is already executing runs to completion.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{trace, warn};

/// Async callback invoked on every firing.
pub type TimerCallback = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

struct ArmedTimer {
    running: Arc<AtomicBool>,
    cancel: Arc<Notify>,
    handle: JoinHandle<()>,
}

struct Inner {
    callback: Option<TimerCallback>,
    interval: Duration,
    armed: Option<ArmedTimer>,
}

/// A named timer bound to the Tokio runtime.
///
/// The callback must be set before the first `start`; re-arming an already
/// running timer cancels the previous schedule. `interval()` keeps returning
/// the last programmed interval after the timer stopped, which is what lets
/// a heartbeat restart reuse its previous period.
pub struct Timer {
    name: &'static str,
    inner: Mutex<Inner>,
}

impl Timer {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            inner: Mutex::new(Inner {
                callback: None,
                interval: Duration::ZERO,
                armed: None,
            }),
        }
    }

    /// Install (or replace) the firing callback.
    pub fn set_callback<F>(&self, callback: F)
    where
        F: Fn() -> BoxFuture<'static, ()> + Send + Sync + 'static,
    {
        let mut inner = self.inner.lock().expect("timer lock");
        inner.callback = Some(Arc::new(callback));
    }

    /// Arm the timer. Must be called from within a Tokio runtime.
    pub fn start(&self, interval: Duration, one_shot: bool) {
        let mut inner = self.inner.lock().expect("timer lock");
        if let Some(armed) = inner.armed.take() {
            armed.running.store(false, Ordering::Release);
            armed.cancel.notify_one();
            drop(armed.handle);
        }
        inner.interval = interval;

        let Some(callback) = inner.callback.clone() else {
            warn!(timer = self.name, "Timer started without a callback");
            return;
        };

        let running = Arc::new(AtomicBool::new(true));
        let cancel = Arc::new(Notify::new());
        let handle = tokio::spawn(run_timer(
            self.name,
            interval,
            one_shot,
            callback,
            running.clone(),
            cancel.clone(),
        ));
        inner.armed = Some(ArmedTimer {
            running,
            cancel,
            handle,
        });
    }

    /// Stop and re-arm as a repeating timer with a new interval.
    pub fn restart(&self, interval: Duration) {
        self.start(interval, false);
    }

    /// Cancel future firings. A firing already in progress completes.
    pub fn stop(&self) {
        let mut inner = self.inner.lock().expect("timer lock");
        if let Some(armed) = inner.armed.take() {
            trace!(timer = self.name, "Timer stopped");
            armed.running.store(false, Ordering::Release);
            armed.cancel.notify_one();
            drop(armed.handle);
        }
    }

    /// Whether the timer is currently armed (a fired one-shot is not).
    pub fn is_started(&self) -> bool {
        let inner = self.inner.lock().expect("timer lock");
        inner
            .armed
            .as_ref()
            .map(|armed| armed.running.load(Ordering::Acquire))
            .unwrap_or(false)
    }

    /// Last programmed interval (survives `stop`).
    pub fn interval(&self) -> Duration {
        self.inner.lock().expect("timer lock").interval
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_timer(
    name: &'static str,
    interval: Duration,
    one_shot: bool,
    callback: TimerCallback,
    running: Arc<AtomicBool>,
    cancel: Arc<Notify>,
) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = cancel.notified() => break,
        }
        if !running.load(Ordering::Acquire) {
            break;
        }
        trace!(timer = name, "Timer fired");
        callback().await;
        if one_shot {
            running.store(false, Ordering::Release);
            break;
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    fn counting_timer(name: &'static str) -> (Timer, Arc<AtomicU32>) {
        let timer = Timer::new(name);
        let fired = Arc::new(AtomicU32::new(0));
        let counter = fired.clone();
        timer.set_callback(move || {
            let counter = counter.clone();
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
            })
        });
        (timer, fired)
    }

    #[tokio::test(start_paused = true)]
    async fn one_shot_fires_once() {
        let (timer, fired) = counting_timer("test");
        timer.start(Duration::from_secs(5), true);
        assert!(timer.is_started());

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!timer.is_started());
    }

    #[tokio::test(start_paused = true)]
    async fn repeating_fires_every_interval() {
        let (timer, fired) = counting_timer("test");
        timer.start(Duration::from_secs(10), false);

        tokio::time::sleep(Duration::from_secs(35)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 3);
        assert!(timer.is_started());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_prevents_firing() {
        let (timer, fired) = counting_timer("test");
        timer.start(Duration::from_secs(5), true);
        timer.stop();
        assert!(!timer.is_started());

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_replaces_schedule() {
        let (timer, fired) = counting_timer("test");
        timer.start(Duration::from_secs(5), true);
        timer.restart(Duration::from_secs(60));
        assert_eq!(timer.interval(), Duration::from_secs(60));

        // The replaced 5 s shot must not fire.
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(40)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn interval_survives_stop() {
        let (timer, _fired) = counting_timer("test");
        timer.start(Duration::from_secs(300), false);
        timer.stop();
        assert_eq!(timer.interval(), Duration::from_secs(300));
    }

    #[tokio::test(start_paused = true)]
    async fn start_without_callback_stays_idle() {
        let timer = Timer::new("test");
        timer.start(Duration::from_secs(1), true);
        assert!(!timer.is_started());
    }
}
