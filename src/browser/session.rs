use crate::browser::chrome;
use crate::config::KioskConfig;
use crate::errors::{KioskError, Result};
use async_trait::async_trait;
use headless_chrome::Browser;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{info, warn};
use uuid::Uuid;

const LIVENESS_INTERVAL: Duration = Duration::from_secs(2);

/// The seam between the control endpoint and the browser session. The HTTP
/// layer only ever sees this trait; tests substitute a recording double.
#[async_trait]
pub trait Navigator: Send + Sync {
    /// Direct the kiosk display to `url`.
    async fn navigate(&self, url: &str) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Launching,
    Running,
    Terminating,
    Terminated,
}

type DriveFn = dyn Fn(&str) -> Result<()> + Send + Sync;

struct SessionInner {
    /// Issues a blocking navigate-and-wait against the kiosk tab.
    drive: Arc<DriveFn>,
    /// Dropping the browser kills the Chrome child; `None` once torn down.
    browser: StdMutex<Option<Browser>>,
    /// Serializes navigations: at most one in flight, waiters in lock order.
    nav_lock: Mutex<()>,
    state: watch::Sender<SessionState>,
    navigation_timeout: Duration,
    /// Bumped by every navigate; a timed-out task that lost the race checks
    /// this before touching the tab.
    nav_epoch: AtomicU64,
    shutting_down: AtomicBool,
}

impl SessionInner {
    /// Runs on the blocking pool. A task whose caller timed out may still be
    /// queued when a newer navigation takes over; it must not reach the
    /// browser once superseded.
    fn issue(&self, epoch: u64, url: &str) -> Result<()> {
        if self.nav_epoch.load(Ordering::SeqCst) != epoch {
            return Err(KioskError::Navigation(
                "superseded by a newer navigation".to_string(),
            ));
        }
        (self.drive)(url)
    }
}

/// The single browser session owned by this process.
///
/// Created once at startup, shared by the startup navigation, every
/// HTTP-triggered navigation, and the shutdown path. Navigations are
/// serialized internally; teardown runs at most once, whether triggered by a
/// process signal or by the browser ending on its own (window closed by a
/// user, Chrome crash).
pub struct KioskSession {
    id: Uuid,
    inner: Arc<SessionInner>,
}

impl KioskSession {
    /// Launch Chrome with the fixed kiosk flag set. Failure here is fatal:
    /// the process must not serve requests without a working session.
    pub async fn launch(config: &KioskConfig) -> Result<Self> {
        let id = Uuid::new_v4();
        let (state, _) = watch::channel(SessionState::Launching);
        info!(session = %id, proxy = config.proxy_server.is_some(), "launching browser session");

        let launch_config = config.clone();
        let (browser, tab) = task::spawn_blocking(move || chrome::launch_browser(&launch_config))
            .await
            .map_err(|e| KioskError::Launch(e.to_string()))??;

        let drive: Arc<DriveFn> = Arc::new({
            let tab = tab.clone();
            move |url: &str| {
                tab.navigate_to(url)
                    .map_err(|e| KioskError::Navigation(e.to_string()))?;
                tab.wait_until_navigated()
                    .map_err(|e| KioskError::Navigation(e.to_string()))?;
                Ok(())
            }
        });

        let inner = Arc::new(SessionInner {
            drive,
            browser: StdMutex::new(Some(browser)),
            nav_lock: Mutex::new(()),
            state,
            navigation_timeout: config.navigation_timeout,
            nav_epoch: AtomicU64::new(0),
            shutting_down: AtomicBool::new(false),
        });
        inner.state.send_replace(SessionState::Running);

        // The probe is any cheap CDP round trip; it fails once the browser
        // connection is gone.
        let probe: Arc<dyn Fn() -> bool + Send + Sync> =
            Arc::new(move || tab.get_bounds().is_ok());
        spawn_liveness_watcher(id, inner.clone(), probe, LIVENESS_INTERVAL);

        info!(session = %id, "browser session running");
        Ok(Self { id, inner })
    }

    pub fn state(&self) -> SessionState {
        *self.inner.state.borrow()
    }

    /// Tear the session down. Idempotent: only the first caller acts.
    pub fn shutdown(&self) {
        if self.inner.shutting_down.swap(true, Ordering::SeqCst) {
            return;
        }
        info!(session = %self.id, "shutting down browser session");
        self.inner.state.send_replace(SessionState::Terminating);
        if let Ok(mut slot) = self.inner.browser.lock() {
            slot.take();
        }
        self.inner.state.send_replace(SessionState::Terminated);
    }

    /// Resolves once the session has terminated, whether through `shutdown`
    /// or through the browser ending externally.
    pub async fn closed(&self) {
        let mut rx = self.inner.state.subscribe();
        while *rx.borrow_and_update() != SessionState::Terminated {
            if rx.changed().await.is_err() {
                break;
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn detached(drive: Arc<DriveFn>, navigation_timeout: Duration) -> Self {
        let (state, _) = watch::channel(SessionState::Running);
        Self {
            id: Uuid::new_v4(),
            inner: Arc::new(SessionInner {
                drive,
                browser: StdMutex::new(None),
                nav_lock: Mutex::new(()),
                state,
                navigation_timeout,
                nav_epoch: AtomicU64::new(0),
                shutting_down: AtomicBool::new(false),
            }),
        }
    }
}

#[async_trait]
impl Navigator for KioskSession {
    async fn navigate(&self, url: &str) -> Result<()> {
        let _guard = self.inner.nav_lock.lock().await;
        if *self.inner.state.borrow() != SessionState::Running {
            return Err(KioskError::SessionClosed);
        }

        info!(session = %self.id, url, "navigating");
        let epoch = self.inner.nav_epoch.fetch_add(1, Ordering::SeqCst) + 1;
        let inner = self.inner.clone();
        let target = url.to_string();
        let nav = task::spawn_blocking(move || inner.issue(epoch, &target));

        let outcome = match timeout(self.inner.navigation_timeout, nav).await {
            Err(_) => Err(KioskError::NavigationTimeout),
            Ok(Err(join_err)) => Err(KioskError::Navigation(join_err.to_string())),
            Ok(Ok(result)) => result,
        };

        match &outcome {
            Ok(()) => info!(session = %self.id, url, "navigation complete"),
            Err(err) => warn!(session = %self.id, url, %err, "navigation failed"),
        }
        outcome
    }
}

/// Watches the browser connection and marks the session terminated when the
/// browser goes away on its own. Converges on the same terminal state as an
/// explicit shutdown, so `closed()` waiters wake either way.
fn spawn_liveness_watcher(
    id: Uuid,
    inner: Arc<SessionInner>,
    probe: Arc<dyn Fn() -> bool + Send + Sync>,
    period: Duration,
) {
    tokio::spawn(async move {
        let mut tick = interval(period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tick.tick().await;
            if *inner.state.borrow() != SessionState::Running {
                break;
            }
            let probe = probe.clone();
            let alive = task::spawn_blocking(move || probe()).await.unwrap_or(false);
            if !alive {
                // Shutdown may have won the race in the meantime.
                if *inner.state.borrow() == SessionState::Running {
                    warn!(session = %id, "browser session ended externally");
                    if let Ok(mut slot) = inner.browser.lock() {
                        slot.take();
                    }
                    inner.state.send_replace(SessionState::Terminated);
                }
                break;
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting_session(calls: Arc<AtomicUsize>) -> KioskSession {
        KioskSession::detached(
            Arc::new(move |_url: &str| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn navigate_drives_the_session() {
        let calls = Arc::new(AtomicUsize::new(0));
        let session = counting_session(calls.clone());

        session.navigate("https://example.com").await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(session.state(), SessionState::Running);
    }

    #[tokio::test]
    async fn navigate_after_shutdown_is_rejected() {
        let calls = Arc::new(AtomicUsize::new(0));
        let session = counting_session(calls.clone());

        session.shutdown();
        let err = session.navigate("https://example.com").await.unwrap_err();
        assert!(matches!(err, KioskError::SessionClosed));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(session.state(), SessionState::Terminated);
    }

    #[tokio::test]
    async fn shutdown_is_idempotent_and_wakes_closed_waiters() {
        let session = Arc::new(counting_session(Arc::new(AtomicUsize::new(0))));

        let waiter = {
            let session = session.clone();
            tokio::spawn(async move { session.closed().await })
        };

        session.shutdown();
        session.shutdown();
        waiter.await.unwrap();
        assert_eq!(session.state(), SessionState::Terminated);
    }

    #[tokio::test]
    async fn navigate_is_rejected_before_running() {
        let (state, _) = watch::channel(SessionState::Launching);
        let calls = Arc::new(AtomicUsize::new(0));
        let session = KioskSession {
            id: Uuid::new_v4(),
            inner: Arc::new(SessionInner {
                drive: Arc::new({
                    let calls = calls.clone();
                    move |_url: &str| {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }
                }),
                browser: StdMutex::new(None),
                nav_lock: Mutex::new(()),
                state,
                navigation_timeout: Duration::from_secs(5),
                nav_epoch: AtomicU64::new(0),
                shutting_down: AtomicBool::new(false),
            }),
        };

        assert_eq!(session.state(), SessionState::Launching);
        let err = session.navigate("https://example.com").await.unwrap_err();
        assert!(matches!(err, KioskError::SessionClosed));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn external_browser_death_terminates_the_session() {
        let session = Arc::new(counting_session(Arc::new(AtomicUsize::new(0))));
        let alive = Arc::new(AtomicBool::new(true));
        let probe: Arc<dyn Fn() -> bool + Send + Sync> = Arc::new({
            let alive = alive.clone();
            move || alive.load(Ordering::SeqCst)
        });
        spawn_liveness_watcher(
            session.id,
            session.inner.clone(),
            probe,
            Duration::from_millis(10),
        );

        // While the probe answers, the session stays up.
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(session.state(), SessionState::Running);

        // Browser window goes away; no shutdown() is ever called.
        alive.store(false, Ordering::SeqCst);
        timeout(Duration::from_secs(2), session.closed())
            .await
            .expect("closed() should wake after the browser dies");
        assert_eq!(session.state(), SessionState::Terminated);

        let err = session.navigate("https://example.com").await.unwrap_err();
        assert!(matches!(err, KioskError::SessionClosed));
    }

    #[tokio::test]
    async fn superseded_navigation_never_reaches_the_browser() {
        let calls = Arc::new(AtomicUsize::new(0));
        let session = counting_session(calls.clone());

        // Claim an epoch the way navigate() does, then let a newer
        // navigation take over before the blocking task runs.
        let stale = session.inner.nav_epoch.fetch_add(1, Ordering::SeqCst) + 1;
        session.inner.nav_epoch.fetch_add(1, Ordering::SeqCst);

        let err = session
            .inner
            .issue(stale, "https://example.com/stale")
            .unwrap_err();
        assert!(matches!(err, KioskError::Navigation(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        // A current-epoch navigation still goes through.
        session.navigate("https://example.com/live").await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn timeout_does_not_block_later_navigations() {
        let issued = Arc::new(Mutex::new(Vec::new()));
        let session = KioskSession::detached(
            Arc::new({
                let issued = issued.clone();
                move |url: &str| {
                    if url.contains("slow") {
                        std::thread::sleep(Duration::from_millis(100));
                    }
                    issued.blocking_lock().push(url.to_string());
                    Ok(())
                }
            }),
            Duration::from_millis(20),
        );

        let err = session.navigate("https://example.com/slow").await.unwrap_err();
        assert!(matches!(err, KioskError::NavigationTimeout));

        session.navigate("https://example.com/next").await.unwrap();
        assert!(issued.lock().await.contains(&"https://example.com/next".to_string()));
    }

    #[tokio::test]
    async fn slow_navigation_times_out() {
        let session = KioskSession::detached(
            Arc::new(|_url: &str| {
                std::thread::sleep(Duration::from_millis(200));
                Ok(())
            }),
            Duration::from_millis(20),
        );

        let err = session.navigate("https://example.com").await.unwrap_err();
        assert!(matches!(err, KioskError::NavigationTimeout));
    }

    #[tokio::test]
    async fn driver_failure_is_returned_not_fatal() {
        let session = KioskSession::detached(
            Arc::new(|_url: &str| Err(KioskError::Navigation("net::ERR_FAILED".into()))),
            Duration::from_secs(5),
        );

        let err = session.navigate("https://example.com").await.unwrap_err();
        assert!(matches!(err, KioskError::Navigation(_)));
        // The session survives a failed navigation.
        assert_eq!(session.state(), SessionState::Running);
    }

    #[tokio::test]
    async fn concurrent_navigations_are_serialized() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let overlapped = Arc::new(AtomicBool::new(false));

        let session = Arc::new(KioskSession::detached(
            Arc::new({
                let in_flight = in_flight.clone();
                let overlapped = overlapped.clone();
                move |_url: &str| {
                    if in_flight.fetch_add(1, Ordering::SeqCst) > 0 {
                        overlapped.store(true, Ordering::SeqCst);
                    }
                    std::thread::sleep(Duration::from_millis(10));
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                }
            }),
            Duration::from_secs(5),
        ));

        let mut handles = Vec::new();
        for i in 0..8 {
            let session = session.clone();
            handles.push(tokio::spawn(async move {
                session.navigate(&format!("https://example.com/{i}")).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert!(!overlapped.load(Ordering::SeqCst), "navigations overlapped");
    }
}
