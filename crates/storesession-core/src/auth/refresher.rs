//! Periodic auth token renewal.
//!
//! A successful refresh arms a recurring timer that repeats the refresh
//! every `refresh_interval`. The timer handle is owned by the
//! [`TokenRefresher`]: arming always cancels the previous timer first, so at
//! most one timer is ever active. A timer that wakes up to find the
//! credentials gone (logout) disarms itself.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::api::{documents, GraphqlClient, GraphqlResponse};

use super::{AuthError, CredentialStore};

/// One refresh-token exchange. Cloned into the timer task.
#[derive(Clone)]
struct RefreshCycle {
    client: GraphqlClient,
    store: CredentialStore,
    last_refresh: Arc<Mutex<Option<DateTime<Utc>>>>,
}

impl RefreshCycle {
    async fn run(&self) -> Result<String, AuthError> {
        let refresh_token = self
            .store
            .refresh_token()?
            .ok_or(AuthError::NotAuthenticated)?;

        let auth_token = self.exchange(&refresh_token).await?;
        let session_token = self.customer_session(&auth_token).await?;

        // A logout (or a new login) while the exchange was in flight wins
        if self.store.refresh_token()?.as_deref() != Some(refresh_token.as_str()) {
            info!("Refresh token changed during refresh, discarding new tokens");
            return Err(AuthError::NotAuthenticated);
        }

        self.store.save(&auth_token, &session_token, None)?;
        *self.last_refresh.lock().unwrap_or_else(PoisonError::into_inner) = Some(Utc::now());

        info!("Auth and session tokens refreshed");
        Ok(auth_token)
    }

    async fn exchange(&self, refresh_token: &str) -> Result<String, AuthError> {
        let response = self
            .client
            .execute(&documents::refresh_auth_token(refresh_token))
            .await
            .map_err(|e| refresh_failed("Refresh token exchange failed", e))?;

        response
            .string_at("/refreshJwtAuthToken/authToken")
            .map(str::to_owned)
            .ok_or_else(|| missing_token("Failed to retrieve a new auth token", &response))
    }

    async fn customer_session(&self, auth_token: &str) -> Result<String, AuthError> {
        let operation = documents::get_customer()
            .with_bearer(auth_token)
            .map_err(|e| refresh_failed("Unusable auth token", e))?;

        let response = self
            .client
            .execute(&operation)
            .await
            .map_err(|e| refresh_failed("Customer session lookup failed", e))?;

        response
            .string_at("/customer/sessionToken")
            .map(str::to_owned)
            .ok_or_else(|| missing_token("Failed to retrieve a new session token", &response))
    }
}

fn refresh_failed(context: &str, err: impl std::fmt::Display) -> AuthError {
    warn!(error = %err, "{}", context);
    AuthError::RefreshFailed(format!("{}: {}", context, err))
}

fn missing_token(context: &str, response: &GraphqlResponse) -> AuthError {
    if response.has_errors() {
        refresh_failed(context, response.error_summary())
    } else {
        warn!("{}", context);
        AuthError::RefreshFailed(context.to_string())
    }
}

/// Handle to an armed timer task. Dropping it cancels the task.
struct RefreshTimer {
    handle: JoinHandle<()>,
    live: Arc<AtomicBool>,
    active: Arc<AtomicUsize>,
}

impl RefreshTimer {
    fn arm(cycle: RefreshCycle, period: Duration, active: Arc<AtomicUsize>) -> Self {
        let live = Arc::new(AtomicBool::new(true));
        active.fetch_add(1, Ordering::SeqCst);

        let handle = tokio::spawn(run_timer(cycle, period, live.clone(), active.clone()));

        Self {
            handle,
            live,
            active,
        }
    }

    fn is_armed(&self) -> bool {
        self.live.load(Ordering::SeqCst) && !self.handle.is_finished()
    }
}

impl Drop for RefreshTimer {
    fn drop(&mut self) {
        self.handle.abort();
        release(&self.live, &self.active);
    }
}

/// Mark a timer as gone, exactly once
fn release(live: &AtomicBool, active: &AtomicUsize) {
    if live.swap(false, Ordering::SeqCst) {
        active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Releases the timer when the task ends, however it ends
struct ReleaseOnExit {
    live: Arc<AtomicBool>,
    active: Arc<AtomicUsize>,
}

impl Drop for ReleaseOnExit {
    fn drop(&mut self) {
        release(&self.live, &self.active);
    }
}

async fn run_timer(
    cycle: RefreshCycle,
    period: Duration,
    live: Arc<AtomicBool>,
    active: Arc<AtomicUsize>,
) {
    let _release = ReleaseOnExit { live, active };

    if period.is_zero() {
        warn!("Refresh interval is zero, token refresh timer not started");
        return;
    }

    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        if !cycle.store.has_credentials() {
            info!("Credentials gone, stopping token refresh timer");
            return;
        }

        if let Err(e) = cycle.run().await {
            warn!(error = %e, "Background token refresh failed");
        }
    }
}

struct RefresherInner {
    cycle: RefreshCycle,
    period: Duration,
    timer: Mutex<Option<RefreshTimer>>,
    active_timers: Arc<AtomicUsize>,
}

/// Keeps the auth token fresh. Clone is cheap; clones share the timer.
#[derive(Clone)]
pub struct TokenRefresher {
    inner: Arc<RefresherInner>,
}

impl TokenRefresher {
    pub fn new(client: GraphqlClient, store: CredentialStore, period: Duration) -> Self {
        Self {
            inner: Arc::new(RefresherInner {
                cycle: RefreshCycle {
                    client,
                    store,
                    last_refresh: Arc::new(Mutex::new(None)),
                },
                period,
                timer: Mutex::new(None),
                active_timers: Arc::new(AtomicUsize::new(0)),
            }),
        }
    }

    /// The cached auth token while a refresh cycle is armed and the
    /// credentials are intact, otherwise a freshly refreshed one.
    pub async fn get_auth_token(&self) -> Result<String, AuthError> {
        let store = &self.inner.cycle.store;
        if self.is_armed() && store.has_credentials() {
            if let Some(token) = store.auth_token()? {
                return Ok(token);
            }
        }
        self.fetch_auth_token().await
    }

    /// Exchange the stored refresh token for new auth and session tokens,
    /// persist them, and (re)arm the recurring timer.
    ///
    /// Fails with [`AuthError::NotAuthenticated`] without any remote call when
    /// no refresh token is stored, and after the exchange when the refresh
    /// token was cleared or replaced while it was in flight.
    pub async fn fetch_auth_token(&self) -> Result<String, AuthError> {
        let token = self.inner.cycle.run().await?;
        if !self.inner.cycle.store.has_credentials() {
            return Err(AuthError::NotAuthenticated);
        }
        self.arm();
        Ok(token)
    }

    fn arm(&self) {
        let mut slot = self.inner.timer.lock().unwrap_or_else(PoisonError::into_inner);
        // Cancel before arming so two timers never coexist
        drop(slot.take());
        *slot = Some(RefreshTimer::arm(
            self.inner.cycle.clone(),
            self.inner.period,
            self.inner.active_timers.clone(),
        ));
        debug!(interval_ms = self.inner.period.as_millis() as u64, "Token refresh timer armed");
    }

    /// Cancel the recurring timer, if any
    pub fn disarm(&self) {
        let timer = self
            .inner
            .timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if timer.is_some() {
            debug!("Token refresh timer disarmed");
        }
    }

    pub fn is_armed(&self) -> bool {
        self.inner
            .timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(RefreshTimer::is_armed)
    }

    /// Number of timer tasks currently alive
    pub fn active_timers(&self) -> usize {
        self.inner.active_timers.load(Ordering::SeqCst)
    }

    pub fn refresh_interval(&self) -> Duration {
        self.inner.period
    }

    /// When the last successful refresh completed
    pub fn last_refresh(&self) -> Option<DateTime<Utc>> {
        *self
            .inner
            .cycle
            .last_refresh
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
