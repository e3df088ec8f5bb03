use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bosswatch_core::clock::{self, Clock, ManilaTime};
use bosswatch_core::config::NotifierConfig;
use bosswatch_core::{Boss, NotifierSettings};
use bosswatch_store::DocumentStore;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::lock::{self, Acquire};
use crate::message::compose_schedule_message;
use crate::trigger::{due_schedule_key, selected_bosses, Skip};
use crate::webhook::{deliver, WebhookTransport};

/// Shortest poll period; `tokio::time::interval` rejects zero.
const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);
/// Upper bound for the cooldown and lock expiry so deadlines stay in range.
const MAX_DEADLINE: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Timing knobs of the notifier loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotifierOptions {
    pub poll_interval: Duration,
    pub retry_cooldown: Duration,
    pub lock_ttl: Duration,
}

impl NotifierOptions {
    /// Pull every knob into the range the loop can run with.
    pub fn clamped(self) -> Self {
        Self {
            poll_interval: self.poll_interval.clamp(MIN_POLL_INTERVAL, MAX_DEADLINE),
            retry_cooldown: self.retry_cooldown.min(MAX_DEADLINE),
            lock_ttl: self.lock_ttl.min(MAX_DEADLINE),
        }
    }
}

impl From<&NotifierConfig> for NotifierOptions {
    fn from(cfg: &NotifierConfig) -> Self {
        Self {
            poll_interval: Duration::from_secs(cfg.poll_interval_secs),
            retry_cooldown: Duration::from_secs(cfg.retry_cooldown_secs),
            lock_ttl: Duration::from_secs(cfg.lock_ttl_secs),
        }
        .clamped()
    }
}

impl Default for NotifierOptions {
    fn default() -> Self {
        Self::from(&NotifierConfig::default())
    }
}

/// What one poll of the notifier did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// A previous tick is still running.
    InFlight,
    /// A failed delivery put this process on cooldown.
    CoolingDown { until: ManilaTime },
    Skipped(Skip),
    /// Another client delivered or is delivering this occurrence, or the
    /// lock transaction itself failed.
    LockDenied { schedule_key: String },
    Sent { schedule_key: String },
    Failed { schedule_key: String },
}

struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Posts the selected bosses' schedule to the configured webhook once per
/// day, at most once across every client sharing the store.
///
/// Clients coordinate only through the send lock in the settings document;
/// the retry cooldown and in-flight flag are local to this instance.
pub struct DailyNotifier {
    store: Arc<dyn DocumentStore>,
    transport: Arc<dyn WebhookTransport>,
    clock: Arc<dyn Clock>,
    bosses: watch::Receiver<Vec<Boss>>,
    settings: watch::Receiver<NotifierSettings>,
    /// Caller-supplied gate, e.g. "an operator is present".
    enabled: watch::Receiver<bool>,
    options: NotifierOptions,
    retry_after: Mutex<Option<ManilaTime>>,
    in_flight: AtomicBool,
}

impl DailyNotifier {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        transport: Arc<dyn WebhookTransport>,
        clock: Arc<dyn Clock>,
        enabled: watch::Receiver<bool>,
        options: NotifierOptions,
    ) -> Self {
        let bosses = store.subscribe_bosses();
        let settings = store.subscribe_settings();
        Self {
            store,
            transport,
            clock,
            bosses,
            settings,
            enabled,
            options: options.clamped(),
            retry_after: Mutex::new(None),
            in_flight: AtomicBool::new(false),
        }
    }

    fn cooldown_until(&self) -> Option<ManilaTime> {
        *self.retry_after.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn start_cooldown(&self, now: &ManilaTime) -> ManilaTime {
        let until = *now + chrono_duration(self.options.retry_cooldown);
        *self.retry_after.lock().unwrap_or_else(|e| e.into_inner()) = Some(until);
        until
    }

    /// Evaluate the trigger once and, if due, run the lock/send/finalize
    /// cycle.
    pub async fn tick(&self) -> TickOutcome {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            return TickOutcome::InFlight;
        }
        let _guard = InFlightGuard(&self.in_flight);

        let now = self.clock.now();
        if let Some(until) = self.cooldown_until().filter(|until| *until > now) {
            return TickOutcome::CoolingDown { until };
        }

        let enabled = *self.enabled.borrow();
        let settings = self.settings.borrow().clone();
        let selected = selected_bosses(&settings, &self.bosses.borrow());

        let schedule_key = match due_schedule_key(enabled, &settings, &selected, &now) {
            Ok(key) => key,
            Err(skip) => return TickOutcome::Skipped(skip),
        };
        let today = clock::today_key(&now);

        let owner_token = match self.acquire(&schedule_key).await {
            Ok(Acquire::Granted(lock)) => lock.owner_token,
            Ok(Acquire::AlreadySent) => {
                debug!(schedule_key = %schedule_key, "occurrence already delivered elsewhere");
                return TickOutcome::LockDenied { schedule_key };
            }
            Ok(Acquire::Held { expires_at, .. }) => {
                debug!(
                    schedule_key = %schedule_key,
                    expires_at = %clock::iso_string(&expires_at),
                    "send lock held by another client"
                );
                return TickOutcome::LockDenied { schedule_key };
            }
            Err(e) => {
                warn!(schedule_key = %schedule_key, "send lock transaction failed: {e}");
                return TickOutcome::LockDenied { schedule_key };
            }
        };

        let content = compose_schedule_message(&selected, &today, &now);
        let sent = match deliver(self.transport.as_ref(), &settings.webhook_url, &content).await {
            Ok(()) => self.finalize(&schedule_key, &owner_token, &today).await,
            Err(e) => Err(e.into()),
        };

        match sent {
            Ok(finalized) => {
                if !finalized {
                    warn!(schedule_key = %schedule_key, "send lock lost before finalize");
                }
                info!(
                    schedule_key = %schedule_key,
                    bosses = selected.len(),
                    "daily schedule delivered"
                );
                TickOutcome::Sent { schedule_key }
            }
            Err(e) => {
                error!(schedule_key = %schedule_key, "daily schedule notification failed: {e}");
                if let Err(e) = self.release(&schedule_key, &owner_token).await {
                    error!(schedule_key = %schedule_key, "failed to release send lock: {e}");
                }
                let until = self.start_cooldown(&now);
                info!(retry_after = %clock::iso_string(&until), "notifier cooling down");
                TickOutcome::Failed { schedule_key }
            }
        }
    }

    /// Atomically try to take the send lock for `schedule_key`.
    async fn acquire(&self, schedule_key: &str) -> Result<Acquire> {
        let store = Arc::clone(&self.store);
        let clock = Arc::clone(&self.clock);
        let ttl = chrono_duration(self.options.lock_ttl);
        let schedule_key = schedule_key.to_string();
        let owner_token = Uuid::new_v4().to_string();

        let outcome = tokio::task::spawn_blocking(move || {
            let mut outcome = Acquire::AlreadySent;
            store.transact_settings(&mut |current: &NotifierSettings| {
                outcome = lock::try_acquire(current, &schedule_key, &owner_token, &clock.now(), ttl);
                outcome.patch()
            })?;
            Ok::<_, bosswatch_store::StoreError>(outcome)
        })
        .await??;
        Ok(outcome)
    }

    /// Advance the watermark if the lock is still ours. Returns whether it was.
    async fn finalize(&self, schedule_key: &str, owner_token: &str, today: &str) -> Result<bool> {
        let store = Arc::clone(&self.store);
        let (schedule_key, owner_token, today) =
            (schedule_key.to_string(), owner_token.to_string(), today.to_string());

        let written = tokio::task::spawn_blocking(move || {
            store.transact_settings(&mut |current: &NotifierSettings| {
                lock::finalize(current, &schedule_key, &owner_token, &today)
            })
        })
        .await??;
        Ok(written)
    }

    async fn release(&self, schedule_key: &str, owner_token: &str) -> Result<bool> {
        let store = Arc::clone(&self.store);
        let (schedule_key, owner_token) = (schedule_key.to_string(), owner_token.to_string());

        let written = tokio::task::spawn_blocking(move || {
            store.transact_settings(&mut |current: &NotifierSettings| {
                lock::release(current, &schedule_key, &owner_token)
            })
        })
        .await??;
        Ok(written)
    }

    /// Main loop. Polls every `poll_interval` until `shutdown` broadcasts `true`.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            poll_secs = self.options.poll_interval.as_secs(),
            "daily notifier started"
        );

        let mut interval = tokio::time::interval(self.options.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.tick().await {
                        TickOutcome::Skipped(skip) => debug!(reason = %skip, "notifier idle"),
                        TickOutcome::CoolingDown { until } => {
                            debug!(until = %clock::iso_string(&until), "notifier on cooldown");
                        }
                        _ => {}
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("daily notifier shutting down");
                        break;
                    }
                }
            }
        }
    }
}

fn chrono_duration(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d.min(MAX_DEADLINE)).unwrap_or(chrono::Duration::zero())
}
