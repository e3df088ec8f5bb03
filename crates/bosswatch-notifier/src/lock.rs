//! Send-lock transitions over the settings document.
//!
//! The functions here are pure: each takes the committed settings and
//! returns the patch to write (if any). Binding them to an atomic
//! read-modify-write of the store is what turns them into a cross-client
//! compare-and-swap.

use bosswatch_core::clock::ManilaTime;
use bosswatch_core::{NotifierSettings, ScheduleLock, SettingsPatch};
use chrono::Duration;

/// Result of an acquisition attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Acquire {
    /// The watermark already records this occurrence.
    AlreadySent,
    /// Another owner holds an unexpired lock for this occurrence.
    Held { owner_token: String, expires_at: ManilaTime },
    /// The lock is ours until `lock.expires_at`.
    Granted(ScheduleLock),
}

impl Acquire {
    /// The write that records a granted lock.
    pub fn patch(&self) -> Option<SettingsPatch> {
        match self {
            Acquire::Granted(lock) => Some(SettingsPatch {
                send_lock: Some(Some(lock.clone())),
                ..SettingsPatch::default()
            }),
            _ => None,
        }
    }

    pub fn is_granted(&self) -> bool {
        matches!(self, Acquire::Granted(_))
    }
}

/// Decide whether `owner_token` may take the lock for `schedule_key`.
///
/// A lock for a different schedule key, or one whose expiry is at or before
/// `now`, does not block acquisition.
pub fn try_acquire(
    settings: &NotifierSettings,
    schedule_key: &str,
    owner_token: &str,
    now: &ManilaTime,
    ttl: Duration,
) -> Acquire {
    if settings.last_notified_schedule_key == schedule_key {
        return Acquire::AlreadySent;
    }
    if let Some(lock) = &settings.send_lock {
        if lock.schedule_key == schedule_key && lock.expires_at > *now {
            return Acquire::Held {
                owner_token: lock.owner_token.clone(),
                expires_at: lock.expires_at,
            };
        }
    }
    Acquire::Granted(ScheduleLock {
        schedule_key: schedule_key.to_string(),
        owner_token: owner_token.to_string(),
        expires_at: *now + ttl,
    })
}

fn holds(settings: &NotifierSettings, schedule_key: &str, owner_token: &str) -> bool {
    settings
        .send_lock
        .as_ref()
        .is_some_and(|lock| lock.schedule_key == schedule_key && lock.owner_token == owner_token)
}

/// Clear the lock, but only if it is still the one we acquired.
pub fn release(
    settings: &NotifierSettings,
    schedule_key: &str,
    owner_token: &str,
) -> Option<SettingsPatch> {
    holds(settings, schedule_key, owner_token).then(|| SettingsPatch {
        send_lock: Some(None),
        ..SettingsPatch::default()
    })
}

/// Advance the watermark to `schedule_key` and clear the lock, but only if
/// the lock is still ours.
pub fn finalize(
    settings: &NotifierSettings,
    schedule_key: &str,
    owner_token: &str,
    today_key: &str,
) -> Option<SettingsPatch> {
    holds(settings, schedule_key, owner_token).then(|| SettingsPatch {
        last_notified_schedule_key: Some(schedule_key.to_string()),
        last_notified_date: Some(today_key.to_string()),
        send_lock: Some(None),
        ..SettingsPatch::default()
    })
}
