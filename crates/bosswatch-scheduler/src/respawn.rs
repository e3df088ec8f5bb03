//! Respawn resolution: the next respawn instant of a boss and its
//! time-derived display status.
//!
//! Everything here is a pure function of the boss record and `now`. The only
//! component that turns a derived `Alive` into a stored one is the promoter.

use std::cmp::Ordering;

use bosswatch_core::clock::{self, ManilaTime};
use bosswatch_core::{Boss, DisplayStatus, PersistedStatus, ScheduledSpawn, SpawnRule};
use chrono::Duration;

use crate::occurrence::{parse_weekday, soonest_occurrence};

/// Lead time before a respawn during which a dead boss shows as respawning.
pub const RESPAWNING_WINDOW_SECS: i64 = 10 * 60;

fn respawning_window() -> Duration {
    Duration::seconds(RESPAWNING_WINDOW_SECS)
}

/// When `boss` next becomes available, if that can be computed.
///
/// - `Unknown` status never has a next respawn.
/// - Fixed spawns: kill time plus the interval. `None` without a readable
///   kill time or interval.
/// - Scheduled spawns: the soonest occurrence after the kill time when the
///   boss is dead, otherwise after `now`. A dead boss with no readable kill
///   time also falls back to `now`.
pub fn next_respawn(boss: &Boss, now: &ManilaTime) -> Option<ManilaTime> {
    if boss.status == PersistedStatus::Unknown {
        return None;
    }

    match &boss.spawn {
        SpawnRule::Fixed { interval_hours } => {
            let hours = (*interval_hours)?;
            let killed = boss.killed_instant()?;
            let millis = (hours * 3_600_000.0).round();
            if !(0.0..=i64::MAX as f64).contains(&millis) {
                return None;
            }
            let offset = Duration::try_milliseconds(millis as i64)?;
            // Out-of-range instants read as "no respawn" for this boss only.
            killed.checked_add_signed(offset)
        }
        SpawnRule::Scheduled(_) => {
            let reference = match boss.status {
                PersistedStatus::Dead => boss.killed_instant().unwrap_or(*now),
                _ => *now,
            };
            soonest_occurrence(&boss.spawn, &reference)
        }
    }
}

/// Derive what the boss looks like at `now`.
pub fn display_status(boss: &Boss, now: &ManilaTime) -> DisplayStatus {
    match boss.status {
        PersistedStatus::Unknown => DisplayStatus::Unknown,
        PersistedStatus::Alive => DisplayStatus::Alive,
        PersistedStatus::Dead => {
            let Some(next) = next_respawn(boss, now) else {
                return DisplayStatus::Dead;
            };
            let gap = next - *now;
            if gap <= Duration::zero() {
                // Stored record is stale; the respawn point has passed.
                DisplayStatus::Alive
            } else if gap <= respawning_window() {
                DisplayStatus::Respawning
            } else {
                DisplayStatus::Dead
            }
        }
    }
}

/// Ascending next respawn (uncomputable last), then ascending level.
pub fn compare_for_display(a: &Boss, b: &Boss, now: &ManilaTime) -> Ordering {
    compare_respawn(next_respawn(a, now), next_respawn(b, now)).then(a.level.cmp(&b.level))
}

/// Order two optional respawn instants, `None` last.
pub fn compare_respawn(a: Option<ManilaTime>, b: Option<ManilaTime>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Sort bosses in display order. The next respawn of each boss is computed
/// once.
pub fn sort_for_display(bosses: &mut [Boss], now: &ManilaTime) {
    bosses.sort_by_cached_key(|boss| {
        let next = next_respawn(boss, now);
        (next.is_none(), next, boss.level)
    });
}

/// Respawn instant formatted for a notification line, or `-`.
pub fn format_next_respawn(boss: &Boss, now: &ManilaTime) -> String {
    next_respawn(boss, now)
        .map(|next| clock::format_month_day_time_12(&next))
        .unwrap_or_else(|| "-".to_string())
}

/// Human-readable spawn schedule, e.g. `["Daily 11:00", "Daily 20:00"]` or
/// `["Monday 10:00", "Thursday 21:00"]`. Unreadable slots are left out and
/// duplicates collapsed. Fixed spawns have no schedule lines.
pub fn schedule_labels(spawn: &SpawnRule) -> Vec<String> {
    let SpawnRule::Scheduled(scheduled) = spawn else {
        return Vec::new();
    };

    let candidates = match scheduled {
        ScheduledSpawn::DestroyerDaily { start, end } => [start, end]
            .map(|time| clock::format_time_label(time).map(|label| format!("Daily {label}"))),
        ScheduledSpawn::WeeklyPair { start, end } => [start, end].map(|slot| {
            parse_weekday(&slot.day)?;
            let label = clock::format_time_label(&slot.time)?;
            Some(format!("{} {label}", capitalize(&slot.day)))
        }),
    };

    let mut labels: Vec<String> = Vec::new();
    for label in candidates.into_iter().flatten() {
        if !labels.contains(&label) {
            labels.push(label);
        }
    }
    labels
}

fn capitalize(word: &str) -> String {
    let word = word.trim().to_ascii_lowercase();
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}
