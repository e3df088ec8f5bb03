use bosswatch_core::clock::{self, ManilaTime};
use bosswatch_core::{ScheduledSpawn, SpawnRule};
use chrono::{Datelike, Duration, NaiveTime, TimeZone, Weekday};

/// Parse a full English weekday name (`"Monday"`), ignoring case.
pub fn parse_weekday(name: &str) -> Option<Weekday> {
    let day = match name.trim().to_ascii_lowercase().as_str() {
        "monday" => Weekday::Mon,
        "tuesday" => Weekday::Tue,
        "wednesday" => Weekday::Wed,
        "thursday" => Weekday::Thu,
        "friday" => Weekday::Fri,
        "saturday" => Weekday::Sat,
        "sunday" => Weekday::Sun,
        _ => return None,
    };
    Some(day)
}

/// `time` on the Manila calendar day `days_ahead` days after `reference`'s.
fn at_local_time(reference: &ManilaTime, days_ahead: i64, time: NaiveTime) -> Option<ManilaTime> {
    let date = clock::to_manila(reference).date_naive() + Duration::days(days_ahead);
    clock::manila()
        .from_local_datetime(&date.and_time(time))
        .single()
}

/// Next instant strictly after `reference` at `time` (HH:MM) Manila time.
///
/// Returns `None` for an unreadable time.
pub fn next_daily(time: &str, reference: &ManilaTime) -> Option<ManilaTime> {
    let time = clock::parse_time_of_day(time)?;
    let candidate = at_local_time(reference, 0, time)?;
    if candidate > *reference {
        Some(candidate)
    } else {
        // Today's slot has passed (or is exactly now), so tomorrow.
        Some(candidate + Duration::days(1))
    }
}

/// Next instant strictly after `reference` falling on `day` at `time`.
///
/// Returns `None` for an unknown weekday or unreadable time.
pub fn next_weekly(day: &str, time: &str, reference: &ManilaTime) -> Option<ManilaTime> {
    let target = parse_weekday(day)?;
    let time = clock::parse_time_of_day(time)?;

    let today = clock::to_manila(reference).weekday().num_days_from_monday() as i64;
    let delta = target.num_days_from_monday() as i64 - today;
    let candidate = at_local_time(reference, delta, time)?;

    if candidate > *reference {
        Some(candidate)
    } else {
        // Earlier this week, or today at/before the reference: next week.
        Some(candidate + Duration::days(7))
    }
}

/// Future occurrences of a scheduled spawn, ascending, at most two.
///
/// Fixed spawns have no occurrence list and yield an empty vec. Malformed
/// slots are dropped silently. Every returned instant is strictly after
/// `reference`.
pub fn next_occurrences(spawn: &SpawnRule, reference: &ManilaTime) -> Vec<ManilaTime> {
    let SpawnRule::Scheduled(scheduled) = spawn else {
        return Vec::new();
    };

    let candidates = match scheduled {
        ScheduledSpawn::DestroyerDaily { start, end } => {
            [next_daily(start, reference), next_daily(end, reference)]
        }
        ScheduledSpawn::WeeklyPair { start, end } => [
            next_weekly(&start.day, &start.time, reference),
            next_weekly(&end.day, &end.time, reference),
        ],
    };

    let mut occurrences: Vec<ManilaTime> = candidates.into_iter().flatten().collect();
    occurrences.sort();
    occurrences
}

/// The soonest entry of [`next_occurrences`].
pub fn soonest_occurrence(spawn: &SpawnRule, reference: &ManilaTime) -> Option<ManilaTime> {
    next_occurrences(spawn, reference).into_iter().next()
}
