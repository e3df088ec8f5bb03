use std::collections::HashSet;

use bosswatch_core::clock::{self, ManilaTime};
use bosswatch_core::{Boss, NotifierSettings};

/// Why a poll did not produce a due occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Skip {
    /// The caller-supplied gate is off.
    Disabled,
    /// Notifications are switched off or no webhook is configured.
    NotConfigured,
    /// None of the selected bosses is in the loaded catalog.
    NoBosses,
    /// The configured notification time is unreadable.
    InvalidTime,
    /// Today's notification time has not been reached yet.
    TooEarly,
    /// The watermark already records today's occurrence.
    AlreadySent,
}

impl std::fmt::Display for Skip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Skip::Disabled => "disabled",
            Skip::NotConfigured => "not configured",
            Skip::NoBosses => "no selected bosses",
            Skip::InvalidTime => "invalid notification time",
            Skip::TooEarly => "too early",
            Skip::AlreadySent => "already sent",
        };
        f.write_str(s)
    }
}

/// `"<YYYY-MM-DD> <notification time>"`, the identity of one occurrence.
pub fn schedule_key(today_key: &str, notification_time: &str) -> String {
    format!("{today_key} {notification_time}")
}

/// Catalog entries selected for the notification, in catalog order.
pub fn selected_bosses(settings: &NotifierSettings, bosses: &[Boss]) -> Vec<Boss> {
    let ids: HashSet<&str> = settings.enabled_boss_ids.iter().map(String::as_str).collect();
    bosses
        .iter()
        .filter(|boss| !boss.id.is_empty() && ids.contains(boss.id.as_str()))
        .cloned()
        .collect()
}

/// The schedule key that is due at `now`, or the first reason it is not.
pub fn due_schedule_key(
    enabled: bool,
    settings: &NotifierSettings,
    selected: &[Boss],
    now: &ManilaTime,
) -> Result<String, Skip> {
    if !enabled {
        return Err(Skip::Disabled);
    }
    if !settings.is_enabled || settings.webhook_url.trim().is_empty() {
        return Err(Skip::NotConfigured);
    }
    if selected.is_empty() {
        return Err(Skip::NoBosses);
    }

    let scheduled = clock::parse_time_of_day(&settings.notification_time).ok_or(Skip::InvalidTime)?;
    if clock::to_manila(now).time() < scheduled {
        return Err(Skip::TooEarly);
    }

    let key = schedule_key(&clock::today_key(now), &settings.notification_time);
    if settings.last_notified_schedule_key == key {
        return Err(Skip::AlreadySent);
    }
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bosswatch_core::clock::parse_instant;
    use bosswatch_core::{BossType, PersistedStatus, SpawnRule};

    fn boss(id: &str) -> Boss {
        Boss {
            id: id.to_string(),
            name: id.to_string(),
            level: 1,
            boss_type: BossType::FieldBoss,
            spawn: SpawnRule::Fixed { interval_hours: Some(1.0) },
            spawn_region: String::new(),
            image: String::new(),
            killed_at: None,
            status: PersistedStatus::Alive,
        }
    }

    fn configured() -> NotifierSettings {
        NotifierSettings {
            is_enabled: true,
            webhook_url: "https://hooks.test/abc".to_string(),
            notification_time: "09:00".to_string(),
            enabled_boss_ids: vec!["a".to_string()],
            ..NotifierSettings::default()
        }
    }

    fn at(s: &str) -> ManilaTime {
        parse_instant(s).unwrap()
    }

    #[test]
    fn due_once_time_is_reached() {
        let settings = configured();
        let selected = selected_bosses(&settings, &[boss("a"), boss("b")]);
        assert_eq!(selected.len(), 1);

        assert_eq!(
            due_schedule_key(true, &settings, &selected, &at("2026-02-14T08:59:59+08:00")),
            Err(Skip::TooEarly)
        );
        assert_eq!(
            due_schedule_key(true, &settings, &selected, &at("2026-02-14T09:00:00+08:00")),
            Ok("2026-02-14 09:00".to_string())
        );
        assert_eq!(
            due_schedule_key(true, &settings, &selected, &at("2026-02-14T23:10:00+08:00")),
            Ok("2026-02-14 09:00".to_string())
        );
    }

    #[test]
    fn each_gate_blocks() {
        let now = at("2026-02-14T10:00:00+08:00");
        let selected = vec![boss("a")];

        assert_eq!(due_schedule_key(false, &configured(), &selected, &now), Err(Skip::Disabled));

        let mut off = configured();
        off.is_enabled = false;
        assert_eq!(due_schedule_key(true, &off, &selected, &now), Err(Skip::NotConfigured));

        let mut no_url = configured();
        no_url.webhook_url = "  ".to_string();
        assert_eq!(due_schedule_key(true, &no_url, &selected, &now), Err(Skip::NotConfigured));

        assert_eq!(due_schedule_key(true, &configured(), &[], &now), Err(Skip::NoBosses));

        let mut bad_time = configured();
        bad_time.notification_time = "nine".to_string();
        assert_eq!(due_schedule_key(true, &bad_time, &selected, &now), Err(Skip::InvalidTime));

        let mut sent = configured();
        sent.last_notified_schedule_key = "2026-02-14 09:00".to_string();
        assert_eq!(due_schedule_key(true, &sent, &selected, &now), Err(Skip::AlreadySent));
    }

    #[test]
    fn changing_the_time_opens_a_new_occurrence() {
        let mut settings = configured();
        settings.last_notified_schedule_key = "2026-02-14 09:00".to_string();
        settings.notification_time = "09:30".to_string();
        assert_eq!(
            due_schedule_key(true, &settings, &[boss("a")], &at("2026-02-14T10:00:00+08:00")),
            Ok("2026-02-14 09:30".to_string())
        );
    }

    #[test]
    fn day_rolls_over_in_manila() {
        let mut settings = configured();
        settings.last_notified_schedule_key = "2026-02-14 09:00".to_string();
        // 01:30 UTC on the 15th is 09:30 on the 15th in Manila.
        let now = clock::to_manila(&chrono::DateTime::parse_from_rfc3339("2026-02-15T01:30:00Z").unwrap());
        assert_eq!(
            due_schedule_key(true, &settings, &[boss("a")], &now),
            Ok("2026-02-15 09:00".to_string())
        );
    }
}
