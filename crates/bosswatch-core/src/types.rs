use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::clock::{self, ManilaTime};

/// Boss category. Selects the scheduled-spawn variant and the message group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BossType {
    #[serde(rename = "Field Boss")]
    FieldBoss,
    #[serde(rename = "Destroyer")]
    Destroyer,
    #[serde(rename = "Guild Boss")]
    GuildBoss,
}

impl BossType {
    /// Fixed order used when grouping bosses for display and notifications.
    pub const ORDER: [BossType; 3] = [BossType::FieldBoss, BossType::Destroyer, BossType::GuildBoss];

    pub fn label(&self) -> &'static str {
        match self {
            BossType::FieldBoss => "Field Boss",
            BossType::Destroyer => "Destroyer",
            BossType::GuildBoss => "Guild Boss",
        }
    }
}

impl std::fmt::Display for BossType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for BossType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "Field Boss" => Ok(BossType::FieldBoss),
            "Destroyer" => Ok(BossType::Destroyer),
            "Guild Boss" => Ok(BossType::GuildBoss),
            other => Err(format!("unknown boss type: {other}")),
        }
    }
}

/// Status as stored. Distinct from the time-derived [`DisplayStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistedStatus {
    Alive,
    Dead,
    Unknown,
}

impl PersistedStatus {
    /// Read a stored status string. Anything other than `alive` or `unknown`
    /// is treated as `dead`.
    pub fn from_stored(raw: &str) -> Self {
        match raw {
            "alive" => PersistedStatus::Alive,
            "unknown" => PersistedStatus::Unknown,
            _ => PersistedStatus::Dead,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PersistedStatus::Alive => "alive",
            PersistedStatus::Dead => "dead",
            PersistedStatus::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for PersistedStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Presentation state, recomputed from persisted status and the clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayStatus {
    Alive,
    Respawning,
    Dead,
    Unknown,
}

impl std::fmt::Display for DisplayStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DisplayStatus::Alive => "alive",
            DisplayStatus::Respawning => "respawning",
            DisplayStatus::Dead => "dead",
            DisplayStatus::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// One weekly occurrence: weekday name (`"Monday"`) plus `HH:MM`.
///
/// Kept as the raw strings that were stored; parsing happens when an
/// occurrence is computed so one bad slot only drops that candidate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklySlot {
    pub day: String,
    pub time: String,
}

impl WeeklySlot {
    pub fn new(day: impl Into<String>, time: impl Into<String>) -> Self {
        Self {
            day: day.into(),
            time: time.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScheduledSpawn {
    /// Two times of day, every day. Used by Destroyer bosses.
    DestroyerDaily { start: String, end: String },
    /// Two (weekday, time) pairs, every week.
    WeeklyPair { start: WeeklySlot, end: WeeklySlot },
}

/// How a boss comes back after it dies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SpawnRule {
    /// Respawns `interval_hours` after the recorded kill. `None` when the
    /// stored interval could not be read.
    Fixed { interval_hours: Option<f64> },
    Scheduled(ScheduledSpawn),
}

/// Flat storage shape of a spawn rule, one field per stored column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpawnFields {
    pub spawn_type: String,
    pub spawn_interval_hours: String,
    pub scheduled_start_day: String,
    pub scheduled_start_time: String,
    pub scheduled_end_day: String,
    pub scheduled_end_time: String,
}

impl SpawnRule {
    /// Build the rule from stored columns. `spawn_type` is consulted first;
    /// fields belonging to the other spawn model are ignored.
    pub fn from_fields(boss_type: BossType, fields: &SpawnFields) -> Self {
        if fields.spawn_type.trim() != "scheduled" {
            return SpawnRule::Fixed {
                interval_hours: parse_interval_hours(&fields.spawn_interval_hours),
            };
        }
        let scheduled = match boss_type {
            BossType::Destroyer => ScheduledSpawn::DestroyerDaily {
                start: fields.scheduled_start_time.clone(),
                end: fields.scheduled_end_time.clone(),
            },
            _ => ScheduledSpawn::WeeklyPair {
                start: WeeklySlot::new(&fields.scheduled_start_day, &fields.scheduled_start_time),
                end: WeeklySlot::new(&fields.scheduled_end_day, &fields.scheduled_end_time),
            },
        };
        SpawnRule::Scheduled(scheduled)
    }

    /// Flatten back into stored columns, blanking the other model's fields.
    pub fn to_fields(&self) -> SpawnFields {
        match self {
            SpawnRule::Fixed { interval_hours } => SpawnFields {
                spawn_type: "fixed".to_string(),
                spawn_interval_hours: interval_hours.map(|h| h.to_string()).unwrap_or_default(),
                ..SpawnFields::default()
            },
            SpawnRule::Scheduled(ScheduledSpawn::DestroyerDaily { start, end }) => SpawnFields {
                spawn_type: "scheduled".to_string(),
                scheduled_start_time: start.clone(),
                scheduled_end_time: end.clone(),
                ..SpawnFields::default()
            },
            SpawnRule::Scheduled(ScheduledSpawn::WeeklyPair { start, end }) => SpawnFields {
                spawn_type: "scheduled".to_string(),
                scheduled_start_day: start.day.clone(),
                scheduled_start_time: start.time.clone(),
                scheduled_end_day: end.day.clone(),
                scheduled_end_time: end.time.clone(),
                ..SpawnFields::default()
            },
        }
    }

    pub fn is_scheduled(&self) -> bool {
        matches!(self, SpawnRule::Scheduled(_))
    }
}

fn parse_interval_hours(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|h| h.is_finite() && *h >= 0.0)
}

/// A boss as read from the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Boss {
    /// Assigned by the store on insert.
    pub id: String,
    pub name: String,
    pub level: u32,
    pub boss_type: BossType,
    pub spawn: SpawnRule,
    pub spawn_region: String,
    pub image: String,
    /// Raw stored kill time. May be absent or unparseable.
    pub killed_at: Option<String>,
    pub status: PersistedStatus,
}

impl Boss {
    /// The kill time as an instant, if present and readable.
    pub fn killed_instant(&self) -> Option<ManilaTime> {
        self.killed_at.as_deref().and_then(clock::parse_instant)
    }
}

impl From<Boss> for NewBoss {
    fn from(boss: Boss) -> Self {
        Self {
            name: boss.name,
            level: boss.level,
            boss_type: boss.boss_type,
            spawn: boss.spawn,
            spawn_region: boss.spawn_region,
            image: boss.image,
            killed_at: boss.killed_at,
            status: boss.status,
        }
    }
}

/// Input for creating a boss. Also the shape validated on edits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewBoss {
    pub name: String,
    pub level: u32,
    pub boss_type: BossType,
    pub spawn: SpawnRule,
    #[serde(default)]
    pub spawn_region: String,
    pub image: String,
    #[serde(default)]
    pub killed_at: Option<String>,
    pub status: PersistedStatus,
}

impl NewBoss {
    /// Reject records the scheduling core cannot work with.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("boss name is required".to_string());
        }
        if self.level < 1 {
            return Err("level must be at least 1".to_string());
        }
        match &self.spawn {
            SpawnRule::Fixed { interval_hours } => match interval_hours {
                Some(h) if (0.0..=23.0).contains(h) => {}
                _ => return Err("spawn interval must be between 0 and 23 hours".to_string()),
            },
            SpawnRule::Scheduled(ScheduledSpawn::DestroyerDaily { start, end }) => {
                if start.trim().is_empty() {
                    return Err("spawn time 1 is required".to_string());
                }
                if end.trim().is_empty() {
                    return Err("spawn time 2 is required".to_string());
                }
            }
            SpawnRule::Scheduled(ScheduledSpawn::WeeklyPair { start, end }) => {
                if start.day.trim().is_empty() || start.time.trim().is_empty() {
                    return Err("spawn time 1 day and time are required".to_string());
                }
                if end.day.trim().is_empty() || end.time.trim().is_empty() {
                    return Err("spawn time 2 day and time are required".to_string());
                }
            }
        }
        if self.image.trim().is_empty() {
            return Err("boss image is required".to_string());
        }
        if self.status == PersistedStatus::Dead
            && self.killed_at.as_deref().map_or(true, |k| k.trim().is_empty())
        {
            return Err("killed time is required when status is dead".to_string());
        }
        Ok(())
    }

    /// Canonicalise the kill time before it is written.
    ///
    /// Non-dead bosses carry no kill time. A dead boss's bare `HH:MM` is
    /// placed on today's Manila date, a local `YYYY-MM-DDTHH:MM` gets the
    /// `+08:00` suffix, and a missing value becomes `now`.
    pub fn normalized(mut self, now: &ManilaTime) -> Self {
        self.killed_at = normalize_killed_at(self.status, self.killed_at.as_deref(), now);
        self
    }
}

/// See [`NewBoss::normalized`].
pub fn normalize_killed_at(
    status: PersistedStatus,
    raw: Option<&str>,
    now: &ManilaTime,
) -> Option<String> {
    if status != PersistedStatus::Dead {
        return None;
    }
    let raw = raw.map(str::trim).unwrap_or_default();
    if raw.is_empty() {
        return Some(clock::iso_string(now));
    }
    if clock::parse_time_of_day(raw).is_some() && raw.len() <= 5 {
        return Some(format!("{}T{}:00+08:00", clock::today_key(now), raw));
    }
    if raw.len() == 16 && raw.as_bytes().get(10) == Some(&b'T') {
        return Some(format!("{raw}:00+08:00"));
    }
    Some(raw.to_string())
}

/// Partial boss update. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BossPatch {
    pub name: Option<String>,
    pub level: Option<u32>,
    /// Boss type and spawn rule change together since the rule's variant
    /// depends on the type.
    pub spawn: Option<(BossType, SpawnRule)>,
    pub spawn_region: Option<String>,
    pub image: Option<String>,
    /// `Some(None)` clears the stored kill time.
    pub killed_at: Option<Option<String>>,
    pub status: Option<PersistedStatus>,
}

impl BossPatch {
    pub fn status(status: PersistedStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn killed_at(killed_at: impl Into<String>) -> Self {
        Self {
            killed_at: Some(Some(killed_at.into())),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// True when the patch only moves the boss through its life cycle
    /// (status and kill time) and leaves its definition alone.
    pub fn is_lifecycle_only(&self) -> bool {
        self.name.is_none()
            && self.level.is_none()
            && self.spawn.is_none()
            && self.spawn_region.is_none()
            && self.image.is_none()
    }

    /// Whether the patch sets the status or the kill time.
    pub fn touches_kill_time(&self) -> bool {
        self.status.is_some() || self.killed_at.is_some()
    }

    pub fn apply(&self, boss: &mut Boss) {
        if let Some(name) = &self.name {
            boss.name = name.clone();
        }
        if let Some(level) = self.level {
            boss.level = level;
        }
        if let Some((boss_type, spawn)) = &self.spawn {
            boss.boss_type = *boss_type;
            boss.spawn = spawn.clone();
        }
        if let Some(region) = &self.spawn_region {
            boss.spawn_region = region.clone();
        }
        if let Some(image) = &self.image {
            boss.image = image.clone();
        }
        if let Some(killed_at) = &self.killed_at {
            boss.killed_at = killed_at.clone();
        }
        if let Some(status) = self.status {
            boss.status = status;
        }
    }
}

/// Cross-client mutual exclusion for one notification occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleLock {
    pub schedule_key: String,
    /// Fresh random token per acquisition; proves ownership on release.
    pub owner_token: String,
    pub expires_at: DateTime<FixedOffset>,
}

pub const DEFAULT_NOTIFICATION_TIME: &str = "09:00";

/// The single global notifier settings document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotifierSettings {
    pub is_enabled: bool,
    pub webhook_url: String,
    /// Daily trigger time, `HH:MM` Manila.
    pub notification_time: String,
    pub enabled_boss_ids: Vec<String>,
    pub last_notified_date: String,
    /// `"YYYY-MM-DD HH:MM"` of the last delivered occurrence.
    pub last_notified_schedule_key: String,
    pub send_lock: Option<ScheduleLock>,
    pub updated_at: String,
}

impl Default for NotifierSettings {
    fn default() -> Self {
        Self {
            is_enabled: false,
            webhook_url: String::new(),
            notification_time: DEFAULT_NOTIFICATION_TIME.to_string(),
            enabled_boss_ids: Vec::new(),
            last_notified_date: String::new(),
            last_notified_schedule_key: String::new(),
            send_lock: None,
            updated_at: String::new(),
        }
    }
}

impl NotifierSettings {
    /// Fill derived fields for records written before the watermark existed.
    pub fn normalized(mut self) -> Self {
        if self.notification_time.trim().is_empty() {
            self.notification_time = DEFAULT_NOTIFICATION_TIME.to_string();
        }
        if self.last_notified_schedule_key.is_empty() && !self.last_notified_date.is_empty() {
            self.last_notified_schedule_key =
                format!("{} {}", self.last_notified_date, self.notification_time);
        }
        self
    }
}

/// Partial settings update with merge semantics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsPatch {
    pub is_enabled: Option<bool>,
    pub webhook_url: Option<String>,
    pub notification_time: Option<String>,
    pub enabled_boss_ids: Option<Vec<String>>,
    pub last_notified_date: Option<String>,
    pub last_notified_schedule_key: Option<String>,
    /// `Some(None)` clears the lock fields.
    pub send_lock: Option<Option<ScheduleLock>>,
}

impl SettingsPatch {
    pub fn apply(&self, settings: &mut NotifierSettings) {
        if let Some(v) = self.is_enabled {
            settings.is_enabled = v;
        }
        if let Some(v) = &self.webhook_url {
            settings.webhook_url = v.clone();
        }
        if let Some(v) = &self.notification_time {
            settings.notification_time = v.clone();
        }
        if let Some(v) = &self.enabled_boss_ids {
            settings.enabled_boss_ids = v.clone();
        }
        if let Some(v) = &self.last_notified_date {
            settings.last_notified_date = v.clone();
        }
        if let Some(v) = &self.last_notified_schedule_key {
            settings.last_notified_schedule_key = v.clone();
        }
        if let Some(v) = &self.send_lock {
            settings.send_lock = v.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(spawn_type: &str) -> SpawnFields {
        SpawnFields {
            spawn_type: spawn_type.to_string(),
            spawn_interval_hours: "18".to_string(),
            scheduled_start_day: "Monday".to_string(),
            scheduled_start_time: "10:00".to_string(),
            scheduled_end_day: "Thursday".to_string(),
            scheduled_end_time: "21:00".to_string(),
        }
    }

    #[test]
    fn spawn_type_is_consulted_before_other_fields() {
        let rule = SpawnRule::from_fields(BossType::FieldBoss, &fields("fixed"));
        assert_eq!(rule, SpawnRule::Fixed { interval_hours: Some(18.0) });

        let rule = SpawnRule::from_fields(BossType::FieldBoss, &fields("scheduled"));
        assert!(matches!(rule, SpawnRule::Scheduled(ScheduledSpawn::WeeklyPair { .. })));

        let rule = SpawnRule::from_fields(BossType::Destroyer, &fields("scheduled"));
        assert_eq!(
            rule,
            SpawnRule::Scheduled(ScheduledSpawn::DestroyerDaily {
                start: "10:00".to_string(),
                end: "21:00".to_string(),
            })
        );
    }

    #[test]
    fn unreadable_interval_is_none() {
        let mut f = fields("fixed");
        f.spawn_interval_hours = "soon".to_string();
        assert_eq!(
            SpawnRule::from_fields(BossType::GuildBoss, &f),
            SpawnRule::Fixed { interval_hours: None }
        );
        f.spawn_interval_hours = "-3".to_string();
        assert_eq!(
            SpawnRule::from_fields(BossType::GuildBoss, &f),
            SpawnRule::Fixed { interval_hours: None }
        );
    }

    #[test]
    fn to_fields_blanks_other_model() {
        let rule = SpawnRule::Fixed { interval_hours: Some(6.0) };
        let f = rule.to_fields();
        assert_eq!(f.spawn_type, "fixed");
        assert_eq!(f.spawn_interval_hours, "6");
        assert!(f.scheduled_start_day.is_empty());
        assert!(f.scheduled_end_time.is_empty());
    }

    #[test]
    fn stored_status_defaults_to_dead() {
        assert_eq!(PersistedStatus::from_stored("alive"), PersistedStatus::Alive);
        assert_eq!(PersistedStatus::from_stored("unknown"), PersistedStatus::Unknown);
        assert_eq!(PersistedStatus::from_stored("dead"), PersistedStatus::Dead);
        assert_eq!(PersistedStatus::from_stored("zombie"), PersistedStatus::Dead);
    }

    fn valid_boss() -> NewBoss {
        NewBoss {
            name: "Venatus".to_string(),
            level: 60,
            boss_type: BossType::FieldBoss,
            spawn: SpawnRule::Fixed { interval_hours: Some(10.0) },
            spawn_region: "Corrupted Basin".to_string(),
            image: "venatus.png".to_string(),
            killed_at: None,
            status: PersistedStatus::Alive,
        }
    }

    #[test]
    fn validation_rules() {
        assert!(valid_boss().validate().is_ok());

        let mut boss = valid_boss();
        boss.status = PersistedStatus::Dead;
        assert!(boss.validate().unwrap_err().contains("killed time"));

        let mut boss = valid_boss();
        boss.spawn = SpawnRule::Fixed { interval_hours: Some(30.0) };
        assert!(boss.validate().is_err());

        let mut boss = valid_boss();
        boss.spawn = SpawnRule::Scheduled(ScheduledSpawn::WeeklyPair {
            start: WeeklySlot::new("Monday", "10:00"),
            end: WeeklySlot::new("", "21:00"),
        });
        assert!(boss.validate().unwrap_err().contains("spawn time 2"));

        let mut boss = valid_boss();
        boss.level = 0;
        assert!(boss.validate().is_err());
    }

    #[test]
    fn killed_at_normalisation() {
        let now = clock::parse_instant("2026-02-13T19:45:10+08:00").unwrap();
        assert_eq!(normalize_killed_at(PersistedStatus::Alive, Some("08:00"), &now), None);
        assert_eq!(
            normalize_killed_at(PersistedStatus::Dead, Some("08:00"), &now).as_deref(),
            Some("2026-02-13T08:00:00+08:00")
        );
        assert_eq!(
            normalize_killed_at(PersistedStatus::Dead, Some("2026-02-12T23:15"), &now).as_deref(),
            Some("2026-02-12T23:15:00+08:00")
        );
        assert_eq!(
            normalize_killed_at(PersistedStatus::Dead, None, &now).as_deref(),
            Some("2026-02-13T19:45:10+08:00")
        );
    }

    #[test]
    fn legacy_settings_derive_watermark() {
        let settings = NotifierSettings {
            last_notified_date: "2026-02-13".to_string(),
            notification_time: "08:30".to_string(),
            ..NotifierSettings::default()
        }
        .normalized();
        assert_eq!(settings.last_notified_schedule_key, "2026-02-13 08:30");
    }

    #[test]
    fn settings_patch_leaves_unspecified_fields() {
        let mut settings = NotifierSettings {
            webhook_url: "https://hooks.example/abc".to_string(),
            enabled_boss_ids: vec!["b1".to_string()],
            ..NotifierSettings::default()
        };
        SettingsPatch {
            last_notified_schedule_key: Some("2026-02-13 09:00".to_string()),
            send_lock: Some(None),
            ..SettingsPatch::default()
        }
        .apply(&mut settings);
        assert_eq!(settings.webhook_url, "https://hooks.example/abc");
        assert_eq!(settings.enabled_boss_ids, vec!["b1".to_string()]);
        assert_eq!(settings.last_notified_schedule_key, "2026-02-13 09:00");
    }
}
