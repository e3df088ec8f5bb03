use bosswatch_core::clock::ManilaTime;
use bosswatch_core::{Boss, DisplayStatus};
use serde::Serialize;

use crate::respawn::{display_status, next_respawn, schedule_labels, sort_for_display};

/// One row of the status board.
#[derive(Debug, Clone, Serialize)]
pub struct BoardEntry {
    pub id: String,
    pub name: String,
    pub level: u32,
    pub status: DisplayStatus,
    pub next_respawn: Option<ManilaTime>,
    pub schedule: Vec<String>,
}

impl BoardEntry {
    fn new(boss: &Boss, now: &ManilaTime) -> Self {
        Self {
            id: boss.id.clone(),
            name: boss.name.clone(),
            level: boss.level,
            status: display_status(boss, now),
            next_respawn: next_respawn(boss, now),
            schedule: schedule_labels(&boss.spawn),
        }
    }
}

/// Catalog snapshot grouped by display status, each group in display order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StatusBoard {
    pub alive: Vec<BoardEntry>,
    pub respawning: Vec<BoardEntry>,
    pub dead: Vec<BoardEntry>,
    pub unknown: Vec<BoardEntry>,
}

impl StatusBoard {
    pub fn build(bosses: &[Boss], now: &ManilaTime) -> Self {
        let mut sorted = bosses.to_vec();
        sort_for_display(&mut sorted, now);

        let mut board = Self::default();
        for boss in &sorted {
            let entry = BoardEntry::new(boss, now);
            match entry.status {
                DisplayStatus::Alive => board.alive.push(entry),
                DisplayStatus::Respawning => board.respawning.push(entry),
                DisplayStatus::Dead => board.dead.push(entry),
                DisplayStatus::Unknown => board.unknown.push(entry),
            }
        }
        board
    }

    pub fn total(&self) -> usize {
        self.alive.len() + self.respawning.len() + self.dead.len() + self.unknown.len()
    }

    /// Bosses about to respawn, as `name (MM/DD - hh:mm AM)`.
    pub fn respawning_names(&self) -> Vec<String> {
        self.respawning
            .iter()
            .map(|entry| match &entry.next_respawn {
                Some(next) => format!(
                    "{} ({})",
                    entry.name,
                    bosswatch_core::clock::format_month_day_time_12(next)
                ),
                None => entry.name.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bosswatch_core::clock::parse_instant;
    use bosswatch_core::{BossType, PersistedStatus, ScheduledSpawn, SpawnRule};

    fn boss(id: &str, status: PersistedStatus, killed_at: Option<&str>, hours: f64) -> Boss {
        Boss {
            id: id.to_string(),
            name: id.to_uppercase(),
            level: 50,
            boss_type: BossType::FieldBoss,
            spawn: SpawnRule::Fixed { interval_hours: Some(hours) },
            spawn_region: String::new(),
            image: String::new(),
            killed_at: killed_at.map(String::from),
            status,
        }
    }

    #[test]
    fn groups_by_display_status() {
        let now = parse_instant("2026-02-14T12:55:00+08:00").unwrap();
        let destroyer = Boss {
            id: "destroyer".to_string(),
            name: "Ratan".to_string(),
            level: 80,
            boss_type: BossType::Destroyer,
            spawn: SpawnRule::Scheduled(ScheduledSpawn::DestroyerDaily {
                start: "11:00".to_string(),
                end: "20:00".to_string(),
            }),
            spawn_region: String::new(),
            image: String::new(),
            killed_at: None,
            status: PersistedStatus::Alive,
        };
        let bosses = vec![
            boss("soon", PersistedStatus::Dead, Some("2026-02-13T19:00:00+08:00"), 18.0),
            boss("later", PersistedStatus::Dead, Some("2026-02-14T12:00:00+08:00"), 10.0),
            boss("stale", PersistedStatus::Dead, Some("2026-02-13T00:00:00+08:00"), 1.0),
            boss("mystery", PersistedStatus::Unknown, None, 1.0),
            destroyer,
        ];

        let board = StatusBoard::build(&bosses, &now);
        assert_eq!(board.total(), 5);
        assert_eq!(board.respawning.len(), 1);
        assert_eq!(board.respawning[0].id, "soon");
        assert_eq!(board.respawning_names(), vec!["SOON (02/14 - 01:00 PM)"]);
        assert_eq!(board.dead[0].id, "later");
        assert_eq!(board.unknown[0].id, "mystery");

        let alive: Vec<&str> = board.alive.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(alive, vec!["stale", "destroyer"]);
        assert_eq!(board.alive[1].schedule, vec!["Daily 11:00", "Daily 20:00"]);
    }
}
