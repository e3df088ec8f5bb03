use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bosswatch_core::clock::{self, Clock, ManilaTime};
use bosswatch_core::{Boss, BossPatch, PersistedStatus};
use bosswatch_store::DocumentStore;
use futures_util::future::join_all;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::respawn::next_respawn;

/// Corrections one pass should write, computed from a single catalog snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassPlan {
    /// Dead scheduled bosses without a readable kill time.
    pub backfill: Vec<String>,
    /// Dead bosses whose respawn instant has been reached.
    pub promote: Vec<String>,
}

impl PassPlan {
    pub fn is_empty(&self) -> bool {
        self.backfill.is_empty() && self.promote.is_empty()
    }
}

/// Pure planning step of a promoter pass.
pub fn plan_pass(bosses: &[Boss], now: &ManilaTime) -> PassPlan {
    let mut plan = PassPlan::default();
    for boss in bosses {
        if boss.id.is_empty() || boss.status != PersistedStatus::Dead {
            continue;
        }
        if boss.spawn.is_scheduled() && boss.killed_instant().is_none() {
            plan.backfill.push(boss.id.clone());
        }
        if next_respawn(boss, now).is_some_and(|next| next <= *now) {
            plan.promote.push(boss.id.clone());
        }
    }
    plan
}

/// Outcome counts of one executed pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    pub backfilled: usize,
    pub promoted: usize,
    pub failed: usize,
}

impl PassReport {
    pub fn writes(&self) -> usize {
        self.backfilled + self.promoted
    }
}

/// Clears the busy flag when a pass ends, however it ends.
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Reconciliation loop that makes the stored catalog agree with the clock:
/// backfills missing kill times on dead scheduled bosses and promotes dead
/// bosses whose respawn time has passed to `Alive`.
///
/// This is the only component that writes the `Dead -> Alive` transition.
pub struct Promoter {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
    bosses: watch::Receiver<Vec<Boss>>,
    interval: Duration,
    busy: AtomicBool,
}

impl Promoter {
    pub fn new(store: Arc<dyn DocumentStore>, clock: Arc<dyn Clock>, interval: Duration) -> Self {
        let bosses = store.subscribe_bosses();
        Self {
            store,
            clock,
            bosses,
            interval,
            busy: AtomicBool::new(false),
        }
    }

    /// Run one reconciliation pass over the latest catalog snapshot.
    ///
    /// Returns `None` when a previous pass is still in flight. Write failures
    /// are logged and counted; the next pass recomputes and retries them.
    pub async fn run_pass(&self) -> Option<PassReport> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            debug!("previous promoter pass still running, skipping tick");
            return None;
        }
        let _guard = BusyGuard(&self.busy);

        let now = self.clock.now();
        let snapshot = self.bosses.borrow().clone();
        let plan = plan_pass(&snapshot, &now);
        let mut report = PassReport::default();
        if plan.is_empty() {
            return Some(report);
        }

        // Backfills land before promotions.
        let now_iso = clock::iso_string(&now);
        let (ok, failed) = self
            .apply_all(&plan.backfill, BossPatch::killed_at(now_iso), "backfill")
            .await;
        report.backfilled = ok;
        report.failed += failed;

        let (ok, failed) = self
            .apply_all(&plan.promote, BossPatch::status(PersistedStatus::Alive), "promote")
            .await;
        report.promoted = ok;
        report.failed += failed;

        if report.writes() > 0 {
            info!(
                backfilled = report.backfilled,
                promoted = report.promoted,
                failed = report.failed,
                "promoter pass applied"
            );
        }
        Some(report)
    }

    /// Issue one independent update per boss, all at once.
    async fn apply_all(&self, ids: &[String], patch: BossPatch, action: &str) -> (usize, usize) {
        let writes = ids.iter().map(|id| {
            let store = Arc::clone(&self.store);
            let patch = patch.clone();
            let id = id.clone();
            async move {
                let result = tokio::task::spawn_blocking({
                    let id = id.clone();
                    move || store.update_boss(&id, &patch)
                })
                .await;
                match result {
                    Ok(Ok(())) => true,
                    Ok(Err(e)) => {
                        warn!(boss_id = %id, %action, "promoter write failed: {e}");
                        false
                    }
                    Err(e) => {
                        error!(boss_id = %id, %action, "promoter write task panicked: {e}");
                        false
                    }
                }
            }
        });

        let results = join_all(writes).await;
        let ok = results.iter().filter(|ok| **ok).count();
        (ok, results.len() - ok)
    }

    /// Main loop. Fires a pass every interval until `shutdown` broadcasts
    /// `true`. Each pass runs on its own task so a slow store never delays
    /// the ticker; overlapping ticks are dropped by the busy flag.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        info!(interval_secs = self.interval.as_secs(), "promoter started");

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let promoter = Arc::clone(&self);
                    tokio::spawn(async move {
                        promoter.run_pass().await;
                    });
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("promoter shutting down");
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bosswatch_core::{BossType, ManualClock, NewBoss, ScheduledSpawn, SpawnRule, WeeklySlot};
    use bosswatch_store::SqliteStore;

    fn fixed(name: &str, killed_at: &str, hours: f64) -> NewBoss {
        NewBoss {
            name: name.to_string(),
            level: 40,
            boss_type: BossType::FieldBoss,
            spawn: SpawnRule::Fixed { interval_hours: Some(hours) },
            spawn_region: "Ruins".to_string(),
            image: "boss.png".to_string(),
            killed_at: Some(killed_at.to_string()),
            status: PersistedStatus::Dead,
        }
    }

    fn weekly(name: &str) -> NewBoss {
        NewBoss {
            name: name.to_string(),
            level: 70,
            boss_type: BossType::GuildBoss,
            spawn: SpawnRule::Scheduled(ScheduledSpawn::WeeklyPair {
                start: WeeklySlot::new("Monday", "10:00"),
                end: WeeklySlot::new("Thursday", "21:00"),
            }),
            spawn_region: "Keep".to_string(),
            image: "guild.png".to_string(),
            killed_at: Some("2026-02-13T19:00:00+08:00".to_string()),
            status: PersistedStatus::Dead,
        }
    }

    fn setup(now: &str) -> (Arc<SqliteStore>, Arc<ManualClock>, Promoter) {
        let clock = Arc::new(ManualClock::at(now));
        let store = Arc::new(SqliteStore::open_in_memory(clock.clone()).unwrap());
        let promoter = Promoter::new(store.clone(), clock.clone(), Duration::from_secs(5));
        (store, clock, promoter)
    }

    #[tokio::test]
    async fn promotes_due_bosses_only() {
        let (store, _clock, promoter) = setup("2026-02-14T13:00:00+08:00");
        let due = store
            .insert_boss(fixed("Due", "2026-02-13T19:00:00+08:00", 18.0))
            .unwrap();
        let pending = store
            .insert_boss(fixed("Pending", "2026-02-14T12:00:00+08:00", 5.0))
            .unwrap();

        let report = promoter.run_pass().await.unwrap();
        assert_eq!(report.promoted, 1);
        assert_eq!(report.failed, 0);

        let due = store.get_boss(&due.id).unwrap().unwrap();
        assert_eq!(due.status, PersistedStatus::Alive);
        let pending = store.get_boss(&pending.id).unwrap().unwrap();
        assert_eq!(pending.status, PersistedStatus::Dead);
    }

    #[tokio::test]
    async fn second_pass_writes_nothing() {
        let (store, _clock, promoter) = setup("2026-02-20T00:00:00+08:00");
        store
            .insert_boss(fixed("A", "2026-02-13T19:00:00+08:00", 1.0))
            .unwrap();
        store
            .insert_boss(fixed("B", "2026-02-13T19:00:00+08:00", 2.0))
            .unwrap();

        let first = promoter.run_pass().await.unwrap();
        assert_eq!(first.promoted, 2);

        let second = promoter.run_pass().await.unwrap();
        assert_eq!(second.writes(), 0);
        assert!(plan_pass(&store.list_bosses().unwrap(), &promoter.clock.now()).is_empty());
    }

    #[tokio::test]
    async fn backfills_unreadable_kill_time() {
        let (store, _clock, promoter) = setup("2026-02-16T09:00:00+08:00");
        let boss = store.insert_boss(weekly("Clemantis")).unwrap();
        store
            .update_boss(&boss.id, &BossPatch::killed_at("not a time"))
            .unwrap();

        let report = promoter.run_pass().await.unwrap();
        assert_eq!(report.backfilled, 1);
        // Anchored on "now", the next window (Monday 10:00) is still ahead.
        assert_eq!(report.promoted, 0);

        let stored = store.get_boss(&boss.id).unwrap().unwrap();
        assert_eq!(stored.killed_at.as_deref(), Some("2026-02-16T09:00:00+08:00"));
        assert_eq!(stored.status, PersistedStatus::Dead);

        let again = promoter.run_pass().await.unwrap();
        assert_eq!(again.writes(), 0);
    }

    #[tokio::test]
    async fn scheduled_boss_promoted_after_window() {
        let (store, clock, promoter) = setup("2026-02-14T09:00:00+08:00");
        let boss = store.insert_boss(weekly("Clemantis")).unwrap();

        assert_eq!(promoter.run_pass().await.unwrap().writes(), 0);

        // Killed Friday evening; the Monday 10:00 window opens the respawn.
        clock.set(clock::parse_instant("2026-02-16T10:00:00+08:00").unwrap());
        let report = promoter.run_pass().await.unwrap();
        assert_eq!(report.promoted, 1);
        assert_eq!(
            store.get_boss(&boss.id).unwrap().unwrap().status,
            PersistedStatus::Alive
        );
    }

    #[tokio::test]
    async fn overlapping_pass_is_skipped() {
        let (store, _clock, promoter) = setup("2026-02-20T00:00:00+08:00");
        let boss = store
            .insert_boss(fixed("A", "2026-02-13T19:00:00+08:00", 1.0))
            .unwrap();

        promoter.busy.store(true, Ordering::SeqCst);
        assert!(promoter.run_pass().await.is_none());
        assert_eq!(
            store.get_boss(&boss.id).unwrap().unwrap().status,
            PersistedStatus::Dead
        );

        promoter.busy.store(false, Ordering::SeqCst);
        assert_eq!(promoter.run_pass().await.unwrap().promoted, 1);
        assert!(!promoter.busy.load(Ordering::SeqCst));
    }

    #[test]
    fn out_of_range_interval_does_not_block_other_bosses() {
        let now = clock::parse_instant("2026-02-20T00:00:00+08:00").unwrap();
        let boss = |id: &str, hours: f64| Boss {
            id: id.to_string(),
            name: id.to_uppercase(),
            level: 1,
            boss_type: BossType::FieldBoss,
            spawn: SpawnRule::Fixed { interval_hours: Some(hours) },
            spawn_region: String::new(),
            image: String::new(),
            killed_at: Some("2026-02-13T19:00:00+08:00".to_string()),
            status: PersistedStatus::Dead,
        };
        let plan = plan_pass(&[boss("broken", 1e10), boss("due", 1.0)], &now);
        assert_eq!(plan.promote, vec!["due".to_string()]);
        assert!(plan.backfill.is_empty());
    }

    #[test]
    fn alive_and_unknown_bosses_are_never_planned() {
        let now = clock::parse_instant("2026-02-20T00:00:00+08:00").unwrap();
        let mut boss = Boss {
            id: "x".to_string(),
            name: "X".to_string(),
            level: 1,
            boss_type: BossType::FieldBoss,
            spawn: SpawnRule::Fixed { interval_hours: Some(1.0) },
            spawn_region: String::new(),
            image: String::new(),
            killed_at: Some("2026-02-13T19:00:00+08:00".to_string()),
            status: PersistedStatus::Alive,
        };
        assert!(plan_pass(std::slice::from_ref(&boss), &now).is_empty());
        boss.status = PersistedStatus::Unknown;
        assert!(plan_pass(std::slice::from_ref(&boss), &now).is_empty());
        boss.status = PersistedStatus::Dead;
        assert_eq!(plan_pass(&[boss], &now).promote, vec!["x".to_string()]);
    }
}
