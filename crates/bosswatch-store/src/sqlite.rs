use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use bosswatch_core::clock::{self, Clock, SystemClock};
use bosswatch_core::types::normalize_killed_at;
use bosswatch_core::{
    Boss, BossPatch, BossType, NewBoss, NotifierSettings, PersistedStatus, ScheduleLock,
    SettingsPatch, SpawnFields, SpawnRule,
};
use chrono::DateTime;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior};
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::db::init_db;
use crate::error::{Result, StoreError};
use crate::store::{DocumentStore, SettingsTxn};

/// How long a writer waits on another process's lock before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const BOSS_COLUMNS: &str = "id, name, level, boss_type, spawn_type, spawn_interval_hours,
     scheduled_start_day, scheduled_start_time, scheduled_end_day, scheduled_end_time,
     spawn_region, image, killed_at, status";

const SETTINGS_COLUMNS: &str = "is_enabled, webhook_url, notification_time, enabled_boss_ids,
     last_notified_date, last_notified_schedule_key, send_lock_schedule_key, send_lock_id,
     send_lock_expires_at, updated_at";

/// SQLite-backed document store.
///
/// Wraps a single connection in a `Mutex`. Several processes may open the
/// same database file; settings transactions take SQLite's write lock up
/// front (`BEGIN IMMEDIATE`) so concurrent read-modify-write cycles are
/// serialised across all of them.
pub struct SqliteStore {
    db: Mutex<Connection>,
    clock: Arc<dyn Clock>,
    bosses_tx: watch::Sender<Vec<Boss>>,
    settings_tx: watch::Sender<NotifierSettings>,
    /// Last `PRAGMA data_version` seen; changes when another connection commits.
    data_version: AtomicI64,
}

impl SqliteStore {
    /// Open (or create) the database at `path`.
    pub fn open(path: &str) -> Result<Self> {
        Self::from_connection(Connection::open(path)?, Arc::new(SystemClock))
    }

    /// Private in-memory database. Used by tests and single-process demos.
    pub fn open_in_memory(clock: Arc<dyn Clock>) -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?, clock)
    }

    /// Wrap an already-open connection, initialising the schema if needed.
    pub fn from_connection(conn: Connection, clock: Arc<dyn Clock>) -> Result<Self> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        init_db(&conn)?;
        ensure_settings_row(&conn)?;

        let bosses = query_bosses(&conn)?;
        let settings = query_settings(&conn)?;
        let version = data_version(&conn)?;
        let (bosses_tx, _) = watch::channel(bosses);
        let (settings_tx, _) = watch::channel(settings);

        Ok(Self {
            db: Mutex::new(conn),
            clock,
            bosses_tx,
            settings_tx,
            data_version: AtomicI64::new(version),
        })
    }

    /// Re-publish snapshots if another connection committed since the last
    /// check. Returns whether anything was re-published.
    pub fn refresh_if_changed(&self) -> Result<bool> {
        let (bosses, settings) = {
            let db = self.conn();
            let version = data_version(&db)?;
            if self.data_version.swap(version, Ordering::SeqCst) == version {
                return Ok(false);
            }
            (query_bosses(&db)?, query_settings(&db)?)
        };
        debug!("external write detected, republishing snapshots");
        self.bosses_tx.send_replace(bosses);
        self.settings_tx.send_replace(settings);
        Ok(true)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.db.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn now_string(&self) -> String {
        clock::iso_string(&self.clock.now())
    }

    fn publish_bosses(&self, db: &Connection) -> Result<()> {
        let bosses = query_bosses(db)?;
        self.bosses_tx.send_replace(bosses);
        Ok(())
    }
}

impl DocumentStore for SqliteStore {
    fn list_bosses(&self) -> Result<Vec<Boss>> {
        query_bosses(&self.conn())
    }

    fn get_boss(&self, id: &str) -> Result<Option<Boss>> {
        query_boss(&self.conn(), id)
    }

    fn subscribe_bosses(&self) -> watch::Receiver<Vec<Boss>> {
        self.bosses_tx.subscribe()
    }

    #[instrument(skip(self, boss), fields(name = %boss.name))]
    fn insert_boss(&self, boss: NewBoss) -> Result<Boss> {
        boss.validate().map_err(StoreError::InvalidBoss)?;
        let boss = boss.normalized(&self.clock.now());
        let id = Uuid::now_v7().to_string();
        let now = self.now_string();
        let fields = boss.spawn.to_fields();

        let db = self.conn();
        db.execute(
            &format!(
                "INSERT INTO bosses ({BOSS_COLUMNS}, created_at, updated_at)
                 VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?15)"
            ),
            rusqlite::params![
                id,
                boss.name,
                boss.level,
                boss.boss_type.label(),
                fields.spawn_type,
                fields.spawn_interval_hours,
                fields.scheduled_start_day,
                fields.scheduled_start_time,
                fields.scheduled_end_day,
                fields.scheduled_end_time,
                boss.spawn_region,
                boss.image,
                boss.killed_at,
                boss.status.as_str(),
                now,
            ],
        )?;
        let stored = query_boss(&db, &id)?.ok_or_else(|| StoreError::BossNotFound { id: id.clone() })?;
        self.publish_bosses(&db)?;
        info!(boss_id = %id, "boss added");
        Ok(stored)
    }

    #[instrument(skip(self, patch), fields(boss_id = %id))]
    fn update_boss(&self, id: &str, patch: &BossPatch) -> Result<()> {
        let now = self.now_string();
        let mut db = self.conn();
        let tx = db.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let mut boss = query_boss(&tx, id)?.ok_or_else(|| StoreError::BossNotFound { id: id.to_string() })?;
        patch.apply(&mut boss);
        if patch.touches_kill_time() && boss.status == PersistedStatus::Dead {
            boss.killed_at =
                normalize_killed_at(boss.status, boss.killed_at.as_deref(), &self.clock.now());
        }
        // Life-cycle writes (promotion, backfill) must land even on records
        // another client stored without validation.
        if !patch.is_lifecycle_only() {
            NewBoss::from(boss.clone())
                .validate()
                .map_err(StoreError::InvalidBoss)?;
        }
        let fields = boss.spawn.to_fields();

        tx.execute(
            "UPDATE bosses SET
                name = ?1, level = ?2, boss_type = ?3, spawn_type = ?4,
                spawn_interval_hours = ?5, scheduled_start_day = ?6,
                scheduled_start_time = ?7, scheduled_end_day = ?8,
                scheduled_end_time = ?9, spawn_region = ?10, image = ?11,
                killed_at = ?12, status = ?13, updated_at = ?14
             WHERE id = ?15",
            rusqlite::params![
                boss.name,
                boss.level,
                boss.boss_type.label(),
                fields.spawn_type,
                fields.spawn_interval_hours,
                fields.scheduled_start_day,
                fields.scheduled_start_time,
                fields.scheduled_end_day,
                fields.scheduled_end_time,
                boss.spawn_region,
                boss.image,
                boss.killed_at,
                boss.status.as_str(),
                now,
                id,
            ],
        )?;
        tx.commit()?;
        debug!("boss updated");
        self.publish_bosses(&db)
    }

    #[instrument(skip(self), fields(boss_id = %id))]
    fn delete_boss(&self, id: &str) -> Result<()> {
        let db = self.conn();
        let n = db.execute("DELETE FROM bosses WHERE id = ?1", [id])?;
        if n == 0 {
            return Err(StoreError::BossNotFound { id: id.to_string() });
        }
        info!("boss removed");
        self.publish_bosses(&db)
    }

    fn load_settings(&self) -> Result<NotifierSettings> {
        let db = self.conn();
        ensure_settings_row(&db)?;
        query_settings(&db)
    }

    fn subscribe_settings(&self) -> watch::Receiver<NotifierSettings> {
        self.settings_tx.subscribe()
    }

    fn merge_settings(&self, patch: &SettingsPatch) -> Result<()> {
        let patch = patch.clone();
        self.transact_settings(&mut |_: &NotifierSettings| Some(patch.clone()))?;
        Ok(())
    }

    fn transact_settings(&self, f: SettingsTxn<'_>) -> Result<bool> {
        let now = self.now_string();
        let mut db = self.conn();
        let tx = db.transaction_with_behavior(TransactionBehavior::Immediate)?;
        ensure_settings_row(&tx)?;

        let current = query_settings(&tx)?;
        let Some(patch) = f(&current) else {
            tx.commit()?;
            return Ok(false);
        };

        let mut next = current;
        patch.apply(&mut next);
        next.updated_at = now;
        write_settings(&tx, &next)?;
        tx.commit()?;

        self.settings_tx.send_replace(next.normalized());
        Ok(true)
    }
}

fn data_version(conn: &Connection) -> Result<i64> {
    Ok(conn.pragma_query_value(None, "data_version", |row| row.get(0))?)
}

fn ensure_settings_row(conn: &Connection) -> Result<()> {
    conn.execute("INSERT OR IGNORE INTO notifier_settings (id) VALUES (1)", [])?;
    Ok(())
}

fn query_bosses(conn: &Connection) -> Result<Vec<Boss>> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {BOSS_COLUMNS} FROM bosses ORDER BY level, name"
    ))?;
    let bosses = stmt
        .query_map([], row_to_boss)?
        .filter_map(|r| match r {
            Ok(boss) => Some(boss),
            Err(e) => {
                warn!("skipping unreadable boss row: {e}");
                None
            }
        })
        .collect();
    Ok(bosses)
}

fn query_boss(conn: &Connection, id: &str) -> Result<Option<Boss>> {
    let boss = conn
        .query_row(
            &format!("SELECT {BOSS_COLUMNS} FROM bosses WHERE id = ?1"),
            [id],
            row_to_boss,
        )
        .optional()?;
    Ok(boss)
}

/// Map a SQLite row to a `Boss`. Only an unknown boss type fails the row;
/// every other malformed value is carried through for the resolver to skip.
fn row_to_boss(row: &rusqlite::Row<'_>) -> rusqlite::Result<Boss> {
    let boss_type_raw: String = row.get(3)?;
    let boss_type: BossType = boss_type_raw.parse().map_err(|e: String| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, e.into())
    })?;

    let fields = SpawnFields {
        spawn_type: row.get(4)?,
        spawn_interval_hours: row.get(5)?,
        scheduled_start_day: row.get(6)?,
        scheduled_start_time: row.get(7)?,
        scheduled_end_day: row.get(8)?,
        scheduled_end_time: row.get(9)?,
    };
    let killed_at: Option<String> = row.get(12)?;
    let status: String = row.get(13)?;

    Ok(Boss {
        id: row.get(0)?,
        name: row.get(1)?,
        level: u32::try_from(row.get::<_, i64>(2)?).unwrap_or(0),
        boss_type,
        spawn: SpawnRule::from_fields(boss_type, &fields),
        spawn_region: row.get(10)?,
        image: row.get(11)?,
        killed_at: killed_at.filter(|k| !k.trim().is_empty()),
        status: PersistedStatus::from_stored(&status),
    })
}

fn query_settings(conn: &Connection) -> Result<NotifierSettings> {
    let settings = conn.query_row(
        &format!("SELECT {SETTINGS_COLUMNS} FROM notifier_settings WHERE id = 1"),
        [],
        |row| {
            Ok((
                row.get::<_, bool>(0)?,   // is_enabled
                row.get::<_, String>(1)?, // webhook_url
                row.get::<_, String>(2)?, // notification_time
                row.get::<_, String>(3)?, // enabled_boss_ids JSON
                row.get::<_, String>(4)?, // last_notified_date
                row.get::<_, String>(5)?, // last_notified_schedule_key
                row.get::<_, String>(6)?, // send_lock_schedule_key
                row.get::<_, String>(7)?, // send_lock_id
                row.get::<_, i64>(8)?,    // send_lock_expires_at
                row.get::<_, String>(9)?, // updated_at
            ))
        },
    )?;
    let (
        is_enabled,
        webhook_url,
        notification_time,
        ids_json,
        last_notified_date,
        last_notified_schedule_key,
        lock_key,
        lock_id,
        lock_expires_ms,
        updated_at,
    ) = settings;

    let enabled_boss_ids: Vec<String> = serde_json::from_str(&ids_json).unwrap_or_else(|e| {
        warn!("enabled_boss_ids is not a JSON string array ({e}); treating as empty");
        Vec::new()
    });

    let send_lock = if lock_key.is_empty() || lock_id.is_empty() {
        None
    } else {
        // An unreadable expiry reads as already expired.
        let expires_at = DateTime::from_timestamp_millis(lock_expires_ms).unwrap_or_default();
        Some(ScheduleLock {
            schedule_key: lock_key,
            owner_token: lock_id,
            expires_at: clock::to_manila(&expires_at),
        })
    };

    Ok(NotifierSettings {
        is_enabled,
        webhook_url,
        notification_time,
        enabled_boss_ids,
        last_notified_date,
        last_notified_schedule_key,
        send_lock,
        updated_at,
    }
    .normalized())
}

fn write_settings(conn: &Connection, settings: &NotifierSettings) -> Result<()> {
    let ids_json = serde_json::to_string(&settings.enabled_boss_ids)?;
    let (lock_key, lock_id, lock_expires_ms) = match &settings.send_lock {
        Some(lock) => (
            lock.schedule_key.as_str(),
            lock.owner_token.as_str(),
            lock.expires_at.timestamp_millis(),
        ),
        None => ("", "", 0),
    };
    conn.execute(
        "UPDATE notifier_settings SET
            is_enabled = ?1, webhook_url = ?2, notification_time = ?3,
            enabled_boss_ids = ?4, last_notified_date = ?5,
            last_notified_schedule_key = ?6, send_lock_schedule_key = ?7,
            send_lock_id = ?8, send_lock_expires_at = ?9, updated_at = ?10
         WHERE id = 1",
        rusqlite::params![
            settings.is_enabled,
            settings.webhook_url,
            settings.notification_time,
            ids_json,
            settings.last_notified_date,
            settings.last_notified_schedule_key,
            lock_key,
            lock_id,
            lock_expires_ms,
            settings.updated_at,
        ],
    )?;
    Ok(())
}
