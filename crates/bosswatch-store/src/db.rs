use rusqlite::Connection;

use crate::error::Result;

/// Initialise the boss catalog and notifier settings schema in `conn`.
///
/// Safe to call on every startup; uses `IF NOT EXISTS` throughout. Spawn
/// columns are stored flat and loosely typed (TEXT); the reader decides what
/// is usable so a single malformed row never fails a whole snapshot.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS bosses (
            id                    TEXT    NOT NULL PRIMARY KEY,
            name                  TEXT    NOT NULL,
            level                 INTEGER NOT NULL DEFAULT 1,
            boss_type             TEXT    NOT NULL,
            spawn_type            TEXT    NOT NULL DEFAULT 'fixed',
            spawn_interval_hours  TEXT    NOT NULL DEFAULT '',
            scheduled_start_day   TEXT    NOT NULL DEFAULT '',
            scheduled_start_time  TEXT    NOT NULL DEFAULT '',
            scheduled_end_day     TEXT    NOT NULL DEFAULT '',
            scheduled_end_time    TEXT    NOT NULL DEFAULT '',
            spawn_region          TEXT    NOT NULL DEFAULT '',
            image                 TEXT    NOT NULL DEFAULT '',
            killed_at             TEXT,               -- ISO-8601 +08:00 or NULL
            status                TEXT    NOT NULL DEFAULT 'dead',
            created_at            TEXT    NOT NULL,
            updated_at            TEXT    NOT NULL
        );

        -- Singleton document: id is always 1.
        CREATE TABLE IF NOT EXISTS notifier_settings (
            id                          INTEGER NOT NULL PRIMARY KEY CHECK (id = 1),
            is_enabled                  INTEGER NOT NULL DEFAULT 0,
            webhook_url                 TEXT    NOT NULL DEFAULT '',
            notification_time           TEXT    NOT NULL DEFAULT '09:00',
            enabled_boss_ids            TEXT    NOT NULL DEFAULT '[]',  -- JSON array
            last_notified_date          TEXT    NOT NULL DEFAULT '',
            last_notified_schedule_key  TEXT    NOT NULL DEFAULT '',
            send_lock_schedule_key      TEXT    NOT NULL DEFAULT '',
            send_lock_id                TEXT    NOT NULL DEFAULT '',
            send_lock_expires_at        INTEGER NOT NULL DEFAULT 0,     -- epoch millis
            updated_at                  TEXT    NOT NULL DEFAULT ''
        );
        ",
    )?;
    Ok(())
}
