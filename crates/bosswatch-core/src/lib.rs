//! `bosswatch-core`: shared types, configuration and the Manila time provider.

pub mod clock;
pub mod config;
pub mod error;
pub mod types;

pub use clock::{Clock, ManilaTime, ManualClock, SystemClock};
pub use error::{BosswatchError, Result};
pub use types::{
    Boss, BossPatch, BossType, DisplayStatus, NewBoss, NotifierSettings, PersistedStatus,
    ScheduleLock, ScheduledSpawn, SettingsPatch, SpawnFields, SpawnRule, WeeklySlot,
};
