//! `bosswatch-scheduler`: respawn math and the Dead→Alive promoter.
//!
//! - [`occurrence`] computes upcoming windows of a scheduled spawn.
//! - [`respawn`] derives the next respawn and display status of a boss.
//! - [`board`] groups a catalog snapshot by display status.
//! - [`promoter`] writes the derived `Alive` transition back to the store.

pub mod board;
pub mod occurrence;
pub mod promoter;
pub mod respawn;

pub use board::{BoardEntry, StatusBoard};
pub use occurrence::{next_daily, next_occurrences, next_weekly, soonest_occurrence};
pub use promoter::{plan_pass, PassPlan, PassReport, Promoter};
pub use respawn::{display_status, next_respawn, sort_for_display, RESPAWNING_WINDOW_SECS};
