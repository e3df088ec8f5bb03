//! `bosswatch-notifier`: the daily schedule webhook.
//!
//! Every client runs a [`DailyNotifier`]; the send lock in the shared
//! settings document ensures each day's occurrence is posted at most once
//! across all of them, and the lock's expiry lets another client take over
//! if the holder dies mid-send.

pub mod engine;
pub mod error;
pub mod lock;
pub mod message;
pub mod trigger;
pub mod webhook;

pub use engine::{DailyNotifier, NotifierOptions, TickOutcome};
pub use error::{DeliveryError, NotifierError, Result};
pub use lock::Acquire;
pub use message::compose_schedule_message;
pub use trigger::{due_schedule_key, schedule_key, Skip};
pub use webhook::{deliver, HttpWebhook, WebhookTransport};
