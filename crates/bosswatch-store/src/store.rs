use bosswatch_core::{Boss, BossPatch, NewBoss, NotifierSettings, SettingsPatch};
use tokio::sync::watch;

use crate::error::Result;

/// Read-modify-write callback for [`DocumentStore::transact_settings`].
///
/// Receives the committed settings and returns the patch to merge, or `None`
/// to leave the document untouched.
pub type SettingsTxn<'a> = &'a mut dyn FnMut(&NotifierSettings) -> Option<SettingsPatch>;

/// The shared document store every client of the catalog talks to.
///
/// Methods are synchronous; async callers should run them on the blocking
/// pool. Subscriptions deliver full snapshots and each emission replaces the
/// subscriber's working set.
pub trait DocumentStore: Send + Sync {
    /// One-shot read of the whole catalog.
    fn list_bosses(&self) -> Result<Vec<Boss>>;

    fn get_boss(&self, id: &str) -> Result<Option<Boss>>;

    /// Live view of the catalog.
    fn subscribe_bosses(&self) -> watch::Receiver<Vec<Boss>>;

    /// Validate, normalise and store a new boss. The store assigns the id.
    fn insert_boss(&self, boss: NewBoss) -> Result<Boss>;

    /// Merge-write: fields left `None` in `patch` keep their stored value.
    fn update_boss(&self, id: &str, patch: &BossPatch) -> Result<()>;

    fn delete_boss(&self, id: &str) -> Result<()>;

    /// Read the settings document, creating it with defaults on first access.
    fn load_settings(&self) -> Result<NotifierSettings>;

    /// Live view of the settings document.
    fn subscribe_settings(&self) -> watch::Receiver<NotifierSettings>;

    /// Merge-write into the settings document.
    fn merge_settings(&self, patch: &SettingsPatch) -> Result<()>;

    /// Atomic read-modify-write of the settings document.
    ///
    /// No other writer can commit between the read handed to `f` and the
    /// write of its patch. Returns whether a patch was written.
    fn transact_settings(&self, f: SettingsTxn<'_>) -> Result<bool>;
}
