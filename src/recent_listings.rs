use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::bus::{ChangeBus, Subscription};
use crate::error::{Result, StoreError};
use crate::modules::listing::{ListingInput, ListingSummary};
use crate::modules::recency;
use crate::settings::StoreSettings;
use crate::storage::Storage;

pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;
pub type Diagnostics = Arc<dyn Fn(&StoreError) + Send + Sync>;

/// Recently viewed listings, most recent first, unique by id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecentListings(Vec<ListingSummary>);

impl RecentListings {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ListingSummary> {
        self.0.iter()
    }

    pub fn get(&self, index: usize) -> Option<&ListingSummary> {
        self.0.get(index)
    }

    pub fn find(&self, id: &str) -> Option<&ListingSummary> {
        self.0.iter().find(|e| e.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.find(id).is_some()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.0.iter().map(|e| e.id.as_str()).collect()
    }

    pub fn as_slice(&self) -> &[ListingSummary] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<ListingSummary> {
        self.0
    }
}

impl IntoIterator for RecentListings {
    type Item = ListingSummary;
    type IntoIter = std::vec::IntoIter<ListingSummary>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a RecentListings {
    type Item = &'a ListingSummary;
    type IntoIter = std::slice::Iter<'a, ListingSummary>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Read side of the store. Subscribers hold one of these instead of the
/// store so that a listener never keeps the bus alive through itself.
#[derive(Clone)]
struct Reader {
    storage: Arc<dyn Storage>,
    key: String,
    capacity: usize,
    diagnostics: Option<Diagnostics>,
}

impl Reader {
    fn read(&self) -> RecentListings {
        match self.try_read() {
            Ok(listings) => listings,
            Err(e) => {
                log::warn!(
                    "[RecentListings] Ignoring unreadable value under '{}': {}",
                    self.key,
                    e
                );
                report(&self.diagnostics, &e);
                RecentListings::default()
            }
        }
    }

    fn try_read(&self) -> Result<RecentListings> {
        let Some(raw) = self.storage.get(&self.key)? else {
            return Ok(RecentListings::default());
        };
        let mut entries: Vec<ListingSummary> =
            serde_json::from_str(&raw).map_err(StoreError::Corrupt)?;

        if recency::normalize(&mut entries, self.capacity) {
            log::debug!(
                "[RecentListings] Normalized persisted value under '{}' to {} entries",
                self.key,
                entries.len()
            );
        }
        Ok(RecentListings(entries))
    }
}

fn report(diagnostics: &Option<Diagnostics>, error: &StoreError) {
    if let Some(hook) = diagnostics {
        hook(error);
    }
}

/// Bounded cache of recently viewed listings.
///
/// The store keeps no entries in memory: every operation re-reads the
/// persistence slot, and every mutation writes the whole collection back
/// and broadcasts the change signal. Stores built over the same storage,
/// bus and settings therefore see each other's changes. Concurrent writers
/// are not coordinated; the last write wins.
///
/// No public operation returns an error or panics on storage trouble.
/// Failures are logged and passed to the diagnostics hook, if any.
#[derive(Clone)]
pub struct RecentListingsStore {
    storage: Arc<dyn Storage>,
    bus: Arc<ChangeBus>,
    settings: StoreSettings,
    clock: Clock,
    diagnostics: Option<Diagnostics>,
}

impl RecentListingsStore {
    pub fn new(storage: Arc<dyn Storage>, bus: Arc<ChangeBus>, settings: StoreSettings) -> Self {
        Self {
            storage,
            bus,
            settings,
            clock: Arc::new(Utc::now),
            diagnostics: None,
        }
    }

    /// Source of `viewedAt` timestamps.
    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> DateTime<Utc> + Send + Sync + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    /// Called with every failure the store swallows.
    pub fn with_diagnostics<F>(mut self, hook: F) -> Self
    where
        F: Fn(&StoreError) + Send + Sync + 'static,
    {
        self.diagnostics = Some(Arc::new(hook));
        self
    }

    pub fn settings(&self) -> &StoreSettings {
        &self.settings
    }

    fn reader(&self) -> Reader {
        Reader {
            storage: self.storage.clone(),
            key: self.settings.storage_key.clone(),
            capacity: self.settings.effective_capacity(),
            diagnostics: self.diagnostics.clone(),
        }
    }

    /// The persisted collection, or an empty one if nothing usable is stored.
    pub fn get_all(&self) -> RecentListings {
        self.reader().read()
    }

    pub fn len(&self) -> usize {
        self.get_all().len()
    }

    pub fn is_empty(&self) -> bool {
        self.get_all().is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get_all().contains(id)
    }

    /// Records a view: the listing moves to the front with a fresh
    /// `viewedAt`, replacing any older entry with the same id.
    pub fn add(&self, input: ListingInput) {
        if let Err(e) = self.try_add(input) {
            self.fail("add", &e);
        }
    }

    /// Same as [`add`](Self::add) for loosely-typed listing data.
    pub fn add_value(&self, value: &Value) {
        match ListingInput::from_value(value) {
            Ok(input) => self.add(input),
            Err(e) => self.fail("add", &e),
        }
    }

    fn try_add(&self, input: ListingInput) -> Result<()> {
        input.validate()?;

        let mut entries = self.load_for_update()?;
        let summary = ListingSummary::from_input(input, (self.clock)());
        let id = summary.id.clone();
        recency::promote(&mut entries, summary, self.settings.effective_capacity());

        self.persist(&entries)?;
        log::debug!(
            "[RecentListings] Viewed listing '{}' ({} cached)",
            id,
            entries.len()
        );
        self.notify();
        Ok(())
    }

    /// Drops the entry with `id` and returns what remains. If the write
    /// fails the collection as it was before the call is returned; if the
    /// slot cannot be read nothing is written and an empty collection is
    /// returned.
    pub fn remove(&self, id: &str) -> RecentListings {
        let current = match self.load_for_update() {
            Ok(entries) => RecentListings(entries),
            Err(e) => {
                self.fail("remove", &e);
                return RecentListings::default();
            }
        };
        let mut entries = current.as_slice().to_vec();
        let removed = recency::remove_id(&mut entries, id);

        match self.persist(&entries) {
            Ok(()) => {
                if removed {
                    log::debug!("[RecentListings] Removed listing '{}'", id);
                }
                self.notify();
                RecentListings(entries)
            }
            Err(e) => {
                self.fail("remove", &e);
                current
            }
        }
    }

    /// Persists an empty collection.
    pub fn clear(&self) {
        match self.persist(&[]) {
            Ok(()) => {
                log::debug!("[RecentListings] Cleared");
                self.notify();
            }
            Err(e) => self.fail("clear", &e),
        }
    }

    /// Calls `callback` with a fresh copy of the collection after every
    /// change signalled on the shared bus, from this store or any other
    /// store using the same signal. Nothing is delivered for changes made
    /// before subscribing; call [`get_all`](Self::get_all) for the
    /// current state.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(RecentListings) + Send + Sync + 'static,
    {
        let reader = self.reader();
        self.bus
            .listen(&self.settings.change_signal, move || callback(reader.read()))
    }

    /// Current entries for a read-modify-write. A corrupt value counts as
    /// empty so the next write replaces it; any other read failure aborts
    /// the mutation so the stored copy is left alone.
    fn load_for_update(&self) -> Result<Vec<ListingSummary>> {
        match self.reader().try_read() {
            Ok(listings) => Ok(listings.into_vec()),
            Err(e @ StoreError::Corrupt(_)) => {
                self.fail("read", &e);
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    fn persist(&self, entries: &[ListingSummary]) -> Result<()> {
        let json = serde_json::to_string(entries).map_err(StoreError::Serialize)?;
        self.storage.set(&self.settings.storage_key, &json)
    }

    fn notify(&self) {
        self.bus.emit(&self.settings.change_signal);
    }

    fn fail(&self, operation: &str, error: &StoreError) {
        match error {
            StoreError::InvalidListing(_) | StoreError::Corrupt(_) => {
                log::warn!("[RecentListings] {} skipped: {}", operation, error)
            }
            _ => log::error!("[RecentListings] {} failed: {}", operation, error),
        }
        report(&self.diagnostics, error);
    }
}

impl std::fmt::Debug for RecentListingsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecentListingsStore")
            .field("settings", &self.settings)
            .field("bus", &self.bus)
            .field("diagnostics", &self.diagnostics.is_some())
            .finish()
    }
}
