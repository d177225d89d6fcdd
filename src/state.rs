// Process-wide wiring: one bus and one store shared by every UI surface.
// Tests build their own AppState instead of touching the global.

use std::sync::{Arc, OnceLock};

use crate::bus::ChangeBus;
use crate::recent_listings::RecentListingsStore;
use crate::settings::StoreSettings;
use crate::storage::Storage;

pub struct AppState {
    pub bus: Arc<ChangeBus>,
    pub recent_listings: RecentListingsStore,
}

impl AppState {
    pub fn new(settings: StoreSettings, storage: Arc<dyn Storage>) -> Self {
        let bus = Arc::new(ChangeBus::new());
        let recent_listings = RecentListingsStore::new(storage, bus.clone(), settings);
        Self {
            bus,
            recent_listings,
        }
    }
}

static GLOBAL: OnceLock<AppState> = OnceLock::new();

/// Installs the process-wide state. A second install is refused and the
/// rejected state handed back.
pub fn init_global(state: AppState) -> Result<(), AppState> {
    GLOBAL.set(state)?;
    log::info!("[State] Recent listings store installed");
    Ok(())
}

pub fn global() -> Option<&'static AppState> {
    GLOBAL.get()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::listing::ListingInput;
    use crate::storage::MemoryStorage;

    #[test]
    fn test_state_store_uses_state_bus() {
        let state = AppState::new(StoreSettings::default(), Arc::new(MemoryStorage::new()));
        let _sub = state.recent_listings.subscribe(|_| {});
        assert_eq!(state.bus.listener_count("recentListingsUpdated"), 1);

        state.recent_listings.add(ListingInput::new("1"));
        assert_eq!(state.recent_listings.get_all().ids(), ["1"]);
    }

    #[test]
    fn test_global_installs_once() {
        let first = AppState::new(StoreSettings::default(), Arc::new(MemoryStorage::new()));
        let second = AppState::new(StoreSettings::default(), Arc::new(MemoryStorage::new()));

        assert!(init_global(first).is_ok());
        assert!(init_global(second).is_err());
        assert!(global().is_some());
    }
}
