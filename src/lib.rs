// Recent Listings Library Entry Point
// Bounded "recently viewed listings" cache shared by independent UI surfaces.
// The host application installs the logger; this crate only emits through `log`.

// Core modules
pub mod bus;
pub mod error;
pub mod recent_listings;
pub mod settings;
pub mod storage;

// Shared state
pub mod state;

// Pure logic modules (no storage or bus imports)
pub mod modules;

pub use bus::{ChangeBus, Subscription};
pub use error::StoreError;
pub use modules::listing::{ListingInput, ListingSummary};
pub use modules::recency::MAX_RECENT_LISTINGS;
pub use recent_listings::{RecentListings, RecentListingsStore};
pub use settings::StoreSettings;
pub use storage::{FileStorage, MemoryStorage, Storage};
