use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, StoreError};
use crate::modules::recency::MAX_RECENT_LISTINGS;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct StoreSettings {
    /// Storage key holding the serialized collection.
    pub storage_key: String,
    /// Signal broadcast on the change bus after every mutation.
    pub change_signal: String,
    pub capacity: usize,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            storage_key: "recentListings".to_string(),
            change_signal: "recentListingsUpdated".to_string(),
            capacity: MAX_RECENT_LISTINGS,
        }
    }
}

impl StoreSettings {
    pub fn path_in(dir: &Path) -> PathBuf {
        dir.join("recent_listings_settings.json")
    }

    /// Capacity actually enforced; never below one entry.
    pub fn effective_capacity(&self) -> usize {
        self.capacity.max(1)
    }

    pub fn load(path: &Path) -> Self {
        if path.exists() {
            match fs::read_to_string(path) {
                Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                    log::warn!("[Settings] Failed to parse settings: {}, returning defaults", e);
                    Self::default()
                }),
                Err(e) => {
                    log::warn!("[Settings] Failed to read file: {}, returning defaults", e);
                    Self::default()
                }
            }
        } else {
            Self::default()
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let key = path.display().to_string();
        let write_err = |source| StoreError::Write {
            key: key.clone(),
            source,
        };
        let tmp_path = path.with_extension("tmp");

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }

        let json = serde_json::to_string_pretty(self).map_err(StoreError::Serialize)?;

        // Atomic Write Strategy: Write to tmp, then rename.
        fs::write(&tmp_path, json).map_err(write_err)?;
        fs::rename(tmp_path, path).map_err(write_err)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let settings = StoreSettings::load(&StoreSettings::path_in(dir.path()));
        assert_eq!(settings, StoreSettings::default());
        assert_eq!(settings.capacity, 10);
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = StoreSettings::path_in(&dir.path().join("nested"));
        let settings = StoreSettings {
            storage_key: "viewed".to_string(),
            change_signal: "viewedChanged".to_string(),
            capacity: 5,
        };

        settings.save(&path).unwrap();
        assert_eq!(StoreSettings::load(&path), settings);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = StoreSettings::path_in(dir.path());
        fs::write(&path, r#"{ "capacity": 3, "unknown": true }"#).unwrap();

        let settings = StoreSettings::load(&path);
        assert_eq!(settings.capacity, 3);
        assert_eq!(settings.storage_key, "recentListings");
    }

    #[test]
    fn test_corrupt_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let path = StoreSettings::path_in(dir.path());
        fs::write(&path, "{ not json").unwrap();

        assert_eq!(StoreSettings::load(&path), StoreSettings::default());
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let settings = StoreSettings {
            capacity: 0,
            ..Default::default()
        };
        assert_eq!(settings.effective_capacity(), 1);
    }
}
