//! Authoritative settings store and its file persistence.
//!
//! The store owns the [`GlobalSettings`] of one participant. On the host it
//! is the single authoritative copy and is loaded from and saved to a
//! text file through a [`ConfigPersistence`] collaborator. On a follower it
//! is a cache replaced wholesale by every settings blob from the host.

use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;

use tracing::{info, info_span, warn};

use crate::error::ValidationError;
use crate::settings::{GlobalSettings, SettingKey};

/// Errors from reading or writing the settings file.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The settings file exists but could not be read.
    #[error("failed to read '{file}': {source}")]
    Read {
        /// File name within the persistence area.
        file: String,
        /// The underlying I/O error.
        source: io::Error,
    },

    /// The settings file could not be written.
    #[error("failed to write '{file}': {source}")]
    Write {
        /// File name within the persistence area.
        file: String,
        /// The underlying I/O error.
        source: io::Error,
    },

    /// The settings file is not valid UTF-8 text.
    #[error("'{file}' is not a text file")]
    NotText {
        /// File name within the persistence area.
        file: String,
    },
}

/// Byte-level storage for the settings file.
pub trait ConfigPersistence {
    /// Read a whole file. `Ok(None)` when the file does not exist.
    fn read(&self, file: &str) -> io::Result<Option<Vec<u8>>>;

    /// Create or replace a whole file.
    fn write(&mut self, file: &str, contents: &[u8]) -> io::Result<()>;
}

/// Settings files stored in a directory on disk.
#[derive(Debug, Clone)]
pub struct FileConfigPersistence {
    dir: PathBuf,
}

impl FileConfigPersistence {
    /// Store files under `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl ConfigPersistence for FileConfigPersistence {
    fn read(&self, file: &str) -> io::Result<Option<Vec<u8>>> {
        match std::fs::read(self.dir.join(file)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn write(&mut self, file: &str, contents: &[u8]) -> io::Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(self.dir.join(file), contents)
    }
}

/// In-memory settings files, for followers and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryConfigPersistence {
    files: BTreeMap<String, Vec<u8>>,
}

impl MemoryConfigPersistence {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that already holds one file.
    pub fn with_file(file: &str, contents: &str) -> Self {
        let mut store = Self::new();
        store
            .files
            .insert(file.to_owned(), contents.as_bytes().to_vec());
        store
    }

    /// Contents of a file as text, if present.
    pub fn text(&self, file: &str) -> Option<String> {
        self.files
            .get(file)
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }
}

impl ConfigPersistence for MemoryConfigPersistence {
    fn read(&self, file: &str) -> io::Result<Option<Vec<u8>>> {
        Ok(self.files.get(file).cloned())
    }

    fn write(&mut self, file: &str, contents: &[u8]) -> io::Result<()> {
        self.files.insert(file.to_owned(), contents.to_vec());
        Ok(())
    }
}

/// What a load found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// No settings file exists yet; the current values are unchanged.
    Missing,
    /// The file was read. Rejected lines are listed, the rest applied.
    Loaded {
        /// Lines that failed validation.
        rejected: Vec<ValidationError>,
    },
}

/// The settings of one participant plus the name of their file.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    settings: GlobalSettings,
    file: String,
}

impl ConfigStore {
    /// A store holding the defaults, persisted as `file`.
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            settings: GlobalSettings::default(),
            file: file.into(),
        }
    }

    /// The current settings.
    pub const fn settings(&self) -> &GlobalSettings {
        &self.settings
    }

    /// Name of the settings file.
    pub fn file(&self) -> &str {
        &self.file
    }

    /// Validate and store one setting, echoing the stored value.
    pub fn set(&mut self, name: &str, raw: &str) -> Result<(SettingKey, String), ValidationError> {
        let result = self.settings.set_by_name(name, raw);
        match &result {
            Ok((key, value)) => info!(setting = %key, value = %value, "Setting changed"),
            Err(e) => warn!(error = %e, "Setting rejected"),
        }
        result
    }

    /// The comment-free text sent on the settings channel.
    pub fn wire_text(&self) -> String {
        self.settings.serialize(false)
    }

    /// Replace the settings wholesale with a blob received from a peer.
    ///
    /// The blob is parsed on top of the defaults, so keys it omits fall
    /// back to their default rather than keeping a stale value.
    pub fn replace_from_blob(&mut self, text: &str) -> Vec<ValidationError> {
        let parsed = GlobalSettings::from_text(text);
        for rejected in &parsed.rejected {
            warn!(error = %rejected, "Failed to parse settings line");
        }
        self.settings = parsed.settings;
        parsed.rejected
    }

    /// Restore the defaults. Nothing is written.
    pub fn reset(&mut self) {
        info!("Settings reset to defaults");
        self.settings = GlobalSettings::default();
    }

    /// Read the settings file and apply it on top of the current values.
    pub fn load(&mut self, persistence: &dyn ConfigPersistence) -> Result<LoadOutcome, StoreError> {
        let _span = info_span!("config_load", file = %self.file).entered();

        let bytes = persistence.read(&self.file).map_err(|source| StoreError::Read {
            file: self.file.clone(),
            source,
        })?;
        let Some(bytes) = bytes else {
            info!("Settings file does not exist");
            return Ok(LoadOutcome::Missing);
        };
        let text = String::from_utf8(bytes).map_err(|_err| StoreError::NotText {
            file: self.file.clone(),
        })?;

        let rejected = self.settings.apply_text(&text);
        for line in &rejected {
            warn!(error = %line, "Failed to parse settings line");
        }
        info!(rejected = rejected.len(), "Settings file loaded");
        Ok(LoadOutcome::Loaded { rejected })
    }

    /// Write the settings file, comments included.
    pub fn save(&self, persistence: &mut dyn ConfigPersistence) -> Result<(), StoreError> {
        let _span = info_span!("config_save", file = %self.file).entered();

        let mut text = self.settings.serialize(true);
        text.push('\n');
        persistence
            .write(&self.file, text.as_bytes())
            .map_err(|source| StoreError::Write {
                file: self.file.clone(),
                source,
            })?;
        info!("Settings file saved");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const FILE: &str = "natural-gravity.cfg";

    struct BrokenDisk;

    impl ConfigPersistence for BrokenDisk {
        fn read(&self, _file: &str) -> io::Result<Option<Vec<u8>>> {
            Err(io::Error::other("disk on fire"))
        }

        fn write(&mut self, _file: &str, _contents: &[u8]) -> io::Result<()> {
            Err(io::Error::other("disk on fire"))
        }
    }

    #[test]
    fn load_of_missing_file_keeps_current_values() {
        let mut store = ConfigStore::new(FILE);
        store.set("jetpack", "5").unwrap();
        let outcome = store.load(&MemoryConfigPersistence::new()).unwrap();
        assert_eq!(outcome, LoadOutcome::Missing);
        assert_eq!(store.settings().jetpack, 5);
    }

    #[test]
    fn save_then_load_restores_settings() {
        let mut disk = MemoryConfigPersistence::new();
        let mut store = ConfigStore::new(FILE);
        store.set("mass_limit", "1234").unwrap();
        store.set("asteroid_prefix", "a_, b_").unwrap();
        store.save(&mut disk).unwrap();
        assert!(disk.text(FILE).unwrap().contains("// "));

        let mut fresh = ConfigStore::new(FILE);
        let outcome = fresh.load(&disk).unwrap();
        assert_eq!(outcome, LoadOutcome::Loaded { rejected: vec![] });
        assert_eq!(fresh.settings(), store.settings());
    }

    #[test]
    fn load_reports_rejected_lines() {
        let disk = MemoryConfigPersistence::with_file(FILE, "jetpack=lots\nnotify=false\n");
        let mut store = ConfigStore::new(FILE);
        let outcome = store.load(&disk).unwrap();
        assert!(matches!(&outcome, LoadOutcome::Loaded { rejected } if rejected.len() == 1));
        assert!(!store.settings().notify);
    }

    #[test]
    fn persistence_failures_surface_as_store_errors() {
        let mut store = ConfigStore::new(FILE);
        assert!(matches!(store.load(&BrokenDisk), Err(StoreError::Read { .. })));
        assert!(matches!(
            store.save(&mut BrokenDisk),
            Err(StoreError::Write { .. })
        ));
    }

    #[test]
    fn blob_replaces_instead_of_merging() {
        let mut store = ConfigStore::new(FILE);
        store.set("jetpack", "5").unwrap();
        let rejected = store.replace_from_blob("notify=false");
        assert!(rejected.is_empty());
        assert_eq!(store.settings().jetpack, 100);
        assert!(!store.settings().notify);
    }

    #[test]
    fn failed_set_leaves_value_untouched() {
        let mut store = ConfigStore::new(FILE);
        assert!(store.set("radius_min", "wide").is_err());
        assert_eq!(store.settings().radius_min, 1000);
    }
}
