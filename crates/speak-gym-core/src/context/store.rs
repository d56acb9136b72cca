use crate::{CoreError, CoreResult};

use std::{
    collections::BTreeMap,
    fs,
    io::Write,
    panic::Location,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use chrono::{Local, NaiveDate};
use error_location::ErrorLocation;
use tracing::{debug, instrument};

/// Client-local string key/value persistence.
pub trait KeyValueStore: Send + Sync {
    /// Read a value.
    fn get(&self, key: &str) -> CoreResult<Option<String>>;
    /// Write a value.
    fn set(&self, key: &str, value: &str) -> CoreResult<()>;
    /// Delete a value; missing keys are ignored.
    fn remove(&self, key: &str) -> CoreResult<()>;
    /// Every key currently stored.
    fn keys(&self) -> CoreResult<Vec<String>>;
}

/// In-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> CoreResult<Option<String>> {
        Ok(lock(&self.values)?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> CoreResult<()> {
        lock(&self.values)?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> CoreResult<()> {
        lock(&self.values)?.remove(key);
        Ok(())
    }

    fn keys(&self) -> CoreResult<Vec<String>> {
        Ok(lock(&self.values)?.keys().cloned().collect())
    }
}

/// Store backed by a single JSON object on disk.
///
/// Every write rewrites the file through a temp file and rename, so a crash
/// mid-write leaves the previous contents intact.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    values: Mutex<BTreeMap<String, String>>,
}

impl JsonFileStore {
    /// Open the store at `path`, starting empty if the file does not exist.
    #[track_caller]
    #[instrument(skip_all)]
    pub fn open(path: impl AsRef<Path>) -> CoreResult<Self> {
        let path = path.as_ref().to_path_buf();

        let values = if path.exists() {
            let contents = fs::read_to_string(&path).map_err(|e| CoreError::StorageError {
                reason: format!("Failed to read {:?}: {}", path, e),
                location: ErrorLocation::from(Location::caller()),
            })?;
            serde_json::from_str(&contents).map_err(|e| CoreError::StorageError {
                reason: format!("Failed to parse {:?}: {}", path, e),
                location: ErrorLocation::from(Location::caller()),
            })?
        } else {
            BTreeMap::new()
        };

        debug!(entries = values.len(), "Key/value store opened");

        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    #[track_caller]
    fn persist(&self, values: &BTreeMap<String, String>) -> CoreResult<()> {
        let storage_error = |action: &str, e: &dyn std::fmt::Display| CoreError::StorageError {
            reason: format!("Failed to {} {:?}: {}", action, self.path, e),
            location: ErrorLocation::from(Location::caller()),
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| storage_error("create directory for", &e))?;
            }
        }

        let contents =
            serde_json::to_string_pretty(values).map_err(|e| storage_error("serialize", &e))?;

        let temp_path = self.path.with_extension("json.tmp");
        let mut temp_file =
            fs::File::create(&temp_path).map_err(|e| storage_error("create temp file for", &e))?;
        temp_file
            .write_all(contents.as_bytes())
            .map_err(|e| storage_error("write", &e))?;
        temp_file
            .sync_all()
            .map_err(|e| storage_error("sync", &e))?;
        fs::rename(&temp_path, &self.path).map_err(|e| storage_error("replace", &e))?;

        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> CoreResult<Option<String>> {
        Ok(lock(&self.values)?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> CoreResult<()> {
        let mut values = lock(&self.values)?;
        values.insert(key.to_string(), value.to_string());
        self.persist(&values)
    }

    fn remove(&self, key: &str) -> CoreResult<()> {
        let mut values = lock(&self.values)?;
        if values.remove(key).is_some() {
            self.persist(&values)?;
        }
        Ok(())
    }

    fn keys(&self) -> CoreResult<Vec<String>> {
        Ok(lock(&self.values)?.keys().cloned().collect())
    }
}

#[track_caller]
fn lock<T>(mutex: &Mutex<T>) -> CoreResult<std::sync::MutexGuard<'_, T>> {
    mutex.lock().map_err(|e| CoreError::StorageError {
        reason: format!("Store lock poisoned: {}", e),
        location: ErrorLocation::from(Location::caller()),
    })
}

const THEME_KEY: &str = "theme";
const ANCHOR_KEY: &str = "anchor_phrase";

/// Values that only live for one calendar day.
///
/// Keys are written as `<date>:<name>`, so yesterday's theme is simply not
/// found today. Writing for a day deletes every entry from earlier days.
#[derive(Clone)]
pub struct DailyStore {
    store: Arc<dyn KeyValueStore>,
}

impl DailyStore {
    /// Wrap a key/value store.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// The local calendar day.
    pub fn today() -> NaiveDate {
        Local::now().date_naive()
    }

    /// Read `name` for `day`.
    pub fn get(&self, day: NaiveDate, name: &str) -> CoreResult<Option<String>> {
        self.store.get(&Self::key(day, name))
    }

    /// Write `name` for `day`, dropping entries left over from earlier days.
    pub fn set(&self, day: NaiveDate, name: &str, value: &str) -> CoreResult<()> {
        self.store.set(&Self::key(day, name), value)?;
        self.prune_before(day)
    }

    /// Delete `name` for `day`.
    pub fn remove(&self, day: NaiveDate, name: &str) -> CoreResult<()> {
        self.store.remove(&Self::key(day, name))
    }

    /// Theme chosen on `day`.
    pub fn theme(&self, day: NaiveDate) -> CoreResult<Option<String>> {
        self.get(day, THEME_KEY)
    }

    /// Remember the theme chosen on `day`.
    pub fn set_theme(&self, day: NaiveDate, theme: &str) -> CoreResult<()> {
        self.set(day, THEME_KEY, theme)
    }

    /// Anchor phrase pinned on `day`.
    pub fn anchor_phrase(&self, day: NaiveDate) -> CoreResult<Option<String>> {
        self.get(day, ANCHOR_KEY)
    }

    /// Pin an anchor phrase for `day`.
    pub fn set_anchor_phrase(&self, day: NaiveDate, phrase: &str) -> CoreResult<()> {
        self.set(day, ANCHOR_KEY, phrase)
    }

    /// Unpin the anchor phrase for `day`.
    pub fn clear_anchor_phrase(&self, day: NaiveDate) -> CoreResult<()> {
        self.remove(day, ANCHOR_KEY)
    }

    /// Delete every dated entry older than `day`; undated keys are left alone.
    #[instrument(skip(self))]
    pub fn prune_before(&self, day: NaiveDate) -> CoreResult<()> {
        let stale: Vec<String> = self
            .store
            .keys()?
            .into_iter()
            .filter(|key| Self::day_of(key).is_some_and(|d| d < day))
            .collect();

        for key in &stale {
            self.store.remove(key)?;
        }
        if !stale.is_empty() {
            debug!(pruned = stale.len(), "Earlier days pruned");
        }
        Ok(())
    }

    fn day_of(key: &str) -> Option<NaiveDate> {
        let (date, _) = key.split_once(':')?;
        NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
    }

    fn key(day: NaiveDate, name: &str) -> String {
        format!("{}:{}", day.format("%Y-%m-%d"), name)
    }
}
