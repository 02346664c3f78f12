//! Durable key-value slots.
//!
//! The clinic persists whole collections as JSON text under a handful of named slots.
//! [`KeyValueStore`] is the seam between the store and the medium:
//!
//! - [`FileKeyValueStore`] keeps one `<key>.json` file per slot under a data directory.
//! - [`MemoryKeyValueStore`] keeps slots in an ordered map (tests, throwaway sessions).
//!
//! ## Storage Layout
//!
//! ```text
//! clinic_data/
//!   patients.json
//!   incidents.json
//!   currentUser.json
//! ```

use crate::constants::SLOT_FILE_EXTENSION;
use crate::{ClinicError, ClinicResult};
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

/// Named text slots with whole-value reads and writes.
pub trait KeyValueStore {
    /// Returns the slot's value, or `None` if it has never been written.
    fn get(&self, key: &str) -> ClinicResult<Option<String>>;

    /// Writes several slots as one step.
    ///
    /// Implementations must not leave a subset of `entries` applied when they return
    /// an error, as far as the medium allows.
    fn set_many(&mut self, entries: &[(&str, String)]) -> ClinicResult<()>;

    /// Removes a slot. Removing a missing slot is not an error.
    fn remove(&mut self, key: &str) -> ClinicResult<()>;

    fn set(&mut self, key: &str, value: String) -> ClinicResult<()> {
        self.set_many(&[(key, value)])
    }
}

/// Slot names double as file names, so they are restricted to `[A-Za-z0-9_-]`.
pub fn validate_key(key: &str) -> ClinicResult<()> {
    let valid = !key.is_empty()
        && key
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
    if valid {
        Ok(())
    } else {
        Err(ClinicError::InvalidKey(key.to_string()))
    }
}

/// In-memory slots.
#[derive(Clone, Debug, Default)]
pub struct MemoryKeyValueStore {
    slots: BTreeMap<String, String>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> ClinicResult<Option<String>> {
        validate_key(key)?;
        Ok(self.slots.get(key).cloned())
    }

    fn set_many(&mut self, entries: &[(&str, String)]) -> ClinicResult<()> {
        for (key, _) in entries {
            validate_key(key)?;
        }
        for (key, value) in entries {
            self.slots.insert((*key).to_string(), value.clone());
        }
        Ok(())
    }

    fn remove(&mut self, key: &str) -> ClinicResult<()> {
        validate_key(key)?;
        self.slots.remove(key);
        Ok(())
    }
}

/// One JSON file per slot under a data directory.
///
/// Writes go to `<key>.json.tmp` and are renamed into place, so a reader never sees a
/// half-written slot. [`set_many`](KeyValueStore::set_many) writes every temporary file
/// before renaming any of them; if a rename fails, slots already renamed are put back
/// and the remaining temporary files are removed.
#[derive(Clone, Debug)]
pub struct FileKeyValueStore {
    dir: PathBuf,
}

impl FileKeyValueStore {
    /// The directory is created lazily on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn slot_path(&self, key: &str) -> ClinicResult<PathBuf> {
        validate_key(key)?;
        Ok(self.dir.join(format!("{key}.{SLOT_FILE_EXTENSION}")))
    }

    fn temp_path(slot_path: &Path) -> PathBuf {
        let mut name = slot_path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }
}

fn read_previous(slot: &Path) -> io::Result<Option<String>> {
    match fs::read_to_string(slot) {
        Ok(contents) => Ok(Some(contents)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Puts a slot back the way it was before a failed multi-slot write.
fn restore(slot: &Path, previous: Option<&str>) {
    let result = match previous {
        Some(contents) => fs::write(slot, contents),
        None => fs::remove_file(slot),
    };
    if let Err(e) = result {
        tracing::error!("failed to roll back {}: {}", slot.display(), e);
    }
}

impl KeyValueStore for FileKeyValueStore {
    fn get(&self, key: &str) -> ClinicResult<Option<String>> {
        let path = self.slot_path(key)?;
        match fs::read_to_string(&path) {
            Ok(contents) => {
                tracing::debug!("read slot {} ({} bytes)", key, contents.len());
                Ok(Some(contents))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ClinicError::SlotRead {
                key: key.to_string(),
                source: e,
            }),
        }
    }

    fn set_many(&mut self, entries: &[(&str, String)]) -> ClinicResult<()> {
        let mut staged = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            let slot = self.slot_path(key)?;
            staged.push((*key, slot, value));
        }

        fs::create_dir_all(&self.dir).map_err(ClinicError::StorageDirCreation)?;

        fn discard(paths: &[PathBuf]) {
            for tmp in paths {
                let _ = fs::remove_file(tmp);
            }
        }

        let mut written = Vec::with_capacity(staged.len());
        for (key, slot, value) in &staged {
            let tmp = Self::temp_path(slot);
            if let Err(e) = fs::write(&tmp, value.as_bytes()) {
                discard(&written);
                let _ = fs::remove_file(&tmp);
                return Err(ClinicError::SlotWrite {
                    key: key.to_string(),
                    source: e,
                });
            }
            written.push(tmp);
        }

        // Slots already renamed into place, with what they held before.
        let mut applied: Vec<(&Path, Option<String>)> = Vec::with_capacity(staged.len());
        for (index, ((key, slot, value), tmp)) in staged.iter().zip(&written).enumerate() {
            let renamed = read_previous(slot).and_then(|previous| {
                fs::rename(tmp, slot)?;
                Ok(previous)
            });
            match renamed {
                Ok(previous) => {
                    applied.push((slot.as_path(), previous));
                    tracing::debug!("wrote slot {} ({} bytes)", key, value.len());
                }
                Err(e) => {
                    discard(&written[index..]);
                    for (slot, previous) in applied.iter().rev() {
                        restore(slot, previous.as_deref());
                    }
                    return Err(ClinicError::SlotWrite {
                        key: key.to_string(),
                        source: e,
                    });
                }
            }
        }

        Ok(())
    }

    fn remove(&mut self, key: &str) -> ClinicResult<()> {
        let path = self.slot_path(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ClinicError::SlotWrite {
                key: key.to_string(),
                source: e,
            }),
        }
    }
}
