//! File-backed JSON document store.
//!
//! Key `a/b` maps to `<root>/a/b.json`. Documents are written whole through
//! a temp file and a rename, so a crash never leaves half a document behind.
//! Read-modify-write goes through [`DocumentStore::update`], which holds a
//! per-key lock for the whole sequence. The lock is synchronous and must
//! never be held across an `.await`; the closure API makes that impossible.

use crate::error::{BotError, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};

/// What [`DocumentStore::update`] does with a document that cannot be parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnCorrupt {
    /// Return [`BotError::StoreCorruption`] and leave the file alone.
    Fail,
    /// Log a warning and start over from `T::default()`.
    Reset,
}

/// JSON document store rooted at a directory.
#[derive(Debug)]
pub struct DocumentStore {
    root: PathBuf,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl DocumentStore {
    /// Open (and create if needed) a store rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the root directory cannot be created.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        debug!(root = %root.display(), "opened document store");
        Ok(Self {
            root,
            locks: Mutex::new(HashMap::new()),
        })
    }

    /// Store root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File path backing `key`.
    ///
    /// # Errors
    ///
    /// Returns [`BotError::Store`] if the key is not a valid document key.
    pub fn path_for(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        let mut path = self.root.clone();
        for segment in key.split('/') {
            path.push(segment);
        }
        path.set_extension("json");
        Ok(path)
    }

    /// Load a document; `None` when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`BotError::StoreCorruption`] if the file exists but is not a
    /// valid `T`.
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let path = self.path_for(key)?;
        read_document(key, &path)
    }

    /// Load an optional document, degrading to `T::default()` when it is
    /// missing or malformed.
    pub fn load_or_default<T: DeserializeOwned + Default>(&self, key: &str) -> T {
        match self.load(key) {
            Ok(Some(doc)) => doc,
            Ok(None) => T::default(),
            Err(e) => {
                warn!(key, error = %e, "ignoring unreadable document");
                T::default()
            }
        }
    }

    /// Replace a document atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid or the file cannot be written.
    pub fn save<T: Serialize>(&self, key: &str, document: &T) -> Result<()> {
        let path = self.path_for(key)?;
        let lock = self.key_lock(key);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        write_document(key, &path, document)
    }

    /// Read-modify-write a document under its key lock.
    ///
    /// `f` receives the current document (`T::default()` if missing) and may
    /// mutate it; the document is written back before the lock is released.
    /// Returns whatever `f` returns.
    ///
    /// # Errors
    ///
    /// Returns [`BotError::StoreCorruption`] for an unreadable document, or
    /// an error if the result cannot be written.
    pub fn update<T, R, F>(&self, key: &str, f: F) -> Result<R>
    where
        T: Serialize + DeserializeOwned + Default,
        F: FnOnce(&mut T) -> R,
    {
        self.update_with(key, OnCorrupt::Fail, |doc| Ok(f(doc)))
    }

    /// Like [`update`](Self::update), with a fallible closure and an explicit
    /// corruption policy. When `f` fails nothing is written.
    ///
    /// # Errors
    ///
    /// Returns the closure's error, a corruption error under
    /// [`OnCorrupt::Fail`], or a write error.
    pub fn update_with<T, R, F>(&self, key: &str, on_corrupt: OnCorrupt, f: F) -> Result<R>
    where
        T: Serialize + DeserializeOwned + Default,
        F: FnOnce(&mut T) -> Result<R>,
    {
        let path = self.path_for(key)?;
        let lock = self.key_lock(key);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut document: T = match read_document(key, &path) {
            Ok(doc) => doc.unwrap_or_default(),
            Err(e @ BotError::StoreCorruption { .. }) if on_corrupt == OnCorrupt::Reset => {
                warn!(key, error = %e, "resetting unreadable document");
                T::default()
            }
            Err(e) => return Err(e),
        };
        let result = f(&mut document)?;
        write_document(key, &path, &document)?;
        Ok(result)
    }

    /// Delete a document. Returns `true` if one existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid or the file cannot be removed.
    pub fn remove(&self, key: &str) -> Result<bool> {
        let path = self.path_for(key)?;
        let lock = self.key_lock(key);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        match std::fs::remove_file(&path) {
            Ok(()) => {
                debug!(key, "document removed");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Keys of all documents directly under `prefix` (e.g. `announcements`).
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory cannot be listed.
    pub fn keys_under(&self, prefix: &str) -> Result<Vec<String>> {
        validate_key(prefix)?;
        let dir = prefix
            .split('/')
            .fold(self.root.clone(), |path, segment| path.join(segment));
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut keys = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match path.file_stem().and_then(|s| s.to_str()) {
                Some(stem) if !stem.starts_with('.') => keys.push(format!("{prefix}/{stem}")),
                _ => {}
            }
        }
        keys.sort();
        Ok(keys)
    }

    fn key_lock(&self, key: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(key.to_owned()).or_default())
    }
}

/// Read a static JSON document that lives outside any store.
///
/// # Errors
///
/// Returns [`BotError::StoreCorruption`] if the file is missing or malformed.
pub fn load_json_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let name = path.display().to_string();
    read_document(&name, path)?
        .ok_or_else(|| BotError::corruption(name, "required file is missing"))
}

fn read_document<T: DeserializeOwned>(key: &str, path: &Path) -> Result<Option<T>> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| BotError::corruption(key, e))
}

fn write_document<T: Serialize>(key: &str, path: &Path, document: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(document)
        .map_err(|e| BotError::Store(format!("cannot serialize '{key}': {e}")))?;
    write_atomic(path, &json)
}

fn write_atomic(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let tmp_name = format!(
        ".{}.tmp-{}",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("document"),
        std::process::id()
    );
    let tmp_path = path
        .parent()
        .map(|p| p.join(&tmp_name))
        .unwrap_or_else(|| PathBuf::from(&tmp_name));

    std::fs::write(&tmp_path, content)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

fn validate_key(key: &str) -> Result<()> {
    let valid_segment = |segment: &str| {
        !segment.is_empty()
            && !segment.starts_with('.')
            && segment
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '-' | '_' | '.'))
    };
    if key.split('/').all(valid_segment) {
        Ok(())
    } else {
        Err(BotError::Store(format!("invalid document key '{key}'")))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Counter {
        value: u32,
    }

    fn store() -> (tempfile::TempDir, DocumentStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::open(dir.path().join("data")).unwrap();
        (dir, store)
    }

    fn counter(store: &DocumentStore) -> u32 {
        store.load::<Counter>("counter").unwrap().unwrap().value
    }

    #[test]
    fn keys_map_to_json_files() {
        let (_dir, store) = store();
        let path = store.path_for("cache/duty-roster").unwrap();
        assert!(path.ends_with("cache/duty-roster.json"));
    }

    #[test]
    fn rejects_unsafe_keys() {
        let (_dir, store) = store();
        for key in ["", "../etc/passwd", "a//b", "Cache/x", "a/.hidden", "a b"] {
            assert!(store.path_for(key).is_err(), "accepted {key:?}");
        }
    }

    #[test]
    fn missing_document_is_none() {
        let (_dir, store) = store();
        assert_eq!(store.load::<Counter>("counter").unwrap(), None);
    }

    #[test]
    fn save_then_load() {
        let (_dir, store) = store();
        store.save("nested/counter", &Counter { value: 3 }).unwrap();
        assert_eq!(
            store.load::<Counter>("nested/counter").unwrap(),
            Some(Counter { value: 3 })
        );
    }

    #[test]
    fn save_leaves_no_temp_files() {
        let (_dir, store) = store();
        store.save("counter", &Counter { value: 1 }).unwrap();
        store.save("counter", &Counter { value: 2 }).unwrap();
        let names: Vec<_> = std::fs::read_dir(store.root())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["counter.json".to_owned()]);
    }

    #[test]
    fn corrupt_document_is_reported() {
        let (_dir, store) = store();
        std::fs::write(store.path_for("counter").unwrap(), "{not json").unwrap();
        let err = store.load::<Counter>("counter").unwrap_err();
        assert!(matches!(err, BotError::StoreCorruption { ref key, .. } if key == "counter"));
    }

    #[test]
    fn remove_deletes_document() {
        let (_dir, store) = store();
        store.save("cache/old", &Counter { value: 1 }).unwrap();
        assert!(store.remove("cache/old").unwrap());
        assert_eq!(store.load::<Counter>("cache/old").unwrap(), None);
        assert!(!store.remove("cache/old").unwrap());
        assert!(store.remove("../escape").is_err());
    }

    #[test]
    fn load_or_default_degrades() {
        let (_dir, store) = store();
        std::fs::write(store.path_for("counter").unwrap(), "[]").unwrap();
        assert_eq!(store.load_or_default::<Counter>("counter"), Counter::default());
    }

    #[test]
    fn update_starts_from_default_and_persists() {
        let (_dir, store) = store();
        let seen = store
            .update("counter", |c: &mut Counter| {
                c.value += 5;
                c.value
            })
            .unwrap();
        assert_eq!(seen, 5);
        assert_eq!(counter(&store), 5);
    }

    #[test]
    fn update_refuses_corrupt_document() {
        let (_dir, store) = store();
        let path = store.path_for("counter").unwrap();
        std::fs::write(&path, "garbage").unwrap();
        let result = store.update("counter", |c: &mut Counter| c.value += 1);
        assert!(result.is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "garbage");
    }

    #[test]
    fn update_with_reset_recovers() {
        let (_dir, store) = store();
        std::fs::write(store.path_for("counter").unwrap(), "garbage").unwrap();
        store
            .update_with("counter", OnCorrupt::Reset, |c: &mut Counter| {
                c.value = 9;
                Ok(())
            })
            .unwrap();
        assert_eq!(counter(&store), 9);
    }

    #[test]
    fn failed_closure_writes_nothing() {
        let (_dir, store) = store();
        store.save("counter", &Counter { value: 1 }).unwrap();
        let result: Result<()> = store.update_with("counter", OnCorrupt::Fail, |c: &mut Counter| {
            c.value = 100;
            Err(BotError::Store("nope".into()))
        });
        assert!(result.is_err());
        assert_eq!(counter(&store), 1);
    }

    #[test]
    fn concurrent_updates_are_serialized() {
        let (_dir, store) = store();
        let store = Arc::new(store);
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        store.update("counter", |c: &mut Counter| c.value += 1).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(counter(&store), 200);
    }

    #[test]
    fn keys_under_lists_documents() {
        let (_dir, store) = store();
        store.save("announcements/weekly-menu", &Counter::default()).unwrap();
        store.save("announcements/daily-menu", &Counter::default()).unwrap();
        store.save("other", &Counter::default()).unwrap();
        assert_eq!(
            store.keys_under("announcements").unwrap(),
            vec!["announcements/daily-menu", "announcements/weekly-menu"]
        );
        assert!(store.keys_under("cache").unwrap().is_empty());
    }

    #[test]
    fn load_json_file_requires_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schema.json");
        assert!(load_json_file::<Counter>(&path).is_err());
        std::fs::write(&path, r#"{"value": 4}"#).unwrap();
        assert_eq!(load_json_file::<Counter>(&path).unwrap().value, 4);
    }
}
