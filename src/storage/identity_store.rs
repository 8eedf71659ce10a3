//! Durable username -> enrollment record mapping.
//!
//! The whole store lives in one JSON document keyed by username:
//!
//! ```json
//! { "alice": { "name": "Alice", "face_encoding": [0.1, 0.2, 0.3] } }
//! ```
//!
//! The in-memory map is the single source of truth while the process runs.
//! Writes go through a writer lock and reach disk via temp-file + rename, so
//! a concurrent reader of the file never sees a partial document.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::common::{FaceAuthError, Result};
use crate::core::descriptor::validate_descriptor;
use crate::storage::record::EnrollmentRecord;

#[derive(Deserialize)]
struct StoredEntry {
    #[serde(default)]
    name: Option<String>,
    face_encoding: Vec<f64>,
}

#[derive(Serialize)]
struct StoredEntryRef<'a> {
    name: &'a str,
    face_encoding: &'a [f64],
}

pub struct IdentityStore {
    path: PathBuf,
    records: RwLock<HashMap<String, EnrollmentRecord>>,
    writer: Mutex<()>,
}

impl IdentityStore {
    /// Loads the store at `path`. A missing file is the first-run state and
    /// yields an empty store.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let records = match read_store_file(&path)? {
            Some(bytes) => {
                let records = decode_records(&path, &bytes)?;
                tracing::info!("Loaded {} enrollment record(s) from {}", records.len(), path.display());
                records
            }
            None => {
                tracing::info!("No identity store at {}, starting empty", path.display());
                HashMap::new()
            }
        };

        Ok(Self {
            path,
            records: RwLock::new(records),
            writer: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, username: &str) -> bool {
        self.read_records().contains_key(username)
    }

    pub fn get(&self, username: &str) -> Result<EnrollmentRecord> {
        self.read_records()
            .get(username)
            .cloned()
            .ok_or_else(|| FaceAuthError::NotFound(username.to_string()))
    }

    pub fn len(&self) -> usize {
        self.read_records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_records().is_empty()
    }

    /// Sorted list of enrolled usernames.
    pub fn usernames(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read_records().keys().cloned().collect();
        names.sort();
        names
    }

    /// Descriptor length shared by every record, `None` while empty.
    pub fn dimension(&self) -> Option<usize> {
        dimension_of(&self.read_records())
    }

    /// Inserts a record into memory only. Call `persist` to make it durable,
    /// or use `commit` to do both atomically.
    pub fn put(&self, record: EnrollmentRecord) -> Result<()> {
        let _guard = self.lock_writer();
        let mut records = self.write_records();
        check_insertable(&records, &record)?;
        records.insert(record.username().to_string(), record);
        Ok(())
    }

    /// Writes the current mapping to disk.
    pub fn persist(&self) -> Result<()> {
        let _guard = self.lock_writer();
        let records = self.read_records();
        write_store_file(&self.path, records.values())
    }

    /// Inserts and persists under the writer lock. The record becomes
    /// visible to readers only after it is on disk; if the write fails the
    /// store is left unchanged.
    pub fn commit(&self, record: EnrollmentRecord) -> Result<()> {
        let _guard = self.lock_writer();

        {
            let records = self.read_records();
            check_insertable(&records, &record)?;
            write_store_file(&self.path, records.values().chain(std::iter::once(&record)))?;
        }

        tracing::debug!("Persisted enrollment record for {}", record.username());
        self.write_records().insert(record.username().to_string(), record);
        Ok(())
    }

    // Writers never panic while holding these locks, so a poisoned lock
    // still guards a consistent map.
    fn read_records(&self) -> RwLockReadGuard<'_, HashMap<String, EnrollmentRecord>> {
        self.records.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_records(&self) -> RwLockWriteGuard<'_, HashMap<String, EnrollmentRecord>> {
        self.records.write().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_writer(&self) -> std::sync::MutexGuard<'_, ()> {
        self.writer.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn dimension_of(records: &HashMap<String, EnrollmentRecord>) -> Option<usize> {
    records.values().next().map(|record| record.descriptor().len())
}

fn check_insertable(records: &HashMap<String, EnrollmentRecord>, record: &EnrollmentRecord) -> Result<()> {
    if records.contains_key(record.username()) {
        return Err(FaceAuthError::AlreadyExists(record.username().to_string()));
    }
    if let Some(expected) = dimension_of(records) {
        let found = record.descriptor().len();
        if found != expected {
            return Err(FaceAuthError::DescriptorShapeMismatch { expected, found });
        }
    }
    Ok(())
}

fn read_store_file(path: &Path) -> Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn decode_records(path: &Path, bytes: &[u8]) -> Result<HashMap<String, EnrollmentRecord>> {
    let corrupt = |message: String| FaceAuthError::StorageCorrupt {
        path: path.to_path_buf(),
        message,
    };

    let entries: BTreeMap<String, StoredEntry> = serde_json::from_slice(bytes)
        .map_err(|e| corrupt(format!("invalid store contents: {}", e)))?;

    let mut dimension = None;
    let mut records = HashMap::with_capacity(entries.len());
    for (username, entry) in entries {
        if username.is_empty() {
            return Err(corrupt("empty username key".into()));
        }
        validate_descriptor(&entry.face_encoding)
            .map_err(|e| corrupt(format!("record '{}': {}", username, e)))?;

        let len = entry.face_encoding.len();
        match dimension {
            None => dimension = Some(len),
            Some(expected) if expected != len => {
                return Err(corrupt(format!(
                    "record '{}' has {} values, expected {}", username, len, expected
                )));
            }
            Some(_) => {}
        }

        let display_name = entry.name.unwrap_or_else(|| username.clone());
        records.insert(
            username.clone(),
            EnrollmentRecord::from_parts(username, display_name, entry.face_encoding),
        );
    }

    Ok(records)
}

fn write_store_file<'a>(
    path: &Path,
    records: impl Iterator<Item = &'a EnrollmentRecord>,
) -> Result<()> {
    let document: BTreeMap<&str, StoredEntryRef<'_>> = records
        .map(|record| {
            (
                record.username(),
                StoredEntryRef {
                    name: record.display_name(),
                    face_encoding: record.descriptor(),
                },
            )
        })
        .collect();
    let serialized = serde_json::to_vec_pretty(&document)
        .map_err(|e| FaceAuthError::Other(anyhow::anyhow!("Failed to serialize store: {}", e)))?;

    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    let mut tmp = NamedTempFile::new_in(parent)?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        writer.write_all(&serialized)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
    }
    tmp.as_file().sync_all()?;

    let file = tmp.persist(path).map_err(|e| FaceAuthError::Io(e.error))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = file.metadata()?.permissions();
        perms.set_mode(0o600);
        file.set_permissions(perms)?;
    }
    #[cfg(not(unix))]
    drop(file);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use tempfile::TempDir;

    fn record(username: &str, descriptor: Vec<f64>) -> EnrollmentRecord {
        EnrollmentRecord::new(username, None, descriptor).unwrap()
    }

    #[test]
    fn missing_file_loads_empty_store() {
        let tmp = TempDir::new().unwrap();
        let store = IdentityStore::load(tmp.path().join("users.json")).unwrap();

        assert!(store.is_empty());
        assert_eq!(store.dimension(), None);
        assert!(!tmp.path().join("users.json").exists());
    }

    #[test]
    fn unparsable_file_is_storage_corrupt() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("users.json");
        fs::write(&path, b"{ not json").unwrap();

        match IdentityStore::load(&path) {
            Err(FaceAuthError::StorageCorrupt { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("unexpected result: {:?}", other.map(|s| s.len())),
        }
    }

    #[test]
    fn empty_descriptor_on_disk_is_storage_corrupt() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("users.json");
        fs::write(&path, br#"{"bob": {"name": "bob", "face_encoding": []}}"#).unwrap();

        assert!(matches!(IdentityStore::load(&path), Err(FaceAuthError::StorageCorrupt { .. })));
    }

    #[test]
    fn mixed_dimensions_on_disk_are_storage_corrupt() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("users.json");
        fs::write(
            &path,
            br#"{"a": {"name": "a", "face_encoding": [0.1, 0.2]},
                 "b": {"name": "b", "face_encoding": [0.1]}}"#,
        )
        .unwrap();

        assert!(matches!(IdentityStore::load(&path), Err(FaceAuthError::StorageCorrupt { .. })));
    }

    #[test]
    fn legacy_document_with_password_field_loads() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("users.json");
        fs::write(
            &path,
            br#"{"alice": {"name": "alice", "password": "", "face_encoding": [0.1, 0.2, 0.3]}}"#,
        )
        .unwrap();

        let store = IdentityStore::load(&path).unwrap();
        let alice = store.get("alice").unwrap();
        assert_eq!(alice.descriptor(), &[0.1, 0.2, 0.3]);

        store.persist().unwrap();
        let rewritten = fs::read_to_string(&path).unwrap();
        assert!(!rewritten.contains("password"));
    }

    #[test]
    fn persist_then_load_round_trips_exactly() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested/users.json");
        let store = IdentityStore::load(&path).unwrap();

        let awkward = vec![0.1 + 0.2, 1.0 / 3.0, -2.5e-300, 123456.789012345678, f64::MIN_POSITIVE];
        store.put(EnrollmentRecord::new("dave", Some("Dave"), awkward.clone()).unwrap()).unwrap();
        store.put(record("erin", vec![0.0, -0.0, 1e10, 7.0, -1.0])).unwrap();
        store.persist().unwrap();

        let reloaded = IdentityStore::load(&path).unwrap();
        assert_eq!(reloaded.usernames(), vec!["dave".to_string(), "erin".to_string()]);
        for name in ["dave", "erin"] {
            assert_eq!(reloaded.get(name).unwrap(), store.get(name).unwrap());
        }
        assert_eq!(reloaded.get("dave").unwrap().descriptor(), awkward.as_slice());
    }

    #[test]
    fn put_rejects_existing_username() {
        let tmp = TempDir::new().unwrap();
        let store = IdentityStore::load(tmp.path().join("users.json")).unwrap();
        store.put(record("carol", vec![0.1, 0.2])).unwrap();

        let err = store.put(record("carol", vec![0.9, 0.9])).unwrap_err();
        assert!(matches!(err, FaceAuthError::AlreadyExists(ref name) if name == "carol"));
        assert_eq!(store.get("carol").unwrap().descriptor(), &[0.1, 0.2]);
    }

    #[test]
    fn put_rejects_descriptor_of_other_dimension() {
        let tmp = TempDir::new().unwrap();
        let store = IdentityStore::load(tmp.path().join("users.json")).unwrap();
        store.put(record("a", vec![0.1, 0.2, 0.3])).unwrap();

        let err = store.put(record("b", vec![0.1, 0.2])).unwrap_err();
        assert!(matches!(err, FaceAuthError::DescriptorShapeMismatch { expected: 3, found: 2 }));
        assert!(!store.contains("b"));
    }

    #[test]
    fn get_unknown_user_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let store = IdentityStore::load(tmp.path().join("users.json")).unwrap();
        assert!(matches!(store.get("nobody"), Err(FaceAuthError::NotFound(_))));
    }

    #[test]
    fn failed_commit_leaves_store_unchanged() {
        let tmp = TempDir::new().unwrap();
        // A directory where the store file should be makes the rename fail
        let path = tmp.path().join("users.json");
        fs::create_dir_all(path.join("occupied")).unwrap();
        let store = IdentityStore {
            path: path.clone(),
            records: RwLock::new(HashMap::new()),
            writer: Mutex::new(()),
        };

        assert!(store.commit(record("frank", vec![0.5])).is_err());
        assert!(!store.contains("frank"));
    }

    #[cfg(unix)]
    #[test]
    fn persisted_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("users.json");
        let store = IdentityStore::load(&path).unwrap();
        store.commit(record("gina", vec![0.5, 0.5])).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn concurrent_commits_of_one_username_keep_a_single_record() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("users.json");
        let store = Arc::new(IdentityStore::load(&path).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                thread::spawn(move || store.commit(record("carol", vec![i as f64, 0.0])))
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, FaceAuthError::AlreadyExists(_))));

        let reloaded = IdentityStore::load(&path).unwrap();
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded.get("carol").unwrap(), store.get("carol").unwrap());
    }

    #[test]
    fn concurrent_commits_of_distinct_usernames_are_all_persisted() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("users.json");
        let store = Arc::new(IdentityStore::load(&path).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                thread::spawn(move || store.commit(record(&format!("user{}", i), vec![i as f64])))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }

        assert_eq!(IdentityStore::load(&path).unwrap().len(), 8);
    }
}
