//! File-backed credential record store
//!
//! One pretty-printed JSON document per user at `<dir>/<username>.json`.
//! Writers take an exclusive advisory lock on `<dir>/.lock` so that
//! create-if-absent is atomic across threads and processes, and documents
//! are written to a temporary file and renamed into place.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::domain::result::{Error, Result};
use crate::domain::{validate_username, CredentialRecord};
use crate::ports::CredentialRepository;

const LOCK_FILE: &str = ".lock";
const EXTENSION: &str = "json";

#[derive(Debug, Clone)]
pub struct FileCredentialRepository {
    dir: PathBuf,
}

impl FileCredentialRepository {
    /// Open (and create if needed) the record directory
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| {
            Error::storage(format!("cannot create record directory {}: {}", dir.display(), e))
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, username: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", username, EXTENSION))
    }

    fn lock(&self) -> Result<File> {
        let path = self.dir.join(LOCK_FILE);
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| Error::storage(format!("cannot open lock file {}: {}", path.display(), e)))?;
        file.lock_exclusive()
            .map_err(|e| Error::storage(format!("cannot lock {}: {}", path.display(), e)))?;
        Ok(file)
    }

    fn write_record(&self, record: &CredentialRecord) -> Result<()> {
        let path = self.record_path(&record.subject_name);
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(record)?;

        let mut file = File::create(&tmp)
            .map_err(|e| Error::storage(format!("cannot write {}: {}", tmp.display(), e)))?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
        fs::rename(&tmp, &path)
            .map_err(|e| Error::storage(format!("cannot replace {}: {}", path.display(), e)))?;
        Ok(())
    }
}

impl CredentialRepository for FileCredentialRepository {
    fn get(&self, username: &str) -> Result<Option<CredentialRecord>> {
        // Names that could never be stored are simply unknown
        if validate_username(username).is_err() {
            return Ok(None);
        }
        let path = self.record_path(username);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(Error::storage(format!("cannot read {}: {}", path.display(), e)))
            }
        };
        let record: CredentialRecord = serde_json::from_str(&content).map_err(|e| {
            Error::storage(format!("corrupt credential record {}: {}", path.display(), e))
        })?;
        Ok(Some(record))
    }

    fn insert_new(&self, record: &CredentialRecord) -> Result<()> {
        validate_username(&record.subject_name)?;
        let lock = self.lock()?;
        if self.record_path(&record.subject_name).exists() {
            return Err(Error::AlreadyExists(format!(
                "a smart card for user '{}' already exists",
                record.subject_name
            )));
        }
        self.write_record(record)?;
        drop(lock);
        Ok(())
    }

    fn upsert(&self, record: &CredentialRecord) -> Result<()> {
        validate_username(&record.subject_name)?;
        let lock = self.lock()?;
        self.write_record(record)?;
        drop(lock);
        Ok(())
    }

    fn list_subjects(&self) -> Result<Vec<String>> {
        let entries = fs::read_dir(&self.dir).map_err(|e| {
            Error::storage(format!("cannot list {}: {}", self.dir.display(), e))
        })?;

        let mut subjects = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if validate_username(stem).is_ok() {
                    subjects.push(stem.to_string());
                }
            }
        }
        subjects.sort();
        Ok(subjects)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{hash_pin, Pin};
    use tempfile::TempDir;

    fn repo() -> (TempDir, FileCredentialRepository) {
        let dir = TempDir::new().unwrap();
        let repo = FileCredentialRepository::new(dir.path().join("cards")).unwrap();
        (dir, repo)
    }

    #[test]
    fn test_record_file_layout() {
        let (_dir, repo) = repo();
        repo.insert_new(&CredentialRecord::new("alice", Pin::new(1234).unwrap()))
            .unwrap();

        let content = fs::read_to_string(repo.dir().join("alice.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(value["subjectName"], "alice");
        assert_eq!(value["pinHash"], hash_pin(1234));
        assert!(content.contains('\n'));
    }

    #[test]
    fn test_insert_new_refuses_existing() {
        let (_dir, repo) = repo();
        repo.insert_new(&CredentialRecord::new("alice", Pin::new(1234).unwrap()))
            .unwrap();
        let err = repo
            .insert_new(&CredentialRecord::new("alice", Pin::new(9999).unwrap()))
            .unwrap_err();

        assert!(matches!(err, Error::AlreadyExists(_)));
        assert_eq!(repo.get("alice").unwrap().unwrap().pin_hash, hash_pin(1234));
    }

    #[test]
    fn test_upsert_and_list() {
        let (_dir, repo) = repo();
        repo.upsert(&CredentialRecord::new("bob", Pin::new(1111).unwrap())).unwrap();
        repo.upsert(&CredentialRecord::new("alice", Pin::new(2222).unwrap())).unwrap();
        repo.upsert(&CredentialRecord::new("bob", Pin::new(3333).unwrap())).unwrap();

        assert_eq!(repo.list_subjects().unwrap(), vec!["alice", "bob"]);
        assert!(repo.get("bob").unwrap().unwrap().matches(3333));
        assert!(!repo.dir().join("bob.json.tmp").exists());
    }

    #[test]
    fn test_unknown_and_unsafe_names() {
        let (_dir, repo) = repo();
        assert!(repo.get("nobody").unwrap().is_none());
        assert!(repo.get("../etc/passwd").unwrap().is_none());
        let bad = CredentialRecord {
            subject_name: "../evil".to_string(),
            pin_hash: hash_pin(1234),
        };
        assert!(matches!(repo.upsert(&bad), Err(Error::Validation(_))));
    }

    #[test]
    fn test_corrupt_record_is_a_storage_error() {
        let (_dir, repo) = repo();
        fs::write(repo.dir().join("alice.json"), "not json").unwrap();
        assert!(matches!(repo.get("alice"), Err(Error::Storage(_))));
    }
}
