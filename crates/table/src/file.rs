//! File-per-revision table.
//!
//! Layout inside the table directory:
//! ```text
//! {prefix}-{key}.1     - first revision of `key`
//! {prefix}-{key}.2     - second revision
//! {prefix}-{other}.7   - newest (and only, after a purge) revision of `other`
//! ```
//! Files are write-once. The directory listing is the only index: the current
//! revision of a key is the largest numeric suffix among its files.
//!
//! Listing a directory and creating a file are not atomic as a pair, so every
//! operation of every `FileTable` in the process runs under one global lock.
//! Writes on unrelated keys therefore queue behind each other.
//!
//! Removing a chain is one file at a time and not atomic on disk. Files go
//! oldest first; if a removal fails, the older files are already gone, the
//! rest of the chain (always including the head) stays, and the error is
//! returned. The key then reads as its head revision with a shortened
//! history, and a later delete finishes the job.

use parking_lot::{Mutex, const_mutex};
use revkv_common::{Entry, Key, Revision, StoreError, ValidationError, is_valid_name};
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::{Append, RevisionTable, expectation_holds};

static DIRECTORY_LOCK: Mutex<()> = const_mutex(());

/// Revision table storing one file per `(prefix, key, revision)`.
#[derive(Debug, Clone)]
pub struct FileTable {
    directory: PathBuf,
    prefix: String,
}

impl FileTable {
    /// Open a table in `directory` whose files start with `prefix`.
    ///
    /// With `create_dir` the directory (and its parents) is created when
    /// missing; otherwise a missing directory is an error.
    pub fn open(
        directory: impl AsRef<Path>,
        prefix: &str,
        create_dir: bool,
    ) -> Result<Self, StoreError> {
        if !is_valid_name(prefix) {
            return Err(ValidationError::InvalidPrefix(prefix.to_owned()).into());
        }
        let directory = directory.as_ref().to_path_buf();
        if create_dir {
            fs::create_dir_all(&directory)?;
        }
        if !directory.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("table directory {} does not exist", directory.display()),
            )
            .into());
        }
        tracing::debug!(directory = %directory.display(), prefix, "opened file table");
        Ok(Self {
            directory,
            prefix: prefix.to_owned(),
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Path of the file holding `revision` of `key`.
    pub fn file_path(&self, key: &Key, revision: Revision) -> PathBuf {
        self.directory
            .join(format!("{}-{}.{}", self.prefix, key, revision))
    }

    /// Split `{prefix}-{key}.{revision}` into key and revision.
    ///
    /// Revisions must be plain base-10 without leading zeros, so each
    /// revision maps to exactly one file name.
    fn parse_file_name<'a>(&self, name: &'a str) -> Option<(&'a str, Revision)> {
        let rest = name.strip_prefix(self.prefix.as_str())?.strip_prefix('-')?;
        let (key, revision) = rest.split_once('.')?;
        if !is_valid_name(key)
            || revision.starts_with('0')
            || !revision.bytes().all(|b| b.is_ascii_digit())
        {
            return None;
        }
        Some((key, revision.parse().ok()?))
    }

    /// Revisions stored for every key, ascending.
    fn scan(&self) -> Result<BTreeMap<String, Vec<Revision>>, StoreError> {
        let mut revisions: BTreeMap<String, Vec<Revision>> = BTreeMap::new();
        let own_prefix = format!("{}-", self.prefix);
        for dir_entry in fs::read_dir(&self.directory)? {
            let file_name = dir_entry?.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            match self.parse_file_name(name) {
                Some((key, revision)) => revisions.entry(key.to_owned()).or_default().push(revision),
                None if name.starts_with(&own_prefix) => {
                    tracing::warn!(file = name, "ignoring unrecognized file in table directory");
                }
                None => {}
            }
        }
        for list in revisions.values_mut() {
            list.sort_unstable();
        }
        Ok(revisions)
    }

    /// Revisions stored for `key`, ascending.
    fn revisions(&self, key: &Key) -> Result<Vec<Revision>, StoreError> {
        let mut revisions = Vec::new();
        for dir_entry in fs::read_dir(&self.directory)? {
            let file_name = dir_entry?.file_name();
            if let Some((found, revision)) = file_name.to_str().and_then(|n| self.parse_file_name(n))
                && found == key.as_str()
            {
                revisions.push(revision);
            }
        }
        revisions.sort_unstable();
        Ok(revisions)
    }

    fn read_entry(&self, key: &Key, revision: Revision) -> Result<Entry, StoreError> {
        let body = fs::read(self.file_path(key, revision))?;
        Ok(Entry::new(key.clone(), revision, body))
    }

    /// Create the file for a new revision. Never replaces an existing file;
    /// a file left half-written by an error is removed again.
    fn write_revision(&self, key: &Key, revision: Revision, body: &[u8]) -> Result<(), StoreError> {
        let path = self.file_path(key, revision);
        let mut file = OpenOptions::new().write(true).create_new(true).open(&path)?;
        if let Err(err) = file.write_all(body).and_then(|()| file.sync_all()) {
            drop(file);
            if let Err(cleanup) = fs::remove_file(&path) {
                tracing::error!(path = %path.display(), error = %cleanup, "could not remove partial revision file");
            }
            return Err(err.into());
        }
        Ok(())
    }

    fn remove_revision(&self, key: &Key, revision: Revision) -> Result<(), StoreError> {
        let path = self.file_path(key, revision);
        fs::remove_file(&path).map_err(|source| StoreError::Remove { path, source })
    }
}

impl RevisionTable for FileTable {
    fn current_revision(&self, key: &Key) -> Result<Option<Revision>, StoreError> {
        let _guard = DIRECTORY_LOCK.lock();
        Ok(self.revisions(key)?.last().copied())
    }

    fn compare_and_append(
        &self,
        key: &Key,
        expected: Revision,
        body: &[u8],
        purge: bool,
    ) -> Result<Append, StoreError> {
        let _guard = DIRECTORY_LOCK.lock();
        let _span = tracing::debug_span!("file_append", %key, expected).entered();

        let existing = self.revisions(key)?;
        let current = existing.last().copied();
        if !expectation_holds(expected, current) {
            return Ok(Append::Mismatch { actual: current });
        }

        let revision = expected + 1;
        self.write_revision(key, revision, body)?;

        if purge {
            // The new revision is already durable; stale files are only logged.
            for old in existing {
                if let Err(err) = self.remove_revision(key, old) {
                    tracing::error!(error = %err, "could not purge old revision");
                }
            }
        }
        Ok(Append::Written(revision))
    }

    fn latest(&self, key: &Key) -> Result<Option<Entry>, StoreError> {
        let _guard = DIRECTORY_LOCK.lock();
        let Some(revision) = self.revisions(key)?.last().copied() else {
            return Ok(None);
        };
        match self.read_entry(key, revision) {
            Ok(entry) => Ok(Some(entry)),
            Err(StoreError::Io(err)) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn chain(&self, key: &Key) -> Result<Vec<Entry>, StoreError> {
        let _guard = DIRECTORY_LOCK.lock();
        self.revisions(key)?
            .into_iter()
            .map(|revision| self.read_entry(key, revision))
            .collect()
    }

    fn remove_chain(&self, key: &Key) -> Result<Option<Entry>, StoreError> {
        let _guard = DIRECTORY_LOCK.lock();
        let _span = tracing::debug_span!("file_remove", %key).entered();

        let revisions = self.revisions(key)?;
        let Some(&head) = revisions.last() else {
            return Ok(None);
        };
        let entry = self.read_entry(key, head)?;
        // Ascending, so the head goes last. A failure part way leaves a
        // shortened chain that still ends at the head.
        for revision in revisions {
            self.remove_revision(key, revision)?;
        }
        Ok(Some(entry))
    }

    fn latest_all(&self) -> Result<Vec<Entry>, StoreError> {
        let _guard = DIRECTORY_LOCK.lock();
        let mut entries = Vec::new();
        for (raw, revisions) in self.scan()? {
            let Some(&head) = revisions.last() else {
                continue;
            };
            let key = Key::parse(&raw)?;
            entries.push(self.read_entry(&key, head)?);
        }
        Ok(entries)
    }
}
