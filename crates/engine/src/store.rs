use revkv_common::{
    Backend, CREATE, DeleteOutcome, GetOutcome, Key, ListOutcome, PutOutcome, Revision,
    RevisionsOutcome, StoreConfig, StoreError,
};
use revkv_table::{Append, FileTable, MemoryTable, RevisionTable};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::dispatch::{Handler, dispatch, panic_message};

/// Store whose backend is chosen at runtime from a `StoreConfig`.
pub type DynStore = RevisionStore<Box<dyn RevisionTable + Send + Sync>>;

/// Revisioned key-value store with optimistic concurrency control.
///
/// Writers name the revision they believe is current; a stale or premature
/// revision yields `PutOutcome::Conflict` instead of overwriting. The store is
/// `Sync` exactly when its table is, so a `MemoryTable` or `FileTable` store
/// can be shared between threads directly.
#[derive(Debug)]
pub struct RevisionStore<T> {
    table: T,
    auto_purge: AtomicBool,
}

impl<T: RevisionTable> RevisionStore<T> {
    /// Wrap `table` with auto-purge off.
    pub fn new(table: T) -> Self {
        Self::with_auto_purge(table, false)
    }

    pub fn with_auto_purge(table: T, auto_purge: bool) -> Self {
        Self {
            table,
            auto_purge: AtomicBool::new(auto_purge),
        }
    }

    pub fn table(&self) -> &T {
        &self.table
    }

    pub fn into_table(self) -> T {
        self.table
    }

    /// Keep only the newest revision on every later successful write.
    /// Chains already stored are left as they are.
    pub fn set_auto_purge(&self, enabled: bool) {
        self.auto_purge.store(enabled, Ordering::SeqCst);
        tracing::debug!(enabled, "auto-purge updated");
    }

    pub fn auto_purge(&self) -> bool {
        self.auto_purge.load(Ordering::SeqCst)
    }

    /// Write `body` as the revision after `expected`.
    ///
    /// `expected == CREATE` starts a new chain and conflicts if the key
    /// exists. Any other value must equal the key's current revision.
    pub fn put(&self, key: &str, expected: Revision, body: impl AsRef<[u8]>) -> PutOutcome {
        let k = match parse_key(key) {
            Ok(k) => k,
            Err(error) => {
                return PutOutcome::Failure {
                    key: key.to_owned(),
                    error,
                };
            }
        };
        let purge = self.auto_purge();
        let appended = self.guarded("put", |table| {
            table.compare_and_append(&k, expected, body.as_ref(), purge)
        });
        match appended {
            Ok(Append::Written(revision)) if expected == CREATE => {
                tracing::debug!(key = %k, revision, "created");
                PutOutcome::Created { key: k, revision }
            }
            Ok(Append::Written(revision)) => {
                tracing::debug!(key = %k, revision, purge, "updated");
                PutOutcome::Updated { key: k, revision }
            }
            Ok(Append::Mismatch { actual }) => {
                if actual.is_some_and(|current| expected != CREATE && expected < current) {
                    tracing::warn!(key = %k, expected, ?actual, "stale revision");
                } else {
                    tracing::debug!(key = %k, expected, ?actual, "revision conflict");
                }
                PutOutcome::Conflict {
                    key: k,
                    expected,
                    actual,
                }
            }
            Err(error) => {
                tracing::error!(key = %k, %error, "put failed");
                PutOutcome::Failure {
                    key: k.into(),
                    error,
                }
            }
        }
    }

    /// Newest entry of `key`.
    pub fn get(&self, key: &str) -> GetOutcome {
        let k = match parse_key(key) {
            Ok(k) => k,
            Err(error) => {
                return GetOutcome::Failure {
                    key: key.to_owned(),
                    error,
                };
            }
        };
        match self.guarded("get", |table| table.latest(&k)) {
            Ok(Some(entry)) => GetOutcome::Found(entry),
            Ok(None) => GetOutcome::NotFound { key: k },
            Err(error) => {
                tracing::error!(key = %k, %error, "get failed");
                GetOutcome::Failure {
                    key: k.into(),
                    error,
                }
            }
        }
    }

    /// Every stored entry of `key`, ascending by revision.
    pub fn get_revisions(&self, key: &str) -> RevisionsOutcome {
        let k = match parse_key(key) {
            Ok(k) => k,
            Err(error) => {
                return RevisionsOutcome::Failure {
                    key: key.to_owned(),
                    error,
                };
            }
        };
        match self.guarded("get_revisions", |table| table.chain(&k)) {
            Ok(entries) if entries.is_empty() => RevisionsOutcome::NotFound { key: k },
            Ok(entries) => RevisionsOutcome::Found { key: k, entries },
            Err(error) => {
                tracing::error!(key = %k, %error, "get_revisions failed");
                RevisionsOutcome::Failure {
                    key: k.into(),
                    error,
                }
            }
        }
    }

    /// Remove the whole chain of `key`, returning the newest body.
    pub fn delete(&self, key: &str) -> DeleteOutcome {
        let k = match parse_key(key) {
            Ok(k) => k,
            Err(error) => {
                return DeleteOutcome::Failure {
                    key: key.to_owned(),
                    error,
                };
            }
        };
        match self.guarded("delete", |table| table.remove_chain(&k)) {
            Ok(Some(entry)) => {
                tracing::debug!(key = %k, revision = entry.revision, "deleted");
                DeleteOutcome::Deleted {
                    key: k,
                    body: entry.body,
                }
            }
            Ok(None) => DeleteOutcome::NotFound { key: k },
            Err(error) => {
                tracing::error!(key = %k, %error, "delete failed");
                DeleteOutcome::Failure {
                    key: k.into(),
                    error,
                }
            }
        }
    }

    /// Newest entry of every live key, ascending by key.
    pub fn list(&self) -> ListOutcome {
        match self.guarded("list", |table| table.latest_all()) {
            Ok(entries) => ListOutcome::Entries(entries),
            Err(error) => {
                tracing::error!(%error, "list failed");
                ListOutcome::Failure { error }
            }
        }
    }

    pub fn put_with<H>(&self, key: &str, expected: Revision, body: impl AsRef<[u8]>, handler: &mut H)
    where
        H: Handler<PutOutcome> + ?Sized,
    {
        dispatch(self.put(key, expected, body), handler);
    }

    pub fn get_with<H>(&self, key: &str, handler: &mut H)
    where
        H: Handler<GetOutcome> + ?Sized,
    {
        dispatch(self.get(key), handler);
    }

    pub fn get_revisions_with<H>(&self, key: &str, handler: &mut H)
    where
        H: Handler<RevisionsOutcome> + ?Sized,
    {
        dispatch(self.get_revisions(key), handler);
    }

    pub fn delete_with<H>(&self, key: &str, handler: &mut H)
    where
        H: Handler<DeleteOutcome> + ?Sized,
    {
        dispatch(self.delete(key), handler);
    }

    pub fn list_with<H>(&self, handler: &mut H)
    where
        H: Handler<ListOutcome> + ?Sized,
    {
        dispatch(self.list(), handler);
    }

    /// Run one table call, turning a backend panic into a `StoreError`.
    fn guarded<R>(
        &self,
        operation: &'static str,
        call: impl FnOnce(&T) -> Result<R, StoreError>,
    ) -> Result<R, StoreError> {
        panic::catch_unwind(AssertUnwindSafe(|| call(&self.table))).unwrap_or_else(|payload| {
            Err(StoreError::BackendPanic {
                operation,
                message: panic_message(payload.as_ref()),
            })
        })
    }
}

impl DynStore {
    /// Build the backend described by `config`.
    pub fn open(config: &StoreConfig) -> Result<Self, StoreError> {
        config.validate()?;
        let table: Box<dyn RevisionTable + Send + Sync> = match config.backend {
            Backend::Memory => Box::new(MemoryTable::new()),
            Backend::File => Box::new(FileTable::open(
                &config.directory,
                &config.prefix,
                config.create_dir,
            )?),
        };
        tracing::info!(backend = ?config.backend, auto_purge = config.auto_purge, "store opened");
        Ok(Self::with_auto_purge(table, config.auto_purge))
    }
}

fn parse_key(key: &str) -> Result<Key, StoreError> {
    Key::parse(key).map_err(|err| {
        tracing::warn!(error = %err, "rejected key");
        err.into()
    })
}
