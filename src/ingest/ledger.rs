// src/ingest/ledger.rs
//! Durable set of already-notified item ids.
//!
//! All read-before-accept and accept-then-persist sequences run under one
//! mutex, so concurrent runs (timer + manual) never lose an update and never
//! both claim the same id.

use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use metrics::gauge;
use serde::{Deserialize, Serialize};

use crate::error::StorageError;

#[derive(Debug, Default, Serialize, Deserialize)]
struct LedgerFile {
    ids: Vec<String>,
}

#[derive(Debug)]
pub struct DedupLedger {
    path: PathBuf,
    ids: Mutex<HashSet<String>>,
}

impl DedupLedger {
    /// Load from `path`. A missing file yields an empty ledger.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let ids = match fs::read_to_string(&path) {
            Ok(s) if s.trim().is_empty() => HashSet::new(),
            Ok(s) => {
                let file: LedgerFile =
                    serde_json::from_str(&s).map_err(|e| StorageError::Corrupt {
                        path: path.clone(),
                        reason: e.to_string(),
                    })?;
                file.ids.into_iter().collect()
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashSet::new(),
            Err(e) => return Err(StorageError::io(&path, e)),
        };
        gauge!("digest_ledger_size").set(ids.len() as f64);
        Ok(Self {
            path,
            ids: Mutex::new(ids),
        })
    }

    /// Like [`DedupLedger::load`] but falls back to an empty ledger (logged)
    /// when the backing file is unreadable.
    pub fn load_or_empty(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match Self::load(&path) {
            Ok(l) => l,
            Err(e) => {
                tracing::error!(error = %e, path = %path.display(), "ledger unreadable, starting empty");
                Self {
                    path,
                    ids: Mutex::new(HashSet::new()),
                }
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn guard(&self) -> MutexGuard<'_, HashSet<String>> {
        self.ids.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Snapshot of all known ids.
    pub fn loaded_ids(&self) -> HashSet<String> {
        self.guard().clone()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.guard().contains(id)
    }

    pub fn len(&self) -> usize {
        self.guard().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert `id`; no-op when already present. Returns true if newly added.
    /// Does not persist, see [`DedupLedger::persist`].
    pub fn accept(&self, id: &str) -> bool {
        let mut g = self.guard();
        let added = g.insert(id.to_string());
        gauge!("digest_ledger_size").set(g.len() as f64);
        added
    }

    /// Write the current set to disk (tmp file + rename).
    pub fn persist(&self) -> Result<(), StorageError> {
        let g = self.guard();
        write_ids(&self.path, &g)
    }

    /// Atomically keep the ids not yet in the ledger, insert them and persist
    /// once. Returns the claimed ids in input order.
    ///
    /// On a persist failure the claimed ids stay in memory (they are still
    /// claimed for this process) and the error is returned alongside.
    pub fn claim<'a, I>(&self, ids: I) -> (Vec<String>, Option<StorageError>)
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut g = self.guard();
        let mut claimed = Vec::new();
        for id in ids {
            if g.insert(id.to_string()) {
                claimed.push(id.to_string());
            }
        }
        gauge!("digest_ledger_size").set(g.len() as f64);
        if claimed.is_empty() {
            return (claimed, None);
        }
        let err = write_ids(&self.path, &g).err();
        (claimed, err)
    }
}

fn write_ids(path: &Path, ids: &HashSet<String>) -> Result<(), StorageError> {
    let mut sorted: Vec<String> = ids.iter().cloned().collect();
    sorted.sort();
    let json = serde_json::to_vec_pretty(&LedgerFile { ids: sorted })
        .map_err(|e| StorageError::Invalid(e.to_string()))?;

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(|e| StorageError::io(dir, e))?;
    }
    let tmp = path.with_extension("json.tmp");
    let mut f = fs::File::create(&tmp).map_err(|e| StorageError::io(&tmp, e))?;
    f.write_all(&json).map_err(|e| StorageError::io(&tmp, e))?;
    f.sync_all().map_err(|e| StorageError::io(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| StorageError::io(path, e))?;
    Ok(())
}
