//! Per-scope selection history with a no-repeat filter.
//!
//! The ledger keeps, for every (server, channel) scope, the most recent selections
//! and the set of members that were already picked since the last reset. Every
//! mutation is written through to the [`HistoryStore`] before it returns.

mod record;

pub use record::{HistoryDocument, LedgerEntry, ScopeKey, SelectionMode, SelectionRecord};

use crate::randomizer::connectors::file::{self, HistoryStore};
use chrono::Local;
use log::{error, info};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

/// Number of selection records retained per scope unless configured otherwise.
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to persist selection history: {0}")]
    Storage(#[from] file::Error),
    #[error("Selection history is unavailable")]
    Poisoned,
}

pub struct SelectionLedger<STORE: HistoryStore> {
    store: STORE,
    history_limit: usize,
    document: Mutex<HistoryDocument>,
}

impl<STORE: HistoryStore> SelectionLedger<STORE> {
    /// Loads the stored history once; the ledger is the only writer afterwards.
    pub fn open(store: STORE, history_limit: usize) -> Result<Self, Error> {
        let document = store.load()?;
        info!("Loaded selection history for {} scopes", document.len());
        Ok(Self {
            store,
            history_limit: history_limit.max(1),
            document: Mutex::new(document),
        })
    }

    /// Appends a selection for `scope` and marks `selected` as used.
    ///
    /// The in-memory state is left untouched when the store rejects the write.
    pub fn record(
        &self,
        scope: ScopeKey,
        mode: SelectionMode,
        selected: &[String],
    ) -> Result<SelectionRecord, Error> {
        self.append(scope, mode, selected, false)
    }

    /// Clears the used members of `scope` and records `selected` in one write.
    ///
    /// Either both changes are stored or neither is.
    pub fn reset_and_record(
        &self,
        scope: ScopeKey,
        mode: SelectionMode,
        selected: &[String],
    ) -> Result<SelectionRecord, Error> {
        self.append(scope, mode, selected, true)
    }

    fn append(
        &self,
        scope: ScopeKey,
        mode: SelectionMode,
        selected: &[String],
        clear_used: bool,
    ) -> Result<SelectionRecord, Error> {
        let mut document = self.lock()?;
        let key = scope.to_string();
        let previous = document.get(&key).cloned();

        let record = SelectionRecord {
            timestamp: Local::now().naive_local(),
            mode,
            selected: selected.to_vec(),
        };
        let entry = document.entry(key.clone()).or_default();
        if clear_used {
            entry.used_members.clear();
        }
        entry.selections.push(record.clone());
        for id in selected {
            if !entry.used_members.contains(id) {
                entry.used_members.push(id.clone());
            }
        }
        if entry.selections.len() > self.history_limit {
            let excess = entry.selections.len() - self.history_limit;
            entry.selections.drain(..excess);
        }

        if let Err(err) = self.store.save(&document) {
            error!("Failed to record selection for scope {}: {}", scope, err);
            match previous {
                Some(previous) => document.insert(key, previous),
                None => document.remove(&key),
            };
            return Err(err.into());
        }
        if clear_used {
            info!("Reset used members for scope {}", scope);
        }
        Ok(record)
    }

    /// Members picked in `scope` since the last reset; empty for unknown scopes.
    pub fn used_members(&self, scope: ScopeKey) -> Result<Vec<String>, Error> {
        let document = self.lock()?;
        Ok(document
            .get(&scope.to_string())
            .map(|entry| entry.used_members.clone())
            .unwrap_or_default())
    }

    /// Makes every member of `scope` eligible again. Selection records are kept.
    pub fn reset(&self, scope: ScopeKey) -> Result<(), Error> {
        let mut document = self.lock()?;
        let key = scope.to_string();
        let Some(entry) = document.get_mut(&key) else {
            return Ok(());
        };
        let previous = std::mem::take(&mut entry.used_members);

        if let Err(err) = self.store.save(&document) {
            error!("Failed to reset scope {}: {}", scope, err);
            if let Some(entry) = document.get_mut(&key) {
                entry.used_members = previous;
            }
            return Err(err.into());
        }
        info!("Reset used members for scope {}", scope);
        Ok(())
    }

    /// Up to `limit` of the latest records of `scope`, oldest first.
    pub fn recent(&self, scope: ScopeKey, limit: usize) -> Result<Vec<SelectionRecord>, Error> {
        let document = self.lock()?;
        let Some(entry) = document.get(&scope.to_string()) else {
            return Ok(Vec::new());
        };
        let start = entry.selections.len().saturating_sub(limit);
        Ok(entry.selections[start..].to_vec())
    }

    /// Number of records retained for `scope`.
    pub fn selection_count(&self, scope: ScopeKey) -> Result<usize, Error> {
        let document = self.lock()?;
        Ok(document
            .get(&scope.to_string())
            .map_or(0, |entry| entry.selections.len()))
    }

    fn lock(&self) -> Result<MutexGuard<'_, HistoryDocument>, Error> {
        self.document.lock().map_err(|_| Error::Poisoned)
    }
}
