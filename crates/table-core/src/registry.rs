//! In-memory registry of what is running for each match.
//!
//! The table itself sits behind a plain mutex that is never held across an
//! await. Each entry has its own async lock, held for the whole of a dealer
//! start, proxy start, or action so that concurrent requests for one match
//! run one at a time while different matches proceed in parallel.
//!
//! Lock order is entry, then table. The sweep goes the other way but only
//! ever `try_lock`s entries, skipping any that are busy.

use crate::dealer::DealerInfo;
use crate::models::MatchId;
use crate::process::ProcessProbe;
use crate::proxy::ProxySession;
use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

/// What is running for one match.
#[derive(Debug, Default)]
pub struct RegistryEntry {
    pub dealer: Option<DealerInfo>,
    pub proxy: Option<ProxySession>,
    /// Set once the entry has left the table. Holders of a retired entry
    /// must not store anything in it.
    retired: bool,
}

impl RegistryEntry {
    pub fn is_retired(&self) -> bool {
        self.retired
    }
}

type EntryHandle = Arc<AsyncMutex<RegistryEntry>>;

/// An entry locked for exclusive use.
pub struct LockedEntry {
    match_id: MatchId,
    handle: EntryHandle,
    guard: OwnedMutexGuard<RegistryEntry>,
}

impl LockedEntry {
    pub fn match_id(&self) -> &MatchId {
        &self.match_id
    }
}

impl Deref for LockedEntry {
    type Target = RegistryEntry;

    fn deref(&self) -> &RegistryEntry {
        &self.guard
    }
}

impl DerefMut for LockedEntry {
    fn deref_mut(&mut self) -> &mut RegistryEntry {
        &mut self.guard
    }
}

/// Process-wide table from match id to registry entry.
#[derive(Debug, Default)]
pub struct MatchRegistry {
    entries: Mutex<HashMap<MatchId, EntryHandle>>,
}

impl MatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self) -> MutexGuard<'_, HashMap<MatchId, EntryHandle>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Lock the entry for `match_id`, creating it if absent.
    pub async fn lock_entry(&self, match_id: &MatchId) -> LockedEntry {
        loop {
            let handle = self
                .table()
                .entry(match_id.clone())
                .or_default()
                .clone();
            let guard = handle.clone().lock_owned().await;
            if guard.retired {
                // Swept or ended while we waited; start over with a fresh one.
                continue;
            }
            return LockedEntry {
                match_id: match_id.clone(),
                handle,
                guard,
            };
        }
    }

    /// Lock the entry for `match_id` if there is one.
    pub async fn lock_existing(&self, match_id: &MatchId) -> Option<LockedEntry> {
        let handle = self.table().get(match_id).cloned()?;
        let guard = handle.clone().lock_owned().await;
        if guard.retired {
            return None;
        }
        Some(LockedEntry {
            match_id: match_id.clone(),
            handle,
            guard,
        })
    }

    /// Remove a locked entry from the table.
    pub fn retire(&self, mut entry: LockedEntry) {
        entry.guard.retired = true;
        let mut table = self.table();
        if table
            .get(&entry.match_id)
            .is_some_and(|current| Arc::ptr_eq(current, &entry.handle))
        {
            table.remove(&entry.match_id);
        }
        debug!(match_id = %entry.match_id, "Registry entry removed");
    }

    /// Remove every idle entry whose dealer is gone or was never recorded.
    /// Entries locked by an in-flight request are left alone.
    pub fn sweep(&self, probe: &dyn ProcessProbe) -> Vec<MatchId> {
        let mut removed = Vec::new();
        self.table().retain(|match_id, handle| {
            let Ok(mut entry) = handle.try_lock() else {
                return true;
            };
            let alive = entry
                .dealer
                .as_ref()
                .is_some_and(|dealer| probe.is_alive(dealer.pid));
            if !alive {
                entry.retired = true;
                removed.push(match_id.clone());
            }
            alive
        });
        removed
    }

    pub fn contains(&self, match_id: &MatchId) -> bool {
        self.table().contains_key(match_id)
    }

    pub fn len(&self) -> usize {
        self.table().len()
    }

    pub fn is_empty(&self) -> bool {
        self.table().is_empty()
    }
}
