//! Shared fight registry.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::mapref::one::{Ref, RefMut};
use dashmap::DashMap;

use crate::fight::{Fight, Fighter};
use crate::transport::ConnectionId;

/// The single source of truth for live fights.
///
/// Backed by a sharded map, so guards serialize all mutation for one
/// fight id while unrelated fights proceed in parallel. Handlers must
/// not hold a guard across an await point.
#[derive(Clone, Default)]
pub struct FightRegistry {
    fights: Arc<DashMap<String, Fight>>,
    epochs: Arc<AtomicU64>,
}

impl FightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<Ref<'_, String, Fight>> {
        self.fights.get(id)
    }

    pub fn get_mut(&self, id: &str) -> Option<RefMut<'_, String, Fight>> {
        self.fights.get_mut(id)
    }

    /// Look up a fight, creating it in the waiting state with `host` in
    /// the first seat when the id is unknown. The flag reports whether
    /// this call created the record; an existing record is returned
    /// unchanged.
    pub fn get_or_create(&self, id: &str, host: Fighter) -> (RefMut<'_, String, Fight>, bool) {
        match self.fights.entry(id.to_string()) {
            Entry::Occupied(entry) => (entry.into_ref(), false),
            Entry::Vacant(entry) => {
                let epoch = self.epochs.fetch_add(1, Ordering::Relaxed);
                (entry.insert(Fight::new(id.to_string(), epoch, host)), true)
            }
        }
    }

    /// Remove a fight. Safe to call for ids that are long gone.
    pub fn remove(&self, id: &str) {
        self.fights.remove(id);
    }

    /// Remove a fight only if it is still the record that existed when
    /// `epoch` was captured. A record re-created under the same id after
    /// a removal carries a newer epoch and is left alone.
    pub fn remove_stale(&self, id: &str, epoch: u64) -> bool {
        self.fights
            .remove_if(id, |_, fight| fight.epoch == epoch)
            .is_some()
    }

    /// First fight referencing `conn` on either seat.
    pub fn find_by_connection(&self, conn: ConnectionId) -> Option<String> {
        self.fights.iter().find_map(|entry| {
            let fight = entry.value();
            let involved = fight.host.connection == conn
                || fight
                    .challenger
                    .as_ref()
                    .map_or(false, |c| c.connection == conn);
            involved.then(|| fight.id.clone())
        })
    }

    pub fn len(&self) -> usize {
        self.fights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fights.is_empty()
    }
}
