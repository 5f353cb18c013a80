//! Deferred removal of finished and abandoned fights.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::registry::FightRegistry;

/// Grace windows before a fight record is reclaimed.
#[derive(Debug, Clone, Copy)]
pub struct ReaperConfig {
    /// Delay after a knockout, long enough for both clients to receive
    /// and render the result before the record disappears.
    pub finished_grace: Duration,

    /// Delay after a disconnect. Short, since an abandoned fight has no
    /// further use, but non-zero so a reconnect racing the disconnect
    /// signal still finds the record.
    pub disconnect_grace: Duration,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            finished_grace: Duration::from_secs(5 * 60),
            disconnect_grace: Duration::from_secs(10),
        }
    }
}

struct PendingSweep {
    epoch: u64,
    task: JoinHandle<()>,
}

/// Schedules fight removal on timers.
///
/// Removal is keyed by the (id, epoch) pair captured at schedule time: a
/// sweep that fires against a record re-created under the same id finds
/// a newer epoch and does nothing. Scheduling for an id with a sweep
/// already pending replaces the pending one.
#[derive(Clone)]
pub struct Reaper {
    registry: FightRegistry,
    pending: Arc<DashMap<String, PendingSweep>>,
    config: ReaperConfig,
}

impl Reaper {
    pub fn new(registry: FightRegistry, config: ReaperConfig) -> Self {
        Self {
            registry,
            pending: Arc::new(DashMap::new()),
            config,
        }
    }

    pub fn config(&self) -> ReaperConfig {
        self.config
    }

    /// Remove `fight_id` after `delay`, unless the record has been
    /// superseded by then.
    pub fn schedule(&self, fight_id: String, epoch: u64, delay: Duration) {
        let reaper = self.clone();
        let id = fight_id.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if reaper.registry.remove_stale(&id, epoch) {
                debug!(fight_id = %id, "fight reclaimed");
            }
            reaper.pending.remove_if(&id, |_, sweep| sweep.epoch == epoch);
        });

        if let Some(previous) = self.pending.insert(fight_id, PendingSweep { epoch, task }) {
            previous.task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fight::Fighter;
    use uuid::Uuid;

    fn fighter(id: &str) -> Fighter {
        Fighter::new(id.to_string(), id.to_string(), "ryu".to_string(), Uuid::new_v4())
    }

    fn create(registry: &FightRegistry, id: &str) -> u64 {
        let (fight, _) = registry.get_or_create(id, fighter("alice"));
        fight.epoch
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_removes_record_after_delay() {
        let registry = FightRegistry::new();
        let reaper = Reaper::new(registry.clone(), ReaperConfig::default());
        let epoch = create(&registry, "f1");

        reaper.schedule("f1".to_string(), epoch, Duration::from_secs(10));
        assert!(registry.get("f1").is_some());

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert!(registry.get("f1").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn stale_sweep_leaves_recreated_record_alone() {
        let registry = FightRegistry::new();
        let reaper = Reaper::new(registry.clone(), ReaperConfig::default());

        let old_epoch = create(&registry, "f1");
        registry.remove("f1");
        create(&registry, "f1");

        reaper.schedule("f1".to_string(), old_epoch, Duration::from_secs(1));
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert!(registry.get("f1").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn reschedule_replaces_pending_sweep() {
        let registry = FightRegistry::new();
        let reaper = Reaper::new(registry.clone(), ReaperConfig::default());
        let epoch = create(&registry, "f1");

        reaper.schedule("f1".to_string(), epoch, Duration::from_secs(300));
        reaper.schedule("f1".to_string(), epoch, Duration::from_secs(10));

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert!(registry.get("f1").is_none());

        // The aborted long sweep never fires
        tokio::time::sleep(Duration::from_secs(300)).await;
        assert!(registry.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_of_absent_record_is_a_noop() {
        let registry = FightRegistry::new();
        let reaper = Reaper::new(registry.clone(), ReaperConfig::default());

        reaper.schedule("ghost".to_string(), 0, Duration::from_secs(1));
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert!(registry.is_empty());
    }
}
