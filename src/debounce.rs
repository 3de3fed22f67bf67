use std::{collections::HashMap, sync::Arc, time::Duration};

use tokio::{sync::Mutex, task::JoinHandle, time::sleep};

use crate::{snapshot::SnapshotCoordinator, types::ResourceCategory};

/// Trailing-edge debounce: a burst of same-category refresh intents
/// collapses into a single snapshot fetch once a quiet period elapses.
///
/// At most one timer per category is pending; scheduling again replaces it
/// (cancel-old-then-store-new, last write wins). Categories are independent.
pub struct DebounceScheduler {
    quiet: Duration,
    slots: Arc<Mutex<HashMap<ResourceCategory, JoinHandle<()>>>>,
}

impl DebounceScheduler {
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            slots: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub async fn schedule(&self, category: ResourceCategory, coordinator: Arc<SnapshotCoordinator>) {
        let mut slots = self.slots.lock().await;
        if let Some(previous) = slots.remove(&category) {
            previous.abort();
        }

        let quiet = self.quiet;
        let slots_ref = Arc::clone(&self.slots);
        let handle = tokio::spawn(async move {
            sleep(quiet).await;
            // Clear the slot before fetching so a new intent arriving during
            // the fetch arms a fresh timer instead of aborting the fetch.
            slots_ref.lock().await.remove(&category);
            coordinator.refresh(category).await;
        });
        slots.insert(category, handle);
    }

    /// Cancel every pending timer. Must run before timers for a different
    /// account context are armed, so a stale timer can never fetch data
    /// scoped to the previous account.
    pub async fn cancel_all(&self) {
        let mut slots = self.slots.lock().await;
        for (_, handle) in slots.drain() {
            handle.abort();
        }
    }

    pub async fn pending(&self) -> usize {
        self.slots.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        snapshot::tests::{FakeApi, FakeSession},
        types::AccountId,
    };

    fn fixture() -> (Arc<FakeApi>, Arc<SnapshotCoordinator>, DebounceScheduler) {
        let api = Arc::new(FakeApi::new());
        let session = Arc::new(FakeSession::new());
        let coordinator = Arc::new(SnapshotCoordinator::new(
            Arc::clone(&api) as Arc<dyn crate::snapshot::SnapshotApi>,
            session,
            AccountId::from("ACC1"),
        ));
        let scheduler = DebounceScheduler::new(Duration::from_millis(300));
        (api, coordinator, scheduler)
    }

    #[tokio::test(start_paused = true)]
    async fn burst_collapses_into_one_fetch() {
        let (api, coordinator, scheduler) = fixture();

        for _ in 0..5 {
            scheduler
                .schedule(ResourceCategory::Positions, Arc::clone(&coordinator))
                .await;
            sleep(Duration::from_millis(50)).await;
        }
        sleep(Duration::from_millis(400)).await;

        assert_eq!(api.count(ResourceCategory::Positions).await, 1);
        assert_eq!(scheduler.pending().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn quiet_period_is_trailing_edge() {
        let (api, coordinator, scheduler) = fixture();

        scheduler
            .schedule(ResourceCategory::Orders, Arc::clone(&coordinator))
            .await;
        // Re-arm just before the deadline; the fetch must move out with it.
        sleep(Duration::from_millis(250)).await;
        scheduler
            .schedule(ResourceCategory::Orders, Arc::clone(&coordinator))
            .await;

        sleep(Duration::from_millis(250)).await;
        assert_eq!(api.count(ResourceCategory::Orders).await, 0);

        sleep(Duration::from_millis(100)).await;
        assert_eq!(api.count(ResourceCategory::Orders).await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn categories_are_independent() {
        let (api, coordinator, scheduler) = fixture();

        for _ in 0..3 {
            scheduler
                .schedule(ResourceCategory::Orders, Arc::clone(&coordinator))
                .await;
        }
        sleep(Duration::from_millis(400)).await;

        assert_eq!(api.count(ResourceCategory::Orders).await, 1);
        assert_eq!(api.count(ResourceCategory::Positions).await, 0);
        assert_eq!(api.count(ResourceCategory::Trades).await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn separate_categories_fire_separately() {
        let (api, coordinator, scheduler) = fixture();

        scheduler
            .schedule(ResourceCategory::Positions, Arc::clone(&coordinator))
            .await;
        scheduler
            .schedule(ResourceCategory::Trades, Arc::clone(&coordinator))
            .await;
        sleep(Duration::from_millis(400)).await;

        assert_eq!(api.count(ResourceCategory::Positions).await, 1);
        assert_eq!(api.count(ResourceCategory::Trades).await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_all_drops_pending_timers() {
        let (api, coordinator, scheduler) = fixture();

        scheduler
            .schedule(ResourceCategory::Positions, Arc::clone(&coordinator))
            .await;
        scheduler
            .schedule(ResourceCategory::Orders, Arc::clone(&coordinator))
            .await;
        scheduler.cancel_all().await;
        sleep(Duration::from_millis(500)).await;

        assert_eq!(api.count(ResourceCategory::Positions).await, 0);
        assert_eq!(api.count(ResourceCategory::Orders).await, 0);
        assert_eq!(scheduler.pending().await, 0);
    }
}
