use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use async_trait::async_trait;
use futures_util::future::join_all;
use tokio::sync::Mutex;

use crate::{
    errors::{SnapshotError, SnapshotResult},
    models::{AccountOverview, Activity, Order, Position, Trade},
    types::{AccountId, ResourceCategory},
};

/// Per-category resource fetcher, keyed by account. The production
/// implementation is [`RestSnapshotApi`](crate::rest::RestSnapshotApi);
/// tests substitute their own.
#[async_trait]
pub trait SnapshotApi: Send + Sync {
    async fn fetch_positions(&self, account: &AccountId) -> SnapshotResult<Vec<Position>>;
    async fn fetch_orders(&self, account: &AccountId) -> SnapshotResult<Vec<Order>>;
    async fn fetch_trades(&self, account: &AccountId) -> SnapshotResult<Vec<Trade>>;
    async fn fetch_overview(&self, account: &AccountId) -> SnapshotResult<AccountOverview>;
    async fn fetch_activity(&self, account: &AccountId) -> SnapshotResult<Vec<Activity>>;

    /// Ask the upstream gateway to refresh its own cache before a manual
    /// full refresh. Fire-and-forget; failure is non-fatal.
    async fn trigger_refresh(&self, account: &AccountId) -> SnapshotResult<()>;
}

/// Authentication provider seam: supplies the bearer credential and is told
/// to tear the session down when a snapshot call reports unauthorized.
#[async_trait]
pub trait SessionControl: Send + Sync {
    async fn bearer_token(&self) -> Option<String>;
    async fn force_logout(&self);
}

/// The authoritative in-memory snapshot state for one account.
#[derive(Clone, Debug, Default)]
pub struct AccountState {
    pub positions: Vec<Position>,
    pub orders: Vec<Order>,
    pub trades: Vec<Trade>,
    pub overview: Option<AccountOverview>,
    pub activities: Vec<Activity>,
}

#[derive(Clone, Copy, Debug, Default)]
struct LoadingFlags {
    positions: bool,
    orders: bool,
    trades: bool,
    overview: bool,
    activity: bool,
}

impl LoadingFlags {
    fn get(&self, category: ResourceCategory) -> bool {
        match category {
            ResourceCategory::Positions => self.positions,
            ResourceCategory::Orders => self.orders,
            ResourceCategory::Trades => self.trades,
            ResourceCategory::Overview => self.overview,
            ResourceCategory::Activity => self.activity,
        }
    }

    fn set(&mut self, category: ResourceCategory, value: bool) {
        match category {
            ResourceCategory::Positions => self.positions = value,
            ResourceCategory::Orders => self.orders = value,
            ResourceCategory::Trades => self.trades = value,
            ResourceCategory::Overview => self.overview = value,
            ResourceCategory::Activity => self.activity = value,
        }
    }
}

enum SnapshotUpdate {
    Positions(Vec<Position>),
    Orders(Vec<Order>),
    Trades(Vec<Trade>),
    Overview(AccountOverview),
    Activity(Vec<Activity>),
}

struct Inner {
    account: AccountId,
    state: AccountState,
    loading: LoadingFlags,
}

/// Orchestrates snapshot fetches and owns the account-scoped snapshot
/// state; no other component mutates it.
pub struct SnapshotCoordinator {
    api: Arc<dyn SnapshotApi>,
    session: Arc<dyn SessionControl>,
    inner: Mutex<Inner>,
    disposed: AtomicBool,
}

impl SnapshotCoordinator {
    pub fn new(
        api: Arc<dyn SnapshotApi>,
        session: Arc<dyn SessionControl>,
        account: AccountId,
    ) -> Self {
        Self {
            api,
            session,
            inner: Mutex::new(Inner {
                account,
                state: AccountState::default(),
                loading: LoadingFlags::default(),
            }),
            disposed: AtomicBool::new(false),
        }
    }

    /// Fetch one category and replace its stored snapshot on success.
    ///
    /// A 401 forces a session reset and leaves the snapshot untouched; any
    /// other failure is logged and the previous snapshot stays visible. A
    /// result arriving after disposal or an account switch is discarded.
    pub async fn refresh(&self, category: ResourceCategory) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }

        let account = {
            let mut inner = self.inner.lock().await;
            inner.loading.set(category, true);
            inner.account.clone()
        };

        let outcome = self.fetch(category, &account).await;

        if self.disposed.load(Ordering::SeqCst) {
            return;
        }

        let unauthorized = {
            let mut inner = self.inner.lock().await;
            if inner.account != account {
                // The view moved on to a different account while this fetch
                // was in flight; its result no longer applies.
                return;
            }
            inner.loading.set(category, false);

            match outcome {
                Ok(update) => {
                    apply(&mut inner.state, update);
                    false
                }
                Err(SnapshotError::Unauthorized) => true,
                Err(err) => {
                    tracing::warn!(%category, %account, error = %err, "snapshot fetch failed");
                    false
                }
            }
        };

        if unauthorized {
            tracing::warn!(%category, %account, "snapshot fetch unauthorized, resetting session");
            self.session.force_logout().await;
        }
    }

    /// Fetch all five categories concurrently; completes when every fetch
    /// has settled, regardless of individual failures.
    pub async fn refresh_all(&self) {
        join_all(
            ResourceCategory::ALL
                .iter()
                .map(|category| self.refresh(*category)),
        )
        .await;
    }

    async fn fetch(
        &self,
        category: ResourceCategory,
        account: &AccountId,
    ) -> SnapshotResult<SnapshotUpdate> {
        match category {
            ResourceCategory::Positions => self
                .api
                .fetch_positions(account)
                .await
                .map(SnapshotUpdate::Positions),
            ResourceCategory::Orders => self
                .api
                .fetch_orders(account)
                .await
                .map(SnapshotUpdate::Orders),
            ResourceCategory::Trades => self
                .api
                .fetch_trades(account)
                .await
                .map(SnapshotUpdate::Trades),
            ResourceCategory::Overview => self
                .api
                .fetch_overview(account)
                .await
                .map(SnapshotUpdate::Overview),
            ResourceCategory::Activity => self
                .api
                .fetch_activity(account)
                .await
                .map(SnapshotUpdate::Activity),
        }
    }

    pub async fn state(&self) -> AccountState {
        self.inner.lock().await.state.clone()
    }

    pub async fn is_loading(&self, category: ResourceCategory) -> bool {
        self.inner.lock().await.loading.get(category)
    }

    pub async fn account(&self) -> AccountId {
        self.inner.lock().await.account.clone()
    }

    /// Reset to an empty state for a new account context.
    pub async fn reset(&self, account: AccountId) {
        let mut inner = self.inner.lock().await;
        inner.account = account;
        inner.state = AccountState::default();
        inner.loading = LoadingFlags::default();
    }

    /// After disposal every in-flight fetch completion becomes a no-op.
    pub fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
    }
}

fn apply(state: &mut AccountState, update: SnapshotUpdate) {
    match update {
        SnapshotUpdate::Positions(positions) => state.positions = positions,
        SnapshotUpdate::Orders(orders) => state.orders = orders,
        SnapshotUpdate::Trades(trades) => state.trades = trades,
        SnapshotUpdate::Overview(overview) => state.overview = Some(overview),
        SnapshotUpdate::Activity(activities) => state.activities = activities,
    }
}
