use std::sync::Arc;

use tokio::{
    sync::{mpsc, watch, Mutex},
    task::JoinHandle,
};

use crate::{
    config::EngineConfig,
    connection::{ConnectionManager, Dialer, WsDialer},
    debounce::DebounceScheduler,
    errors::{EngineError, EngineResult},
    router::{EventRouter, RefreshIntent},
    snapshot::{AccountState, SessionControl, SnapshotApi, SnapshotCoordinator},
    types::{AccountId, ConnectionState, ResourceCategory, StreamEvent},
};

/// The real-time state synchronization engine for one dashboard session.
///
/// Owns the event-stream connection, deduplicates and classifies incoming
/// events, and decides when and which authoritative snapshot to re-fetch.
/// Everything is session-scoped: build one engine per mounted dashboard and
/// call [`shutdown`](SyncEngine::shutdown) when it unmounts.
pub struct SyncEngine {
    connection: ConnectionManager,
    coordinator: Arc<SnapshotCoordinator>,
    scheduler: Arc<DebounceScheduler>,
    router: Arc<Mutex<EventRouter>>,
    api: Arc<dyn SnapshotApi>,
    route_task: Option<JoinHandle<()>>,
}

impl SyncEngine {
    pub fn builder() -> SyncEngineBuilder {
        SyncEngineBuilder {
            config: EngineConfig::default(),
            account: None,
            api: None,
            session: None,
            dialer: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.connection.state()
    }

    /// Current snapshot state for the observed account.
    pub async fn state(&self) -> AccountState {
        self.coordinator.state().await
    }

    pub async fn is_loading(&self, category: ResourceCategory) -> bool {
        self.coordinator.is_loading(category).await
    }

    /// Buffered stream events, newest first.
    pub async fn recent_events(&self) -> Vec<StreamEvent> {
        self.connection.recent_events().await
    }

    pub async fn account(&self) -> AccountId {
        self.coordinator.account().await
    }

    /// Operator-triggered full refresh, independent of debounce state. Asks
    /// the gateway to refresh its own cache first; that call failing is
    /// logged and does not stop the snapshot fetches.
    pub async fn refresh_all(&self) {
        let account = self.coordinator.account().await;
        if let Err(err) = self.api.trigger_refresh(&account).await {
            tracing::warn!(%account, error = %err, "gateway refresh request failed");
        }
        self.coordinator.refresh_all().await;
    }

    /// Move the engine to a new account context. Pending debounce timers
    /// are cancelled before anything for the new account can be armed, the
    /// dedup window resets and the snapshot state starts empty; the
    /// account-agnostic connection stays open.
    pub async fn switch_account(&self, account: AccountId) {
        tracing::info!(%account, "switching account context");
        self.scheduler.cancel_all().await;
        self.router.lock().await.switch_account(account.clone());
        self.coordinator.reset(account).await;
        self.coordinator.refresh_all().await;
    }

    /// Tear the session down: cancel timers, stop routing, close the
    /// connection. In-flight fetch results arriving afterwards are
    /// discarded by the coordinator's disposed guard.
    pub async fn shutdown(&mut self) {
        self.scheduler.cancel_all().await;
        self.coordinator.dispose();
        if let Some(task) = self.route_task.take() {
            task.abort();
        }
        self.connection.shutdown();
    }
}

pub struct SyncEngineBuilder {
    config: EngineConfig,
    account: Option<AccountId>,
    api: Option<Arc<dyn SnapshotApi>>,
    session: Option<Arc<dyn SessionControl>>,
    dialer: Option<Arc<dyn Dialer>>,
}

impl SyncEngineBuilder {
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn account(mut self, account: impl Into<AccountId>) -> Self {
        self.account = Some(account.into());
        self
    }

    pub fn api(mut self, api: Arc<dyn SnapshotApi>) -> Self {
        self.api = Some(api);
        self
    }

    pub fn session(mut self, session: Arc<dyn SessionControl>) -> Self {
        self.session = Some(session);
        self
    }

    /// Override the production WebSocket dialer; used by tests and demos.
    pub fn dialer(mut self, dialer: Arc<dyn Dialer>) -> Self {
        self.dialer = Some(dialer);
        self
    }

    /// Construct the engine, open the connection and kick off the initial
    /// full snapshot load. The initial load runs in the background; watch
    /// the per-category loading flags for progress.
    pub fn start(self) -> EngineResult<SyncEngine> {
        let account = self.account.ok_or(EngineError::InvalidConfig {
            field: "account",
            why: "an account id is required",
        })?;
        let api = self.api.ok_or(EngineError::InvalidConfig {
            field: "api",
            why: "a snapshot api is required",
        })?;
        let session = self.session.ok_or(EngineError::InvalidConfig {
            field: "session",
            why: "a session control is required",
        })?;

        let dialer = match self.dialer {
            Some(dialer) => dialer,
            None => {
                let url = self
                    .config
                    .stream_url()
                    .map_err(crate::errors::StreamError::from)?;
                Arc::new(WsDialer::new(url))
            }
        };

        let mut connection = ConnectionManager::connect(
            dialer,
            self.config.reconnect_delay(),
            self.config.message_buffer_cap,
        );
        let events = connection
            .take_events()
            .ok_or(EngineError::InvalidConfig {
                field: "connection",
                why: "event channel already taken",
            })?;

        let coordinator = Arc::new(SnapshotCoordinator::new(
            api.clone(),
            session,
            account.clone(),
        ));
        let scheduler = Arc::new(DebounceScheduler::new(self.config.debounce()));
        let router = Arc::new(Mutex::new(EventRouter::new(
            account,
            self.config.dedup_cap,
        )));

        let route_task = tokio::spawn(route_loop(
            events,
            Arc::clone(&router),
            Arc::clone(&scheduler),
            Arc::clone(&coordinator),
        ));

        // Initial load, in the background so startup never blocks on the
        // gateway.
        let initial = Arc::clone(&coordinator);
        tokio::spawn(async move {
            initial.refresh_all().await;
        });

        Ok(SyncEngine {
            connection,
            coordinator,
            scheduler,
            router,
            api,
            route_task: Some(route_task),
        })
    }
}

/// Single routing task: dedup check-and-mark, classification and timer
/// replacement all happen here between suspension points, so they never
/// interleave.
async fn route_loop(
    mut events: mpsc::UnboundedReceiver<StreamEvent>,
    router: Arc<Mutex<EventRouter>>,
    scheduler: Arc<DebounceScheduler>,
    coordinator: Arc<SnapshotCoordinator>,
) {
    while let Some(event) = events.recv().await {
        let intent = router.lock().await.route(&event);
        match intent {
            Some(RefreshIntent::Immediate(category)) => {
                // The fetch must not stall routing.
                let coordinator = Arc::clone(&coordinator);
                tokio::spawn(async move {
                    coordinator.refresh(category).await;
                });
            }
            Some(RefreshIntent::Debounced(category)) => {
                scheduler.schedule(category, Arc::clone(&coordinator)).await;
            }
            None => {}
        }
    }
}
