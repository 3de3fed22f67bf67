//! Real-time state synchronization for a trading-account dashboard.
//!
//! The engine keeps an in-memory account snapshot consistent with a remote
//! gateway by combining two feeds: a WebSocket event stream that announces
//! that something changed, and REST snapshot endpoints that say what the
//! state now is. Stream events never carry authoritative data; they only
//! schedule snapshot re-fetches, deduplicated and debounced per resource
//! category.
//!
//! ```no_run
//! use std::sync::Arc;
//! use desk_sync::{EngineConfig, RestSnapshotApi, SessionControl, SyncEngine};
//!
//! # async fn run(session: Arc<dyn SessionControl>) -> anyhow::Result<()> {
//! let config = EngineConfig::from_file("desk.toml")?;
//! let api = Arc::new(RestSnapshotApi::new(&config.api_base_url, Arc::clone(&session))?);
//! let engine = SyncEngine::builder()
//!     .config(config)
//!     .account("ACC1")
//!     .api(api)
//!     .session(session)
//!     .start()?;
//! let state = engine.state().await;
//! # Ok(())
//! # }
//! ```

pub mod buffer;
pub mod config;
pub mod connection;
pub mod debounce;
pub mod dedup;
pub mod engine;
pub mod errors;
pub mod models;
pub mod rest;
pub mod router;
pub mod snapshot;
pub mod types;

pub use config::EngineConfig;
pub use connection::{ConnectionManager, Dialer, FrameSource, WsDialer};
pub use engine::{SyncEngine, SyncEngineBuilder};
pub use errors::{
    EngineError, EngineResult, SnapshotError, SnapshotResult, StreamError, StreamResult,
};
pub use rest::RestSnapshotApi;
pub use snapshot::{AccountState, SessionControl, SnapshotApi, SnapshotCoordinator};
pub use types::{AccountId, ConnectionState, EventIdentity, ResourceCategory, StreamEvent};
