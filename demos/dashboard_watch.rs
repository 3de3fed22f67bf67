//! Watches one account and prints snapshot changes as the event stream
//! drives refreshes.
//!
//! Optional environment variables:
//! - `DESK_API_BASE_URL`
//! - `DESK_WS_URL`
//! - `DESK_ACCOUNT_ID`
//! - `DESK_BEARER_TOKEN`
//! Optional configuration via `desk.toml` or `DESK_CONFIG_PATH`.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use desk_sync::{EngineConfig, RestSnapshotApi, SessionControl, SyncEngine};

struct EnvSession;

#[async_trait]
impl SessionControl for EnvSession {
    async fn bearer_token(&self) -> Option<String> {
        std::env::var("DESK_BEARER_TOKEN").ok()
    }

    async fn force_logout(&self) {
        eprintln!("Session rejected by the gateway; stop and re-authenticate.");
        std::process::exit(1);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "desk_sync=info".into()),
        )
        .init();

    let config_path =
        std::env::var("DESK_CONFIG_PATH").unwrap_or_else(|_| "desk.toml".to_string());
    let config = if std::path::Path::new(&config_path).exists() {
        EngineConfig::from_file(&config_path)?
    } else {
        EngineConfig::default()
    };
    let account =
        std::env::var("DESK_ACCOUNT_ID").unwrap_or_else(|_| "DEMO_ACCOUNT".to_string());

    let session: Arc<dyn SessionControl> = Arc::new(EnvSession);
    let api = Arc::new(RestSnapshotApi::new(
        &config.api_base_url,
        Arc::clone(&session),
    )?);

    println!(
        "Watching account {account} via {} (stream {})",
        config.api_base_url,
        config.stream_url()?
    );

    let mut engine = SyncEngine::builder()
        .config(config)
        .account(account)
        .api(api)
        .session(session)
        .start()?;

    let mut last_equity: Option<f64> = None;
    for _ in 0..60 {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let state = engine.state().await;
        let equity = state.overview.as_ref().map(|o| o.current_equity);
        if equity != last_equity {
            if let Some(overview) = &state.overview {
                println!(
                    "equity={:.2} buying_power={:.2} positions={} open_orders={}",
                    overview.current_equity,
                    overview.buying_power,
                    state.positions.len(),
                    state.orders.len()
                );
            }
            last_equity = equity;
        }

        if !engine.is_connected() {
            println!("Stream disconnected; reconnect pending...");
        }
    }

    println!("Done watching; shutting down.");
    engine.shutdown().await;
    Ok(())
}
