use std::sync::Arc;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize};
use url::Url;

use crate::{
    errors::{SnapshotError, SnapshotResult},
    models::{AccountOverview, Activity, Order, Position, Trade},
    snapshot::{SessionControl, SnapshotApi},
    types::AccountId,
};

const TRADES_LIMIT: u32 = 1000;
const ACTIVITY_LIMIT: u32 = 100;

/// Production snapshot fetcher over the dashboard gateway's REST API.
///
/// List endpoints return `{ "<category>": [...] }` envelopes; the overview
/// endpoint returns the object directly. A 401 maps to
/// [`SnapshotError::Unauthorized`], everything else non-2xx to a generic
/// HTTP error.
pub struct RestSnapshotApi {
    http: reqwest::Client,
    base_url: Url,
    session: Arc<dyn SessionControl>,
}

#[derive(Deserialize)]
struct PositionsEnvelope {
    #[serde(default)]
    positions: Vec<Position>,
}

#[derive(Deserialize)]
struct OrdersEnvelope {
    #[serde(default)]
    orders: Vec<Order>,
}

#[derive(Deserialize)]
struct TradesEnvelope {
    #[serde(default)]
    trades: Vec<Trade>,
}

#[derive(Deserialize)]
struct ActivitiesEnvelope {
    #[serde(default)]
    activities: Vec<Activity>,
}

impl RestSnapshotApi {
    pub fn new(
        base_url: impl AsRef<str>,
        session: Arc<dyn SessionControl>,
    ) -> SnapshotResult<Self> {
        Ok(Self {
            http: reqwest::Client::new(),
            base_url: Url::parse(base_url.as_ref())?,
            session,
        })
    }

    fn endpoint(&self, account: &AccountId, resource: &str) -> SnapshotResult<Url> {
        let url = self
            .base_url
            .join(&format!("api/accounts/{account}/{resource}"))?;
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        account: &AccountId,
        resource: &str,
        limit: Option<u32>,
    ) -> SnapshotResult<T> {
        let mut url = self.endpoint(account, resource)?;
        if let Some(limit) = limit {
            url.query_pairs_mut().append_pair("limit", &limit.to_string());
        }

        let mut request = self.http.get(url);
        if let Some(token) = self.session.bearer_token().await {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SnapshotError::from_status(status.as_u16(), body));
        }
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl SnapshotApi for RestSnapshotApi {
    async fn fetch_positions(&self, account: &AccountId) -> SnapshotResult<Vec<Position>> {
        let envelope: PositionsEnvelope = self.get_json(account, "positions", None).await?;
        Ok(envelope.positions)
    }

    async fn fetch_orders(&self, account: &AccountId) -> SnapshotResult<Vec<Order>> {
        let envelope: OrdersEnvelope = self.get_json(account, "orders", None).await?;
        Ok(envelope.orders)
    }

    async fn fetch_trades(&self, account: &AccountId) -> SnapshotResult<Vec<Trade>> {
        let envelope: TradesEnvelope = self
            .get_json(account, "trades", Some(TRADES_LIMIT))
            .await?;
        Ok(envelope.trades)
    }

    async fn fetch_overview(&self, account: &AccountId) -> SnapshotResult<AccountOverview> {
        self.get_json(account, "overview", None).await
    }

    async fn fetch_activity(&self, account: &AccountId) -> SnapshotResult<Vec<Activity>> {
        let envelope: ActivitiesEnvelope = self
            .get_json(account, "activity", Some(ACTIVITY_LIMIT))
            .await?;
        Ok(envelope.activities)
    }

    async fn trigger_refresh(&self, account: &AccountId) -> SnapshotResult<()> {
        let url = self.endpoint(account, "refresh")?;
        let mut request = self.http.post(url);
        if let Some(token) = self.session.bearer_token().await {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SnapshotError::from_status(status.as_u16(), body));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::tests::FakeSession;

    fn api() -> RestSnapshotApi {
        RestSnapshotApi::new("http://localhost:8000", Arc::new(FakeSession::new())).unwrap()
    }

    #[test]
    fn endpoints_are_account_scoped() {
        let api = api();
        let url = api
            .endpoint(&AccountId::from("ACC1"), "positions")
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8000/api/accounts/ACC1/positions"
        );
    }

    #[test]
    fn rejects_invalid_base_url() {
        let result = RestSnapshotApi::new("not a url", Arc::new(FakeSession::new()));
        assert!(result.is_err());
    }

    #[test]
    fn list_envelopes_tolerate_missing_arrays() {
        let envelope: TradesEnvelope = serde_json::from_str("{}").unwrap();
        assert!(envelope.trades.is_empty());
        let envelope: PositionsEnvelope = serde_json::from_str("{}").unwrap();
        assert!(envelope.positions.is_empty());
        let envelope: OrdersEnvelope = serde_json::from_str("{}").unwrap();
        assert!(envelope.orders.is_empty());
        let envelope: ActivitiesEnvelope = serde_json::from_str("{}").unwrap();
        assert!(envelope.activities.is_empty());
    }
}
