use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Number of leading characters of the canonical payload serialization used
/// as the dedup fingerprint. Collisions are tolerated; the fingerprint only
/// guards against re-delivery, never business logic.
const FINGERPRINT_LEN: usize = 32;

/// Identifier for a trading account.
#[repr(transparent)]
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl From<String> for AccountId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for AccountId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The closed set of dashboard resources, each backed by exactly one
/// snapshot endpoint and one loading flag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceCategory {
    Positions,
    Orders,
    Trades,
    Overview,
    Activity,
}

impl ResourceCategory {
    pub const ALL: [ResourceCategory; 5] = [
        ResourceCategory::Positions,
        ResourceCategory::Orders,
        ResourceCategory::Trades,
        ResourceCategory::Overview,
        ResourceCategory::Activity,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            ResourceCategory::Positions => "positions",
            ResourceCategory::Orders => "orders",
            ResourceCategory::Trades => "trades",
            ResourceCategory::Overview => "overview",
            ResourceCategory::Activity => "activity",
        }
    }
}

impl fmt::Display for ResourceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of the event-stream connection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// A decoded event received from the stream. Immutable once constructed;
/// events are processed in strict arrival order.
#[derive(Clone, Debug)]
pub struct StreamEvent {
    pub category: String,
    pub account_id: AccountId,
    pub payload: Value,
    pub received_at: DateTime<Utc>,
}

/// Derived key recognizing re-delivery of the same logical event.
///
/// Built from the event timestamp, category, account and a short payload
/// fingerprint. Used only by the dedup index.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct EventIdentity(String);

impl EventIdentity {
    pub fn of(event: &StreamEvent) -> Self {
        let serialized = event.payload.to_string();
        let fingerprint: String = serialized.chars().take(FINGERPRINT_LEN).collect();
        Self(format!(
            "{}-{}-{}-{}",
            event.received_at.timestamp_millis(),
            event.category,
            event.account_id,
            fingerprint
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn event(category: &str, account: &str, payload: Value) -> StreamEvent {
        StreamEvent {
            category: category.to_string(),
            account_id: AccountId::from(account),
            payload,
            received_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn identity_is_stable_across_redelivery() {
        let first = event("order", "ACC1", json!({"order_id": "42"}));
        let second = first.clone();
        assert_eq!(EventIdentity::of(&first), EventIdentity::of(&second));
    }

    #[test]
    fn identity_differs_by_account() {
        let a = event("order", "ACC1", json!({"order_id": "42"}));
        let b = event("order", "ACC2", json!({"order_id": "42"}));
        assert_ne!(EventIdentity::of(&a), EventIdentity::of(&b));
    }

    #[test]
    fn identity_differs_by_payload_prefix() {
        let a = event("trade", "ACC1", json!({"trade_id": "t-1"}));
        let b = event("trade", "ACC1", json!({"trade_id": "t-2"}));
        assert_ne!(EventIdentity::of(&a), EventIdentity::of(&b));
    }

    #[test]
    fn category_round_trip_labels() {
        for category in ResourceCategory::ALL {
            assert!(!category.as_str().is_empty());
        }
        assert_eq!(ResourceCategory::Overview.to_string(), "overview");
    }
}
