//! Typed payloads returned by the snapshot endpoints.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    #[serde(rename = "type")]
    pub position_type: String,
    pub quantity: f64,
    pub avg_cost: f64,
    pub init_quantity: f64,
    pub init_price: f64,
    pub realized_pnl: f64,
    pub create_time: String,
    pub unrealized_pnl: f64,
    #[serde(default)]
    pub mark_price: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: String,
    pub token: String,
    pub symbol: String,
    pub side: String,
    pub order_type: String,
    pub quantity: f64,
    pub left_quantity: f64,
    pub canceled_quantity: f64,
    #[serde(default)]
    pub price: Option<f64>,
    pub route: String,
    pub status: String,
    pub time: String,
    pub original_order_id: String,
    pub account: String,
    pub trader: String,
    pub order_source: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub trade_id: String,
    pub symbol: String,
    pub side: String,
    pub quantity: f64,
    pub price: f64,
    pub route: String,
    pub time: String,
    pub order_id: String,
    pub liquidity: String,
    pub ecn_fee: f64,
    pub realized_pl: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AccountOverview {
    pub account_id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub user_name: Option<String>,
    pub current_equity: f64,
    pub open_equity: f64,
    pub realized_pl: f64,
    pub unrealized_pl: f64,
    pub net_pl: f64,
    pub buying_power: f64,
    pub overnight_bp: f64,
    pub equity_exposure: f64,
    pub commission: f64,
    pub fees: f64,
    #[serde(default)]
    pub last_update: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    #[serde(rename = "type")]
    pub activity_type: String,
    pub timestamp: String,
    pub symbol: String,
    #[serde(default)]
    pub side: Option<String>,
    #[serde(default)]
    pub quantity: Option<f64>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub realized_pl: Option<f64>,
    #[serde(default)]
    pub data: Value,
}
