/*
[INPUT]:  API schema definitions and serde requirements
[OUTPUT]: Typed Rust response structs with serialization support
[POS]:    Data layer - type definitions for API communication
[UPDATE]: When API schema changes or new types added
*/

use serde::{Deserialize, Serialize};

/// Response to an order submission. Transactions are kept as raw JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCreateResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_create_transaction: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_fill_transaction: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_cancel_transaction: Option<serde_json::Value>,
    #[serde(rename = "relatedTransactionIDs", default)]
    pub related_transaction_ids: Vec<String>,
    #[serde(rename = "lastTransactionID", default, skip_serializing_if = "Option::is_none")]
    pub last_transaction_id: Option<String>,
}
