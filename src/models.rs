use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Document records
// ---------------------------------------------------------------------------
//
// Accounts and transactions live in the store as schema-less JSON documents.
// The typed structs below cover the fields the engine understands; anything
// else a document carries rides along in `extra` and is written back intact.

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: String,
    #[serde(default)]
    pub user_id: String,
    /// The stated balance — the authoritative target the ledger must explain.
    #[serde(default, deserialize_with = "lenient_amount")]
    pub balance: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_type: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Deposit,
    Withdrawal,
    Transfer,
    Adjustment,
    /// Unrecognized or absent type. Legacy rows sometimes omit it entirely;
    /// they still belong to the ledger.
    #[serde(other)]
    #[default]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    /// Legacy documents predate the status field; they were always part of
    /// the balance, so a missing status reads as completed.
    #[default]
    Completed,
    Pending,
    Failed,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    #[serde(default)]
    pub account_id: String,
    #[serde(default)]
    pub user_id: String,
    /// Signed: positive = credit, negative = debit. A value that fails to
    /// parse as a number decodes to 0.0 — the row still exists, it just
    /// contributes nothing to the sum.
    #[serde(default, deserialize_with = "lenient_amount")]
    pub amount: f64,
    #[serde(rename = "type", default)]
    pub kind: TransactionKind,
    #[serde(default)]
    pub description: String,
    /// Informational running balance. Display only, never authoritative.
    #[serde(default, deserialize_with = "lenient_amount")]
    pub balance_after: f64,
    #[serde(default = "epoch", deserialize_with = "lenient_timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub status: TransactionStatus,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

fn epoch() -> DateTime<Utc> {
    Utc.timestamp_opt(0, 0).unwrap()
}

/// Accept a number, a numeric string, or garbage; garbage coerces to 0.0.
fn lenient_amount<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().replace(',', "").parse().unwrap_or(0.0),
        _ => 0.0,
    })
}

fn lenient_timestamp<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<DateTime<Utc>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) => s
            .parse::<DateTime<Utc>>()
            .unwrap_or_else(|_| epoch()),
        Value::Number(n) => n
            .as_i64()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
            .unwrap_or_else(epoch),
        _ => epoch(),
    })
}
