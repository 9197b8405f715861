use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// An unresolved delivery receipt fetched for the current cycle.
///
/// Each record is owned by exactly one worker for the lifetime of its
/// processing and dropped afterwards.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct PendingRecord {
    /// Primary key of the `dlr` row
    pub id: i64,
    /// Message id known to the upstream gateway (the `ts` column)
    pub external_id: i64,
    /// `smsc-id` of the gateway the message was sent through
    pub gateway_key: String,
    /// Callback URL with a `%d` placeholder for the delivery status
    pub callback_url_template: String,
    /// Destination phone number
    pub phone: String,
}

impl PendingRecord {
    pub fn new(
        id: i64,
        external_id: i64,
        gateway_key: impl Into<String>,
        callback_url_template: impl Into<String>,
        phone: impl Into<String>,
    ) -> Self {
        Self {
            id,
            external_id,
            gateway_key: gateway_key.into(),
            callback_url_template: callback_url_template.into(),
            phone: phone.into(),
        }
    }
}
