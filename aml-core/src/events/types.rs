//! Job events carried on the bus.
//!
//! Only `data.processing_id` is authoritative. The rest of `data` is a
//! denormalized summary for observers; the scoring worker re-reads the
//! submission from the primary store.

use crate::utils::ids::new_event_id;
use aml_sdk::objects::Transaction;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

pub const TRANSACTION_RECEIVED: &str = "transaction_received";

/// Request to screen one submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobEvent {
    pub event_id: String,
    pub event_type: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub data: JobData,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobData {
    pub processing_id: String,
    #[serde(default)]
    pub transaction_id: String,
    #[serde(default)]
    pub account_number: String,
    #[serde(default)]
    pub amount: Decimal,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub transaction_type: String,
    #[serde(default)]
    pub counterparty_country: String,
    #[serde(default)]
    pub channel: String,
}

impl JobEvent {
    /// A fresh `transaction_received` event for a persisted submission.
    pub fn transaction_received(processing_id: &str, tx: &Transaction) -> Self {
        Self {
            event_id: new_event_id(),
            event_type: TRANSACTION_RECEIVED.to_string(),
            timestamp: OffsetDateTime::now_utc(),
            data: JobData {
                processing_id: processing_id.to_string(),
                transaction_id: tx.transaction_id.clone(),
                account_number: tx.account_number.clone(),
                amount: tx.amount,
                currency: tx.currency.clone(),
                transaction_type: tx.transaction_type.clone(),
                counterparty_country: tx.counterparty_country.clone(),
                channel: tx.channel.clone(),
            },
        }
    }

    pub fn processing_id(&self) -> &str {
        &self.data.processing_id
    }
}

/// One message pulled from the bus, with enough position information to
/// commit or rewind it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub payload: Vec<u8>,
}

impl Delivery {
    pub fn decode(&self) -> Result<JobEvent, serde_json::Error> {
        serde_json::from_slice(&self.payload)
    }
}
