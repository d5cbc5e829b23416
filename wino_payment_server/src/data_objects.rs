use indexer_tools::EnhancedTransaction;
use log::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use wino_payment_engine::db_types::ExternalPaymentEvent;

use crate::integrations::indexer::events_from_enhanced_transaction;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PendingInvoicesQuery {
    pub destination: Option<String>,
}

/// One element of a webhook delivery. Either the canonical event shape, or an indexer enhanced transaction.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TransferNotification {
    Event(ExternalPaymentEvent),
    Enhanced(EnhancedTransaction),
}

/// A webhook delivery that has been normalized into payment events. Elements that could not be understood are kept
/// aside with the reason, so that they can be reported without holding up the rest of the batch.
#[derive(Debug, Clone, Default)]
pub struct NormalizedDelivery {
    pub events: Vec<ExternalPaymentEvent>,
    pub rejected: Vec<(String, String)>,
}

impl NormalizedDelivery {
    /// Normalizes a webhook body, which is a JSON array of notifications or a single notification.
    ///
    /// Fails only if the body is not JSON, or is neither an array nor an object.
    pub fn from_json(body: &[u8], mint: Option<&str>, decimals: u8) -> Result<Self, String> {
        let value = serde_json::from_slice::<Value>(body).map_err(|e| format!("Webhook body is not JSON. {e}"))?;
        let items = match value {
            Value::Array(items) => items,
            v @ Value::Object(_) => vec![v],
            _ => return Err("Webhook body must be a notification or an array of notifications".to_string()),
        };
        let mut result = Self::default();
        for item in items {
            let reference = notification_reference(&item);
            match serde_json::from_value::<TransferNotification>(item) {
                Ok(TransferNotification::Event(event)) => result.events.push(event),
                Ok(TransferNotification::Enhanced(tx)) => match events_from_enhanced_transaction(&tx, mint, decimals) {
                    Ok(events) => result.events.extend(events),
                    Err(e) => result.rejected.push((reference, e.to_string())),
                },
                Err(e) => {
                    debug!("💻️ Unrecognised webhook notification {reference}. {e}");
                    result.rejected.push((reference, "Unrecognised notification format".to_string()))
                },
            }
        }
        Ok(result)
    }
}

fn notification_reference(item: &Value) -> String {
    item.get("settlement_ref")
        .or_else(|| item.get("signature"))
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string()
}
