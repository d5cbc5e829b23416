use std::fmt::Display;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use wpg_common::TokenAmount;

use crate::IndexerApiError;

/// A decoded ledger transaction, as returned by the indexer's transaction endpoints and pushed by its webhooks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnhancedTransaction {
    pub signature: String,
    /// Block time, in unix seconds
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub token_transfers: Vec<TokenTransfer>,
    #[serde(default)]
    pub account_data: Vec<AccountData>,
    #[serde(default)]
    pub fee_payer: Option<String>,
}

impl EnhancedTransaction {
    pub fn block_time(&self) -> Option<DateTime<Utc>> {
        self.timestamp.and_then(|t| Utc.timestamp_opt(t, 0).single())
    }

    /// Every account touched by the transaction, in the order the indexer listed them.
    pub fn touched_accounts(&self) -> impl Iterator<Item = &str> {
        self.account_data.iter().map(|a| a.account.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenTransfer {
    #[serde(default)]
    pub from_user_account: Option<String>,
    #[serde(default)]
    pub to_user_account: Option<String>,
    #[serde(default)]
    pub from_token_account: Option<String>,
    #[serde(default)]
    pub to_token_account: Option<String>,
    pub token_amount: UiAmount,
    #[serde(default)]
    pub mint: Option<String>,
}

impl TokenTransfer {
    /// The token account that received the transfer. Falls back to the owner wallet when the indexer did not report
    /// the token account.
    pub fn destination(&self) -> Option<&str> {
        self.to_token_account.as_deref().or(self.to_user_account.as_deref())
    }

    pub fn is_for_mint(&self, mint: &str) -> bool {
        self.mint.as_deref() == Some(mint)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountData {
    pub account: String,
}

/// Indexers report token amounts in display units, either as a JSON number or as a string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UiAmount {
    Number(f64),
    Text(String),
}

impl UiAmount {
    /// Converts the display amount into smallest units. Strings are parsed exactly; numbers are rounded.
    pub fn to_token_amount(&self, decimals: u8) -> Result<TokenAmount, IndexerApiError> {
        match self {
            UiAmount::Number(n) => TokenAmount::from_ui_amount(*n, decimals)
                .map_err(|e| IndexerApiError::InvalidTokenAmount(format!("{n}: {e}"))),
            UiAmount::Text(s) => TokenAmount::from_decimal_str(s, decimals)
                .map_err(|e| IndexerApiError::InvalidTokenAmount(format!("{s}: {e}"))),
        }
    }
}

impl Display for UiAmount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UiAmount::Number(n) => write!(f, "{n}"),
            UiAmount::Text(s) => f.write_str(s),
        }
    }
}
