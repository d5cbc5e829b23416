//! A thin client for the blockchain indexer's REST API.
//!
//! The indexer decodes ledger transactions into "enhanced transactions": token transfers with their source and
//! destination accounts, UI amounts, and every account the transaction touched. The payment gateway uses it both to
//! receive pushed transactions (the webhook payload uses the same shape) and to look transfers up on demand.
mod api;
mod config;
mod data_objects;
mod error;

pub use api::IndexerApi;
pub use config::IndexerConfig;
pub use data_objects::{AccountData, EnhancedTransaction, TokenTransfer, UiAmount};
pub use error::IndexerApiError;
