pub mod errors;
pub mod ingestion_api;
pub mod invoice_objects;
pub mod lifecycle_api;
pub mod matching;
pub mod reconciliation_api;
