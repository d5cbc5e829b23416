pub mod indexer;
pub mod notifications;
