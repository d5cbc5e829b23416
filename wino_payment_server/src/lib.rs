//! # Wino payment server
//! The HTTP front end of the Wino payment gateway. It is responsible for:
//! * Issuing invoices for merchant destinations and reporting their status.
//! * Receiving transfer notifications pushed by the blockchain indexer, and handing them to the reconciliation
//!   engine.
//! * Answering client polls and verification requests, consulting the ledger through the indexer when needed.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/api/invoices`, `/api/invoices/pending`, `/api/invoice/{id}`: invoice issuing and queries.
//! * `/api/invoice/{id}/poll` and `/api/invoice/{id}/verify`: client-driven payment confirmation.
//! * `/webhook/transfers`: the indexer webhook. Requires the shared secret as a bearer credential.
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod helpers;
pub mod integrations;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
