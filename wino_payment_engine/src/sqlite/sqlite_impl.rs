//! `SqliteDatabase` is a concrete implementation of a Wino Payment Engine storage backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements the [`InvoiceStore`] trait.
use std::fmt::Debug;

use log::*;
use sqlx::{migrate, SqlitePool};

use super::db::{create_database_if_missing, invoices, matching_keys, new_pool};
use crate::{
    db_types::{Account, Invoice, InvoiceId, MatchingKey},
    traits::{InvoiceStore, InvoiceStoreError},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl InvoiceStore for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn fetch_invoice(&self, id: &InvoiceId) -> Result<Option<Invoice>, InvoiceStoreError> {
        let mut conn = self.pool.acquire().await?;
        invoices::fetch_invoice(id, &mut conn).await
    }

    async fn save_invoice(&self, invoice: &Invoice) -> Result<(), InvoiceStoreError> {
        let mut conn = self.pool.acquire().await?;
        invoices::upsert_invoice(invoice, &mut conn).await
    }

    async fn index_matching_key(&self, key: &MatchingKey, id: &InvoiceId) -> Result<(), InvoiceStoreError> {
        let mut conn = self.pool.acquire().await?;
        matching_keys::claim(key, id, &mut conn).await
    }

    async fn invoice_id_for_matching_key(&self, key: &MatchingKey) -> Result<Option<InvoiceId>, InvoiceStoreError> {
        let mut conn = self.pool.acquire().await?;
        matching_keys::invoice_id_for_key(key, &mut conn).await
    }

    async fn fetch_pending_invoices(&self, destination: Option<&Account>) -> Result<Vec<Invoice>, InvoiceStoreError> {
        let mut conn = self.pool.acquire().await?;
        invoices::fetch_pending_invoices(destination, &mut conn).await
    }

    async fn close(&mut self) -> Result<(), InvoiceStoreError> {
        self.pool.close().await;
        Ok(())
    }
}

impl SqliteDatabase {
    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, InvoiceStoreError> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Creates the database at `url` if necessary, connects to it, and brings the schema up to date.
    pub async fn create_and_migrate(url: &str, max_connections: u32) -> Result<Self, InvoiceStoreError> {
        create_database_if_missing(url).await?;
        let db = Self::new_with_url(url, max_connections).await?;
        db.migrate().await?;
        Ok(db)
    }

    /// Runs the embedded schema migrations.
    pub async fn migrate(&self) -> Result<(), InvoiceStoreError> {
        migrate!("./src/sqlite/migrations")
            .run(&self.pool)
            .await
            .map_err(|e| InvoiceStoreError::DatabaseError(format!("Migrations failed. {e}")))?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
