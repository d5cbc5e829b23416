use log::*;
use sqlx::SqliteConnection;

use crate::{
    db_types::{InvoiceId, MatchingKey},
    traits::InvoiceStoreError,
};

/// Claims the matching key for the given invoice. The insert is a no-op if the key already exists, in which case
/// `MatchingKeyExists` is returned and the existing claim is left alone.
pub async fn claim(key: &MatchingKey, id: &InvoiceId, conn: &mut SqliteConnection) -> Result<(), InvoiceStoreError> {
    let result = sqlx::query(
        "INSERT INTO matching_keys (matching_key, invoice_id) VALUES ($1, $2) ON CONFLICT (matching_key) DO NOTHING",
    )
    .bind(key)
    .bind(id)
    .execute(conn)
    .await?;
    if result.rows_affected() == 0 {
        debug!("🗃️ Matching key {key} has already been claimed");
        return Err(InvoiceStoreError::MatchingKeyExists(key.to_string()));
    }
    Ok(())
}

pub async fn invoice_id_for_key(
    key: &MatchingKey,
    conn: &mut SqliteConnection,
) -> Result<Option<InvoiceId>, InvoiceStoreError> {
    let id = sqlx::query_scalar::<_, InvoiceId>("SELECT invoice_id FROM matching_keys WHERE matching_key = $1")
        .bind(key)
        .fetch_optional(conn)
        .await?;
    Ok(id)
}
