use chrono::{DateTime, Utc};
use log::*;
use sqlx::{FromRow, QueryBuilder, SqliteConnection};
use wpg_common::TokenAmount;

use crate::{
    db_types::{Account, Invoice, InvoiceId, InvoiceStatusType, MatchingKey},
    traits::InvoiceStoreError,
};

const INVOICE_COLUMNS: &str = "id, merchant_destination, expected_amount, matching_key, status, needs_review, \
                               review_refs, created_at, expires_at, paid_at, settlement_ref, payer_identity";

/// The flat, on-disk representation of an invoice.
#[derive(Debug, Clone, FromRow)]
struct InvoiceRow {
    id: InvoiceId,
    merchant_destination: Account,
    expected_amount: Option<TokenAmount>,
    matching_key: MatchingKey,
    status: String,
    needs_review: bool,
    review_refs: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    paid_at: Option<DateTime<Utc>>,
    settlement_ref: Option<String>,
    payer_identity: Option<Account>,
}

impl TryFrom<InvoiceRow> for Invoice {
    type Error = InvoiceStoreError;

    fn try_from(row: InvoiceRow) -> Result<Self, Self::Error> {
        let corrupt = |reason: String| InvoiceStoreError::CorruptRecord { id: row.id.0.clone(), reason };
        let status = row.status.parse::<InvoiceStatusType>().map_err(|e| corrupt(e.to_string()))?;
        let review_refs = serde_json::from_str::<Vec<String>>(&row.review_refs)
            .map_err(|e| corrupt(format!("review_refs is not a JSON list. {e}")))?;
        Ok(Invoice {
            id: row.id,
            merchant_destination: row.merchant_destination,
            expected_amount: row.expected_amount,
            matching_key: row.matching_key,
            status,
            needs_review: row.needs_review,
            review_refs,
            created_at: row.created_at,
            expires_at: row.expires_at,
            paid_at: row.paid_at,
            settlement_ref: row.settlement_ref,
            payer_identity: row.payer_identity,
        })
    }
}

pub async fn fetch_invoice(id: &InvoiceId, conn: &mut SqliteConnection) -> Result<Option<Invoice>, InvoiceStoreError> {
    let sql = format!("SELECT {INVOICE_COLUMNS} FROM invoices WHERE id = $1");
    let row = sqlx::query_as::<_, InvoiceRow>(&sql).bind(id).fetch_optional(conn).await?;
    row.map(Invoice::try_from).transpose()
}

/// Inserts the invoice, or, if a record with the same id exists, overwrites its mutable fields. The identity fields
/// (destination, amount, matching key and validity window) are never changed after the first write.
pub async fn upsert_invoice(invoice: &Invoice, conn: &mut SqliteConnection) -> Result<(), InvoiceStoreError> {
    let review_refs = serde_json::to_string(&invoice.review_refs)
        .map_err(|e| InvoiceStoreError::DatabaseError(format!("Could not serialize review_refs. {e}")))?;
    let result = sqlx::query(
        r#"
            INSERT INTO invoices (
                id,
                merchant_destination,
                expected_amount,
                matching_key,
                status,
                needs_review,
                review_refs,
                created_at,
                expires_at,
                paid_at,
                settlement_ref,
                payer_identity
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (id) DO UPDATE SET
                status = excluded.status,
                needs_review = excluded.needs_review,
                review_refs = excluded.review_refs,
                paid_at = excluded.paid_at,
                settlement_ref = excluded.settlement_ref,
                payer_identity = excluded.payer_identity,
                updated_at = CURRENT_TIMESTAMP;
        "#,
    )
    .bind(&invoice.id)
    .bind(&invoice.merchant_destination)
    .bind(invoice.expected_amount)
    .bind(&invoice.matching_key)
    .bind(invoice.status.to_string())
    .bind(invoice.needs_review)
    .bind(review_refs)
    .bind(invoice.created_at)
    .bind(invoice.expires_at)
    .bind(invoice.paid_at)
    .bind(&invoice.settlement_ref)
    .bind(&invoice.payer_identity)
    .execute(conn)
    .await?;
    trace!("🗃️ Invoice {} saved ({} row affected)", invoice.id, result.rows_affected());
    Ok(())
}

/// Fetches invoices whose stored status is `Pending`, oldest first.
pub async fn fetch_pending_invoices(
    destination: Option<&Account>,
    conn: &mut SqliteConnection,
) -> Result<Vec<Invoice>, InvoiceStoreError> {
    let mut builder = QueryBuilder::new(format!("SELECT {INVOICE_COLUMNS} FROM invoices WHERE status = "));
    builder.push_bind(InvoiceStatusType::Pending.to_string());
    if let Some(destination) = destination {
        builder.push(" AND merchant_destination = ");
        builder.push_bind(destination.as_str());
    }
    builder.push(" ORDER BY created_at ASC, id ASC");
    trace!("🗃️ Executing query: {}", builder.sql());
    let rows = builder.build_query_as::<InvoiceRow>().fetch_all(conn).await?;
    trace!("🗃️ {} pending invoices fetched", rows.len());
    rows.into_iter().map(Invoice::try_from).collect()
}
