//! Invoice records.

use crate::{document_of, record_of};
use serde::{Deserialize, Serialize};
use solbill_sync::{Document, EntityId, FieldMapper, SyncResult};

/// Payment status of an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    /// Generated but not yet issued to the customer.
    Draft,
    /// Issued and awaiting payment.
    Open,
    /// Settled.
    Paid,
    /// Past its due date without payment.
    Overdue,
}

/// One monthly invoice for a customer.
///
/// Monetary values are integer cents. The amounts are populated by the
/// dashboard's tariff calculation from the customer's
/// [`BillingConfig`](crate::BillingConfig); this record only carries them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    /// Engine-managed identity.
    pub id: EntityId,
    /// Remote id of the invoiced customer.
    pub customer_id: String,
    /// Billing period, `YYYY-MM`.
    pub reference_month: String,
    /// Energy consumed in the period, kWh.
    pub kwh_consumed: f64,
    /// Value before discount, cents.
    pub gross_amount_cents: i64,
    /// Discount applied, cents.
    pub discount_cents: i64,
    /// Value payable, cents.
    pub net_amount_cents: i64,
    /// Due date, `YYYY-MM-DD`.
    pub due_date: String,
    /// Payment status.
    pub status: InvoiceStatus,
}

impl Invoice {
    /// Creates a new draft invoice with a local temporary id.
    #[must_use]
    pub fn new(customer_id: impl Into<String>, reference_month: impl Into<String>) -> Self {
        Self {
            id: EntityId::local(),
            customer_id: customer_id.into(),
            reference_month: reference_month.into(),
            kwh_consumed: 0.0,
            gross_amount_cents: 0,
            discount_cents: 0,
            net_amount_cents: 0,
            due_date: String::new(),
            status: InvoiceStatus::Draft,
        }
    }
}

/// Maps [`Invoice`] records to the `invoices` collection.
#[derive(Debug, Clone, Copy, Default)]
pub struct InvoiceMapper;

impl FieldMapper for InvoiceMapper {
    type Record = Invoice;

    fn collection(&self) -> &str {
        "invoices"
    }

    fn to_remote(&self, record: &Invoice) -> SyncResult<Document> {
        document_of(record)
    }

    fn from_remote(&self, id: &EntityId, fields: &Document) -> SyncResult<Invoice> {
        record_of(id, fields)
    }
}
