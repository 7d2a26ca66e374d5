//! Entity types of the SolBill reseller billing dashboard.
//!
//! Customers, generating plants and invoices, with the
//! [`FieldMapper`](solbill_sync::FieldMapper) implementations that plug
//! them into the generic [`Repository`](solbill_sync::Repository). The
//! mappers are pure field mapping; tariff arithmetic stays with the
//! dashboard.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod customer;
mod invoice;
mod plant;

pub use customer::{BillingConfig, CalculationKind, Customer, CustomerMapper, CustomerStatus, LightingCharge};
pub use invoice::{Invoice, InvoiceMapper, InvoiceStatus};
pub use plant::{Plant, PlantMapper, PlantStatus};

use serde::de::DeserializeOwned;
use serde::Serialize;
use solbill_sync::{Document, EntityId, SyncError, SyncResult};

/// Serializes a record to its remote payload, stripping the `id` field
/// (ids travel out of band in the engine).
pub(crate) fn document_of<T: Serialize>(record: &T) -> SyncResult<Document> {
    let value = serde_json::to_value(record)?;
    let serde_json::Value::Object(mut fields) = value else {
        return Err(SyncError::mapping("record did not serialize to an object"));
    };
    fields.remove("id");
    Ok(fields)
}

/// Rebuilds a record from an id and a remote payload.
pub(crate) fn record_of<T: DeserializeOwned>(id: &EntityId, fields: &Document) -> SyncResult<T> {
    let mut fields = fields.clone();
    fields.insert("id".into(), serde_json::Value::String(id.to_string()));
    Ok(serde_json::from_value(serde_json::Value::Object(fields))?)
}
