//! Customer records and their billing configuration.

use crate::{document_of, record_of};
use serde::{Deserialize, Serialize};
use solbill_sync::{Document, EntityId, FieldMapper, SyncResult};

/// Lifecycle status of a customer account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CustomerStatus {
    /// Billed normally.
    Active,
    /// Suspended, no invoices issued.
    Inactive,
    /// Registered but not yet approved.
    Pending,
}

/// How the customer's energy discount is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalculationKind {
    /// Percentage discount over the utility tariff.
    DiscountPercent,
    /// Fixed negotiated rate per kWh.
    FixedRate,
}

/// How the public lighting contribution is charged, if at all.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum LightingCharge {
    /// Not charged through the reseller.
    None,
    /// Fixed monthly amount in cents.
    Fixed {
        /// Monthly amount, cents.
        amount_cents: i64,
    },
    /// Percentage of the invoice energy value.
    Percent {
        /// Percentage, 0 to 100.
        pct: f64,
    },
}

/// Per-customer billing parameters applied when an invoice is generated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingConfig {
    /// Discount model.
    pub calculation: CalculationKind,
    /// Discount percentage, 0 to 100. Ignored under a fixed rate.
    pub discount_pct: f64,
    /// Distribution tariff component (TUSD), currency units per kWh.
    pub tusd_rate: f64,
    /// Energy tariff component (TE), currency units per kWh.
    pub te_rate: f64,
    /// Public lighting contribution mode.
    pub lighting: LightingCharge,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            calculation: CalculationKind::DiscountPercent,
            discount_pct: 0.0,
            tusd_rate: 0.0,
            te_rate: 0.0,
            lighting: LightingCharge::None,
        }
    }
}

/// A customer of the reseller: the consumer unit being billed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    /// Engine-managed identity.
    pub id: EntityId,
    /// Display name.
    pub name: String,
    /// Contact e-mail.
    pub email: String,
    /// CPF or CNPJ, digits only.
    pub document: String,
    /// Contact phone.
    pub phone: String,
    /// Street address.
    pub address: String,
    /// City.
    pub city: String,
    /// State code.
    pub state: String,
    /// Postal code.
    pub postal_code: String,
    /// Account status.
    pub status: CustomerStatus,
    /// Remote id of the plant that credits this customer, when linked.
    pub plant_id: Option<String>,
    /// Rolling average monthly consumption, kWh.
    pub avg_consumption_kwh: f64,
    /// Billing parameters.
    pub billing: BillingConfig,
    /// Free-form operator notes.
    pub notes: Option<String>,
}

impl Customer {
    /// Creates a new, not-yet-persisted customer with a local temporary id
    /// and default billing configuration.
    #[must_use]
    pub fn new(name: impl Into<String>, email: impl Into<String>, document: impl Into<String>) -> Self {
        Self {
            id: EntityId::local(),
            name: name.into(),
            email: email.into(),
            document: document.into(),
            phone: String::new(),
            address: String::new(),
            city: String::new(),
            state: String::new(),
            postal_code: String::new(),
            status: CustomerStatus::Pending,
            plant_id: None,
            avg_consumption_kwh: 0.0,
            billing: BillingConfig::default(),
            notes: None,
        }
    }
}

/// Maps [`Customer`] records to the `customers` collection.
#[derive(Debug, Clone, Copy, Default)]
pub struct CustomerMapper;

impl FieldMapper for CustomerMapper {
    type Record = Customer;

    fn collection(&self) -> &str {
        "customers"
    }

    fn to_remote(&self, record: &Customer) -> SyncResult<Document> {
        document_of(record)
    }

    fn from_remote(&self, id: &EntityId, fields: &Document) -> SyncResult<Customer> {
        record_of(id, fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn payload_excludes_the_id() {
        let customer = Customer::new("Ana Lima", "ana@example.com", "12345678901");
        let payload = CustomerMapper.to_remote(&customer).unwrap();
        assert!(!payload.contains_key("id"));
        assert_eq!(payload["name"], json!("Ana Lima"));
    }

    #[test]
    fn record_rebuilds_under_a_remote_id() {
        let customer = Customer::new("Ana Lima", "ana@example.com", "12345678901");
        let payload = CustomerMapper.to_remote(&customer).unwrap();

        let id = EntityId::remote("cust-1");
        let rebuilt = CustomerMapper.from_remote(&id, &payload).unwrap();
        assert_eq!(rebuilt.id, id);
        assert_eq!(rebuilt.name, customer.name);
        assert_eq!(rebuilt.billing, customer.billing);
    }

    #[test]
    fn lighting_charge_is_tagged() {
        let mut customer = Customer::new("Ana", "a@b.c", "1");
        customer.billing.lighting = LightingCharge::Fixed { amount_cents: 1250 };

        let payload = CustomerMapper.to_remote(&customer).unwrap();
        assert_eq!(payload["billing"]["lighting"]["mode"], json!("fixed"));
        assert_eq!(payload["billing"]["lighting"]["amount_cents"], json!(1250));
    }
}
