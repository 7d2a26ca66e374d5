//! Generating-plant records.

use crate::{document_of, record_of};
use serde::{Deserialize, Serialize};
use solbill_sync::{Document, EntityId, FieldMapper, SyncResult};

/// Operational status of a plant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlantStatus {
    /// Generating and crediting customers.
    Active,
    /// Not generating.
    Inactive,
    /// Temporarily offline for maintenance.
    Maintenance,
}

/// A solar generating plant whose surplus energy is resold to customers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plant {
    /// Engine-managed identity.
    pub id: EntityId,
    /// Display name.
    pub name: String,
    /// Registered legal name of the operating company.
    pub legal_name: String,
    /// CNPJ, digits only.
    pub document: String,
    /// Site address.
    pub address: String,
    /// Operational status.
    pub status: PlantStatus,
    /// Installed capacity, kWp.
    pub capacity_kwp: f64,
    /// Expected monthly production, kWh.
    pub monthly_production_kwh: f64,
    /// Operations contact e-mail.
    pub contact_email: String,
    /// Operations contact phone.
    pub contact_phone: String,
}

impl Plant {
    /// Creates a new, not-yet-persisted plant with a local temporary id.
    #[must_use]
    pub fn new(name: impl Into<String>, document: impl Into<String>) -> Self {
        Self {
            id: EntityId::local(),
            name: name.into(),
            legal_name: String::new(),
            document: document.into(),
            address: String::new(),
            status: PlantStatus::Active,
            capacity_kwp: 0.0,
            monthly_production_kwh: 0.0,
            contact_email: String::new(),
            contact_phone: String::new(),
        }
    }
}

/// Maps [`Plant`] records to the `plants` collection.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlantMapper;

impl FieldMapper for PlantMapper {
    type Record = Plant;

    fn collection(&self) -> &str {
        "plants"
    }

    fn to_remote(&self, record: &Plant) -> SyncResult<Document> {
        document_of(record)
    }

    fn from_remote(&self, id: &EntityId, fields: &Document) -> SyncResult<Plant> {
        record_of(id, fields)
    }
}
