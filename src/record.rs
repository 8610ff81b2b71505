// 📄 Records & Published Document - the contract with the dashboard
// JSON keys are what the dashboard reads; field order is the emitted key order.

use chrono::{DateTime, Local, SecondsFormat};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One maintenance/service event
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "equipo")]
    pub equipment_id: String,

    #[serde(rename = "tipo_equipo")]
    pub equipment_type: String,

    #[serde(rename = "marca")]
    pub brand: String,

    #[serde(rename = "modelo")]
    pub model: String,

    #[serde(rename = "razon_reparacion")]
    pub repair_reason: String,

    // ========================================================================
    // COSTS
    // ========================================================================
    #[serde(rename = "precio_refaccion")]
    pub part_cost: f64,

    #[serde(rename = "precio_mano_obra")]
    pub labor_cost: f64,

    #[serde(rename = "precio_otros")]
    pub other_cost: f64,

    #[serde(rename = "total")]
    pub total_cost: f64,

    // ========================================================================
    // DURATIONS
    // ========================================================================
    #[serde(rename = "dias_real")]
    pub actual_days: f64,

    #[serde(rename = "dias_atraso")]
    pub delay_days: f64,

    #[serde(rename = "nodo")]
    pub node: String,

    #[serde(rename = "region")]
    pub region: String,

    // ========================================================================
    // OPTIONAL TRAILING COLUMNS
    // ========================================================================
    #[serde(rename = "clasificacion")]
    pub classification: String,

    #[serde(rename = "tipo_servicio")]
    pub service_type: String,

    #[serde(rename = "tiempo_estandar")]
    pub standard_time: f64,

    #[serde(rename = "familia")]
    pub family: String,

    /// Lower-cased month name
    #[serde(rename = "mes")]
    pub month: String,

    #[serde(rename = "ano")]
    pub year: String,

    #[serde(rename = "grupo_manto")]
    pub maintenance_group: String,
}

/// The single published artifact: `{updated, count, data}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishedDocument {
    /// ISO-8601 generation time
    pub updated: String,

    /// Always equals `data.len()`
    pub count: usize,

    pub data: Vec<Record>,
}

impl PublishedDocument {
    /// Wrap records, stamping them with the current local time
    pub fn new(records: Vec<Record>) -> Self {
        Self::at(records, Local::now())
    }

    pub fn at(records: Vec<Record>, generated: DateTime<Local>) -> Self {
        PublishedDocument {
            updated: generated.to_rfc3339_opts(SecondsFormat::Secs, false),
            count: records.len(),
            data: records,
        }
    }

    /// Compact JSON; non-ASCII characters stay unescaped (serde_json default)
    pub fn to_compact_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    /// SHA-256 of the data section only, so reruns over identical data match
    /// regardless of the generation stamp
    pub fn data_digest(&self) -> String {
        digest_records(&self.data)
    }
}

pub fn digest_records(records: &[Record]) -> String {
    let mut hasher = Sha256::new();
    // Serializing plain structs of strings and finite floats cannot fail
    if let Ok(bytes) = serde_json::to_vec(records) {
        hasher.update(&bytes);
    }
    format!("{:x}", hasher.finalize())
}

// ============================================================================
// TESTS
// ============================================================================
