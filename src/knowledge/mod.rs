//! Static vehicle knowledge base.
//!
//! Loaded once at startup from a JSON file and read-only afterwards. Absence
//! or corruption of the file degrades to no knowledge base; context assembly
//! then produces empty context instead of failing.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use tracing::warn;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VehicleIdentity {
    #[serde(default)]
    pub make: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub year: Option<u32>,
    #[serde(default)]
    pub engine: Option<String>,
    #[serde(default)]
    pub transmission: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MaintenanceItem {
    pub interval: String,
    #[serde(default)]
    pub services: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct KnowledgeBase {
    #[serde(default)]
    pub vehicle: VehicleIdentity,
    #[serde(default)]
    pub maintenance_schedule: Vec<MaintenanceItem>,
    /// Symptom -> tip.
    #[serde(default)]
    pub diagnostic_tips: BTreeMap<String, String>,
    #[serde(default)]
    pub common_issues: Vec<String>,
}

impl KnowledgeBase {
    /// Load from a JSON file. Returns `None` (with a warning) on any failure.
    pub fn load(path: &Path) -> Option<Self> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "knowledge base not available");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(kb) => Some(kb),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "knowledge base is not valid JSON");
                None
            }
        }
    }

    /// One-line vehicle identity header for prompt context.
    pub fn identity_header(&self) -> String {
        let mut header = String::from("Vehicle:");
        if let Some(year) = self.vehicle.year {
            header.push_str(&format!(" {year}"));
        }
        if !self.vehicle.make.is_empty() {
            header.push_str(&format!(" {}", self.vehicle.make));
        }
        if !self.vehicle.model.is_empty() {
            header.push_str(&format!(" {}", self.vehicle.model));
        }
        if let Some(engine) = &self.vehicle.engine {
            header.push_str(&format!(", {engine} engine"));
        }
        if let Some(transmission) = &self.vehicle.transmission {
            header.push_str(&format!(", {transmission} transmission"));
        }
        header
    }
}
