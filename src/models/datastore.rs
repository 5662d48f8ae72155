//! Datastore export/import models matching the frontend Datastore interface.

use serde::{Deserialize, Serialize};

use crate::store::Record;

/// Full datastore image for export and backup. Collections are raw records
/// so invalid entries survive a backup/restore round trip untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatastoreExport {
    pub schema_version: i32,
    pub generated_at: String,
    pub revision_id: i64,
    pub users: Vec<Record>,
    pub staff: Vec<Record>,
    pub themes: Vec<Record>,
    pub evaluations: Vec<Record>,
}

/// Datastore image accepted for restore. Absent collections are left
/// untouched.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatastoreImport {
    #[serde(default)]
    pub users: Option<Vec<Record>>,
    #[serde(default)]
    pub staff: Option<Vec<Record>>,
    #[serde(default)]
    pub themes: Option<Vec<Record>>,
    #[serde(default)]
    pub evaluations: Option<Vec<Record>>,
}

/// Revision information for change detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionInfo {
    pub revision_id: i64,
    pub generated_at: String,
}
