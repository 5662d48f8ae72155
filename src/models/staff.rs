//! Staff member model matching the frontend StaffMember interface.

use serde::{Deserialize, Serialize};

/// A staff member of the training center.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffMember {
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matricule: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub establishment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formation_year: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

/// Request body for creating a new staff member.
///
/// Serialized form carries only the fields that were provided, so optional
/// fields left out never appear as nulls in the stored record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateStaffRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matricule: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub establishment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formation_year: Option<String>,
}

/// Request body for updating an existing staff member. Absent fields keep
/// their current values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStaffRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matricule: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub establishment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formation_year: Option<String>,
}
