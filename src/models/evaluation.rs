//! Evaluation model matching the frontend Evaluation interface.
//!
//! Ratings are conventionally 0 to 5 and grouped into five categories.
//! Every rating is optional: older records predate some of the fields.

use serde::{Deserialize, Serialize};

/// A per-staff training evaluation.
///
/// `staff_id` is a weak reference to a StaffMember; legacy records link by
/// the firstName/lastName pair instead. `formation_theme` is a denormalized
/// copy of a theme name, not an id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evaluation {
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staff_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    pub formation_theme: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_objectives: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_relevance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_depth: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub methods_pedagogy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub methods_materials: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub methods_pacing: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_scheduling: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_logistics: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_environment: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub behavior_engagement: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub behavior_punctuality: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub behavior_teamwork: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cognitive_understanding: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cognitive_retention: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cognitive_application: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendation_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub justification_observations: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

/// Request body for creating a new evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEvaluationRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staff_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    pub formation_theme: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_objectives: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_relevance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_depth: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub methods_pedagogy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub methods_materials: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub methods_pacing: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_scheduling: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_logistics: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_environment: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub behavior_engagement: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub behavior_punctuality: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub behavior_teamwork: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cognitive_understanding: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cognitive_retention: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cognitive_application: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendation_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub justification_observations: Option<String>,
}

/// Request body for updating an existing evaluation. Absent fields keep
/// their current values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEvaluationRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staff_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formation_theme: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_objectives: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_relevance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_depth: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub methods_pedagogy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub methods_materials: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub methods_pacing: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_scheduling: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_logistics: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_environment: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub behavior_engagement: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub behavior_punctuality: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub behavior_teamwork: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cognitive_understanding: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cognitive_retention: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cognitive_application: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendation_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub justification_observations: Option<String>,
}
