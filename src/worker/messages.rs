//! Storage request/response contract.
//!
//! The same shapes travel over the in-process channel and the HTTP storage
//! bridge, so the desktop shell can forward messages verbatim. Collection
//! names stay strings here: unknown names are part of the contract (reads
//! answer empty, writes answer ERROR), not a parse failure.

use serde::{Deserialize, Serialize};

use crate::store::{Mirror, Record};

/// A request to the storage worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "SCREAMING_SNAKE_CASE", rename_all_fields = "camelCase")]
pub enum StorageRequest {
    Get {
        data_type: String,
    },
    Create {
        data_type: String,
        data: Record,
    },
    Update {
        data_type: String,
        id: i64,
        data: Record,
    },
    Delete {
        data_type: String,
        id: i64,
    },
    BulkUpdate {
        data_type: String,
        data: Vec<Record>,
    },
    Clear {
        data_type: String,
    },
    Reload,
}

/// Outcome payload of a DELETE.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DeleteOutcome {
    pub success: bool,
    pub changes: u64,
}

/// A response from the storage worker. Every processed response carries the
/// worker's revision stamp; `Error` is the only shape without one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "SCREAMING_SNAKE_CASE", rename_all_fields = "camelCase")]
pub enum StorageResponse {
    GetResult {
        data_type: String,
        data: Vec<Record>,
        success: bool,
        revision: i64,
    },
    CreateResult {
        data_type: String,
        data: Record,
        success: bool,
        revision: i64,
    },
    UpdateResult {
        data_type: String,
        /// The merged record, or null when the id was not found.
        data: Option<Record>,
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        revision: i64,
    },
    DeleteResult {
        data_type: String,
        data: DeleteOutcome,
        success: bool,
        revision: i64,
    },
    BulkUpdateResult {
        data_type: String,
        data: Vec<Record>,
        success: bool,
        revision: i64,
    },
    ClearResult {
        data_type: String,
        data: Vec<Record>,
        success: bool,
        revision: i64,
    },
    ReloadResult {
        data: Mirror,
        success: bool,
        revision: i64,
    },
    Error {
        error: String,
        success: bool,
    },
}

impl StorageResponse {
    pub fn error(message: impl Into<String>) -> Self {
        StorageResponse::Error {
            error: message.into(),
            success: false,
        }
    }

    /// The revision stamp, if this response carries one.
    pub fn revision(&self) -> Option<i64> {
        match self {
            StorageResponse::GetResult { revision, .. }
            | StorageResponse::CreateResult { revision, .. }
            | StorageResponse::UpdateResult { revision, .. }
            | StorageResponse::DeleteResult { revision, .. }
            | StorageResponse::BulkUpdateResult { revision, .. }
            | StorageResponse::ClearResult { revision, .. }
            | StorageResponse::ReloadResult { revision, .. } => Some(*revision),
            StorageResponse::Error { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_wire_shape() {
        let request: StorageRequest = serde_json::from_value(json!({
            "action": "UPDATE",
            "dataType": "staff",
            "id": 42,
            "data": { "email": "new@example.mg" }
        }))
        .unwrap();

        match request {
            StorageRequest::Update { data_type, id, data } => {
                assert_eq!(data_type, "staff");
                assert_eq!(id, 42);
                assert_eq!(data["email"], json!("new@example.mg"));
            }
            other => panic!("unexpected request: {:?}", other),
        }
    }

    #[test]
    fn test_unit_action_parses_without_fields() {
        let request: StorageRequest = serde_json::from_value(json!({ "action": "RELOAD" })).unwrap();
        assert!(matches!(request, StorageRequest::Reload));
    }

    #[test]
    fn test_unrecognized_action_is_a_parse_error() {
        let result: Result<StorageRequest, _> =
            serde_json::from_value(json!({ "action": "EXPLODE", "dataType": "staff" }));
        assert!(result.is_err());
    }

    #[test]
    fn test_update_miss_serializes_null_data() {
        let response = StorageResponse::UpdateResult {
            data_type: "staff".to_string(),
            data: None,
            success: false,
            error: Some("No record with id 7 in staff".to_string()),
            revision: 3,
        };

        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["action"], json!("UPDATE_RESULT"));
        assert_eq!(value["data"], json!(null));
        assert_eq!(value["success"], json!(false));
        assert_eq!(value["revision"], json!(3));
    }

    #[test]
    fn test_delete_result_shape() {
        let response = StorageResponse::DeleteResult {
            data_type: "evaluations".to_string(),
            data: DeleteOutcome {
                success: true,
                changes: 2,
            },
            success: true,
            revision: 9,
        };

        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["action"], json!("DELETE_RESULT"));
        assert_eq!(value["dataType"], json!("evaluations"));
        assert_eq!(value["data"]["changes"], json!(2));
    }
}
