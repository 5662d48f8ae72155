//! Typed access to the datastore through the storage worker.
//!
//! The facade converts typed requests into storage messages, tracks the
//! latest revision it has seen, and publishes change events that drive the
//! sync layer. Reads fall back to the persistent store directly when the
//! worker is unavailable; mutations have no fallback.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::errors::AppError;
use crate::models::{
    CreateEvaluationRequest, CreateStaffRequest, CreateThemeRequest, DatastoreExport,
    DatastoreImport, Evaluation, RevisionInfo, StaffMember, Theme, UpdateEvaluationRequest,
    UpdateStaffRequest, UpdateThemeRequest,
};
use crate::policy;
use crate::store::{Collection, Mirror, Record, RecordStore, SCHEMA_VERSION};
use crate::sync::ChangePublisher;
use crate::worker::{StorageRequest, StorageResponse, WorkerHandle};

/// Application-wide handle for reading and mutating the datastore.
#[derive(Clone)]
pub struct DatabaseFacade {
    worker: WorkerHandle,
    store: RecordStore,
    changes: ChangePublisher,
    /// Highest revision observed in any worker response.
    revision: Arc<AtomicI64>,
}

impl DatabaseFacade {
    pub fn new(worker: WorkerHandle, store: RecordStore, changes: ChangePublisher) -> Self {
        Self {
            worker,
            store,
            changes,
            revision: Arc::new(AtomicI64::new(0)),
        }
    }

    /// Send a raw storage request. Every worker round trip funnels through
    /// here so revision tracking and change publication cannot be skipped.
    pub async fn dispatch(&self, request: StorageRequest) -> Result<StorageResponse, AppError> {
        let response = self.worker.send(request).await?;
        if let Some(revision) = response.revision() {
            self.revision.fetch_max(revision, Ordering::SeqCst);
        }
        self.publish_changes(&response);
        Ok(response)
    }

    /// Announce which collections a response changed.
    fn publish_changes(&self, response: &StorageResponse) {
        match response {
            StorageResponse::CreateResult { data_type, success: true, revision, .. }
            | StorageResponse::UpdateResult { data_type, success: true, revision, .. }
            | StorageResponse::BulkUpdateResult { data_type, success: true, revision, .. }
            | StorageResponse::ClearResult { data_type, success: true, revision, .. } => {
                if let Some(collection) = Collection::parse(data_type) {
                    self.changes.publish(collection, *revision);
                }
            }
            StorageResponse::DeleteResult { data_type, data, success: true, revision } => {
                if data.changes > 0 {
                    if let Some(collection) = Collection::parse(data_type) {
                        self.changes.publish(collection, *revision);
                        // A staff delete may have cascaded
                        if collection == Collection::Staff {
                            self.changes.publish(Collection::Evaluations, *revision);
                        }
                    }
                }
            }
            StorageResponse::ReloadResult { success: true, revision, .. } => {
                for collection in Collection::ALL {
                    self.changes.publish(collection, *revision);
                }
            }
            _ => {}
        }
    }

    /// Read a collection, falling back to the store when the worker is gone.
    async fn fetch_collection(&self, collection: Collection) -> Result<Vec<Record>, AppError> {
        let request = StorageRequest::Get {
            data_type: collection.as_str().to_string(),
        };
        match self.dispatch(request).await {
            Ok(StorageResponse::GetResult { data, .. }) => Ok(data),
            Ok(other) => Err(unexpected_response(&other)),
            Err(AppError::WorkerUnavailable(msg)) => {
                tracing::warn!(
                    "Storage worker unavailable ({}), reading {} directly from the store",
                    msg,
                    collection
                );
                self.store.load_collection(collection).await
            }
            Err(e) => Err(e),
        }
    }

    async fn create_in(
        &self,
        collection: Collection,
        payload: &impl Serialize,
    ) -> Result<Record, AppError> {
        let request = StorageRequest::Create {
            data_type: collection.as_str().to_string(),
            data: to_record(payload)?,
        };
        match self.dispatch(request).await? {
            StorageResponse::CreateResult { data, success: true, .. } => Ok(data),
            StorageResponse::Error { error, .. } => Err(AppError::Internal(error)),
            other => Err(unexpected_response(&other)),
        }
    }

    async fn update_in(
        &self,
        collection: Collection,
        id: i64,
        payload: &impl Serialize,
    ) -> Result<Record, AppError> {
        let request = StorageRequest::Update {
            data_type: collection.as_str().to_string(),
            id,
            data: to_record(payload)?,
        };
        match self.dispatch(request).await? {
            StorageResponse::UpdateResult { data: Some(data), success: true, .. } => Ok(data),
            StorageResponse::UpdateResult { error, .. } => Err(AppError::NotFound(
                error.unwrap_or_else(|| format!("No record with id {} in {}", id, collection)),
            )),
            StorageResponse::Error { error, .. } => Err(AppError::Internal(error)),
            other => Err(unexpected_response(&other)),
        }
    }

    /// Delete by id, returning how many records were removed.
    async fn delete_in(&self, collection: Collection, id: i64) -> Result<u64, AppError> {
        let request = StorageRequest::Delete {
            data_type: collection.as_str().to_string(),
            id,
        };
        match self.dispatch(request).await? {
            StorageResponse::DeleteResult { data, success: true, .. } => Ok(data.changes),
            StorageResponse::Error { error, .. } => Err(AppError::Internal(error)),
            other => Err(unexpected_response(&other)),
        }
    }

    async fn bulk_replace(&self, collection: Collection, records: Vec<Record>) -> Result<(), AppError> {
        let request = StorageRequest::BulkUpdate {
            data_type: collection.as_str().to_string(),
            data: records,
        };
        match self.dispatch(request).await? {
            StorageResponse::BulkUpdateResult { success: true, .. } => Ok(()),
            StorageResponse::Error { error, .. } => Err(AppError::Internal(error)),
            other => Err(unexpected_response(&other)),
        }
    }

    pub async fn get_staff(&self) -> Result<Vec<StaffMember>, AppError> {
        let records = self.fetch_collection(Collection::Staff).await?;
        Ok(policy::repair_staff(&records))
    }

    pub async fn get_staff_member(&self, id: i64) -> Result<Option<StaffMember>, AppError> {
        Ok(self.get_staff().await?.into_iter().find(|s| s.id == id))
    }

    pub async fn create_staff(&self, request: &CreateStaffRequest) -> Result<StaffMember, AppError> {
        from_record(self.create_in(Collection::Staff, request).await?)
    }

    pub async fn update_staff(
        &self,
        id: i64,
        request: &UpdateStaffRequest,
    ) -> Result<StaffMember, AppError> {
        from_record(self.update_in(Collection::Staff, id, request).await?)
    }

    pub async fn delete_staff(&self, id: i64) -> Result<u64, AppError> {
        self.delete_in(Collection::Staff, id).await
    }

    pub async fn get_themes(&self) -> Result<Vec<Theme>, AppError> {
        let records = self.fetch_collection(Collection::Themes).await?;
        Ok(policy::repair_themes(&records))
    }

    pub async fn create_theme(&self, request: &CreateThemeRequest) -> Result<Theme, AppError> {
        from_record(self.create_in(Collection::Themes, request).await?)
    }

    pub async fn update_theme(
        &self,
        id: i64,
        request: &UpdateThemeRequest,
    ) -> Result<Theme, AppError> {
        from_record(self.update_in(Collection::Themes, id, request).await?)
    }

    pub async fn delete_theme(&self, id: i64) -> Result<u64, AppError> {
        self.delete_in(Collection::Themes, id).await
    }

    pub async fn get_evaluations(&self) -> Result<Vec<Evaluation>, AppError> {
        let records = self.fetch_collection(Collection::Evaluations).await?;
        Ok(policy::repair_evaluations(&records))
    }

    pub async fn get_evaluation(&self, id: i64) -> Result<Option<Evaluation>, AppError> {
        Ok(self.get_evaluations().await?.into_iter().find(|e| e.id == id))
    }

    pub async fn create_evaluation(
        &self,
        request: &CreateEvaluationRequest,
    ) -> Result<Evaluation, AppError> {
        from_record(self.create_in(Collection::Evaluations, request).await?)
    }

    pub async fn update_evaluation(
        &self,
        id: i64,
        request: &UpdateEvaluationRequest,
    ) -> Result<Evaluation, AppError> {
        from_record(self.update_in(Collection::Evaluations, id, request).await?)
    }

    pub async fn delete_evaluation(&self, id: i64) -> Result<u64, AppError> {
        self.delete_in(Collection::Evaluations, id).await
    }

    /// Raw user records; no typed model exists for them.
    pub async fn get_users(&self) -> Result<Vec<Record>, AppError> {
        self.fetch_collection(Collection::Users).await
    }

    /// Export all four collections as raw records.
    pub async fn export_datastore(&self) -> Result<DatastoreExport, AppError> {
        let users = self.get_users().await?;
        let staff = self.fetch_collection(Collection::Staff).await?;
        let themes = self.fetch_collection(Collection::Themes).await?;
        let evaluations = self.fetch_collection(Collection::Evaluations).await?;
        let info = self.revision_info().await?;

        Ok(DatastoreExport {
            schema_version: SCHEMA_VERSION,
            generated_at: info.generated_at,
            revision_id: info.revision_id,
            users,
            staff,
            themes,
            evaluations,
        })
    }

    /// Replace the collections present in the import; absent ones are left
    /// untouched.
    pub async fn import_datastore(&self, import: &DatastoreImport) -> Result<(), AppError> {
        let collections = [
            (Collection::Users, &import.users),
            (Collection::Staff, &import.staff),
            (Collection::Themes, &import.themes),
            (Collection::Evaluations, &import.evaluations),
        ];
        for (collection, records) in collections {
            if let Some(records) = records {
                self.bulk_replace(collection, records.clone()).await?;
            }
        }
        Ok(())
    }

    /// Discard the worker's mirror and re-read everything from the store.
    pub async fn force_sync_all(&self) -> Result<Mirror, AppError> {
        match self.dispatch(StorageRequest::Reload).await? {
            StorageResponse::ReloadResult { data, success: true, .. } => Ok(data),
            StorageResponse::Error { error, .. } => Err(AppError::Internal(error)),
            other => Err(unexpected_response(&other)),
        }
    }

    /// Latest revision observed from the worker.
    pub fn current_revision(&self) -> i64 {
        self.revision.load(Ordering::SeqCst)
    }

    /// Persisted revision info, raised to the in-memory revision when the
    /// store lags behind unflushed writes.
    pub async fn revision_info(&self) -> Result<RevisionInfo, AppError> {
        let mut info = self.store.revision_info().await?;
        info.revision_id = info.revision_id.max(self.current_revision());
        Ok(info)
    }
}

fn unexpected_response(response: &StorageResponse) -> AppError {
    AppError::Internal(format!("Unexpected storage response: {:?}", response))
}

fn to_record(payload: &impl Serialize) -> Result<Record, AppError> {
    match serde_json::to_value(payload)? {
        Value::Object(map) => Ok(map),
        _ => Err(AppError::Internal(
            "Payload did not serialize to an object".to_string(),
        )),
    }
}

fn from_record<T: DeserializeOwned>(record: Record) -> Result<T, AppError> {
    Ok(serde_json::from_value(Value::Object(record))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    use crate::store::init_store;
    use crate::sync::ChangeHub;
    use crate::worker::{self, FlushPolicy};

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    async fn fixture() -> (DatabaseFacade, ChangeHub, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let pool = init_store(&temp_dir.path().join("test.sqlite")).await.unwrap();
        let store = RecordStore::new(pool);
        let handle = worker::spawn(store.clone(), FlushPolicy::default()).await.unwrap();
        let hub = ChangeHub::new();
        let facade = DatabaseFacade::new(handle, store, hub.publisher());
        (facade, hub, temp_dir)
    }

    fn staff_request(first: &str, last: &str, email: &str) -> CreateStaffRequest {
        CreateStaffRequest {
            matricule: None,
            first_name: first.to_string(),
            last_name: last.to_string(),
            email: email.to_string(),
            position: None,
            phone: None,
            establishment: None,
            formation_year: None,
        }
    }

    #[tokio::test]
    async fn test_create_and_list_staff() {
        let (facade, _hub, _dir) = fixture().await;

        let created = facade
            .create_staff(&staff_request("Marie", "RAKOTO", "marie@example.mg"))
            .await
            .unwrap();
        assert!(created.id > 0);
        assert!(created.created_at.is_some());
        assert_eq!(created.matricule, None);

        let staff = facade.get_staff().await.unwrap();
        assert_eq!(staff.len(), 1);
        assert_eq!(staff[0].first_name, "Marie");

        let found = facade.get_staff_member(created.id).await.unwrap();
        assert_eq!(found.unwrap().email, "marie@example.mg");
    }

    #[tokio::test]
    async fn test_update_staff_merges_partially() {
        let (facade, _hub, _dir) = fixture().await;

        let mut request = staff_request("Marie", "RAKOTO", "marie@example.mg");
        request.position = Some("Formatrice".to_string());
        let created = facade.create_staff(&request).await.unwrap();

        let update = UpdateStaffRequest {
            matricule: None,
            first_name: None,
            last_name: None,
            email: Some("m.rakoto@example.mg".to_string()),
            position: None,
            phone: None,
            establishment: None,
            formation_year: None,
        };
        let updated = facade.update_staff(created.id, &update).await.unwrap();

        assert_eq!(updated.email, "m.rakoto@example.mg");
        assert_eq!(updated.first_name, "Marie");
        assert_eq!(updated.position.as_deref(), Some("Formatrice"));
        assert_eq!(updated.created_at, created.created_at);
    }

    #[tokio::test]
    async fn test_update_missing_staff_is_not_found() {
        let (facade, _hub, _dir) = fixture().await;

        let update = UpdateStaffRequest {
            matricule: None,
            first_name: None,
            last_name: None,
            email: Some("x@example.mg".to_string()),
            position: None,
            phone: None,
            establishment: None,
            formation_year: None,
        };
        let result = facade.update_staff(424242, &update).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_staff_reports_changes() {
        let (facade, _hub, _dir) = fixture().await;

        let created = facade
            .create_staff(&staff_request("Marie", "RAKOTO", "marie@example.mg"))
            .await
            .unwrap();

        assert_eq!(facade.delete_staff(created.id).await.unwrap(), 1);
        assert_eq!(facade.delete_staff(created.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_invalid_staff_hidden_from_typed_view_but_exported() {
        let (facade, _hub, _dir) = fixture().await;

        facade
            .bulk_replace(
                Collection::Staff,
                vec![
                    record(json!({
                        "id": 1, "firstName": "Marie", "lastName": "RAKOTO",
                        "email": "marie@example.mg"
                    })),
                    record(json!({ "id": 2, "firstName": "", "lastName": "RABE", "email": "r@x.mg" })),
                ],
            )
            .await
            .unwrap();

        let typed = facade.get_staff().await.unwrap();
        assert_eq!(typed.len(), 1);

        let export = facade.export_datastore().await.unwrap();
        assert_eq!(export.staff.len(), 2);
        assert_eq!(export.schema_version, SCHEMA_VERSION);
    }

    #[tokio::test]
    async fn test_import_replaces_only_present_collections() {
        let (facade, _hub, _dir) = fixture().await;

        facade
            .create_theme(&CreateThemeRequest {
                name: "Accueil".to_string(),
                description: None,
            })
            .await
            .unwrap();

        let import = DatastoreImport {
            users: None,
            staff: Some(vec![record(json!({
                "id": 9, "firstName": "Paul", "lastName": "RABE", "email": "p@x.mg"
            }))]),
            themes: None,
            evaluations: None,
        };
        facade.import_datastore(&import).await.unwrap();

        assert_eq!(facade.get_staff().await.unwrap().len(), 1);
        // Themes were absent from the import and survive
        assert_eq!(facade.get_themes().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_mutations_publish_change_events() {
        let (facade, hub, _dir) = fixture().await;
        let mut rx = hub.subscribe();

        let created = facade
            .create_staff(&staff_request("Marie", "RAKOTO", "marie@example.mg"))
            .await
            .unwrap();
        let event = rx.recv().await.unwrap();
        assert_eq!(event.collection, Collection::Staff);
        assert_eq!(event.revision, 1);

        facade.delete_staff(created.id).await.unwrap();
        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.collection, Collection::Staff);
        assert_eq!(second.collection, Collection::Evaluations);
        assert_eq!(second.revision, first.revision);
    }

    #[tokio::test]
    async fn test_reads_publish_nothing() {
        let (facade, hub, _dir) = fixture().await;
        let mut rx = hub.subscribe();

        facade.get_staff().await.unwrap();
        facade.get_themes().await.unwrap();

        assert!(matches!(
            rx.try_recv(),
            Err(tokio::sync::broadcast::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn test_worker_gone_reads_fall_back_to_store() {
        let temp_dir = TempDir::new().unwrap();
        let pool = init_store(&temp_dir.path().join("test.sqlite")).await.unwrap();
        let store = RecordStore::new(pool);
        store
            .save_collection(
                Collection::Staff,
                &[record(json!({
                    "id": 1, "firstName": "Marie", "lastName": "RAKOTO",
                    "email": "marie@example.mg"
                }))],
                3,
            )
            .await
            .unwrap();

        let hub = ChangeHub::new();
        let facade = DatabaseFacade::new(WorkerHandle::disconnected(), store, hub.publisher());

        let staff = facade.get_staff().await.unwrap();
        assert_eq!(staff.len(), 1);

        // Mutations have no fallback
        let result = facade
            .create_staff(&staff_request("Paul", "RABE", "p@x.mg"))
            .await;
        assert!(matches!(result, Err(AppError::WorkerUnavailable(_))));
    }

    #[tokio::test]
    async fn test_revision_tracking() {
        let (facade, _hub, _dir) = fixture().await;
        assert_eq!(facade.current_revision(), 0);

        facade
            .create_staff(&staff_request("Marie", "RAKOTO", "marie@example.mg"))
            .await
            .unwrap();
        assert_eq!(facade.current_revision(), 1);

        // The store has not flushed yet; revision info reports the higher
        // in-memory revision
        let info = facade.revision_info().await.unwrap();
        assert_eq!(info.revision_id, 1);
    }
}
