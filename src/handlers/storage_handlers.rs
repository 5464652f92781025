//! HTTP handlers for the `storage/*` routes.
//! Path and query extraction happens here; all bookkeeping is delegated to
//! `FileLedger`.

use crate::{
    errors::AppError,
    models::stored_file::{NewStoredFile, StoredFile},
    services::ledger_service::FileLedger,
};
use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Optional `?findability=` filter shared by the roll-up routes.
#[derive(Debug, Default, Deserialize)]
pub struct FindabilityQuery {
    pub findability: Option<String>,
}

/// Body of `PUT /storage/info/{bucket}/{*object_name}`.
#[derive(Debug, Deserialize)]
pub struct RecordFileReq {
    #[serde(default)]
    pub findability: Option<String>,
    pub owner: String,
    pub owner_id: String,
    pub dataset_id: String,
    pub flow_id: String,
    pub size: i64,
    pub created_at: DateTime<Utc>,
}

/// Response of every roll-up route.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TotalBytes {
    #[serde(rename = "totalBytes")]
    pub total_bytes: i64,
}

/// GET `/storage/info/{bucket}/{*object_name}`: the file's ledger entry,
/// or JSON `null` when it was never recorded.
pub async fn file_info(
    State(ledger): State<FileLedger>,
    Path((bucket, object_name)): Path<(String, String)>,
) -> Result<Json<Option<StoredFile>>, AppError> {
    let file = ledger.get_file_info(&bucket, &object_name).await?;
    Ok(Json(file))
}

/// PUT `/storage/info/{bucket}/{*object_name}`: record one write event.
pub async fn record_file(
    State(ledger): State<FileLedger>,
    Path((bucket, object_name)): Path<(String, String)>,
    Json(req): Json<RecordFileReq>,
) -> Result<Json<StoredFile>, AppError> {
    let file = ledger
        .record_file(NewStoredFile {
            bucket,
            object_name,
            findability: req.findability,
            owner: req.owner,
            owner_id: req.owner_id,
            dataset_id: req.dataset_id,
            flow_id: req.flow_id,
            size: req.size,
            created_at: req.created_at,
        })
        .await?;
    Ok(Json(file))
}

/// GET `/storage/owner/{owner}`
pub async fn total_storage_for_owner(
    State(ledger): State<FileLedger>,
    Path(owner): Path<String>,
    Query(q): Query<FindabilityQuery>,
) -> Result<Json<TotalBytes>, AppError> {
    let total = ledger
        .sum_by_owner(&owner, q.findability.as_deref())
        .await?;
    Ok(Json(TotalBytes { total_bytes: total }))
}

/// GET `/storage/dataset_id/{*dataset_id}`
pub async fn total_storage_for_dataset_id(
    State(ledger): State<FileLedger>,
    Path(dataset_id): Path<String>,
    Query(q): Query<FindabilityQuery>,
) -> Result<Json<TotalBytes>, AppError> {
    let total = ledger
        .sum_by_dataset(&dataset_id, q.findability.as_deref())
        .await?;
    Ok(Json(TotalBytes { total_bytes: total }))
}

/// GET `/storage/flow_id/{*flow_id}`
pub async fn total_storage_for_flow_id(
    State(ledger): State<FileLedger>,
    Path(flow_id): Path<String>,
    Query(q): Query<FindabilityQuery>,
) -> Result<Json<TotalBytes>, AppError> {
    let total = ledger
        .sum_by_flow(&flow_id, q.findability.as_deref())
        .await?;
    Ok(Json(TotalBytes { total_bytes: total }))
}
