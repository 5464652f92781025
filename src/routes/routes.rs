//! Defines routes for the file ledger.
//!
//! ## Structure
//! - **File entries**
//!   - `GET /storage/info/{bucket}/{*object_name}`: ledger entry or `null`
//!   - `PUT /storage/info/{bucket}/{*object_name}`: record a write event
//!
//! - **Size roll-ups** (each accepts `?findability=`)
//!   - `GET /storage/owner/{owner}`
//!   - `GET /storage/dataset_id/{*dataset_id}`
//!   - `GET /storage/flow_id/{*flow_id}`
//!
//! Object names, dataset ids and flow ids are path-like (`ow1/ds1/2`), so
//! they are captured with wildcard segments.

use crate::{
    handlers::{
        health_handlers::{healthz, readyz},
        storage_handlers::{
            file_info, record_file, total_storage_for_dataset_id, total_storage_for_flow_id,
            total_storage_for_owner,
        },
    },
    services::ledger_service::FileLedger,
};
use axum::{Router, routing::get};

/// Build the router for all ledger routes.
///
/// The router carries the shared `FileLedger` to every handler.
pub fn routes() -> Router<FileLedger> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route(
            "/storage/info/{bucket}/{*object_name}",
            get(file_info).put(record_file),
        )
        .route("/storage/owner/{owner}", get(total_storage_for_owner))
        .route(
            "/storage/dataset_id/{*dataset_id}",
            get(total_storage_for_dataset_id),
        )
        .route("/storage/flow_id/{*flow_id}", get(total_storage_for_flow_id))
}
