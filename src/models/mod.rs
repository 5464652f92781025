//! Data models for the file ledger.
//!
//! `StoredFile` is the one persisted entity; `flow_ids` holds the codec that
//! turns its flow-id set into the TEXT column the table stores.

pub mod flow_ids;
pub mod stored_file;
