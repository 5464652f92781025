//! Represents the ledger entry for one file in the object store.

use super::flow_ids::decode_flow_ids;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use std::collections::BTreeSet;

/// Metadata recorded for a single `(bucket, object_name)` pair.
///
/// The ledger never stores file contents, only who owns the object, which
/// dataset it belongs to, how big it was on its latest write, and which
/// ingestion flows have written it.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct StoredFile {
    /// Bucket the object lives in (first half of the primary key).
    pub bucket: String,

    /// Object name inside the bucket; may contain `/`.
    pub object_name: String,

    /// Visibility tag such as `private`, `unlisted` or `published`.
    pub findability: Option<String>,

    /// Owning principal.
    pub owner: String,

    /// Stable internal identifier of the owner.
    pub owner_id: String,

    /// Dataset the object is grouped under.
    pub dataset_id: String,

    /// Flow that performed the most recent write.
    pub last_flow_id: String,

    /// Every flow that has ever written this object, ascending.
    pub flow_ids: BTreeSet<String>,

    /// Size in bytes as of the latest write.
    pub size: i64,

    /// Caller-supplied timestamp of the latest write.
    pub created_at: DateTime<Utc>,
}

/// One observed file-write event, as passed to `FileLedger::record_file`.
#[derive(Clone, Debug)]
pub struct NewStoredFile {
    pub bucket: String,
    pub object_name: String,
    pub findability: Option<String>,
    pub owner: String,
    pub owner_id: String,
    pub dataset_id: String,
    pub flow_id: String,
    pub size: i64,
    pub created_at: DateTime<Utc>,
}

/// Raw `storedfiles` row before the flow-id column is decoded.
#[derive(FromRow, Debug)]
pub(crate) struct StoredFileRow {
    pub bucket: String,
    pub object_name: String,
    pub findability: Option<String>,
    pub owner: String,
    pub owner_id: String,
    pub dataset_id: String,
    pub last_flow_id: String,
    pub flow_ids: Option<String>,
    pub size: i64,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<StoredFileRow> for StoredFile {
    type Error = serde_json::Error;

    fn try_from(row: StoredFileRow) -> Result<Self, Self::Error> {
        let flow_ids = decode_flow_ids(row.flow_ids.as_deref())?;
        Ok(Self {
            bucket: row.bucket,
            object_name: row.object_name,
            findability: row.findability,
            owner: row.owner,
            owner_id: row.owner_id,
            dataset_id: row.dataset_id,
            last_flow_id: row.last_flow_id,
            flow_ids,
            size: row.size,
            created_at: row.created_at,
        })
    }
}

impl StoredFile {
    /// Build the first ledger entry for a file from its initial write.
    pub fn first_write(write: NewStoredFile) -> Self {
        let mut flow_ids = BTreeSet::new();
        flow_ids.insert(write.flow_id.clone());
        Self {
            bucket: write.bucket,
            object_name: write.object_name,
            findability: write.findability,
            owner: write.owner,
            owner_id: write.owner_id,
            dataset_id: write.dataset_id,
            last_flow_id: write.flow_id,
            flow_ids,
            size: write.size,
            created_at: write.created_at,
        }
    }

    /// Return the first identity field (`owner`, `owner_id`, `dataset_id`)
    /// that `write` disagrees on, as `(field, stored, supplied)`.
    pub fn identity_conflict<'a>(
        &'a self,
        write: &'a NewStoredFile,
    ) -> Option<(&'static str, &'a str, &'a str)> {
        [
            ("owner", self.owner.as_str(), write.owner.as_str()),
            ("owner_id", self.owner_id.as_str(), write.owner_id.as_str()),
            (
                "dataset_id",
                self.dataset_id.as_str(),
                write.dataset_id.as_str(),
            ),
        ]
        .into_iter()
        .find(|(_, stored, supplied)| stored != supplied)
    }

    /// Fold a later write into this entry.
    ///
    /// Identity fields must already have been checked. Flow ids only grow;
    /// findability, size and timestamp take the incoming values.
    pub fn apply_write(&mut self, write: NewStoredFile) {
        self.findability = write.findability;
        self.flow_ids.insert(write.flow_id.clone());
        self.last_flow_id = write.flow_id;
        self.size = write.size;
        self.created_at = write.created_at;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn write(flow_id: &str, size: i64) -> NewStoredFile {
        NewStoredFile {
            bucket: "bucket".into(),
            object_name: "ow1/ds1/f1".into(),
            findability: Some("published".into()),
            owner: "ow1".into(),
            owner_id: "ow1_id".into(),
            dataset_id: "ow1/ds1".into(),
            flow_id: flow_id.into(),
            size,
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn apply_write_keeps_flow_history_and_overwrites_size() {
        let mut file = StoredFile::first_write(write("ow1/ds1/2", 10));
        file.apply_write(write("ow1/ds1/1", 25));

        assert_eq!(file.last_flow_id, "ow1/ds1/1");
        assert_eq!(
            file.flow_ids.iter().collect::<Vec<_>>(),
            vec!["ow1/ds1/1", "ow1/ds1/2"]
        );
        assert_eq!(file.size, 25);
    }

    #[test]
    fn identity_conflict_reports_first_differing_field() {
        let file = StoredFile::first_write(write("f", 1));

        let mut other = write("g", 1);
        assert!(file.identity_conflict(&other).is_none());

        other.dataset_id = "ow1/ds9".into();
        assert_eq!(
            file.identity_conflict(&other),
            Some(("dataset_id", "ow1/ds1", "ow1/ds9"))
        );

        other.owner_id = "someone_else".into();
        assert_eq!(
            file.identity_conflict(&other).map(|(field, _, _)| field),
            Some("owner_id")
        );
    }

    #[test]
    fn serializes_flow_ids_as_sorted_array_and_timestamp_as_iso8601() {
        let mut file = StoredFile::first_write(write("b", 1));
        file.apply_write(write("a", 1));

        let json = serde_json::to_value(&file).unwrap();
        assert_eq!(json["flow_ids"], serde_json::json!(["a", "b"]));
        assert_eq!(json["created_at"], "2024-05-01T12:00:00Z");
        assert_eq!(json["findability"], "published");
    }
}
