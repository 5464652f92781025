//! Codec for the `flow_ids` column.
//!
//! The set of flows that ever wrote a file is kept in a single TEXT column as
//! a JSON array of strings. Encoding goes through a `BTreeSet`, so the array
//! is always written in ascending order and without duplicates.

use std::collections::BTreeSet;

/// Serialize a flow-id set into its column text (sorted JSON array).
pub fn encode_flow_ids(flow_ids: &BTreeSet<String>) -> serde_json::Result<String> {
    serde_json::to_string(flow_ids)
}

/// Parse column text back into a flow-id set.
///
/// NULL or blank text decodes to the empty set. Arrays written out of order
/// or with repeats still come back sorted and deduplicated.
pub fn decode_flow_ids(raw: Option<&str>) -> serde_json::Result<BTreeSet<String>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(BTreeSet::new()),
        Some(text) => serde_json::from_str(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_writes_sorted_json_array() {
        let set: BTreeSet<String> = ["ow1/ds1/2", "ow1/ds1/10", "ow1/ds1/1"]
            .into_iter()
            .map(String::from)
            .collect();

        let text = encode_flow_ids(&set).unwrap();
        assert_eq!(text, r#"["ow1/ds1/1","ow1/ds1/10","ow1/ds1/2"]"#);
    }

    #[test]
    fn decode_normalizes_unsorted_input() {
        let set = decode_flow_ids(Some(r#"["b","a","b"]"#)).unwrap();
        assert_eq!(set.into_iter().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn decode_treats_missing_column_as_empty() {
        assert!(decode_flow_ids(None).unwrap().is_empty());
        assert!(decode_flow_ids(Some("  ")).unwrap().is_empty());
        assert!(decode_flow_ids(Some("[]")).unwrap().is_empty());
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(decode_flow_ids(Some("not json")).is_err());
        assert!(decode_flow_ids(Some(r#"{"a":1}"#)).is_err());
    }
}
