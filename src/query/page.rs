//! Query results

use crate::core::PersistedRecord;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

/// One bucket of records, newest first
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogGroup {
    pub key: String,
    pub records: Vec<PersistedRecord>,
}

/// One page of grouped query results
///
/// Serializes to the endpoint shape, with `logs` as a JSON object whose keys
/// keep the page's group order:
///
/// ```json
/// { "logs": { "42": [ ... ], "17": [ ... ] }, "total_groups": 2,
///   "page": 1, "total_pages": 1 }
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Page {
    #[serde(rename = "logs", serialize_with = "groups_as_map")]
    pub groups: Vec<LogGroup>,
    pub total_groups: usize,
    /// Records that passed the filter, across every page
    pub total_records: usize,
    pub page: usize,
    #[serde(skip)]
    pub page_size: usize,
    pub total_pages: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

fn groups_as_map<S: Serializer>(groups: &[LogGroup], serializer: S) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(groups.len()))?;
    for group in groups {
        map.serialize_entry(&group.key, &group.records)?;
    }
    map.end()
}

impl Page {
    /// A failed query: no groups, and the reason in `error_message`
    pub fn failed(message: impl Into<String>, page: usize, page_size: usize) -> Self {
        Self {
            page,
            page_size,
            error_message: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn is_error(&self) -> bool {
        self.error_message.is_some()
    }

    /// Records on this page
    pub fn record_count(&self) -> usize {
        self.groups.iter().map(|g| g.records.len()).sum()
    }

    pub fn group(&self, key: &str) -> Option<&LogGroup> {
        self.groups.iter().find(|g| g.key == key)
    }

    pub fn keys(&self) -> Vec<&str> {
        self.groups.iter().map(|g| g.key.as_str()).collect()
    }

    pub fn to_json(&self) -> crate::core::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
