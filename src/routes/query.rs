use serde::Deserialize;

use crate::normalization;

/// The body of a generation request. Both fields are sanitized on the
/// way in.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    #[serde(deserialize_with = "normalization::deserialize")]
    pub track_title: String,
    #[serde(default, deserialize_with = "normalization::deserialize")]
    pub artist_name: String,
}

/// Query parameters for looking up an already-allocated code.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupQuery {
    pub track_title: String,
    #[serde(default)]
    pub artist_name: String,
}

/// The body of a usage-recording request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordRequest {
    #[serde(default = "default_package_type")]
    pub package_type: String,
}

fn default_package_type() -> String {
    "radio".to_owned()
}
