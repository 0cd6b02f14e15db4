use std::collections::BTreeMap;
use std::convert::TryFrom;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

pub mod allocator;

/// The ISO 3166 territory every code is issued under.
pub const TERRITORY: &str = "ZA";

/// The registrant prefix every code is issued under.
pub const REGISTRANT: &str = "80G";

/// Salt mixed into user IDs before hashing them into a partition.
const SALT: &str = "beatschain-isrc-salt";

/// The number of designation partitions the 5-digit keyspace is
/// divided into.
const PARTITIONS: u32 = 90;

/// The first designation of partition 0.
const RANGE_FLOOR: u32 = 200;

/// The number of designations in one partition.
const RANGE_SPAN: u32 = 1_000;

/// The largest designation a 5-digit sequence can express.
const SEQUENCE_CEILING: u32 = 99_999;

/// The block of designations assigned to one user for one year.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignationRange {
    pub start: u32,
    pub end: u32,
    #[serde(default)]
    pub user_id: String,
    #[serde(default, rename = "rangeIndex")]
    pub partition: u32,
}

impl DesignationRange {
    /// The fixed range assigned when the caller's identity cannot be
    /// resolved.
    pub fn fallback() -> DesignationRange {
        DesignationRange {
            start: RANGE_FLOOR,
            end: RANGE_FLOOR + RANGE_SPAN - 1,
            user_id: "default".to_owned(),
            partition: 0,
        }
    }

    /// How many codes the range can hold.
    pub fn capacity(&self) -> u32 {
        self.end - self.start + 1
    }
}

/// Derives the designation range for a user by hashing their ID into
/// one of [`PARTITIONS`] fixed blocks. Deterministic, so the same
/// user always lands in the same block; distinct users collide only
/// if their hashes do.
pub fn designation_range(user_id: &str) -> DesignationRange {
    let mut hasher = Sha256::new();
    hasher.update(user_id.as_bytes());
    hasher.update(SALT.as_bytes());
    let digest = hasher.finalize();

    let hash = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
    let partition = hash % PARTITIONS;
    let start = RANGE_FLOOR + partition * RANGE_SPAN;
    let end = (start + RANGE_SPAN - 1).min(SEQUENCE_CEILING);

    DesignationRange {
        start,
        end,
        user_id: user_id.to_owned(),
        partition,
    }
}

/// Builds the full code string for a designation.
pub fn format_code(year: &str, designation: u32) -> String {
    format!("{}-{}-{}-{:05}", TERRITORY, REGISTRANT, year, designation)
}

/// Checks a code against the `ZA-80G-YY-NNNNN` layout. Whitespace is
/// ignored; everything else must match exactly.
pub fn validate(code: &str) -> bool {
    let compact: String = code.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = compact.as_bytes();

    bytes.len() == 15
        && compact.starts_with("ZA-80G-")
        && bytes[7].is_ascii_digit()
        && bytes[8].is_ascii_digit()
        && bytes[9] == b'-'
        && bytes[10..].iter().all(u8::is_ascii_digit)
}

/// Everything recorded about one allocated code.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeRecord {
    #[serde(default)]
    pub track_title: String,
    #[serde(default)]
    pub artist_name: String,
    #[serde(default)]
    pub generated: String,
    #[serde(default)]
    pub used: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub used_at: Option<String>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub context: Value,
}

impl CodeRecord {
    pub(crate) fn new(track_title: String, artist_name: String, generated: String) -> Self {
        Self {
            track_title,
            artist_name,
            generated,
            used: false,
            used_at: None,
            context: Value::Null,
        }
    }
}

/// A summary of the registry for reporting.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryStats {
    pub total: usize,
    pub used: usize,
    pub available: usize,
    pub current_year: String,
    pub last_designation: u32,
}

/// The persisted allocation state for one installation.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Registry {
    pub(crate) last_designation: u32,
    pub(crate) codes: BTreeMap<String, CodeRecord>,
    pub(crate) year: String,
    pub(crate) user_range: DesignationRange,
}

impl Registry {
    /// A registry that has never allocated anything.
    pub(crate) fn fresh(user_range: DesignationRange, year: String) -> Registry {
        Registry {
            last_designation: user_range.start,
            codes: BTreeMap::new(),
            year,
            user_range,
        }
    }
}

/// A lenient view of a stored registry document. Damaged or missing
/// parts surface as `None`/empty so the caller can rebuild them
/// instead of discarding the whole document.
#[derive(Debug, Default)]
pub(crate) struct StoredRegistry {
    pub(crate) last_designation: Option<u32>,
    pub(crate) codes: BTreeMap<String, CodeRecord>,
    pub(crate) year: Option<String>,
    pub(crate) user_range: Option<DesignationRange>,
}

impl StoredRegistry {
    pub(crate) fn parse(value: &Value) -> StoredRegistry {
        let last_designation = value
            .get("lastDesignation")
            .and_then(Value::as_u64)
            .and_then(|n| u32::try_from(n).ok());

        let codes = value
            .get("codes")
            .and_then(Value::as_object)
            .map(|map| {
                map.iter()
                    .filter_map(|(code, record)| {
                        serde_json::from_value::<CodeRecord>(record.clone())
                            .ok()
                            .map(|record| (code.clone(), record))
                    })
                    .collect()
            })
            .unwrap_or_default();

        let year = value.get("year").and_then(Value::as_str).map(str::to_owned);

        let user_range = value
            .get("userRange")
            .and_then(|range| serde_json::from_value(range.clone()).ok());

        StoredRegistry {
            last_designation,
            codes,
            year,
            user_range,
        }
    }
}
