use serde::Serialize;

use crate::isrc::{DesignationRange, RegistryStats};
use crate::limits::{PackageGate, UpgradePrompt, UsageStats};

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum SuccessResponse<'a> {
    Gate {
        #[serde(flatten)]
        gate: PackageGate,
        #[serde(skip_serializing_if = "Option::is_none")]
        upgrade: Option<UpgradePrompt>,
    },
    Generated {
        code: String,
    },
    Healthz {
        revision: Option<&'a str>,
        timestamp: Option<&'a str>,
        version: &'a str,
    },
    Lookup {
        code: String,
    },
    Marked {
        code: String,
        updated: bool,
    },
    Range(DesignationRange),
    Stats(RegistryStats),
    Usage(UsageStats),
    Validity {
        code: String,
        valid: bool,
    },
}
