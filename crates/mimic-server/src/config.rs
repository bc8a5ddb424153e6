//! Route-table configuration loaded from JSON.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration document: an ordered list of route entries.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Configuration {
    #[serde(default, rename = "requestConfig")]
    pub request_config: Vec<RouteSpec>,
}

/// One configured mapping of (HTTP method, resource path) to a named
/// response template.
///
/// Every field defaults to the empty string: an entry missing a field
/// decodes rather than erroring, and route compilation registers or skips
/// it based on the resulting values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RouteSpec {
    /// Base file name of the response template to render
    #[serde(default, rename = "responseTemplateName")]
    pub response_template: String,
    /// Resource path to match exactly
    #[serde(default)]
    pub resource: String,
    /// HTTP method to respond to, compared case-insensitively
    #[serde(default)]
    pub method: String,
}

impl Configuration {
    /// Read and decode the JSON route table.
    ///
    /// I/O and decode errors are returned to the caller; startup treats
    /// them as fatal. There is no validation beyond structural decoding.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let contents = std::fs::read_to_string(path)?;
        let config: Configuration = serde_json::from_str(&contents)?;
        Ok(config)
    }
}
