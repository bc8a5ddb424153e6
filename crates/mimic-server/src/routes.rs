//! Route table compilation: turns the ordered configuration entries into
//! an exact-match (method, path) lookup table.

use crate::config::Configuration;
use std::collections::HashMap;
use std::fmt;
use tracing::{info, warn};

/// HTTP methods the route table dispatches on.
///
/// The mapping from configuration strings is total: anything outside the
/// recognized set becomes `Unsupported`, which route compilation logs and
/// skips instead of silently dropping.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RouteMethod {
    Get,
    Post,
    Put,
    Delete,
    Unsupported(String),
}

impl RouteMethod {
    /// Classify a configuration method string, case-insensitively.
    pub fn from_config(method: &str) -> Self {
        match method.to_ascii_uppercase().as_str() {
            "GET" => Self::Get,
            "POST" => Self::Post,
            "PUT" => Self::Put,
            "DELETE" => Self::Delete,
            _ => Self::Unsupported(method.to_string()),
        }
    }

    /// Classify an incoming request method.
    pub fn from_request(method: &hyper::Method) -> Self {
        match *method {
            hyper::Method::GET => Self::Get,
            hyper::Method::POST => Self::Post,
            hyper::Method::PUT => Self::Put,
            hyper::Method::DELETE => Self::Delete,
            _ => Self::Unsupported(method.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Unsupported(raw) => raw.as_str(),
        }
    }
}

impl fmt::Display for RouteMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The render action bound to a registered route.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteBinding {
    /// Base file name of the template to render for this route
    pub template_name: String,
}

/// Exact-match routing table, compiled once at startup and read-only at
/// request time.
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: HashMap<(RouteMethod, String), RouteBinding>,
}

impl RouteTable {
    /// Compile the configuration's entries, in order, into the table.
    ///
    /// A later entry for the same (method, path) key overrides an earlier
    /// one. Entries with an unsupported method are logged and skipped.
    pub fn compile(config: &Configuration) -> Self {
        let mut routes = HashMap::new();

        for spec in &config.request_config {
            match RouteMethod::from_config(&spec.method) {
                RouteMethod::Unsupported(raw) => {
                    warn!(
                        method = %raw,
                        resource = %spec.resource,
                        "Skipping route entry with unsupported method"
                    );
                }
                method => {
                    info!(
                        method = %method,
                        resource = %spec.resource,
                        template = %spec.response_template,
                        "Registered route"
                    );
                    routes.insert(
                        (method, spec.resource.clone()),
                        RouteBinding {
                            template_name: spec.response_template.clone(),
                        },
                    );
                }
            }
        }

        Self { routes }
    }

    /// Look up the binding for an exact (method, path) pair.
    pub fn lookup(&self, method: &RouteMethod, path: &str) -> Option<&RouteBinding> {
        self.routes.get(&(method.clone(), path.to_string()))
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
