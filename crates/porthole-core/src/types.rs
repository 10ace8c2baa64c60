//! Output types for a discovery pass.
//!
//! These are the wire contract between the discovery pipeline and its
//! consumers (the JSON API, the dashboard page). Serialized field
//! names follow the camelCase convention of the API.

use serde::Serialize;

use crate::resolve::ServiceLabel;

// ── Web classification ────────────────────────────────────────────

/// Transport a probed web service answered on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    Https,
}

/// Fields attached to a record once a probe finds a web page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WebService {
    pub title: Option<String>,
    pub description: Option<String>,
    /// Absolute URL, already resolved against the probed origin.
    pub favicon: Option<String>,
    pub protocol: Protocol,
    /// `Some(true)` for HTTPS with a certificate the system trusts,
    /// `Some(false)` for HTTPS with an untrusted certificate, `None`
    /// for plain HTTP.
    pub secure: Option<bool>,
}

// ── Records ───────────────────────────────────────────────────────

/// One discovered listening port.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRecord {
    pub port: u16,
    pub process_name: String,
    /// Friendly display name from the label tables.
    pub name: String,
    /// Icon token understood by the dashboard.
    pub icon: String,
    pub has_web: bool,
    #[serde(flatten)]
    pub web: Option<WebService>,
}

impl ServiceRecord {
    /// A fresh record from enumeration, not yet probed.
    pub fn new(port: u16, process_name: String, label: ServiceLabel) -> Self {
        Self {
            port,
            process_name,
            name: label.name,
            icon: label.icon,
            has_web: false,
            web: None,
        }
    }

    /// Fold in the probe outcome. `has_web` always mirrors whether a
    /// web block is present.
    pub fn apply_probe(&mut self, outcome: Option<WebService>) {
        self.has_web = outcome.is_some();
        self.web = outcome;
    }
}

/// The partitioned output of one discovery pass. Both lists are sorted
/// ascending by port, and no port appears in both.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DiscoveryResult {
    pub web: Vec<ServiceRecord>,
    pub other: Vec<ServiceRecord>,
}
