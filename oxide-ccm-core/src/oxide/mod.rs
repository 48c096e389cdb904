use serde::{Deserialize, Serialize};

pub mod api;
pub mod http;

#[cfg(test)]
pub(crate) mod mock;

pub use api::{OxideApi, OxideApiError};
pub use http::OxideHttpClient;

/// An Oxide compute instance, as returned by the API. Request-scoped only -
/// never cached across reconcile calls.
#[derive(Debug, Clone, Deserialize)]
pub struct Instance {
    pub id: String,
    pub name: String,
    pub hostname: String,
    pub ncpus: u64,
    /// Memory in bytes.
    pub memory: u64,
    pub run_state: InstanceState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceState {
    Creating,
    Starting,
    Running,
    Stopping,
    Stopped,
    Rebooting,
    Migrating,
    Repairing,
    Failed,
    Destroyed,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkInterface {
    pub id: String,
    pub name: String,
    pub ip: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExternalIp {
    pub ip: String,
    pub kind: ExternalIpKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExternalIpKind {
    Ephemeral,
    Floating,
    /// Provider-internal masquerade address, not externally reachable.
    Snat,
}

/// A floating IP keyed by (project, name). The backend enforces that it is
/// attached to at most one instance at a time.
#[derive(Debug, Clone, Deserialize)]
pub struct FloatingIp {
    pub id: String,
    pub name: String,
    pub ip: String,
    #[serde(default)]
    pub instance_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FloatingIpCreate {
    pub name: String,
    pub description: String,
    pub pool: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FloatingIpAttach {
    pub kind: FloatingIpParentKind,
    pub parent: String,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FloatingIpParentKind {
    Instance,
}

/// A single page of a paginated list response.
#[derive(Debug, Deserialize)]
pub struct ResultsPage<T> {
    pub items: Vec<T>,
    #[serde(default)]
    pub next_page: Option<String>,
}
