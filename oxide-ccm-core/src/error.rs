use thiserror::Error;

use crate::{oxide::OxideApiError, provider_id::ProviderIdError};

/// Failure modes surfaced by the provider core. The core never retries
/// internally - callers are expected to requeue and re-invoke from scratch.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Malformed provider id. Permanent, retrying won't help.
    #[error("Couldn't parse the provider id! Reason: {}", .0)]
    ProviderId(#[from] ProviderIdError),
    /// Any other failure from the Oxide API. Transient by default.
    #[error("The Oxide API request failed! Reason: {}", .0)]
    Api(#[from] OxideApiError),
    #[error("No instance backing node '{}' could be found!", .0)]
    InstanceNotFound(String),
    /// Recoverable - expected during cluster bootstrap races.
    #[error("No control plane node found among {} nodes!", .0)]
    NoControlPlaneNode(usize),
    #[error("The floating ip '{}' doesn't exist!", .0)]
    FloatingIpNotFound(String),
    #[error("The '{}' resource is missing its name or namespace!", .0)]
    MissingObjectMetadata(&'static str),
}
