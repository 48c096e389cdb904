use std::env::var;

use thiserror::Error;

/// Connection and scoping configuration for the Oxide API, supplied by the
/// deployment environment. The core treats these as opaque inputs.
#[derive(Debug, Clone)]
pub struct OxideConfig {
    /// Base URL of the rack's external API, e.g. `https://oxide.sys.example.com`.
    pub host: String,
    pub token: String,
    /// Project the cluster's instances and floating IPs live in.
    pub project: String,
}

#[derive(Debug, Error)]
pub enum FromError {
    #[error("Env var unavailable: {}", .0)]
    VarUnset(std::env::VarError),
}

impl OxideConfig {
    pub fn from_env() -> Result<Self, FromError> {
        Ok(Self {
            host: var("OXIDE_HOST").map_err(FromError::VarUnset)?,
            token: var("OXIDE_TOKEN").map_err(FromError::VarUnset)?,
            project: var("OXIDE_PROJECT").map_err(FromError::VarUnset)?,
        })
    }
}
