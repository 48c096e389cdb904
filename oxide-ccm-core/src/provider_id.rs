use thiserror::Error;
use uuid::Uuid;

/// Scheme prefix carried by every Oxide provider id.
pub const PROVIDER_ID_SCHEME: &str = "oxide://";

#[derive(Debug, Error)]
pub enum ProviderIdError {
    #[error("The provider id is empty!")]
    Empty,
    #[error("The provider id '{}' doesn't have the '{}' prefix!", .0, PROVIDER_ID_SCHEME)]
    Scheme(String),
    #[error("The provider id contains an invalid uuid! Reason: {}", .0)]
    Uuid(uuid::Error),
}

/// Extracts the Oxide instance id from a node's provider id.
///
/// The instance id is returned exactly as it appeared in the provider id
/// (case preserved) after validating that it parses as a UUID.
pub fn parse(provider_id: &str) -> Result<String, ProviderIdError> {
    if provider_id.is_empty() {
        return Err(ProviderIdError::Empty);
    }

    let instance_id = provider_id
        .strip_prefix(PROVIDER_ID_SCHEME)
        .ok_or_else(|| ProviderIdError::Scheme(provider_id.to_owned()))?;

    Uuid::try_parse(instance_id).map_err(ProviderIdError::Uuid)?;

    Ok(instance_id.to_owned())
}

/// Formats an Oxide instance id as a provider id.
///
/// Total - an empty instance id yields the bare scheme.
pub fn format(instance_id: &str) -> String {
    format!("{PROVIDER_ID_SCHEME}{instance_id}")
}
