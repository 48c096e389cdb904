use oxide_ccm_core::error::ProviderError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error("Object is missing metadata!")]
    MissingObjectMetadata,
    #[error("Couldn't patch the resource! Reason: {}", .0)]
    KubeApiError(kube::Error),
    #[error("Couldn't reconcile against the Oxide API! Reason: {}", .0)]
    Provider(#[from] ProviderError),
}
