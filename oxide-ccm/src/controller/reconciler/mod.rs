use kube::Resource;

use self::error::ReconcilerError;

pub mod context;
pub mod error;
pub mod node;
pub mod service;

pub fn require_name<T: Resource>(object: &T) -> Result<&str, ReconcilerError> {
    Ok(object
        .meta()
        .name
        .as_ref()
        .ok_or(ReconcilerError::MissingObjectMetadata)?
        .as_str())
}

pub fn require_namespace<T: Resource>(object: &T) -> Result<&str, ReconcilerError> {
    Ok(object
        .meta()
        .namespace
        .as_ref()
        .ok_or(ReconcilerError::MissingObjectMetadata)?
        .as_str())
}
