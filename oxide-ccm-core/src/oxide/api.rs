use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use super::{ExternalIp, FloatingIp, FloatingIpCreate, Instance, NetworkInterface};

#[derive(Debug, Error)]
pub enum OxideApiError {
    /// Definitive absence, distinct from transient failure so callers can
    /// proceed with cleanup instead of retrying.
    #[error("The requested resource doesn't exist!")]
    NotFound,
    #[error("Couldn't reach the Oxide API! Reason: {}", .0)]
    Request(#[from] reqwest::Error),
    #[error("The Oxide API rejected the request! Status: {}, message: {}", .0, .1)]
    Api(u16, String),
}

impl OxideApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

/// The subset of the Oxide API consumed by this controller.
///
/// Instance references are name-or-id strings, mirroring the API's
/// `NameOrId` path parameters; id lookups are rack-global, name lookups
/// require a project scope.
#[async_trait]
pub trait OxideApi: Send + Sync {
    async fn instance_view(
        &self,
        instance: &str,
        project: Option<&str>,
    ) -> Result<Instance, OxideApiError>;

    async fn instance_network_interface_list(
        &self,
        instance: &str,
    ) -> Result<Vec<NetworkInterface>, OxideApiError>;

    async fn instance_external_ip_list(
        &self,
        instance: &str,
    ) -> Result<Vec<ExternalIp>, OxideApiError>;

    async fn floating_ip_view(
        &self,
        floating_ip: &str,
        project: &str,
    ) -> Result<FloatingIp, OxideApiError>;

    async fn floating_ip_create(
        &self,
        project: &str,
        params: FloatingIpCreate,
    ) -> Result<FloatingIp, OxideApiError>;

    async fn floating_ip_attach(
        &self,
        floating_ip: &str,
        project: &str,
        instance: &str,
    ) -> Result<FloatingIp, OxideApiError>;

    async fn floating_ip_detach(
        &self,
        floating_ip: &str,
        project: &str,
    ) -> Result<FloatingIp, OxideApiError>;

    async fn floating_ip_delete(&self, floating_ip: &str, project: &str)
        -> Result<(), OxideApiError>;
}

#[async_trait]
impl<T: OxideApi + ?Sized> OxideApi for Arc<T> {
    async fn instance_view(
        &self,
        instance: &str,
        project: Option<&str>,
    ) -> Result<Instance, OxideApiError> {
        (**self).instance_view(instance, project).await
    }

    async fn instance_network_interface_list(
        &self,
        instance: &str,
    ) -> Result<Vec<NetworkInterface>, OxideApiError> {
        (**self).instance_network_interface_list(instance).await
    }

    async fn instance_external_ip_list(
        &self,
        instance: &str,
    ) -> Result<Vec<ExternalIp>, OxideApiError> {
        (**self).instance_external_ip_list(instance).await
    }

    async fn floating_ip_view(
        &self,
        floating_ip: &str,
        project: &str,
    ) -> Result<FloatingIp, OxideApiError> {
        (**self).floating_ip_view(floating_ip, project).await
    }

    async fn floating_ip_create(
        &self,
        project: &str,
        params: FloatingIpCreate,
    ) -> Result<FloatingIp, OxideApiError> {
        (**self).floating_ip_create(project, params).await
    }

    async fn floating_ip_attach(
        &self,
        floating_ip: &str,
        project: &str,
        instance: &str,
    ) -> Result<FloatingIp, OxideApiError> {
        (**self)
            .floating_ip_attach(floating_ip, project, instance)
            .await
    }

    async fn floating_ip_detach(
        &self,
        floating_ip: &str,
        project: &str,
    ) -> Result<FloatingIp, OxideApiError> {
        (**self).floating_ip_detach(floating_ip, project).await
    }

    async fn floating_ip_delete(
        &self,
        floating_ip: &str,
        project: &str,
    ) -> Result<(), OxideApiError> {
        (**self).floating_ip_delete(floating_ip, project).await
    }
}
