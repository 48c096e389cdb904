use k8s_openapi::api::core::v1::{LoadBalancerIngress, LoadBalancerStatus, Node, Service};
use log::{debug, info};

use crate::{
    error::ProviderError,
    oxide::{FloatingIp, FloatingIpCreate, OxideApi},
    provider_id,
};

pub const CONTROL_PLANE_LABEL: &str = "node-role.kubernetes.io/control-plane";
/// Legacy role label, still honored for clusters upgraded in place.
pub const LEGACY_CONTROL_PLANE_LABEL: &str = "node-role.kubernetes.io/master";

/// Pool floating IPs are allocated from.
pub const FLOATING_IP_POOL: &str = "default";

/// Picks the backend node for a load balancer: the first node in input order
/// carrying a control-plane role label. Deterministic on purpose - repeated
/// reconciles against an unchanged node set must pick the same backend to
/// avoid attach/detach churn.
pub fn find_control_plane_node(nodes: &[Node]) -> Result<&Node, ProviderError> {
    nodes
        .iter()
        .find(|node| {
            node.metadata.labels.as_ref().map_or(false, |labels| {
                labels.contains_key(CONTROL_PLANE_LABEL)
                    || labels.contains_key(LEGACY_CONTROL_PLANE_LABEL)
            })
        })
        .ok_or(ProviderError::NoControlPlaneNode(nodes.len()))
}

/// Drives a per-Service floating IP to "exists, attached to the selected
/// control-plane node", and on deletion to "detached and removed".
///
/// All state lives in the Oxide backend; every call re-reads it before
/// mutating, so any failed call can be retried from scratch. The caller must
/// serialize calls for the same Service (the controller runtime guarantees
/// this); calls for different Services may run concurrently.
pub struct LoadBalancers<C> {
    api: C,
    project: String,
}

impl<C: OxideApi> LoadBalancers<C> {
    pub fn new(api: C, project: impl Into<String>) -> Self {
        Self {
            api,
            project: project.into(),
        }
    }

    /// Derives the floating ip name for a Service: `lb-{namespace}-{name}`.
    pub fn load_balancer_name(service: &Service) -> Result<String, ProviderError> {
        let (namespace, name) = service_keys(service)?;

        Ok(format!("lb-{namespace}-{name}"))
    }

    /// Looks up the Service's floating IP; `Ok(None)` means no balancer has
    /// been provisioned for it.
    pub async fn get_load_balancer(
        &self,
        service: &Service,
    ) -> Result<Option<LoadBalancerStatus>, ProviderError> {
        let name = Self::load_balancer_name(service)?;

        debug!("Getting load balancer '{}'...", name);

        match self.api.floating_ip_view(&name, &self.project).await {
            Ok(floating_ip) => Ok(Some(ingress_status(&floating_ip))),
            Err(error) if error.is_not_found() => Ok(None),
            Err(error) => Err(error.into()),
        }
    }

    /// Idempotent upsert: creates the floating IP when absent and reconciles
    /// its attachment to the selected control-plane node. The steady-state
    /// path (already attached to the right instance) issues no mutations.
    pub async fn ensure_load_balancer(
        &self,
        service: &Service,
        nodes: &[Node],
    ) -> Result<LoadBalancerStatus, ProviderError> {
        let (namespace, service_name) = service_keys(service)?;
        let name = format!("lb-{namespace}-{service_name}");

        info!("Ensuring load balancer '{}'...", name);

        let instance_id = target_instance_id(nodes)?;

        let floating_ip = match self.api.floating_ip_view(&name, &self.project).await {
            Ok(floating_ip) => floating_ip,
            Err(error) if error.is_not_found() => {
                info!(
                    "Creating floating ip '{}' in the '{}' pool...",
                    name, FLOATING_IP_POOL
                );

                let params = FloatingIpCreate {
                    name: name.clone(),
                    description: format!("Load balancer for service {namespace}/{service_name}"),
                    pool: FLOATING_IP_POOL.to_owned(),
                };

                match self.api.floating_ip_create(&self.project, params).await {
                    Ok(floating_ip) => floating_ip,
                    // a concurrent create may have won the race; re-read and
                    // only surface the create error if it truly doesn't exist
                    Err(create_error) => {
                        match self.api.floating_ip_view(&name, &self.project).await {
                            Ok(floating_ip) => floating_ip,
                            Err(_) => return Err(create_error.into()),
                        }
                    }
                }
            }
            Err(error) => return Err(error.into()),
        };

        let floating_ip = self
            .reconcile_attachment(&name, floating_ip, &instance_id)
            .await?;

        Ok(ingress_status(&floating_ip))
    }

    /// Re-selects the backend and fixes up the attachment, assuming the
    /// floating IP already exists; only invoked after a successful ensure.
    pub async fn update_load_balancer(
        &self,
        service: &Service,
        nodes: &[Node],
    ) -> Result<(), ProviderError> {
        let name = Self::load_balancer_name(service)?;

        info!("Updating load balancer '{}'...", name);

        let instance_id = target_instance_id(nodes)?;

        let floating_ip = match self.api.floating_ip_view(&name, &self.project).await {
            Ok(floating_ip) => floating_ip,
            Err(error) if error.is_not_found() => {
                return Err(ProviderError::FloatingIpNotFound(name))
            }
            Err(error) => return Err(error.into()),
        };

        self.reconcile_attachment(&name, floating_ip, &instance_id)
            .await?;

        Ok(())
    }

    /// Idempotent teardown: a floating IP that's already gone is a no-op
    /// success. An attached floating IP is detached first since the backend
    /// rejects deleting an attached resource.
    pub async fn ensure_load_balancer_deleted(
        &self,
        service: &Service,
    ) -> Result<(), ProviderError> {
        let name = Self::load_balancer_name(service)?;

        info!("Ensuring load balancer '{}' is deleted...", name);

        let floating_ip = match self.api.floating_ip_view(&name, &self.project).await {
            Ok(floating_ip) => floating_ip,
            Err(error) if error.is_not_found() => {
                debug!("Floating ip '{}' not found, already deleted", name);
                return Ok(());
            }
            Err(error) => return Err(error.into()),
        };

        if let Some(instance_id) = attached_instance(&floating_ip) {
            info!(
                "Detaching floating ip '{}' from instance '{}'...",
                name, instance_id
            );
            self.api.floating_ip_detach(&name, &self.project).await?;
        }

        info!("Deleting floating ip '{}'...", name);
        self.api.floating_ip_delete(&name, &self.project).await?;

        Ok(())
    }

    /// Brings the floating IP's attachment in line with the desired instance.
    /// Detach-before-attach is mandatory - the backend enforces single
    /// attachment exclusivity.
    async fn reconcile_attachment(
        &self,
        name: &str,
        floating_ip: FloatingIp,
        instance_id: &str,
    ) -> Result<FloatingIp, ProviderError> {
        let attached = attached_instance(&floating_ip).map(str::to_owned);

        match attached {
            Some(attached) if attached == instance_id => {
                debug!(
                    "Floating ip '{}' is already attached to instance '{}'",
                    name, instance_id
                );

                Ok(floating_ip)
            }
            attached => {
                if let Some(previous) = attached {
                    info!(
                        "Detaching floating ip '{}' from instance '{}'...",
                        name, previous
                    );
                    self.api.floating_ip_detach(name, &self.project).await?;
                }

                info!(
                    "Attaching floating ip '{}' to instance '{}'...",
                    name, instance_id
                );

                Ok(self
                    .api
                    .floating_ip_attach(name, &self.project, instance_id)
                    .await?)
            }
        }
    }
}

fn target_instance_id(nodes: &[Node]) -> Result<String, ProviderError> {
    let node = find_control_plane_node(nodes)?;
    let node_provider_id = node
        .spec
        .as_ref()
        .and_then(|spec| spec.provider_id.as_deref())
        .unwrap_or_default();

    Ok(provider_id::parse(node_provider_id)?)
}

fn attached_instance(floating_ip: &FloatingIp) -> Option<&str> {
    floating_ip
        .instance_id
        .as_deref()
        .filter(|instance_id| !instance_id.is_empty())
}

fn ingress_status(floating_ip: &FloatingIp) -> LoadBalancerStatus {
    LoadBalancerStatus {
        ingress: Some(vec![LoadBalancerIngress {
            ip: Some(floating_ip.ip.clone()),
            ..Default::default()
        }]),
    }
}

fn service_keys(service: &Service) -> Result<(&str, &str), ProviderError> {
    let namespace = service
        .metadata
        .namespace
        .as_deref()
        .ok_or(ProviderError::MissingObjectMetadata("Service"))?;
    let name = service
        .metadata
        .name
        .as_deref()
        .ok_or(ProviderError::MissingObjectMetadata("Service"))?;

    Ok((namespace, name))
}
