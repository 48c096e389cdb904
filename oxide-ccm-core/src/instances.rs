use std::iter::once;

use itertools::chain;
use k8s_openapi::api::core::v1::{Node, NodeAddress};
use log::debug;

use crate::{
    error::ProviderError,
    oxide::{ExternalIp, ExternalIpKind, Instance, InstanceState, NetworkInterface, OxideApi},
    provider_id,
};

pub const GIBIBYTE: u64 = 1024 * 1024 * 1024;

/// Normalized node metadata consumed by the node controller. Recomputed on
/// every request, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeMetadata {
    pub provider_id: String,
    pub instance_type: String,
    pub node_addresses: Vec<NodeAddress>,
}

/// Resolves Kubernetes nodes to the Oxide instances backing them.
pub struct Instances<C> {
    api: C,
    project: String,
}

impl<C: OxideApi> Instances<C> {
    pub fn new(api: C, project: impl Into<String>) -> Self {
        Self {
            api,
            project: project.into(),
        }
    }

    /// Finds the instance backing the node.
    ///
    /// A node carrying a provider id is looked up by the instance id encoded
    /// in it (propagating codec errors); a node without one is looked up by
    /// its name within the configured project, which only happens before the
    /// node controller has assigned a provider id. A definitive "not found"
    /// from the backend maps to `Ok(None)`, never to an error.
    pub async fn resolve(&self, node: &Node) -> Result<Option<Instance>, ProviderError> {
        let provider_id = node_provider_id(node);

        let result = if provider_id.is_empty() {
            let name = node_name(node)?;

            debug!("Looking up the instance for node '{}' by name...", name);

            self.api.instance_view(name, Some(&self.project)).await
        } else {
            let instance_id = provider_id::parse(provider_id)?;

            self.api.instance_view(&instance_id, None).await
        };

        match result {
            Ok(instance) => Ok(Some(instance)),
            Err(error) if error.is_not_found() => Ok(None),
            Err(error) => Err(error.into()),
        }
    }

    /// Whether the instance named by the node's provider id still exists.
    ///
    /// Unlike `resolve` there is no name fallback: a node without a provider
    /// id hasn't been tied to an instance yet, and answering for it risks
    /// declaring an unrelated node dead. Codec errors propagate.
    pub async fn instance_exists(&self, node: &Node) -> Result<bool, ProviderError> {
        let instance_id = provider_id::parse(node_provider_id(node))?;

        match self.api.instance_view(&instance_id, None).await {
            Ok(_) => Ok(true),
            Err(error) if error.is_not_found() => Ok(false),
            Err(error) => Err(error.into()),
        }
    }

    /// Whether the backing instance is stopped in Oxide. Requires a provider
    /// id like `instance_exists`, and a missing instance is an error here -
    /// existence is `instance_exists`'s question.
    pub async fn instance_shutdown(&self, node: &Node) -> Result<bool, ProviderError> {
        let instance_id = provider_id::parse(node_provider_id(node))?;

        match self.api.instance_view(&instance_id, None).await {
            Ok(instance) => Ok(instance.run_state == InstanceState::Stopped),
            Err(error) if error.is_not_found() => Err(ProviderError::InstanceNotFound(
                node_name(node)?.to_owned(),
            )),
            Err(error) => Err(error.into()),
        }
    }

    pub async fn instance_metadata(&self, node: &Node) -> Result<NodeMetadata, ProviderError> {
        let instance = self.require_instance(node).await?;

        let nics = self.api.instance_network_interface_list(&instance.id).await?;
        let external_ips = self.api.instance_external_ip_list(&instance.id).await?;

        Ok(project_metadata(&instance, &nics, &external_ips))
    }

    async fn require_instance(&self, node: &Node) -> Result<Instance, ProviderError> {
        match self.resolve(node).await? {
            Some(instance) => Ok(instance),
            None => Err(ProviderError::InstanceNotFound(
                node_name(node)?.to_owned(),
            )),
        }
    }
}

/// Projects an instance and its address listings into node metadata.
///
/// Addresses are ordered hostname first, then one internal IP per network
/// interface in listing order, then external IPs with snat-kind masquerade
/// addresses excluded. The instance type deliberately truncates memory to
/// whole gibibytes - it's a label value, not an exact spec.
pub fn project_metadata(
    instance: &Instance,
    nics: &[NetworkInterface],
    external_ips: &[ExternalIp],
) -> NodeMetadata {
    let hostname = once(NodeAddress {
        type_: "Hostname".to_owned(),
        address: instance.hostname.clone(),
    });
    let internal = nics.iter().map(|nic| NodeAddress {
        type_: "InternalIP".to_owned(),
        address: nic.ip.clone(),
    });
    let external = external_ips
        .iter()
        .filter(|external_ip| external_ip.kind != ExternalIpKind::Snat)
        .map(|external_ip| NodeAddress {
            type_: "ExternalIP".to_owned(),
            address: external_ip.ip.clone(),
        });

    NodeMetadata {
        provider_id: provider_id::format(&instance.id),
        instance_type: format!("{}-{}", instance.ncpus, instance.memory / GIBIBYTE),
        node_addresses: chain!(hostname, internal, external).collect(),
    }
}

fn node_provider_id(node: &Node) -> &str {
    node.spec
        .as_ref()
        .and_then(|spec| spec.provider_id.as_deref())
        .unwrap_or_default()
}

fn node_name(node: &Node) -> Result<&str, ProviderError> {
    node.metadata
        .name
        .as_deref()
        .ok_or(ProviderError::MissingObjectMetadata("Node"))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use k8s_openapi::api::core::v1::{Node, NodeSpec};

    use crate::{
        error::ProviderError,
        oxide::{
            mock::{instance, ApiCall, MockOxideApi},
            ExternalIp, ExternalIpKind, InstanceState, NetworkInterface,
        },
        provider_id::ProviderIdError,
    };

    use super::{project_metadata, Instances, GIBIBYTE};

    const INSTANCE_ID: &str = "11111111-1111-1111-1111-111111111111";

    fn node(name: &str, provider_id: Option<&str>) -> Node {
        let mut node = Node::default();
        node.metadata.name = Some(name.to_owned());
        node.spec = Some(NodeSpec {
            provider_id: provider_id.map(str::to_owned),
            ..Default::default()
        });

        node
    }

    fn nic(ip: &str) -> NetworkInterface {
        NetworkInterface {
            id: format!("nic-{ip}"),
            name: "net0".to_owned(),
            ip: ip.to_owned(),
        }
    }

    fn external_ip(ip: &str, kind: ExternalIpKind) -> ExternalIp {
        ExternalIp {
            ip: ip.to_owned(),
            kind,
        }
    }

    #[tokio::test]
    async fn resolve_prefers_the_provider_id() {
        let api = Arc::new(MockOxideApi::default().with_instance(instance(INSTANCE_ID, "n1")));
        let instances = Instances::new(api.clone(), "k8s");

        let resolved = instances
            .resolve(&node("n1", Some(&format!("oxide://{INSTANCE_ID}"))))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(resolved.id, INSTANCE_ID);
        assert_eq!(api.take_calls(), vec![ApiCall::InstanceView(INSTANCE_ID.to_owned())]);
    }

    #[tokio::test]
    async fn resolve_falls_back_to_the_node_name() {
        let api = Arc::new(MockOxideApi::default().with_instance(instance(INSTANCE_ID, "n1")));
        let instances = Instances::new(api.clone(), "k8s");

        let resolved = instances.resolve(&node("n1", None)).await.unwrap().unwrap();

        assert_eq!(resolved.id, INSTANCE_ID);
        assert_eq!(api.take_calls(), vec![ApiCall::InstanceView("n1".to_owned())]);
    }

    #[tokio::test]
    async fn resolve_maps_not_found_to_absence() {
        let api = Arc::new(MockOxideApi::default());
        let instances = Instances::new(api, "k8s");

        let resolved = instances
            .resolve(&node("gone", Some(&format!("oxide://{INSTANCE_ID}"))))
            .await
            .unwrap();

        assert!(resolved.is_none());
    }

    #[tokio::test]
    async fn resolve_propagates_codec_errors() {
        let api = Arc::new(MockOxideApi::default());
        let instances = Instances::new(api, "k8s");

        let result = instances.resolve(&node("n1", Some("aws://whatever"))).await;

        assert!(matches!(
            result,
            Err(ProviderError::ProviderId(ProviderIdError::Scheme(_)))
        ));
    }

    #[tokio::test]
    async fn instance_exists_reports_presence() {
        let api = Arc::new(MockOxideApi::default().with_instance(instance(INSTANCE_ID, "n1")));
        let instances = Instances::new(api, "k8s");

        let provider_id = format!("oxide://{INSTANCE_ID}");
        assert!(instances.instance_exists(&node("n1", Some(&provider_id))).await.unwrap());
        assert!(!instances
            .instance_exists(&node("n2", Some("oxide://22222222-2222-2222-2222-222222222222")))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn instance_exists_never_falls_back_to_the_node_name() {
        // An unassigned node must not be mistaken for a dead one, even when
        // an instance with a matching name exists.
        let api = Arc::new(MockOxideApi::default().with_instance(instance(INSTANCE_ID, "n1")));
        let instances = Instances::new(api.clone(), "k8s");

        let result = instances.instance_exists(&node("n1", None)).await;

        assert!(matches!(
            result,
            Err(ProviderError::ProviderId(ProviderIdError::Empty))
        ));
        assert_eq!(api.take_calls(), vec![]);
    }

    #[tokio::test]
    async fn instance_shutdown_requires_a_provider_id() {
        let api = Arc::new(MockOxideApi::default().with_instance(instance(INSTANCE_ID, "n1")));
        let instances = Instances::new(api, "k8s");

        let result = instances.instance_shutdown(&node("n1", None)).await;

        assert!(matches!(
            result,
            Err(ProviderError::ProviderId(ProviderIdError::Empty))
        ));
    }

    #[tokio::test]
    async fn instance_shutdown_checks_the_run_state() {
        let mut stopped = instance(INSTANCE_ID, "n1");
        stopped.run_state = InstanceState::Stopped;

        let api = Arc::new(MockOxideApi::default().with_instance(stopped));
        let instances = Instances::new(api, "k8s");

        let provider_id = format!("oxide://{INSTANCE_ID}");
        assert!(instances.instance_shutdown(&node("n1", Some(&provider_id))).await.unwrap());
    }

    #[tokio::test]
    async fn instance_shutdown_errors_when_the_instance_is_gone() {
        let api = Arc::new(MockOxideApi::default());
        let instances = Instances::new(api, "k8s");

        let result = instances
            .instance_shutdown(&node("n1", Some(&format!("oxide://{INSTANCE_ID}"))))
            .await;

        assert!(matches!(result, Err(ProviderError::InstanceNotFound(_))));
    }

    #[tokio::test]
    async fn instance_metadata_projects_the_backing_instance() {
        let api = Arc::new(
            MockOxideApi::default()
                .with_instance(instance(INSTANCE_ID, "n1"))
                .with_nics(INSTANCE_ID, vec![nic("172.30.0.5")])
                .with_external_ips(
                    INSTANCE_ID,
                    vec![external_ip("198.51.100.7", ExternalIpKind::Ephemeral)],
                ),
        );
        let instances = Instances::new(api, "k8s");

        let metadata = instances
            .instance_metadata(&node("n1", Some(&format!("oxide://{INSTANCE_ID}"))))
            .await
            .unwrap();

        assert_eq!(metadata.provider_id, format!("oxide://{INSTANCE_ID}"));
        assert_eq!(metadata.instance_type, "4-8");

        let addresses = metadata
            .node_addresses
            .iter()
            .map(|address| (address.type_.as_str(), address.address.as_str()))
            .collect::<Vec<_>>();
        assert_eq!(
            addresses,
            vec![
                ("Hostname", "n1"),
                ("InternalIP", "172.30.0.5"),
                ("ExternalIP", "198.51.100.7"),
            ]
        );
    }

    #[test]
    fn projection_orders_addresses_and_drops_snat() {
        let mut instance = instance(INSTANCE_ID, "n1");
        instance.ncpus = 2;
        // truncated to whole gibibytes, no rounding
        instance.memory = 4 * GIBIBYTE + 123;

        let metadata = project_metadata(
            &instance,
            &[nic("172.30.0.5"), nic("172.30.1.5")],
            &[
                external_ip("198.51.100.1", ExternalIpKind::Snat),
                external_ip("198.51.100.7", ExternalIpKind::Floating),
            ],
        );

        assert_eq!(metadata.instance_type, "2-4");

        let addresses = metadata
            .node_addresses
            .iter()
            .map(|address| (address.type_.as_str(), address.address.as_str()))
            .collect::<Vec<_>>();
        assert_eq!(
            addresses,
            vec![
                ("Hostname", "n1"),
                ("InternalIP", "172.30.0.5"),
                ("InternalIP", "172.30.1.5"),
                ("ExternalIP", "198.51.100.7"),
            ]
        );
    }
}
