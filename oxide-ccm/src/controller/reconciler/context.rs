use std::sync::Arc;

use k8s_openapi::api::core::v1::Node;
use kube::{runtime::reflector::Store, Client};
use oxide_ccm_core::{
    instances::Instances, loadbalancer::LoadBalancers, oxide::OxideHttpClient,
};

pub struct ReconcilerContext {
    pub client: Client,
    pub instances: Instances<Arc<OxideHttpClient>>,
    pub load_balancers: LoadBalancers<Arc<OxideHttpClient>>,
    pub nodes: Store<Node>,
}

impl ReconcilerContext {
    /// Snapshot of the candidate node set for backend selection.
    pub fn candidate_nodes(&self) -> Vec<Node> {
        self.nodes
            .state()
            .iter()
            .map(|node| (**node).clone())
            .collect()
    }
}
