use std::sync::Arc;

use kube::Client;
use oxide_ccm_core::{
    config::OxideConfig, instances::Instances, loadbalancer::LoadBalancers, oxide::OxideHttpClient,
};
use tokio::join;

use self::{
    node::{start_node_controller, start_node_reflector},
    reconciler::context::ReconcilerContext,
    service::start_service_controller,
};

pub mod node;
pub mod reconciler;
pub mod service;

pub async fn main_controller(client: Client, oxide: Arc<OxideHttpClient>, config: OxideConfig) {
    let (reflector, nodes, ping) = start_node_reflector(&client).await;

    let context = Arc::new(ReconcilerContext {
        client,
        instances: Instances::new(oxide.clone(), config.project.clone()),
        load_balancers: LoadBalancers::new(oxide, config.project),
        nodes,
    });

    let node_controller = start_node_controller(context.clone());
    let service_controller = start_service_controller(context, ping);

    join!(reflector, node_controller, service_controller);
}
