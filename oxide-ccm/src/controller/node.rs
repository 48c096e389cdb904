use std::sync::Arc;

use futures::{Future, StreamExt, TryStreamExt};
use k8s_openapi::api::core::v1::Node;
use kube::{
    runtime::{
        reflector::{self, reflector, Store},
        watcher::{watcher, Config},
        Controller, WatchStreamExt,
    },
    Api, Client, ResourceExt,
};
use log::info;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

use crate::helpers::handle_reconciliation_result;

use super::reconciler::{
    context::ReconcilerContext,
    node::{reconcile_node, reconcile_node_error},
};

/// Maintains a trimmed-down node cache for the service controller (it needs
/// role labels and provider ids to pick a load balancer backend) and pings
/// on every change so load balancers can follow the node set.
pub async fn start_node_reflector(
    client: &Client,
) -> (impl Future<Output = ()>, Store<Node>, UnboundedReceiver<()>) {
    let (tx, rx) = unbounded_channel::<()>();
    let watcher_config = Config::default();
    let watcher = watcher(Api::<Node>::all(client.clone()), watcher_config).map_ok(|event| {
        event.modify(|node| {
            node.managed_fields_mut().clear();
            node.annotations_mut().clear();
            node.finalizers_mut().clear();
            node.owner_references_mut().clear();
            node.status = None;
        })
    });
    let (store, writer) = reflector::store();
    let reflector = reflector(writer, watcher)
        .applied_objects()
        .for_each(move |_| {
            let _ = tx.send(());
            std::future::ready(())
        });

    (reflector, store, rx)
}

pub async fn start_node_controller(context: Arc<ReconcilerContext>) {
    info!("Creating node controller...");

    let watcher_config = Config::default();
    let node_api = Api::<Node>::all(context.client.clone());

    let controller = Controller::new(node_api, watcher_config)
        .shutdown_on_signal()
        .run(reconcile_node, reconcile_node_error, context)
        .for_each(handle_reconciliation_result);

    info!("Node controller created!");

    controller.await
}
