use std::sync::Arc;

use futures::StreamExt;
use k8s_openapi::api::core::v1::Service;
use kube::{
    runtime::{watcher::Config, Controller},
    Api,
};
use log::info;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::helpers::handle_reconciliation_result;

use super::reconciler::{
    context::ReconcilerContext,
    service::{reconcile_service, reconcile_service_error},
};

pub async fn start_service_controller(
    context: Arc<ReconcilerContext>,
    node_changes: UnboundedReceiver<()>,
) {
    info!("Creating service controller...");

    let watcher_config = Config::default();
    let service_api = Api::<Service>::all(context.client.clone());

    let controller = Controller::new(service_api, watcher_config)
        .reconcile_all_on(UnboundedReceiverStream::new(node_changes))
        .shutdown_on_signal()
        .run(reconcile_service, reconcile_service_error, context)
        .for_each(handle_reconciliation_result);

    info!("Service controller created!");

    controller.await
}
