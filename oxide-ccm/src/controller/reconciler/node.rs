use std::{sync::Arc, time::Duration};

use k8s_openapi::api::core::v1::Node;
use kube::{
    api::{DeleteParams, Patch, PatchParams},
    runtime::controller::Action,
    Api,
};
use log::{info, warn};
use oxide_ccm_core::instances::NodeMetadata;
use serde_json::json;

use super::{context::ReconcilerContext, error::ReconcilerError, require_name};

const SUCCESS_REQUEUE_SECS: u64 = 60 * 5;
const DEFAULT_ERROR_REQUEUE_SECS: u64 = 10;

const INSTANCE_TYPE_LABEL: &str = "node.kubernetes.io/instance-type";

/// Initializes a node from its backing Oxide instance (provider id,
/// instance-type label, addresses) and removes nodes whose instance is
/// definitively gone.
pub async fn reconcile_node(
    object: Arc<Node>,
    context: Arc<ReconcilerContext>,
) -> Result<Action, ReconcilerError> {
    let name = require_name(object.as_ref())?.to_owned();

    // nodes without a provider id haven't been initialized yet, existence
    // can only be judged once an instance id is recorded on the node
    let has_provider_id = object
        .spec
        .as_ref()
        .and_then(|spec| spec.provider_id.as_deref())
        .map_or(false, |provider_id| !provider_id.is_empty());

    if has_provider_id {
        if !context.instances.instance_exists(&object).await? {
            warn!(
                "Node '{}' has no backing Oxide instance, removing it from the cluster...",
                name
            );

            let node_api: Api<Node> = Api::all(context.client.clone());
            match node_api.delete(&name, &DeleteParams::default()).await {
                Ok(_) => (),
                Err(kube::Error::Api(response)) if response.code == 404 => (),
                Err(error) => return Err(ReconcilerError::KubeApiError(error)),
            }

            return Ok(Action::await_change());
        }

        if context.instances.instance_shutdown(&object).await? {
            warn!("The instance backing node '{}' is stopped!", name);
        }
    }

    let metadata = context.instances.instance_metadata(&object).await?;
    apply_node_metadata(&object, &metadata, &context).await?;

    Ok(Action::requeue(Duration::from_secs(SUCCESS_REQUEUE_SECS)))
}

pub fn reconcile_node_error(
    _object: Arc<Node>,
    _error: &ReconcilerError,
    _context: Arc<ReconcilerContext>,
) -> Action {
    Action::requeue(Duration::from_secs(DEFAULT_ERROR_REQUEUE_SECS))
}

async fn apply_node_metadata(
    node: &Node,
    metadata: &NodeMetadata,
    context: &ReconcilerContext,
) -> Result<(), ReconcilerError> {
    let name = require_name(node)?;
    let node_api: Api<Node> = Api::all(context.client.clone());

    let mut patch = json!({
        "metadata": {
            "labels": { INSTANCE_TYPE_LABEL: metadata.instance_type }
        }
    });

    let current_provider_id = node
        .spec
        .as_ref()
        .and_then(|spec| spec.provider_id.as_deref())
        .unwrap_or_default();

    // the provider id is immutable once set, only assign it to fresh nodes
    if current_provider_id.is_empty() {
        info!(
            "Assigning provider id '{}' to node '{}'...",
            metadata.provider_id, name
        );
        patch["spec"] = json!({ "providerID": metadata.provider_id });
    }

    node_api
        .patch(name, &PatchParams::default(), &Patch::Merge(&patch))
        .await
        .map_err(ReconcilerError::KubeApiError)?;

    node_api
        .patch_status(
            name,
            &PatchParams::default(),
            &Patch::Merge(&json!({
                "status": { "addresses": metadata.node_addresses }
            })),
        )
        .await
        .map_err(ReconcilerError::KubeApiError)?;

    Ok(())
}
