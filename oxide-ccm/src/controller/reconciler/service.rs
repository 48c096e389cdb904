use std::{sync::Arc, time::Duration};

use k8s_openapi::api::core::v1::Service;
use kube::{
    api::{Patch, PatchParams},
    runtime::{
        controller::Action,
        finalizer::{finalizer, Error as FinalizerError, Event},
    },
    Api,
};
use log::info;
use oxide_ccm_core::error::ProviderError;
use serde_json::json;

use super::{context::ReconcilerContext, error::ReconcilerError, require_name, require_namespace};

const SUCCESS_REQUEUE_SECS: u64 = 60 * 5;
const DEFAULT_ERROR_REQUEUE_SECS: u64 = 10;
// backend selection failures resolve quickly once a control plane node is Ready
const NO_BACKEND_REQUEUE_SECS: u64 = 5;

pub const LOAD_BALANCER_FINALIZER: &str = "oxide.computer/load-balancer";

/// Reconciles LoadBalancer Services against the floating ip lifecycle
/// manager. A finalizer guards teardown so a deleted Service releases its
/// floating ip before it disappears from the cluster.
pub async fn reconcile_service(
    object: Arc<Service>,
    context: Arc<ReconcilerContext>,
) -> Result<Action, FinalizerError<ReconcilerError>> {
    if !is_load_balancer(&object) && !has_load_balancer_finalizer(&object) {
        return Ok(Action::await_change());
    }

    let namespace = require_namespace(object.as_ref())
        .map_err(FinalizerError::ApplyFailed)?
        .to_owned();
    let service_api: Api<Service> = Api::namespaced(context.client.clone(), &namespace);

    finalizer(&service_api, LOAD_BALANCER_FINALIZER, object, |event| async {
        match event {
            Event::Apply(service) => apply_load_balancer(service, &context).await,
            Event::Cleanup(service) => cleanup_load_balancer(service, &context).await,
        }
    })
    .await
}

pub fn reconcile_service_error(
    _object: Arc<Service>,
    error: &FinalizerError<ReconcilerError>,
    _context: Arc<ReconcilerContext>,
) -> Action {
    Action::requeue(match error {
        FinalizerError::ApplyFailed(ReconcilerError::Provider(
            ProviderError::NoControlPlaneNode(_),
        )) => Duration::from_secs(NO_BACKEND_REQUEUE_SECS),
        _ => Duration::from_secs(DEFAULT_ERROR_REQUEUE_SECS),
    })
}

async fn apply_load_balancer(
    service: Arc<Service>,
    context: &ReconcilerContext,
) -> Result<Action, ReconcilerError> {
    if !is_load_balancer(&service) {
        // the Service type changed away from LoadBalancer, release the
        // floating ip and drop the stale ingress status
        release_load_balancer(&service, context).await?;
        patch_load_balancer_status(&service, context, json!(null)).await?;

        return Ok(Action::await_change());
    }

    let nodes = context.candidate_nodes();
    let status = context
        .load_balancers
        .ensure_load_balancer(&service, &nodes)
        .await?;

    patch_load_balancer_status(&service, context, json!(status)).await?;

    Ok(Action::requeue(Duration::from_secs(SUCCESS_REQUEUE_SECS)))
}

async fn cleanup_load_balancer(
    service: Arc<Service>,
    context: &ReconcilerContext,
) -> Result<Action, ReconcilerError> {
    release_load_balancer(&service, context).await?;

    Ok(Action::await_change())
}

async fn release_load_balancer(
    service: &Service,
    context: &ReconcilerContext,
) -> Result<(), ReconcilerError> {
    context
        .load_balancers
        .ensure_load_balancer_deleted(service)
        .await?;

    Ok(())
}

async fn patch_load_balancer_status(
    service: &Service,
    context: &ReconcilerContext,
    load_balancer: serde_json::Value,
) -> Result<(), ReconcilerError> {
    let namespace = require_namespace(service)?;
    let name = require_name(service)?;
    let service_api: Api<Service> = Api::namespaced(context.client.clone(), namespace);

    info!(
        "Patching load balancer status of service '{}' (namespace {})...",
        name, namespace
    );

    service_api
        .patch_status(
            name,
            &PatchParams::default(),
            &Patch::Merge(&json!({ "status": { "loadBalancer": load_balancer } })),
        )
        .await
        .map_err(ReconcilerError::KubeApiError)?;

    Ok(())
}

fn is_load_balancer(service: &Service) -> bool {
    service
        .spec
        .as_ref()
        .and_then(|spec| spec.type_.as_deref())
        == Some("LoadBalancer")
}

fn has_load_balancer_finalizer(service: &Service) -> bool {
    service
        .metadata
        .finalizers
        .as_ref()
        .map_or(false, |finalizers| {
            finalizers
                .iter()
                .any(|finalizer| finalizer == LOAD_BALANCER_FINALIZER)
        })
}
