use std::{
    fmt::Debug,
    future::{ready, Ready},
};

use kube::{
    runtime::{
        controller::{Action, Error as ControllerError},
        reflector::ObjectRef,
        watcher::Error as WatcherError,
    },
    Resource,
};
use log::{error, info, warn};

/// Drains a controller's result stream, logging each outcome. Nodes are
/// cluster-scoped and services are namespaced, so objects render as
/// `namespace/name` or a bare `name` accordingly.
pub fn handle_reconciliation_result<T, E>(
    result: Result<(ObjectRef<T>, Action), ControllerError<E, WatcherError>>,
) -> Ready<()>
where
    T: Resource,
    E: Debug,
{
    match result {
        Ok((object, action)) => {
            info!(
                "Reconciled '{}'. Next action: {:?}",
                object_key(&object),
                action
            )
        }
        // deleted before we got to it, nothing left to do
        Err(ControllerError::ObjectNotFound(_)) => (),
        Err(ControllerError::ReconcilerFailed(error, object)) => {
            warn!(
                "Reconciliation of '{}' failed: {:#?}",
                object_key(&object),
                error
            )
        }
        Err(ControllerError::QueueError(error)) => error!("Watcher stream has failed! {error:#?}"),
    }

    ready(())
}

fn object_key<T: Resource>(object: &ObjectRef<T>) -> String {
    match &object.namespace {
        Some(namespace) => format!("{namespace}/{}", object.name),
        None => object.name.clone(),
    }
}
