use std::{collections::HashMap, sync::Mutex};

use async_trait::async_trait;

use super::{
    api::{OxideApi, OxideApiError},
    ExternalIp, FloatingIp, FloatingIpCreate, Instance, InstanceState, NetworkInterface,
};

pub const ASSIGNED_IP: &str = "203.0.113.10";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    InstanceView(String),
    NetworkInterfaceList(String),
    ExternalIpList(String),
    FloatingIpView(String),
    FloatingIpCreate(String),
    FloatingIpAttach(String, String),
    FloatingIpDetach(String),
    FloatingIpDelete(String),
}

/// Scripted Oxide backend recording every call it receives. Mutating
/// floating-ip operations enforce the backend's single-attachment rule so
/// tests catch ordering mistakes.
#[derive(Default)]
pub struct MockOxideApi {
    instances: Vec<Instance>,
    nics: HashMap<String, Vec<NetworkInterface>>,
    external_ips: HashMap<String, Vec<ExternalIp>>,
    floating_ips: Mutex<HashMap<String, FloatingIp>>,
    create_error: Mutex<Option<OxideApiError>>,
    calls: Mutex<Vec<ApiCall>>,
}

pub fn instance(id: &str, name: &str) -> Instance {
    Instance {
        id: id.to_owned(),
        name: name.to_owned(),
        hostname: name.to_owned(),
        ncpus: 4,
        memory: 8 * crate::instances::GIBIBYTE,
        run_state: InstanceState::Running,
    }
}

impl MockOxideApi {
    pub fn with_instance(mut self, instance: Instance) -> Self {
        self.instances.push(instance);
        self
    }

    pub fn with_nics(mut self, instance_id: &str, nics: Vec<NetworkInterface>) -> Self {
        self.nics.insert(instance_id.to_owned(), nics);
        self
    }

    pub fn with_external_ips(mut self, instance_id: &str, ips: Vec<ExternalIp>) -> Self {
        self.external_ips.insert(instance_id.to_owned(), ips);
        self
    }

    pub fn with_floating_ip(self, floating_ip: FloatingIp) -> Self {
        self.floating_ips
            .lock()
            .unwrap()
            .insert(floating_ip.name.clone(), floating_ip);
        self
    }

    /// Arms the next `floating_ip_create` to fail with `error` after the
    /// resource has been registered, as if a concurrent create had won the
    /// race between the caller's existence check and its create.
    pub fn with_create_error(self, error: OxideApiError) -> Self {
        *self.create_error.lock().unwrap() = Some(error);
        self
    }

    pub fn floating_ip(&self, name: &str) -> Option<FloatingIp> {
        self.floating_ips.lock().unwrap().get(name).cloned()
    }

    pub fn take_calls(&self) -> Vec<ApiCall> {
        std::mem::take(&mut *self.calls.lock().unwrap())
    }

    fn record(&self, call: ApiCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl OxideApi for MockOxideApi {
    async fn instance_view(
        &self,
        instance: &str,
        project: Option<&str>,
    ) -> Result<Instance, OxideApiError> {
        self.record(ApiCall::InstanceView(instance.to_owned()));

        self.instances
            .iter()
            .find(|candidate| {
                candidate.id.eq_ignore_ascii_case(instance)
                    || (project.is_some() && candidate.name == instance)
            })
            .cloned()
            .ok_or(OxideApiError::NotFound)
    }

    async fn instance_network_interface_list(
        &self,
        instance: &str,
    ) -> Result<Vec<NetworkInterface>, OxideApiError> {
        self.record(ApiCall::NetworkInterfaceList(instance.to_owned()));

        Ok(self.nics.get(instance).cloned().unwrap_or_default())
    }

    async fn instance_external_ip_list(
        &self,
        instance: &str,
    ) -> Result<Vec<ExternalIp>, OxideApiError> {
        self.record(ApiCall::ExternalIpList(instance.to_owned()));

        Ok(self.external_ips.get(instance).cloned().unwrap_or_default())
    }

    async fn floating_ip_view(
        &self,
        floating_ip: &str,
        _project: &str,
    ) -> Result<FloatingIp, OxideApiError> {
        self.record(ApiCall::FloatingIpView(floating_ip.to_owned()));

        self.floating_ip(floating_ip).ok_or(OxideApiError::NotFound)
    }

    async fn floating_ip_create(
        &self,
        _project: &str,
        params: FloatingIpCreate,
    ) -> Result<FloatingIp, OxideApiError> {
        self.record(ApiCall::FloatingIpCreate(params.name.clone()));

        let mut floating_ips = self.floating_ips.lock().unwrap();

        if floating_ips.contains_key(&params.name) {
            return Err(OxideApiError::Api(
                400,
                format!("already exists: floating-ip '{}'", params.name),
            ));
        }

        let floating_ip = FloatingIp {
            id: format!("fip-{}", params.name),
            name: params.name.clone(),
            ip: ASSIGNED_IP.to_owned(),
            instance_id: None,
        };
        floating_ips.insert(params.name, floating_ip.clone());

        if let Some(error) = self.create_error.lock().unwrap().take() {
            return Err(error);
        }

        Ok(floating_ip)
    }

    async fn floating_ip_attach(
        &self,
        floating_ip: &str,
        _project: &str,
        instance: &str,
    ) -> Result<FloatingIp, OxideApiError> {
        self.record(ApiCall::FloatingIpAttach(
            floating_ip.to_owned(),
            instance.to_owned(),
        ));

        let mut floating_ips = self.floating_ips.lock().unwrap();
        let floating_ip = floating_ips
            .get_mut(floating_ip)
            .ok_or(OxideApiError::NotFound)?;

        if floating_ip.instance_id.is_some() {
            return Err(OxideApiError::Api(
                400,
                "floating IP is already attached to an instance".to_owned(),
            ));
        }

        floating_ip.instance_id = Some(instance.to_owned());

        Ok(floating_ip.clone())
    }

    async fn floating_ip_detach(
        &self,
        floating_ip: &str,
        _project: &str,
    ) -> Result<FloatingIp, OxideApiError> {
        self.record(ApiCall::FloatingIpDetach(floating_ip.to_owned()));

        let mut floating_ips = self.floating_ips.lock().unwrap();
        let floating_ip = floating_ips
            .get_mut(floating_ip)
            .ok_or(OxideApiError::NotFound)?;

        floating_ip.instance_id = None;

        Ok(floating_ip.clone())
    }

    async fn floating_ip_delete(
        &self,
        floating_ip: &str,
        _project: &str,
    ) -> Result<(), OxideApiError> {
        self.record(ApiCall::FloatingIpDelete(floating_ip.to_owned()));

        let mut floating_ips = self.floating_ips.lock().unwrap();
        let entry = floating_ips.get(floating_ip).ok_or(OxideApiError::NotFound)?;

        if entry.instance_id.is_some() {
            return Err(OxideApiError::Api(
                400,
                "floating IP cannot be deleted while attached to an instance".to_owned(),
            ));
        }

        floating_ips.remove(floating_ip);

        Ok(())
    }
}
