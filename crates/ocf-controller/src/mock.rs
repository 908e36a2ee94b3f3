use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ocf::device::Device;
use ocf::events::{DeviceEvent, PropertiesResponse, ResourceEvent, ResourceUpdate};
use ocf::options::FindOptions;
use ocf::resource::{Properties, Resource, ResourceKey};

use hashbrown::{HashMap, HashSet};

use serde::Serialize;
use serde_json::Value;

use tracing::debug;

use crate::controller::DEFAULT_BACKEND;
use crate::error::{Error, Result};
use crate::provider::{COMPLETED, DiscoveryChannel, Provider};

// Resource paths the native stack reports but never exposes to clients.
const RESERVED_PATHS: &[&str] = &["/oic/p", "/oic/d", "/oic/sec/doxm", "/oic/sec/pstat"];

#[derive(Debug)]
enum Announcement {
    Resource(Resource),
    Raw(Value),
}

impl Announcement {
    fn matches(&self, options: &FindOptions) -> bool {
        let Self::Resource(resource) = self else {
            return true;
        };

        let device_matches = options
            .device_id
            .as_ref()
            .is_none_or(|device_id| *device_id == resource.id.device_id);
        let type_matches = options
            .resource_type
            .as_ref()
            .is_none_or(|resource_type| resource.has_type(resource_type));

        device_matches && type_matches
    }

    fn payload(&self) -> Result<Value> {
        match self {
            Self::Resource(resource) => event_payload(&ResourceEvent::new(resource.clone())),
            Self::Raw(value) => Ok(value.clone()),
        }
    }
}

fn event_payload<T: Serialize>(event: &T) -> Result<Value> {
    serde_json::to_value(event).map_err(Error::from)
}

#[derive(Debug)]
struct MockState {
    backend: String,
    backend_requests: Vec<String>,
    backend_failure: Option<String>,

    announcements: Vec<Announcement>,
    devices: Vec<Device>,
    find_requests: Vec<FindOptions>,
    discovery_failure: Option<String>,
    completes_discoveries: bool,

    pushed_resources: Vec<Resource>,
    update_failure: Option<String>,

    updates: Vec<ResourceUpdate>,
    polling_failure: Option<String>,

    properties: HashMap<ResourceKey, Properties>,
    properties_failures: HashSet<ResourceKey>,
    property_requests: Vec<ResourceKey>,
}

impl MockState {
    fn new() -> Self {
        Self {
            backend: DEFAULT_BACKEND.into(),
            backend_requests: Vec::new(),
            backend_failure: None,
            announcements: Vec::new(),
            devices: Vec::new(),
            find_requests: Vec::new(),
            discovery_failure: None,
            completes_discoveries: true,
            pushed_resources: Vec::new(),
            update_failure: None,
            updates: Vec::new(),
            polling_failure: None,
            properties: HashMap::new(),
            properties_failures: HashSet::new(),
            property_requests: Vec::new(),
        }
    }

    fn discovery_channel(&self, payloads: impl IntoIterator<Item = Result<Value>>) -> DiscoveryChannel {
        let (sender, receiver) = flume::unbounded();

        if let Some(failure) = &self.discovery_failure {
            let _ = sender.send(Err(Error::provider(failure.clone())));
            return receiver;
        }

        for payload in payloads {
            let _ = sender.send(payload);
        }

        if self.completes_discoveries {
            let _ = sender.send(Ok(Value::String(COMPLETED.into())));
        }

        receiver
    }
}

/// An in-memory [`Provider`].
///
/// Resources, devices, property values and updates are registered on the
/// provider ahead of time and reported back to the controller as a native
/// provider would. Every failure of a native provider can be simulated.
///
/// The provider is cheap to clone: all clones share the same state.
#[derive(Debug, Clone)]
pub struct MockProvider {
    state: Arc<Mutex<MockState>>,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProvider {
    /// Creates a [`MockProvider`] without resources and devices.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState::new())),
        }
    }

    /// Registers a resource reported by every subsequent matching resource
    /// discovery.
    ///
    /// Resources on reserved paths are never reported.
    pub fn announce_resource(&self, resource: Resource) {
        if RESERVED_PATHS.contains(&resource.id.resource_path.as_str()) {
            debug!("Skip reserved resource `{}`", resource.id);
            return;
        }
        self.lock().announcements.push(Announcement::Resource(resource));
    }

    /// Registers a raw payload sent on every subsequent resource discovery
    /// channel.
    pub fn announce_raw_resource(&self, payload: Value) {
        self.lock().announcements.push(Announcement::Raw(payload));
    }

    /// Registers a device reported by every subsequent device discovery.
    pub fn announce_device(&self, device: Device) {
        self.lock().devices.push(device);
    }

    /// Sets the property values returned for a resource.
    pub fn set_properties(&self, key: ResourceKey, properties: Properties) {
        let _ = self.lock().properties.insert(key, properties);
    }

    /// Queues an update entry returned by the next update poll.
    pub fn push_update(&self, update: ResourceUpdate) {
        self.lock().updates.push(update);
    }

    /// Makes backend switches fail with the given description.
    pub fn fail_backend(&self, description: impl Into<String>) {
        self.lock().backend_failure = Some(description.into());
    }

    /// Makes resource and device discoveries fail with the given description.
    pub fn fail_discoveries(&self, description: impl Into<String>) {
        self.lock().discovery_failure = Some(description.into());
    }

    /// Makes discoveries close their channel without completing.
    pub fn drop_completion(&self) {
        self.lock().completes_discoveries = false;
    }

    /// Makes resource updates fail with the given description.
    pub fn fail_updates(&self, description: impl Into<String>) {
        self.lock().update_failure = Some(description.into());
    }

    /// Makes update polls fail with the given description.
    pub fn fail_polling(&self, description: impl Into<String>) {
        self.lock().polling_failure = Some(description.into());
    }

    /// Makes property requests for a resource fail.
    pub fn fail_properties(&self, key: ResourceKey) {
        let _ = self.lock().properties_failures.insert(key);
    }

    /// Clears every simulated failure.
    pub fn recover(&self) {
        let mut state = self.lock();
        state.backend_failure = None;
        state.discovery_failure = None;
        state.completes_discoveries = true;
        state.update_failure = None;
        state.polling_failure = None;
        state.properties_failures.clear();
    }

    /// Returns the active backend.
    #[must_use]
    pub fn backend(&self) -> String {
        self.lock().backend.clone()
    }

    /// Returns all backend switch requests, in order.
    #[must_use]
    pub fn backend_requests(&self) -> Vec<String> {
        self.lock().backend_requests.clone()
    }

    /// Returns the options of all resource discovery requests, in order.
    #[must_use]
    pub fn find_requests(&self) -> Vec<FindOptions> {
        self.lock().find_requests.clone()
    }

    /// Returns all resources pushed to the network, in order.
    #[must_use]
    pub fn pushed_resources(&self) -> Vec<Resource> {
        self.lock().pushed_resources.clone()
    }

    /// Returns the keys of all property requests, in order.
    #[must_use]
    pub fn property_requests(&self) -> Vec<ResourceKey> {
        self.lock().property_requests.clone()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Provider for MockProvider {
    async fn set_backend(&self, backend: &str) -> Result<()> {
        let mut state = self.lock();
        state.backend_requests.push(backend.into());

        if let Some(failure) = &state.backend_failure {
            return Err(Error::provider(failure.clone()));
        }

        state.backend = backend.into();
        Ok(())
    }

    fn find_resources(&self, options: &FindOptions) -> DiscoveryChannel {
        let mut state = self.lock();
        state.find_requests.push(options.clone());

        let payloads: Vec<Result<Value>> = state
            .announcements
            .iter()
            .filter(|announcement| announcement.matches(options))
            .map(Announcement::payload)
            .collect();

        state.discovery_channel(payloads)
    }

    fn find_devices(&self) -> DiscoveryChannel {
        let state = self.lock();

        let payloads: Vec<Result<Value>> = state
            .devices
            .iter()
            .map(|device| event_payload(&DeviceEvent::new(device.clone())))
            .collect();

        state.discovery_channel(payloads)
    }

    async fn update_resource(&self, resource: &Resource) -> Result<()> {
        let mut state = self.lock();

        if let Some(failure) = &state.update_failure {
            return Err(Error::provider(failure.clone()));
        }

        state.pushed_resources.push(resource.clone());
        Ok(())
    }

    async fn resource_updates(&self) -> Result<Vec<ResourceUpdate>> {
        let mut state = self.lock();

        if let Some(failure) = &state.polling_failure {
            return Err(Error::provider(failure.clone()));
        }

        Ok(std::mem::take(&mut state.updates))
    }

    async fn resource_properties(&self, key: &ResourceKey) -> Result<PropertiesResponse> {
        let mut state = self.lock();
        state.property_requests.push(key.clone());

        if state.properties_failures.contains(key) {
            return Err(Error::provider(format!(
                "Unable to retrieve the properties of `{key}`"
            )));
        }

        let properties = state.properties.get(key).cloned().unwrap_or_default();
        Ok(PropertiesResponse::new(key.clone(), properties))
    }
}
