use std::sync::Arc;

use ocf::events::{DeviceEvent, ResourceEvent, UpdateEvent};
use ocf::options::FindOptions;
use ocf::resource::{Resource, ResourceId, ResourceKey};

use tokio::sync::{RwLock, watch};

use tracing::{debug, info};

use crate::discovery::{Discovery, DiscoveryState};
use crate::error::{Error, ErrorKind, Result};
use crate::provider::Provider;
use crate::registry::Registry;
use crate::subscription::SubscriptionId;
use crate::synchronizer::{PollingConfig, Synchronizer};

/// Name of the native backend selected when a controller is created.
pub const DEFAULT_BACKEND: &str = "iotivity";

fn unknown_resource(key: &ResourceKey) -> Error {
    Error::new(
        ErrorKind::UnknownResource,
        format!("Resource `{key}` not found."),
    )
}

#[derive(Debug)]
pub(crate) struct Inner<P: Provider> {
    pub(crate) provider: P,
    pub(crate) registry: RwLock<Registry>,
    pub(crate) discovery: Discovery,
    backend: watch::Sender<String>,
}

// The state shared among the controller and its polling tasks.
#[derive(Debug)]
pub(crate) struct Context<P: Provider>(Arc<Inner<P>>);

impl<P: Provider> Clone for Context<P> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<P: Provider> std::ops::Deref for Context<P> {
    type Target = Inner<P>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<P: Provider> Context<P> {
    pub(crate) fn new(provider: P, registry: Registry) -> Self {
        let (backend, _) = watch::channel(DEFAULT_BACKEND.to_owned());
        Self(Arc::new(Inner {
            provider,
            registry: RwLock::new(registry),
            discovery: Discovery::new(),
            backend,
        }))
    }

    pub(crate) async fn subscribe_updates<F>(
        &self,
        key: &ResourceKey,
        handler: F,
    ) -> Result<SubscriptionId>
    where
        F: Fn(&UpdateEvent) + Send + Sync + 'static,
    {
        self.registry
            .read()
            .await
            .update_subscribers(key)
            .map(|subscribers| subscribers.subscribe(handler))
            .ok_or_else(|| unknown_resource(key))
    }
}

/// A controller for discovering `OCF` resources and keeping their state
/// synchronized.
///
/// The main functionalities include:
///
/// - Discovering resources on the network and registering each of them once
///   in memory.
/// - Discovering devices on the network.
/// - Notifying subscribers of newly discovered resources and devices.
/// - Polling the native provider in the background to retrieve the
///   properties of new resources and to deliver resource updates to their
///   subscribers.
///
/// Every network operation is delegated to a [`Provider`].
#[derive(Debug)]
pub struct Controller<P: Provider> {
    context: Context<P>,
    polling: PollingConfig,
    synchronizer: Option<Synchronizer>,
}

impl<P: Provider> Controller<P> {
    /// Creates a [`Controller`] from a [`Provider`].
    #[must_use]
    #[inline]
    pub fn new(provider: P) -> Self {
        Self::from_registry(provider, Registry::new())
    }

    /// Creates a [`Controller`] from a [`Provider`] and an initial
    /// [`Registry`].
    ///
    /// This method is useful when resources are retrieved from a database.
    #[must_use]
    #[inline]
    pub fn from_registry(provider: P, registry: Registry) -> Self {
        Self {
            context: Context::new(provider, registry),
            polling: PollingConfig::new(),
            synchronizer: None,
        }
    }

    /// Defines a [`PollingConfig`] while constructing a [`Controller`].
    #[must_use]
    #[inline]
    pub fn polling(mut self, polling: PollingConfig) -> Self {
        self.polling = polling;
        self
    }

    /// Returns the [`Provider`].
    #[must_use]
    pub fn provider(&self) -> &P {
        &self.context.provider
    }

    /// Returns the name of the active native backend.
    #[must_use]
    pub fn backend(&self) -> String {
        self.context.backend.borrow().clone()
    }

    /// Switches the active native backend.
    ///
    /// The request always reaches the provider, even when the given backend
    /// is already active.
    ///
    /// # Errors
    ///
    /// The provider may fail to switch backend. In that case, the active
    /// backend is left unchanged.
    pub async fn set_backend(&self, backend: &str) -> Result<()> {
        self.context.provider.set_backend(backend).await?;

        info!("Active backend: {backend}");
        self.context
            .backend
            .send_modify(|active| backend.clone_into(active));
        Ok(())
    }

    /// Discovers resources on the network.
    ///
    /// Each resource not already known is registered and reported to the
    /// resource-found subscribers before this method returns. Resources
    /// discovered again are ignored.
    ///
    /// # Errors
    ///
    /// The provider may report a failure or stop answering before completing
    /// the discovery. Resources reported before the failure stay registered.
    pub async fn find_resources(&self, options: FindOptions) -> Result<()> {
        self.context
            .discovery
            .find_resources(
                &self.context.provider,
                &self.context.registry,
                &options,
            )
            .await
    }

    /// Discovers devices on the network.
    ///
    /// Every reported device is forwarded to the device-found subscribers,
    /// devices are never stored.
    ///
    /// # Errors
    ///
    /// The provider may report a failure or stop answering before completing
    /// the discovery.
    pub async fn find_devices(&self) -> Result<()> {
        self.context
            .discovery
            .find_devices(&self.context.provider)
            .await
    }

    /// Pushes the representation of a resource to the network.
    ///
    /// The registry is not modified: the new state is received through the
    /// resource updates.
    ///
    /// # Errors
    ///
    /// The provider may fail to deliver the representation.
    pub async fn update(&self, resource: &Resource) -> Result<()> {
        debug!("Updating resource `{}`", resource.id);
        self.context.provider.update_resource(resource).await
    }

    /// Returns the state of the last resource discovery.
    #[must_use]
    pub fn resource_discovery_state(&self) -> DiscoveryState {
        self.context.discovery.resources_state()
    }

    /// Returns the state of the last device discovery.
    #[must_use]
    pub fn device_discovery_state(&self) -> DiscoveryState {
        self.context.discovery.devices_state()
    }

    /// Registers a handler called for each newly discovered resource.
    pub fn on_resource_found<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&ResourceEvent) + Send + Sync + 'static,
    {
        self.context.discovery.resource_found.subscribe(handler)
    }

    /// Removes a resource-found handler.
    ///
    /// Returns `false` if the handler was not registered.
    pub fn remove_resource_found(&self, id: SubscriptionId) -> bool {
        self.context.discovery.resource_found.unsubscribe(id)
    }

    /// Registers a handler called for each discovered device.
    pub fn on_device_found<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&DeviceEvent) + Send + Sync + 'static,
    {
        self.context.discovery.device_found.subscribe(handler)
    }

    /// Removes a device-found handler.
    ///
    /// Returns `false` if the handler was not registered.
    pub fn remove_device_found(&self, id: SubscriptionId) -> bool {
        self.context.discovery.device_found.unsubscribe(id)
    }

    /// Registers a handler called with the updates of a resource.
    ///
    /// # Errors
    ///
    /// An error is returned if the resource is not registered.
    pub async fn on_update<F>(&self, id: &ResourceId, handler: F) -> Result<SubscriptionId>
    where
        F: Fn(&UpdateEvent) + Send + Sync + 'static,
    {
        self.context.subscribe_updates(&id.key(), handler).await
    }

    /// Removes an update handler of a resource.
    ///
    /// Returns `false` if the resource or the handler is not registered.
    pub async fn remove_update(&self, id: &ResourceId, subscription: SubscriptionId) -> bool {
        self.context
            .registry
            .read()
            .await
            .update_subscribers(&id.key())
            .is_some_and(|subscribers| subscribers.unsubscribe(subscription))
    }

    /// Returns a snapshot of all registered resources, in discovery order.
    pub async fn resources(&self) -> Vec<Resource> {
        self.context.registry.read().await.iter().cloned().collect()
    }

    /// Returns a snapshot of the resource with the given identifier.
    pub async fn resource(&self, id: &ResourceId) -> Option<Resource> {
        self.context
            .registry
            .read()
            .await
            .find_by_key(&id.key())
            .cloned()
    }

    /// Starts the polling tasks which retrieve resource properties and
    /// resource updates from the provider.
    ///
    /// The tasks run until [`Controller::shutdown`] is called or the
    /// [`Controller`] is dropped. This method must be called from within a
    /// `tokio` runtime.
    ///
    /// # Errors
    ///
    /// An error is returned if the polling tasks are already running.
    pub fn start_polling(&mut self) -> Result<()> {
        if self.synchronizer.is_some() {
            return Err(Error::new(
                ErrorKind::Synchronizer,
                "Polling tasks already running",
            ));
        }

        self.synchronizer = Some(Synchronizer::start(&self.context, self.polling));
        Ok(())
    }

    /// Checks whether the polling tasks are running.
    #[must_use]
    pub const fn is_polling(&self) -> bool {
        self.synchronizer.is_some()
    }

    /// Shuts down the [`Controller`], stopping all asynchronous tasks and
    /// releasing all associated resources.
    ///
    /// # Note
    ///
    /// For a graceful shutdown, this method must be called before dropping
    /// the [`Controller`].
    pub async fn shutdown(mut self) {
        if let Some(synchronizer) = self.synchronizer.take() {
            synchronizer.stop().await;
        } else {
            debug!("Shutting down a controller without polling tasks");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use ocf::device::Device;
    use ocf::events::{DeviceEvent, ResourceEvent};
    use ocf::options::FindOptions;
    use ocf::resource::ResourceId;

    use serde_json::json;

    use crate::discovery::DiscoveryState;
    use crate::error::{Error, ErrorKind};
    use crate::mock::MockProvider;
    use crate::registry::Registry;
    use crate::registry::tests::{properties, resource};

    use super::{Controller, DEFAULT_BACKEND};

    fn counter() -> (Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (Arc::clone(&calls), calls)
    }

    #[test]
    fn empty_controller() {
        let controller = Controller::new(MockProvider::new());

        assert_eq!(controller.backend(), DEFAULT_BACKEND);
        assert_eq!(controller.resource_discovery_state(), DiscoveryState::Idle);
        assert_eq!(controller.device_discovery_state(), DiscoveryState::Idle);
        assert!(!controller.is_polling());
    }

    #[tokio::test]
    async fn controller_from_registry() {
        let registry = Registry::from_resources([resource("A", "/p"), resource("B", "/p")]);
        let controller = Controller::from_registry(MockProvider::new(), registry);

        assert_eq!(
            controller.resources().await,
            [resource("A", "/p"), resource("B", "/p")]
        );
        assert_eq!(
            controller.resource(&ResourceId::new("B", "/p")).await,
            Some(resource("B", "/p"))
        );
        assert_eq!(controller.resource(&ResourceId::new("C", "/p")).await, None);
    }

    #[tokio::test]
    async fn set_backend() {
        let controller = Controller::new(MockProvider::new());

        controller.set_backend("iotivity").await.unwrap();
        controller.set_backend("iotivity").await.unwrap();
        assert_eq!(controller.backend(), "iotivity");

        controller.set_backend("mock").await.unwrap();
        assert_eq!(controller.backend(), "mock");

        // Every request reaches the provider.
        assert_eq!(
            controller.provider().backend_requests(),
            ["iotivity", "iotivity", "mock"]
        );
    }

    #[tokio::test]
    async fn set_backend_failure() {
        let provider = MockProvider::new();
        provider.fail_backend("unknown backend");
        let controller = Controller::new(provider);

        assert_eq!(
            controller.set_backend("other").await,
            Err(Error::provider("unknown backend"))
        );
        assert_eq!(controller.backend(), DEFAULT_BACKEND);
    }

    #[tokio::test]
    async fn update_does_not_touch_the_registry() {
        let controller = Controller::new(MockProvider::new());
        controller.provider().announce_resource(resource("A", "/p"));
        controller.find_resources(FindOptions::new()).await.unwrap();

        let changed = resource("A", "/p").properties(properties(json!({ "value": true })));
        controller.update(&changed).await.unwrap();

        assert_eq!(controller.provider().pushed_resources(), [changed]);
        assert_eq!(controller.resources().await, [resource("A", "/p")]);

        controller.provider().fail_updates("device unreachable");
        assert_eq!(
            controller.update(&resource("A", "/p")).await,
            Err(Error::provider("device unreachable"))
        );
    }

    #[tokio::test]
    async fn found_subscriptions() {
        let controller = Controller::new(MockProvider::new());
        controller.provider().announce_resource(resource("A", "/p"));
        controller.provider().announce_device(Device::new("d1", "Lamp"));

        let (resources, resources_seen) = counter();
        let first = controller.on_resource_found(move |_: &ResourceEvent| {
            let _ = resources.fetch_add(1, Ordering::SeqCst);
        });
        let (second_resources, _) = counter();
        let _ = controller.on_resource_found(move |_: &ResourceEvent| {
            let _ = second_resources.fetch_add(1, Ordering::SeqCst);
        });

        let (devices, devices_seen) = counter();
        let device_subscription = controller.on_device_found(move |_: &DeviceEvent| {
            let _ = devices.fetch_add(1, Ordering::SeqCst);
        });

        controller.find_resources(FindOptions::new()).await.unwrap();
        controller.find_devices().await.unwrap();

        assert_eq!(resources_seen.load(Ordering::SeqCst), 1);
        assert_eq!(devices_seen.load(Ordering::SeqCst), 1);

        assert!(controller.remove_resource_found(first));
        assert!(!controller.remove_resource_found(first));
        assert!(controller.remove_device_found(device_subscription));

        controller.find_devices().await.unwrap();
        assert_eq!(devices_seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn update_subscriptions() {
        let controller = Controller::from_registry(
            MockProvider::new(),
            Registry::from_resources([resource("A", "/p")]),
        );

        let id = ResourceId::new("A", "/p");
        let subscription = controller.on_update(&id, |_| {}).await.unwrap();

        assert!(controller.remove_update(&id, subscription).await);
        assert!(!controller.remove_update(&id, subscription).await);

        let unknown = ResourceId::new("Z", "/p");
        assert_eq!(
            controller
                .on_update(&unknown, |_| {})
                .await
                .map_err(|e| e.kind()),
            Err(ErrorKind::UnknownResource)
        );
    }

    #[tokio::test]
    async fn polling_lifecycle() {
        let mut controller = Controller::new(MockProvider::new());

        controller.start_polling().unwrap();
        assert!(controller.is_polling());

        assert_eq!(
            controller.start_polling().map_err(|e| e.kind()),
            Err(ErrorKind::Synchronizer)
        );

        controller.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_without_polling() {
        let controller = Controller::new(MockProvider::new());
        controller.provider().announce_resource(resource("A", "/p"));
        controller.find_resources(FindOptions::new()).await.unwrap();

        assert!(!controller.is_polling());
        controller.shutdown().await;
    }
}
