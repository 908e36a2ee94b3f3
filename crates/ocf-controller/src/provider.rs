use ocf::events::{PropertiesResponse, ResourceUpdate};
use ocf::options::FindOptions;
use ocf::resource::{Resource, ResourceKey};

use flume::Receiver;

use serde_json::Value;

use crate::error::Result;

/// Payload sent by a provider to signal that a discovery request completed.
///
/// Every other payload sent on a discovery channel describes a discovered
/// entity.
pub const COMPLETED: &str = "OK";

/// Channel on which a provider answers a discovery request.
///
/// Each message is either a [`COMPLETED`] string, an entity-found event
/// serialized as `JSON`, or a failure. Nothing is read after the
/// [`COMPLETED`] payload or after a failure.
pub type DiscoveryChannel = Receiver<Result<Value>>;

/// The native provider that drives the `OCF` stack.
///
/// The controller never talks to the network directly: every operation is
/// delegated to a provider, which is expected to run its own work in the
/// background and report back through the returned futures and channels.
pub trait Provider: Send + Sync + 'static {
    /// Switches the active native backend.
    fn set_backend(&self, backend: &str) -> impl Future<Output = Result<()>> + Send;

    /// Starts a resource discovery.
    ///
    /// The returned channel yields a `{"resource": ...}` event for each
    /// discovered resource and the [`COMPLETED`] payload once the request
    /// terminates.
    fn find_resources(&self, options: &FindOptions) -> DiscoveryChannel;

    /// Starts a device discovery.
    ///
    /// The returned channel yields a `{"device": ...}` event for each
    /// discovered device and the [`COMPLETED`] payload once the request
    /// terminates.
    fn find_devices(&self) -> DiscoveryChannel;

    /// Pushes the representation of a resource to the network.
    fn update_resource(&self, resource: &Resource) -> impl Future<Output = Result<()>> + Send;

    /// Retrieves the update entries collected since the previous call.
    fn resource_updates(&self) -> impl Future<Output = Result<Vec<ResourceUpdate>>> + Send;

    /// Retrieves the property values of a resource.
    fn resource_properties(
        &self,
        key: &ResourceKey,
    ) -> impl Future<Output = Result<PropertiesResponse>> + Send;
}
