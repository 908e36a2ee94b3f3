use ocf::events::{DeviceEvent, ResourceEvent};
use ocf::options::FindOptions;

use serde::de::DeserializeOwned;
use serde_json::Value;

use tokio::sync::{RwLock, watch};

use tracing::{debug, error, info, warn};

use crate::error::{Error, ErrorKind, Result};
use crate::provider::{COMPLETED, DiscoveryChannel, Provider};
use crate::registry::Registry;
use crate::subscription::Subscribers;

/// State of a discovery process.
///
/// Overlapping requests of the same kind share one state: it stays
/// [`DiscoveryState::Requesting`] while any of them runs and then takes the
/// outcome of the last one to finish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryState {
    /// No discovery has been requested yet.
    Idle,
    /// At least one discovery request is running.
    Requesting,
    /// The last discovery request to finish completed.
    Completed,
    /// The last discovery request to finish failed.
    Failed,
}

#[derive(Debug, Clone, Copy)]
struct Progress {
    running: usize,
    state: DiscoveryState,
}

// A running discovery request. A request dropped before finishing counts as
// failed.
struct Request<'a> {
    progress: &'a watch::Sender<Progress>,
    outcome: DiscoveryState,
}

impl<'a> Request<'a> {
    fn start(progress: &'a watch::Sender<Progress>) -> Self {
        progress.send_modify(|progress| {
            progress.running += 1;
            progress.state = DiscoveryState::Requesting;
        });
        Self {
            progress,
            outcome: DiscoveryState::Failed,
        }
    }

    fn finish(mut self, result: &Result<()>, entity: &str) {
        self.outcome = match result {
            Ok(()) => {
                info!("The {entity} discovery completed");
                DiscoveryState::Completed
            }
            Err(e) => {
                error!("The {entity} discovery failed: {e}");
                DiscoveryState::Failed
            }
        };
    }
}

impl Drop for Request<'_> {
    fn drop(&mut self) {
        let outcome = self.outcome;
        self.progress.send_modify(|progress| {
            progress.running = progress.running.saturating_sub(1);
            if progress.running == 0 {
                progress.state = outcome;
            }
        });
    }
}

// A payload received on a discovery channel.
#[derive(Debug, PartialEq)]
enum Payload<T> {
    Completed,
    Found(T),
}

// Payloads are told apart by their shape: the completion string or an event.
fn classify<T: DeserializeOwned>(payload: Value) -> Result<Payload<T>> {
    if payload.as_str() == Some(COMPLETED) {
        return Ok(Payload::Completed);
    }
    Ok(Payload::Found(serde_json::from_value(payload)?))
}

// Waits for the next discovered entity, `None` once the request completed.
async fn next_event<T: DeserializeOwned>(
    channel: &DiscoveryChannel,
    entity: &str,
) -> Result<Option<T>> {
    loop {
        let payload = channel.recv_async().await.map_err(|_| {
            Error::new(
                ErrorKind::Disconnected,
                format!("The provider closed the {entity} discovery before completing it"),
            )
        })??;

        match classify::<T>(payload) {
            Ok(Payload::Completed) => return Ok(None),
            Ok(Payload::Found(event)) => return Ok(Some(event)),
            Err(e) => warn!("Discarding a malformed {entity} payload: {e}"),
        }
    }
}

/// The coordinator of resource and device discovery requests.
#[derive(Debug)]
pub(crate) struct Discovery {
    resources: watch::Sender<Progress>,
    devices: watch::Sender<Progress>,
    pub(crate) resource_found: Subscribers<ResourceEvent>,
    pub(crate) device_found: Subscribers<DeviceEvent>,
}

impl Discovery {
    pub(crate) fn new() -> Self {
        let idle = Progress {
            running: 0,
            state: DiscoveryState::Idle,
        };
        let (resources, _) = watch::channel(idle);
        let (devices, _) = watch::channel(idle);
        Self {
            resources,
            devices,
            resource_found: Subscribers::new(),
            device_found: Subscribers::new(),
        }
    }

    pub(crate) fn resources_state(&self) -> DiscoveryState {
        self.resources.borrow().state
    }

    pub(crate) fn devices_state(&self) -> DiscoveryState {
        self.devices.borrow().state
    }

    pub(crate) async fn find_resources<P: Provider>(
        &self,
        provider: &P,
        registry: &RwLock<Registry>,
        options: &FindOptions,
    ) -> Result<()> {
        let request = Request::start(&self.resources);

        let channel = provider.find_resources(options);
        let result = self.receive_resources(&channel, registry).await;

        request.finish(&result, "resource");
        result
    }

    pub(crate) async fn find_devices<P: Provider>(&self, provider: &P) -> Result<()> {
        let request = Request::start(&self.devices);

        let channel = provider.find_devices();
        let result = self.receive_devices(&channel).await;

        request.finish(&result, "device");
        result
    }

    async fn receive_resources(
        &self,
        channel: &DiscoveryChannel,
        registry: &RwLock<Registry>,
    ) -> Result<()> {
        while let Some(event) = next_event::<ResourceEvent>(channel, "resource").await? {
            let added = registry.write().await.add(event.resource.clone());
            if added {
                self.resource_found.notify(&event);
            } else {
                debug!("Resource `{}` rediscovered", event.resource.id);
            }
        }
        Ok(())
    }

    async fn receive_devices(&self, channel: &DiscoveryChannel) -> Result<()> {
        while let Some(event) = next_event::<DeviceEvent>(channel, "device").await? {
            debug!("Device `{}` found", event.device.uuid);
            self.device_found.notify(&event);
        }
        Ok(())
    }
}
