use std::time::Duration;

use ocf::resource::ResourceKey;

use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Instant, MissedTickBehavior, interval_at};

use tokio_util::sync::CancellationToken;

use tracing::{debug, error, warn};

use crate::controller::Context;
use crate::provider::Provider;

/// Default interval between two polls of the native provider.
pub const DEFAULT_POLLING_INTERVAL: Duration = Duration::from_millis(2000);

/// Polling synchronizer configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollingConfig {
    updates_interval: Duration,
    properties_interval: Duration,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl PollingConfig {
    /// Creates a [`PollingConfig`] which polls both resource updates and
    /// resource properties every [`DEFAULT_POLLING_INTERVAL`].
    #[must_use]
    pub const fn new() -> Self {
        Self {
            updates_interval: DEFAULT_POLLING_INTERVAL,
            properties_interval: DEFAULT_POLLING_INTERVAL,
        }
    }

    /// Sets the interval between two resource update polls.
    ///
    /// A zero interval is replaced by [`DEFAULT_POLLING_INTERVAL`].
    #[must_use]
    pub const fn updates_interval(mut self, interval: Duration) -> Self {
        self.updates_interval = non_zero(interval);
        self
    }

    /// Sets the interval between two resource property polls.
    ///
    /// A zero interval is replaced by [`DEFAULT_POLLING_INTERVAL`].
    #[must_use]
    pub const fn properties_interval(mut self, interval: Duration) -> Self {
        self.properties_interval = non_zero(interval);
        self
    }
}

const fn non_zero(interval: Duration) -> Duration {
    if interval.is_zero() {
        DEFAULT_POLLING_INTERVAL
    } else {
        interval
    }
}

// Retrieves the pending update entries and delivers them to the update
// subscribers of the matching resources.
pub(crate) async fn poll_updates<P: Provider>(context: &Context<P>) {
    let updates = match context.provider.resource_updates().await {
        Ok(updates) => updates,
        Err(e) => {
            error!("Error in retrieving resource updates, retry at the next tick: {e}");
            return;
        }
    };

    if updates.is_empty() {
        return;
    }

    debug!("Received {} resource updates", updates.len());

    let deliveries: Vec<_> = {
        let registry = context.registry.read().await;
        updates
            .into_iter()
            .filter_map(|update| registry.update_delivery(update))
            .collect()
    };

    // Subscribers run without the registry lock.
    for (subscribers, event) in deliveries {
        subscribers.notify(&event);
    }
}

// Starts a property request for every resource without properties. Requests
// run concurrently and may outlive the tick which started them.
pub(crate) async fn request_pending_properties<P: Provider>(
    context: &Context<P>,
    requests: &mut JoinSet<()>,
) {
    while let Some(result) = requests.try_join_next() {
        if let Err(e) = result {
            error!("A property request terminated abnormally: {e}");
        }
    }

    let pending = context.registry.read().await.pending_properties();
    for key in pending {
        let context = context.clone();
        let _ = requests.spawn(async move { fetch_properties(&context, key).await });
    }
}

async fn fetch_properties<P: Provider>(context: &Context<P>, key: ResourceKey) {
    let response = match context.provider.resource_properties(&key).await {
        Ok(response) => response,
        Err(e) => {
            error!("Error in retrieving the properties of `{key}`: {e}");
            return;
        }
    };

    let updated = context
        .registry
        .write()
        .await
        .set_properties(&response.key, response.properties);
    if !updated {
        warn!("Properties of unknown resource `{}` discarded", response.key);
    }
}

async fn run_updates_poller<P: Provider>(
    context: Context<P>,
    period: Duration,
    cancellation_token: CancellationToken,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            // Use the cancellation token to stop the loop
            () = cancellation_token.cancelled() => { break; }
            _ = ticker.tick() => {
                // A poll never answered by the provider must not block the
                // cancellation.
                if cancellation_token
                    .run_until_cancelled(poll_updates(&context))
                    .await
                    .is_none()
                {
                    break;
                }
            }
        }
    }
    drop(context);
}

async fn run_properties_poller<P: Provider>(
    context: Context<P>,
    period: Duration,
    cancellation_token: CancellationToken,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut requests = JoinSet::new();
    loop {
        tokio::select! {
            // Use the cancellation token to stop the loop
            () = cancellation_token.cancelled() => { break; }
            _ = ticker.tick() => {
                request_pending_properties(&context, &mut requests).await;
            }
        }
    }
    // Abort the requests still waiting for a response.
    requests.shutdown().await;
    drop(context);
}

/// The two periodic tasks which keep the registry synchronized with the
/// network.
///
/// Both tasks are cancelled when the synchronizer is stopped or dropped.
#[derive(Debug)]
pub(crate) struct Synchronizer {
    cancellation_token: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl Synchronizer {
    pub(crate) fn start<P: Provider>(context: &Context<P>, config: PollingConfig) -> Self {
        let cancellation_token = CancellationToken::new();

        let handles = vec![
            tokio::spawn(run_updates_poller(
                context.clone(),
                config.updates_interval,
                cancellation_token.clone(),
            )),
            tokio::spawn(run_properties_poller(
                context.clone(),
                config.properties_interval,
                cancellation_token.clone(),
            )),
        ];

        debug!(
            "Polling started: updates every {:?}, properties every {:?}",
            config.updates_interval, config.properties_interval
        );

        Self {
            cancellation_token,
            handles,
        }
    }

    pub(crate) async fn stop(mut self) {
        // Stop the infinite loops
        self.cancellation_token.cancel();

        for handle in std::mem::take(&mut self.handles) {
            // Await the task.
            if let Err(e) = handle.await {
                error!("Failed to await a polling task: {e}");
            }
        }
        debug!("Polling stopped");
    }
}

impl Drop for Synchronizer {
    fn drop(&mut self) {
        self.cancellation_token.cancel();
    }
}
