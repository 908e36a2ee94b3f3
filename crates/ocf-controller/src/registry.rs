use std::sync::Arc;

use ocf::events::{ResourceUpdate, UpdateEvent};
use ocf::resource::{Properties, Resource, ResourceKey};

use indexmap::IndexMap;

use tracing::{debug, trace};

use crate::subscription::Subscribers;

#[derive(Debug)]
struct Entry {
    resource: Resource,
    updates: Arc<Subscribers<UpdateEvent>>,
}

impl Entry {
    fn new(resource: Resource) -> Self {
        Self {
            resource,
            updates: Arc::new(Subscribers::new()),
        }
    }
}

/// Update subscribers of a resource along with the event to deliver to them.
pub(crate) type UpdateDelivery = (Arc<Subscribers<UpdateEvent>>, UpdateEvent);

/// A collection of discovered resources.
///
/// Each resource is stored once, identified by its [`ResourceKey`].
/// Resources are kept in insertion order and are never removed.
#[derive(Debug, Default)]
pub struct Registry {
    entries: IndexMap<ResourceKey, Entry>,
}

impl Registry {
    /// Creates an empty [`Registry`].
    #[must_use]
    #[inline]
    pub fn new() -> Self {
        Self {
            entries: IndexMap::new(),
        }
    }

    /// Creates a [`Registry`] from a list of resources.
    ///
    /// Resources sharing the same key are stored once, the first one wins.
    ///
    /// This method is useful when resources are retrieved from a database.
    #[must_use]
    pub fn from_resources(resources: impl IntoIterator<Item = Resource>) -> Self {
        let mut registry = Self::new();
        for resource in resources {
            let _ = registry.add(resource);
        }
        registry
    }

    /// Checks whether a resource with the same key as `candidate` is already
    /// stored.
    ///
    /// Only keys are compared: property values and descriptions are ignored.
    #[must_use]
    #[inline]
    pub fn contains(&self, candidate: &Resource) -> bool {
        self.entries.contains_key(&candidate.key())
    }

    /// Adds a resource if no resource with the same key is stored.
    ///
    /// Returns `true` when the resource has been added, `false` when it was
    /// already known.
    pub fn add(&mut self, resource: Resource) -> bool {
        let key = resource.key();
        if self.entries.contains_key(&key) {
            trace!("Resource `{key}` already known");
            return false;
        }

        debug!("Added resource `{key}`");
        let _ = self.entries.insert(key, Entry::new(resource));
        true
    }

    /// Returns the resource with the given key, if any.
    #[must_use]
    #[inline]
    pub fn find_by_key(&self, key: &ResourceKey) -> Option<&Resource> {
        self.entries.get(key).map(|entry| &entry.resource)
    }

    /// Returns the number of stored resources.
    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Checks whether the registry is empty.
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns an iterator over the stored resources, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Resource> {
        self.entries.values().map(|entry| &entry.resource)
    }

    // Keys of the resources whose properties have not been retrieved yet.
    pub(crate) fn pending_properties(&self) -> Vec<ResourceKey> {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.resource.properties.is_empty())
            .map(|(key, _)| key.clone())
            .collect()
    }

    pub(crate) fn set_properties(&mut self, key: &ResourceKey, properties: Properties) -> bool {
        let Some(entry) = self.entries.get_mut(key) else {
            return false;
        };
        entry.resource.properties = properties;
        true
    }

    pub(crate) fn update_subscribers(
        &self,
        key: &ResourceKey,
    ) -> Option<&Arc<Subscribers<UpdateEvent>>> {
        self.entries.get(key).map(|entry| &entry.updates)
    }

    // The returned delivery is present only if the updated resource is
    // stored and has update subscribers. Properties are left untouched.
    pub(crate) fn update_delivery(&self, update: ResourceUpdate) -> Option<UpdateDelivery> {
        let Some(entry) = self.entries.get(&update.key) else {
            trace!("Update for unknown resource `{}` discarded", update.key);
            return None;
        };

        if entry.updates.is_empty() {
            return None;
        }

        Some((Arc::clone(&entry.updates), UpdateEvent::single(update)))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use ocf::events::ResourceUpdate;
    use ocf::resource::{Properties, Resource, ResourceId};

    use serde_json::json;

    use super::Registry;

    pub(crate) fn properties(value: serde_json::Value) -> Properties {
        let serde_json::Value::Object(properties) = value else {
            panic!("Properties must be a JSON object");
        };
        properties
    }

    pub(crate) fn resource(device_id: &str, resource_path: &str) -> Resource {
        Resource::new(ResourceId::new(device_id, resource_path))
    }

    #[test]
    fn idempotent_add() {
        let mut registry = Registry::new();

        assert!(registry.add(resource("dev1", "/path1")));
        assert!(!registry.add(resource("dev1", "/path1")));

        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn contains_compares_keys_only() {
        let mut registry = Registry::new();
        assert!(registry.add(resource("dev1", "/light")));

        let candidate = resource("dev1", "/light")
            .resource_types(["oic.r.switch.binary"])
            .properties(properties(json!({ "value": true })));

        assert!(registry.contains(&candidate));
        assert!(!registry.add(candidate));
        assert!(
            registry
                .find_by_key(&ResourceId::new("dev1", "/light").key())
                .is_some_and(|stored| stored.properties.is_empty()),
            "The stored resource must not be replaced"
        );
    }

    #[test]
    fn concatenation_does_not_collide() {
        let mut registry = Registry::new();

        assert!(registry.add(resource("ab", "c")));
        assert!(registry.add(resource("a", "bc")));

        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn insertion_order() {
        let registry = Registry::from_resources([
            resource("B", "/p"),
            resource("A", "/p"),
            resource("B", "/p"),
            resource("C", "/p"),
        ]);

        let devices: Vec<&str> = registry
            .iter()
            .map(|resource| resource.id.device_id.as_str())
            .collect();

        assert_eq!(devices, ["B", "A", "C"]);
    }

    #[test]
    fn find_by_key() {
        let registry = Registry::from_resources([resource("dev1", "/path1")]);

        assert_eq!(
            registry.find_by_key(&ResourceId::new("dev1", "/path1").key()),
            Some(&resource("dev1", "/path1"))
        );
        assert_eq!(
            registry.find_by_key(&ResourceId::new("dev1", "/path2").key()),
            None
        );
    }

    #[test]
    fn pending_properties() {
        let mut registry = Registry::from_resources([
            resource("A", "/p"),
            resource("B", "/p").properties(properties(json!({ "value": 1 }))),
            resource("C", "/p"),
        ]);

        let key_a = ResourceId::new("A", "/p").key();
        let key_c = ResourceId::new("C", "/p").key();

        assert_eq!(registry.pending_properties(), [key_a.clone(), key_c.clone()]);

        assert!(registry.set_properties(&key_a, properties(json!({ "value": 2 }))));
        assert_eq!(registry.pending_properties(), [key_c]);

        assert!(!registry.set_properties(
            &ResourceId::new("D", "/p").key(),
            properties(json!({ "value": 3 }))
        ));
    }

    #[test]
    fn update_without_subscribers() {
        let registry = Registry::from_resources([resource("A", "/p")]);
        let key = ResourceId::new("A", "/p").key();

        let update = ResourceUpdate::new(key.clone(), properties(json!({ "value": true })));

        assert!(registry.update_delivery(update).is_none());
        // Updates never fill the properties, they are still pending.
        assert_eq!(registry.pending_properties(), [key]);
    }

    #[test]
    fn update_with_subscribers() {
        let registry = Registry::from_resources([resource("A", "/p"), resource("B", "/p")]);
        let key = ResourceId::new("A", "/p").key();

        let _ = registry
            .update_subscribers(&key)
            .map(|subscribers| subscribers.subscribe(|_| {}));

        let update = ResourceUpdate::new(key, properties(json!({ "value": true })));
        let (_, event) = registry.update_delivery(update.clone()).unwrap();

        assert_eq!(event.updates, [update]);

        let unknown = ResourceUpdate::new(
            ResourceId::new("Z", "/p").key(),
            properties(json!({ "value": true })),
        );
        assert!(registry.update_delivery(unknown).is_none());
    }
}
