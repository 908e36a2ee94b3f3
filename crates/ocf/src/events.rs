use alloc::string::String;
use alloc::vec::Vec;

use core::fmt;

use serde::de::Error as _;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::device::Device;
use crate::resource::{Properties, Resource, ResourceKey};

/// Event reporting a discovered resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceEvent {
    /// The discovered resource.
    pub resource: Resource,
}

impl ResourceEvent {
    /// Creates a [`ResourceEvent`].
    #[must_use]
    pub const fn new(resource: Resource) -> Self {
        Self { resource }
    }
}

/// Event reporting a discovered device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceEvent {
    /// The discovered device.
    pub device: Device,
}

impl DeviceEvent {
    /// Creates a [`DeviceEvent`].
    #[must_use]
    pub const fn new(device: Device) -> Self {
        Self { device }
    }
}

/// A resource update entry.
///
/// On the wire an entry is a mapping with exactly one key, the
/// [`ResourceKey`] of the updated resource, whose value contains the new
/// property values.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceUpdate {
    /// Key of the updated resource.
    pub key: ResourceKey,
    /// New property values.
    pub values: Properties,
}

impl ResourceUpdate {
    /// Creates a [`ResourceUpdate`].
    #[must_use]
    pub const fn new(key: ResourceKey, values: Properties) -> Self {
        Self { key, values }
    }
}

impl Serialize for ResourceUpdate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.key, &self.values)?;
        map.end()
    }
}

impl<'de> Deserialize<'de> for ResourceUpdate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let entry = Map::<String, Value>::deserialize(deserializer)?;
        if entry.len() != 1 {
            return Err(D::Error::custom(format_args!(
                "an update entry must have exactly one key, found {}",
                entry.len()
            )));
        }

        let Some((key, value)) = entry.into_iter().next() else {
            return Err(D::Error::custom("empty update entry"));
        };

        let Value::Object(values) = value else {
            return Err(D::Error::custom(format_args!(
                "the values of the update entry `{key}` are not a mapping"
            )));
        };

        Ok(Self {
            key: ResourceKey::from_encoded(key),
            values,
        })
    }
}

/// Event delivered to the update subscribers of a resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateEvent {
    /// Update entries, in the order they were produced.
    pub updates: Vec<ResourceUpdate>,
}

impl fmt::Display for UpdateEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        for update in &self.updates {
            write!(f, "{}:", update.key)?;
            for (name, value) in &update.values {
                write!(f, " {name}={value}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

impl UpdateEvent {
    /// Creates an [`UpdateEvent`] containing a single entry.
    #[must_use]
    pub fn single(update: ResourceUpdate) -> Self {
        Self {
            updates: alloc::vec![update],
        }
    }
}

/// Property values of a resource, as returned by a native provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertiesResponse {
    /// Key of the resource.
    pub key: ResourceKey,
    /// Property values.
    pub properties: Properties,
}

impl PropertiesResponse {
    /// Creates a [`PropertiesResponse`].
    #[must_use]
    pub const fn new(key: ResourceKey, properties: Properties) -> Self {
        Self { key, properties }
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::ToString;

    use serde_json::{Map, json};

    use crate::resource::{Resource, ResourceId};
    use crate::{deserialize, serialize};

    use super::{ResourceEvent, ResourceUpdate, UpdateEvent};

    fn values() -> Map<alloc::string::String, serde_json::Value> {
        let mut values = Map::new();
        let _ = values.insert("value".into(), json!(true));
        values
    }

    #[test]
    fn update_entry_is_a_single_key_mapping() {
        let key = ResourceId::new("dev1", "/path1").key();
        let update = ResourceUpdate::new(key.clone(), values());

        assert_eq!(serialize(&update), json!({ "dev1|/path1": { "value": true } }));
        assert_eq!(
            deserialize::<ResourceUpdate>(json!({ "dev1|/path1": { "value": true } })),
            update
        );
    }

    #[test]
    fn malformed_update_entries() {
        assert!(
            serde_json::from_value::<ResourceUpdate>(json!({})).is_err(),
            "An entry without keys must be rejected"
        );
        assert!(
            serde_json::from_value::<ResourceUpdate>(json!({ "a|/p": {}, "b|/p": {} })).is_err(),
            "An entry with two keys must be rejected"
        );
        assert!(
            serde_json::from_value::<ResourceUpdate>(json!({ "a|/p": 42 })).is_err(),
            "An entry with non-mapping values must be rejected"
        );
    }

    #[test]
    fn update_event_batch() {
        let event: UpdateEvent = deserialize(json!({
            "updates": [
                { "a|/p": { "value": true } },
                { "b|/p": { "value": false } },
            ]
        }));

        assert_eq!(event.updates.len(), 2);
        assert_eq!(event.updates[0].key, ResourceId::new("a", "/p").key());
        assert_eq!(event.updates[1].key, ResourceId::new("b", "/p").key());
        assert_eq!(event.to_string(), "a|/p: value=true\nb|/p: value=false\n");
    }

    #[test]
    fn resource_event_payload() {
        let event: ResourceEvent = deserialize(json!({
            "resource": {
                "id": { "deviceId": "dev1", "resourcePath": "/light" },
                "observable": true,
            }
        }));

        assert_eq!(
            event,
            ResourceEvent::new(Resource::new(ResourceId::new("dev1", "/light")).observable())
        );
    }
}
