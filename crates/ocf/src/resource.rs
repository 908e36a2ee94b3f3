use alloc::string::String;
use alloc::vec::Vec;

use core::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Resource property values.
pub type Properties = Map<String, Value>;

// Separates the escaped device identifier from the resource path in a key.
const KEY_SEPARATOR: char = '|';

/// Resource identifier.
///
/// A resource is addressed by the device hosting it and by its path on
/// that device.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceId {
    /// Device identifier.
    pub device_id: String,
    /// Resource path on the device.
    pub resource_path: String,
}

// Displayed as its key, so log lines match the keys of update entries.
impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        f.write_str(self.key().as_str())
    }
}

impl ResourceId {
    /// Creates a [`ResourceId`].
    #[must_use]
    pub fn new(device_id: impl Into<String>, resource_path: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            resource_path: resource_path.into(),
        }
    }

    /// Returns the [`ResourceKey`] identifying this resource.
    #[must_use]
    #[inline]
    pub fn key(&self) -> ResourceKey {
        ResourceKey::new(self)
    }
}

/// Resource identity key.
///
/// The key is a string encoding of a [`ResourceId`] in which the device
/// identifier is escaped and followed by a separator, so two distinct
/// identifiers never produce the same key, whatever their content.
///
/// Native providers use this key to label update entries and property
/// responses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceKey(String);

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        f.write_str(&self.0)
    }
}

impl From<&ResourceId> for ResourceKey {
    fn from(id: &ResourceId) -> Self {
        Self::new(id)
    }
}

impl ResourceKey {
    /// Creates the [`ResourceKey`] of a [`ResourceId`].
    #[must_use]
    pub fn new(id: &ResourceId) -> Self {
        let mut key = String::with_capacity(id.device_id.len() + id.resource_path.len() + 1);
        for c in id.device_id.chars() {
            match c {
                '%' => key.push_str("%25"),
                KEY_SEPARATOR => key.push_str("%7C"),
                c => key.push(c),
            }
        }
        key.push(KEY_SEPARATOR);
        key.push_str(&id.resource_path);
        Self(key)
    }

    /// Returns the key as a string slice.
    #[must_use]
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub(crate) const fn from_encoded(key: String) -> Self {
        Self(key)
    }
}

/// A discovered resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    /// Resource identifier.
    pub id: ResourceId,
    /// Resource types.
    #[serde(default)]
    pub resource_types: Vec<String>,
    /// Interfaces exposed by the resource.
    #[serde(default)]
    pub interfaces: Vec<String>,
    /// Media types supported by the resource.
    #[serde(default)]
    pub media_types: Vec<String>,
    /// Property values.
    ///
    /// Empty until they are retrieved from the device.
    #[serde(default)]
    pub properties: Properties,
    /// Whether the resource can be observed.
    #[serde(default)]
    pub observable: bool,
}

impl Resource {
    /// Creates a [`Resource`] without properties.
    #[must_use]
    pub fn new(id: ResourceId) -> Self {
        Self {
            id,
            resource_types: Vec::new(),
            interfaces: Vec::new(),
            media_types: Vec::new(),
            properties: Properties::new(),
            observable: false,
        }
    }

    /// Sets the resource types.
    #[must_use]
    pub fn resource_types<I, S>(mut self, resource_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.resource_types = resource_types.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the interfaces.
    #[must_use]
    pub fn interfaces<I, S>(mut self, interfaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.interfaces = interfaces.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the property values.
    #[must_use]
    pub fn properties(mut self, properties: Properties) -> Self {
        self.properties = properties;
        self
    }

    /// Marks the resource as observable.
    #[must_use]
    pub fn observable(mut self) -> Self {
        self.observable = true;
        self
    }

    /// Returns the [`ResourceKey`] of the resource.
    #[must_use]
    #[inline]
    pub fn key(&self) -> ResourceKey {
        self.id.key()
    }

    /// Checks whether the resource has the given type.
    #[must_use]
    pub fn has_type(&self, resource_type: &str) -> bool {
        self.resource_types.iter().any(|t| t == resource_type)
    }
}
