use alloc::string::String;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Options of a resource discovery request.
///
/// Native providers restrict the discovery to a device or to a resource
/// type when the corresponding option is set. Any other option is forwarded
/// untouched, leaving its interpretation to the provider.
///
/// The default value serializes to an empty mapping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindOptions {
    /// Only discover the resources of this device.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    /// Only discover the resources of this type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    /// Additional options interpreted by the provider.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FindOptions {
    /// Creates empty [`FindOptions`].
    #[must_use]
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts the discovery to a device.
    #[must_use]
    pub fn device_id(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    /// Restricts the discovery to a resource type.
    #[must_use]
    pub fn resource_type(mut self, resource_type: impl Into<String>) -> Self {
        self.resource_type = Some(resource_type.into());
        self
    }

    /// Adds an option interpreted by the provider.
    #[must_use]
    pub fn option(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let _ = self.extra.insert(name.into(), value.into());
        self
    }
}
