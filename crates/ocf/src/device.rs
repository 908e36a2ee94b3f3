use alloc::string::String;
use alloc::vec::Vec;

use core::fmt;

use serde::{Deserialize, Serialize};

/// A discovered device.
///
/// A device is a network endpoint hosting zero or more resources. Its
/// description is reported once per discovery and never retained by the
/// client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    /// Device unique identifier.
    #[serde(default)]
    pub uuid: String,
    /// Human-readable device name.
    #[serde(default)]
    pub name: String,
    /// Version of the core specification implemented by the device.
    #[serde(default)]
    pub core_spec_version: String,
    /// Data models implemented by the device.
    #[serde(default)]
    pub data_models: Vec<String>,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        writeln!(f, "Device \"{}\" ({})", self.name, self.uuid)?;
        if !self.core_spec_version.is_empty() {
            writeln!(f, "Core specification: {}", self.core_spec_version)?;
        }
        for data_model in &self.data_models {
            writeln!(f, "Data model: {data_model}")?;
        }
        Ok(())
    }
}

impl Device {
    /// Creates a [`Device`] from its identifier and name.
    #[must_use]
    pub fn new(uuid: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            name: name.into(),
            core_spec_version: String::new(),
            data_models: Vec::new(),
        }
    }

    /// Sets the core specification version.
    #[must_use]
    pub fn core_spec_version(mut self, version: impl Into<String>) -> Self {
        self.core_spec_version = version.into();
        self
    }

    /// Adds a data model.
    #[must_use]
    pub fn data_model(mut self, data_model: impl Into<String>) -> Self {
        self.data_models.push(data_model.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::ToString;

    use serde_json::json;

    use crate::{deserialize, serialize};

    use super::Device;

    #[test]
    fn device_wire_format() {
        let device = Device::new("2f0e6a4c", "Living room light")
            .core_spec_version("core.1.1.0")
            .data_model("res.1.1.0");

        assert_eq!(
            serialize(&device),
            json!({
                "uuid": "2f0e6a4c",
                "name": "Living room light",
                "coreSpecVersion": "core.1.1.0",
                "dataModels": ["res.1.1.0"],
            })
        );

        assert_eq!(
            deserialize::<Device>(json!({ "uuid": "2f0e6a4c" })),
            Device {
                uuid: "2f0e6a4c".into(),
                ..Device::default()
            }
        );
    }

    #[test]
    fn device_display() {
        let device = Device::new("2f0e6a4c", "Lamp").data_model("res.1.1.0");

        assert_eq!(
            device.to_string(),
            "Device \"Lamp\" (2f0e6a4c)\nData model: res.1.1.0\n"
        );
    }
}
