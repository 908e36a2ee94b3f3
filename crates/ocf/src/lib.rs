//! The data exchanged between an `OCF` resource client and the native provider
//! that talks to the network on its behalf.
//!
//! This crate provides APIs to:
//!
//! - Identify resources through a device identifier and a resource path, and
//!   derive from them an unambiguous identity key.
//! - Describe discovered resources and devices along with the events that
//!   report them.
//! - Encode and decode the resource update entries and property responses
//!   produced by a native provider while it observes resources.
//!
//! All structures are serializable and deserializable with the same field
//! names used by the native layer, so a provider can forward its payloads
//! as plain `JSON` values.
//!
//! This crate can be compiled for both `std` and `no_std` environments.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![no_std]

extern crate alloc;

/// Discovered device descriptions.
pub mod device;
/// Discovery and update events.
pub mod events;
/// Options forwarded to a resource discovery request.
pub mod options;
/// Resource identifiers and descriptions.
pub mod resource;

#[cfg(test)]
pub(crate) fn serialize<T: serde::Serialize>(value: T) -> serde_json::Value {
    serde_json::to_value(value).unwrap()
}

#[cfg(test)]
pub(crate) fn deserialize<T: serde::de::DeserializeOwned>(value: serde_json::Value) -> T {
    serde_json::from_value(value).unwrap()
}
