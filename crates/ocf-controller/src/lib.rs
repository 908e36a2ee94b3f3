//! The `ocf-controller` library crate provides a set of APIs for discovering
//! `OCF` resources and devices and for keeping the state of the discovered
//! resources synchronized with the network.
//!
//! The controller never speaks the `OCF` protocol itself: every network
//! operation is delegated to a native [`provider::Provider`], which drives
//! the underlying stack and reports its results asynchronously.
//!
//! Core functionalities of this crate include:
//!
//! - Discovering resources and devices, registering each resource only once
//!   even when it is discovered several times
//! - Notifying any number of subscribers of newly discovered resources and
//!   devices
//! - Lazily retrieving the properties of newly discovered resources
//! - Polling resource updates and delivering each of them to the subscribers
//!   of the updated resource
//!
//! Polling runs on `tokio` tasks owned by the [`controller::Controller`]:
//! they are stopped when the controller is shut down or dropped.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

/// A controller for discovering and synchronizing `OCF` resources.
pub mod controller;
/// Coordination of resource and device discovery requests.
pub mod discovery;
/// Error management.
pub mod error;
/// An in-memory provider.
#[cfg(any(test, feature = "mock"))]
pub mod mock;
/// The interface of a native provider.
pub mod provider;
/// A collection of discovered resources.
pub mod registry;
/// Subscription identifiers.
pub mod subscription;
/// Periodic tasks polling resource properties and updates.
pub mod synchronizer;
