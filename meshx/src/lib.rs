//! MeshX: node-side BLE Mesh model layer.
//!
//! This crate implements the transmission-reliability and model-dispatch
//! subsystem that sits between application-level models (Generic OnOff
//! client, Light CTL client, ...) and a vendor-provided BLE Mesh
//! transport. It does not implement the mesh access or network layer,
//! segmentation, replay protection, provisioning, or net/app key
//! handling — all of that belongs to the transport behind
//! [`transport::ClientTransport`]/[`transport::ServerTransport`].
//!
//! Bottom-up, the crate is:
//! - [`bus`] — the process-local pub/sub message bus (C1).
//! - [`txcm`] — the reliable single-in-flight send worker (C2).
//! - [`model`] — family-parameterized client/server model registries (C3).
//! - [`models`] — concrete per-model adapters: Generic OnOff/Level/Power/
//!   Location/Property, Light CTL/Lightness/HSL/xyL/LC (C4).
//!
//! [`element`], [`storage`], [`platform`] and [`cli`] are the external
//! collaborators a node binary (see `meshx-node`) wires the core up to.

pub mod bus;
pub mod cli;
pub mod config;
pub mod element;
pub mod error;
pub mod model;
pub mod models;
pub mod platform;
pub mod storage;
pub mod transport;
pub mod txcm;
pub mod types;

#[cfg(test)]
pub mod test_support;

pub use error::{MeshxError, Result};
