//! Base model framework (C3): family-parameterized client/server
//! registries sitting over [`crate::bus`] and [`crate::txcm`].

pub mod client;
pub mod family;
pub mod server;

pub use client::{ClientCallback, ClientInboundEvent, ClientRegistry};
pub use family::ModelFamily;
pub use server::{ElStateChangeEvent, ServerCallback, ServerDecision, ServerInboundEvent, ServerRegistry};
