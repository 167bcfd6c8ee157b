//! Transport SPI (spec.md §6.1): the capabilities the core requires from
//! a vendor-provided BLE Mesh stack.
//!
//! The core never encodes the network/access layer, never does
//! segmentation or replay protection, and never touches a GATT or
//! advertising bearer — all of that lives behind these traits. A host
//! test suite implements them in memory; `meshx-node` implements them
//! over the vendor mesh stack's FFI.

use crate::error::Result;
use crate::types::{Address, Ctx, ModelRef, Opcode};

/// Capability required to send a client-originated message.
///
/// One call per family (generic, light) in the original; here a single
/// trait object per family instance is enough since `ModelRef` already
/// carries the model id needed to disambiguate on the transport side.
pub trait ClientTransport: Send + Sync {
    /// Dispatch `payload` as an access-layer message from `model`.
    /// `is_get` mirrors the original's bookkeeping flag so the transport
    /// can special-case GET-family opcodes if it needs to.
    fn plat_send_msg(
        &self,
        model: ModelRef,
        opcode: Opcode,
        dst_addr: Address,
        net_idx: u16,
        app_idx: u16,
        is_get: bool,
        payload: &[u8],
    ) -> Result<()>;
}

/// Capability required to reply from a server model.
pub trait ServerTransport: Send + Sync {
    /// Send `payload` as a reply/status from `model`, addressed per `ctx`.
    fn plat_server_model_send(&self, model: ModelRef, ctx: &Ctx, opcode: Opcode, payload: &[u8]) -> Result<()>;

    /// Whether `model`'s element currently subscribes to group `addr`,
    /// used to decide whether a broadcast/group SET should notify the
    /// element (spec.md §4.3.2).
    fn plat_is_group_subscribed(&self, model: ModelRef, addr: Address) -> bool;
}

/// Capability to ask the transport for this node's primary element
/// address (used by elements composing publish addresses at startup).
pub trait PrimaryElementAddress: Send + Sync {
    fn plat_get_primary_element_address(&self) -> Address;
}
