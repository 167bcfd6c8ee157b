//! Generic Location client/server (Global + Local sub-states), grounded
//! on `original_source/.../meshx_model_location.cpp`.

use std::sync::Arc;

use crate::bus::{Bus, Topic};
use crate::config::MeshxConfig;
use crate::error::Result;
use crate::model::client::{ClientInboundEvent, ClientRegistry};
use crate::model::family::ModelFamily;
use crate::model::server::{ServerDecision, ServerInboundEvent, ServerRegistry};
use crate::models::el_event;
use crate::models::generic::{model_id, opcode, GenericFamily};
use crate::models::wire;
use crate::transport::{ClientTransport, ServerTransport};
use crate::txcm::Txcm;
use crate::types::{Address, Ctx, ModelId, ModelRef, Opcode};

/// Published on `EL_STATE_CH/SET_LOCATION`, tagged with whichever
/// opcode the inbound STATUS carried (Global or Local), mirroring the
/// original's opcode-keyed union.
#[derive(Debug, Clone)]
pub struct LocationClientElMsg {
    pub ctx: Ctx,
    pub model_id: ModelId,
    pub opcode: Opcode,
    pub payload: Vec<u8>,
    pub timed_out: bool,
}

pub struct LocationClient {
    registry: Arc<ClientRegistry<GenericFamily>>,
    transport: Arc<dyn ClientTransport>,
    bus: Arc<Bus>,
}

impl LocationClient {
    pub fn construct(bus: Arc<Bus>, txcm: Arc<Txcm>, config: MeshxConfig, transport: Arc<dyn ClientTransport>) -> Result<Arc<Self>> {
        let registry = ClientRegistry::<GenericFamily>::new(bus.clone(), txcm, config);
        let adapter = Arc::new(Self { registry: registry.clone(), transport, bus: bus.clone() });
        let this = adapter.clone();
        registry.construct(model_id::LOCATION_CLIENT, Arc::new(move |event: &ClientInboundEvent| this.handle_inbound(event)))?;
        Ok(adapter)
    }

    fn handle_inbound(&self, event: &ClientInboundEvent) -> Result<()> {
        self.bus.publish(
            Topic::ElStateCh,
            el_event::SET_LOCATION,
            &LocationClientElMsg {
                ctx: event.ctx,
                model_id: event.model_id,
                opcode: event.ctx.opcode,
                payload: event.payload.clone(),
                timed_out: event.timed_out,
            },
        );
        Ok(())
    }

    pub fn send_global_get(&self, model: ModelRef, dst_addr: Address, net_idx: u16, app_idx: u16) -> Result<()> {
        self.send(model, Opcode::from(opcode::LOCATION_GLOBAL_GET), dst_addr, net_idx, app_idx, Vec::new())
    }

    pub fn send_local_get(&self, model: ModelRef, dst_addr: Address, net_idx: u16, app_idx: u16) -> Result<()> {
        self.send(model, Opcode::from(opcode::LOCATION_LOCAL_GET), dst_addr, net_idx, app_idx, Vec::new())
    }

    /// Global Location Set. Latitude/longitude/altitude per Mesh Model
    /// spec are signed fixed-point; stored here pre-encoded by the
    /// caller as raw little-endian `i32`/`i16` bytes (8 bytes total).
    pub fn send_global_set(&self, model: ModelRef, dst_addr: Address, net_idx: u16, app_idx: u16, global: [u8; 8], ack: bool) -> Result<()> {
        let op = if ack { opcode::LOCATION_GLOBAL_SET } else { opcode::LOCATION_GLOBAL_SET_UNACK };
        self.send(model, Opcode::from(op), dst_addr, net_idx, app_idx, global.to_vec())
    }

    pub fn send_local_set(&self, model: ModelRef, dst_addr: Address, net_idx: u16, app_idx: u16, local: [u8; 9], ack: bool) -> Result<()> {
        let op = if ack { opcode::LOCATION_LOCAL_SET } else { opcode::LOCATION_LOCAL_SET_UNACK };
        self.send(model, Opcode::from(op), dst_addr, net_idx, app_idx, local.to_vec())
    }

    fn send(&self, model: ModelRef, opcode: Opcode, dst_addr: Address, net_idx: u16, app_idx: u16, payload: Vec<u8>) -> Result<()> {
        let is_get = GenericFamily::is_get_opcode(opcode);
        let transport = self.transport.clone();
        let buf = payload.clone();
        let send_fn = Arc::new(move |_: &[u8]| transport.plat_send_msg(model, opcode, dst_addr, net_idx, app_idx, is_get, &buf));
        self.registry.plat_send_msg(model, opcode, dst_addr, net_idx, app_idx, payload, send_fn)
    }
}

pub struct LocationServer {
    registry: Arc<ServerRegistry<GenericFamily>>,
}

impl LocationServer {
    pub fn construct(bus: Arc<Bus>, transport: Arc<dyn ServerTransport>) -> Result<Arc<Self>> {
        let registry = ServerRegistry::<GenericFamily>::new(bus, transport);
        registry.construct(model_id::LOCATION_SERVER, Arc::new(Self::handle_inbound))?;
        Ok(Arc::new(Self { registry }))
    }

    pub fn registry(&self) -> &Arc<ServerRegistry<GenericFamily>> {
        &self.registry
    }

    fn handle_inbound(event: &ServerInboundEvent) -> Result<ServerDecision> {
        let op = event.opcode.raw() as u16;
        if GenericFamily::is_status_opcode(event.opcode) {
            return Ok(ServerDecision::default());
        }

        let mut decision = ServerDecision::default();
        let is_get = op == opcode::LOCATION_GLOBAL_GET || op == opcode::LOCATION_LOCAL_GET;
        if !is_get {
            decision.notify_state_change = Some(event.payload.clone());
        }

        let (status_op, is_global) = match op {
            opcode::LOCATION_GLOBAL_GET | opcode::LOCATION_GLOBAL_SET => (opcode::LOCATION_GLOBAL_STATUS, true),
            opcode::LOCATION_LOCAL_GET | opcode::LOCATION_LOCAL_SET => (opcode::LOCATION_LOCAL_STATUS, false),
            _ => return Ok(decision),
        };
        let _ = is_global;

        if op == opcode::LOCATION_GLOBAL_SET || op == opcode::LOCATION_LOCAL_SET {
            decision.status_reply = Some((Opcode::from(status_op), event.payload.clone()));
        }
        if event.ctx.src_addr != event.ctx.dst_addr {
            decision.publish_update = Some((Opcode::from(status_op), event.payload.clone()));
        }
        Ok(decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_global_set_replies_global_status() {
        let decision = LocationServer::handle_inbound(&ServerInboundEvent {
            ctx: Ctx { src_addr: Address(0x0003), dst_addr: Address(0x0001), net_idx: 0, app_idx: 0, opcode: Opcode::from(opcode::LOCATION_GLOBAL_SET), reply_handle: None },
            model_id: model_id::LOCATION_SERVER,
            opcode: Opcode::from(opcode::LOCATION_GLOBAL_SET),
            payload: vec![0; 8],
        })
        .unwrap();
        let (status_op, _) = decision.status_reply.unwrap();
        assert_eq!(status_op, Opcode::from(opcode::LOCATION_GLOBAL_STATUS));
    }

    #[test]
    fn server_local_get_skips_notify() {
        let decision = LocationServer::handle_inbound(&ServerInboundEvent {
            ctx: Ctx { src_addr: Address(0x0003), dst_addr: Address(0x0001), net_idx: 0, app_idx: 0, opcode: Opcode::from(opcode::LOCATION_LOCAL_GET), reply_handle: None },
            model_id: model_id::LOCATION_SERVER,
            opcode: Opcode::from(opcode::LOCATION_LOCAL_GET),
            payload: Vec::new(),
        })
        .unwrap();
        assert!(decision.notify_state_change.is_none());
        assert!(decision.status_reply.is_none());
    }
}
