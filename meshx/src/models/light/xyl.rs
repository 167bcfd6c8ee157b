//! Light xyL client/server, grounded on
//! `original_source/.../light_model/meshx_model_xyl.cpp`.

use std::sync::Arc;

use crate::bus::{Bus, Topic};
use crate::config::MeshxConfig;
use crate::error::Result;
use crate::model::client::{ClientInboundEvent, ClientRegistry};
use crate::model::family::ModelFamily;
use crate::model::server::{ServerDecision, ServerInboundEvent, ServerRegistry};
use crate::models::el_event;
use crate::models::light::{model_id, opcode, LightFamily};
use crate::models::wire;
use crate::transport::{ClientTransport, ServerTransport};
use crate::txcm::Txcm;
use crate::types::{Address, Ctx, ModelId, ModelRef, Opcode};

/// `LIGHT_XYL_STATUS` payload: `u16 lightness; u16 x; u16 y` (6 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XylStatus {
    pub lightness: u16,
    pub x: u16,
    pub y: u16,
}

impl XylStatus {
    pub fn decode(payload: &[u8]) -> Option<Self> {
        Some(Self { lightness: wire::read_u16(payload, 0)?, x: wire::read_u16(payload, 2)?, y: wire::read_u16(payload, 4)? })
    }

    pub fn encode(self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(6);
        wire::push_u16(&mut buf, self.lightness);
        wire::push_u16(&mut buf, self.x);
        wire::push_u16(&mut buf, self.y);
        buf
    }
}

#[derive(Debug, Clone)]
pub struct XylClientElMsg {
    pub ctx: Ctx,
    pub model_id: ModelId,
    pub status: Option<XylStatus>,
    pub timed_out: bool,
}

pub struct XylClient {
    registry: Arc<ClientRegistry<LightFamily>>,
    transport: Arc<dyn ClientTransport>,
    bus: Arc<Bus>,
}

impl XylClient {
    pub fn construct(bus: Arc<Bus>, txcm: Arc<Txcm>, config: MeshxConfig, transport: Arc<dyn ClientTransport>) -> Result<Arc<Self>> {
        let registry = ClientRegistry::<LightFamily>::new(bus.clone(), txcm, config);
        let adapter = Arc::new(Self { registry: registry.clone(), transport, bus: bus.clone() });
        let this = adapter.clone();
        registry.construct(model_id::XYL_CLIENT, Arc::new(move |event: &ClientInboundEvent| this.handle_inbound(event)))?;
        Ok(adapter)
    }

    fn handle_inbound(&self, event: &ClientInboundEvent) -> Result<()> {
        let status = XylStatus::decode(&event.payload);
        self.bus.publish(
            Topic::ElStateCh,
            el_event::SET_XYL,
            &XylClientElMsg { ctx: event.ctx, model_id: event.model_id, status, timed_out: event.timed_out },
        );
        Ok(())
    }

    pub fn send_get(&self, model: ModelRef, dst_addr: Address, net_idx: u16, app_idx: u16) -> Result<()> {
        self.send(model, Opcode::from(opcode::XYL_GET), dst_addr, net_idx, app_idx, Vec::new())
    }

    pub fn send_set(&self, model: ModelRef, dst_addr: Address, net_idx: u16, app_idx: u16, status: XylStatus, tid: u8, ack: bool) -> Result<()> {
        let mut payload = status.encode();
        wire::push_u8(&mut payload, tid);
        let op = if ack { opcode::XYL_SET } else { opcode::XYL_SET_UNACK };
        self.send(model, Opcode::from(op), dst_addr, net_idx, app_idx, payload)
    }

    fn send(&self, model: ModelRef, opcode: Opcode, dst_addr: Address, net_idx: u16, app_idx: u16, payload: Vec<u8>) -> Result<()> {
        let is_get = LightFamily::is_get_opcode(opcode);
        let transport = self.transport.clone();
        let buf = payload.clone();
        let send_fn = Arc::new(move |_: &[u8]| transport.plat_send_msg(model, opcode, dst_addr, net_idx, app_idx, is_get, &buf));
        self.registry.plat_send_msg(model, opcode, dst_addr, net_idx, app_idx, payload, send_fn)
    }
}

pub struct XylServer {
    registry: Arc<ServerRegistry<LightFamily>>,
}

impl XylServer {
    pub fn construct(bus: Arc<Bus>, transport: Arc<dyn ServerTransport>) -> Result<Arc<Self>> {
        let registry = ServerRegistry::<LightFamily>::new(bus, transport);
        registry.construct(model_id::XYL_SERVER, Arc::new(Self::handle_inbound))?;
        Ok(Arc::new(Self { registry }))
    }

    pub fn registry(&self) -> &Arc<ServerRegistry<LightFamily>> {
        &self.registry
    }

    fn handle_inbound(event: &ServerInboundEvent) -> Result<ServerDecision> {
        let op = event.opcode.raw() as u16;
        if LightFamily::is_status_opcode(event.opcode) {
            return Ok(ServerDecision::default());
        }
        if op != opcode::XYL_GET && op != opcode::XYL_SET && op != opcode::XYL_SET_UNACK {
            return Ok(ServerDecision::default());
        }

        let status = XylStatus::decode(&event.payload).unwrap_or(XylStatus { lightness: 0, x: 0, y: 0 });
        let status_payload = status.encode();

        let mut decision = ServerDecision::default();
        let is_get = op == opcode::XYL_GET;
        if !is_get {
            decision.notify_state_change = Some(status_payload.clone());
        }
        if op != opcode::XYL_SET_UNACK {
            decision.status_reply = Some((Opcode::from(opcode::XYL_STATUS), status_payload.clone()));
        }
        if event.ctx.src_addr != event.ctx.dst_addr {
            decision.publish_update = Some((Opcode::from(opcode::XYL_STATUS), status_payload));
        }
        Ok(decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xyl_status_encodes_six_bytes_le() {
        let status = XylStatus { lightness: 0x0A0B, x: 0x0C0D, y: 0x0E0F };
        let encoded = status.encode();
        assert_eq!(XylStatus::decode(&encoded), Some(status));
        assert_eq!(encoded.len(), 6);
    }

    #[test]
    fn server_get_replies_with_current_state() {
        let decision = XylServer::handle_inbound(&ServerInboundEvent {
            ctx: Ctx { src_addr: Address(0x0003), dst_addr: Address(0x0001), net_idx: 0, app_idx: 0, opcode: Opcode::from(opcode::XYL_GET), reply_handle: None },
            model_id: model_id::XYL_SERVER,
            opcode: Opcode::from(opcode::XYL_GET),
            payload: Vec::new(),
        })
        .unwrap();
        assert!(decision.status_reply.is_some());
        assert!(decision.notify_state_change.is_none());
    }
}
