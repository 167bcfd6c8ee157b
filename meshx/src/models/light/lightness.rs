//! Light Lightness client/server, grounded on
//! `original_source/.../light_model/meshx_model_lightness.cpp`.

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

#[derive(Debug, Clone)]
pub struct LightnessClientElMsg {
    pub ctx: Ctx,
    pub model_id: ModelId,
    pub opcode: Opcode,
    pub payload: Vec<u8>,
    pub timed_out: bool,
}

pub struct LightnessClient {
    registry: Arc<ClientRegistry<LightFamily>>,
    transport: Arc<dyn ClientTransport>,
    bus: Arc<Bus>,
}

impl LightnessClient {
    pub fn construct(bus: Arc<Bus>, txcm: Arc<Txcm>, config: MeshxConfig, transport: Arc<dyn ClientTransport>) -> Result<Arc<Self>> {
        let registry = ClientRegistry::<LightFamily>::new(bus.clone(), txcm, config);
        let adapter = Arc::new(Self { registry: registry.clone(), transport, bus: bus.clone() });
        let this = adapter.clone();
        registry.construct(model_id::LIGHTNESS_CLIENT, Arc::new(move |event: &ClientInboundEvent| this.handle_inbound(event)))?;
        Ok(adapter)
    }

    fn handle_inbound(&self, event: &ClientInboundEvent) -> Result<()> {
        self.bus.publish(
            Topic::ElStateCh,
            el_event::SET_LIGHTNESS,
            &LightnessClientElMsg {
                ctx: event.ctx,
                model_id: event.model_id,
                opcode: event.ctx.opcode,
                payload: event.payload.clone(),
                timed_out: event.timed_out,
            },
        );
        Ok(())
    }

    pub fn send_get(&self, model: ModelRef, dst_addr: Address, net_idx: u16, app_idx: u16) -> Result<()> {
        self.send(model, Opcode::from(opcode::LIGHTNESS_GET), dst_addr, net_idx, app_idx, Vec::new())
    }

    pub fn send_set(&self, model: ModelRef, dst_addr: Address, net_idx: u16, app_idx: u16, lightness: u16, tid: u8, ack: bool) -> Result<()> {
        let mut payload = Vec::with_capacity(3);
        wire::push_u16(&mut payload, lightness);
        wire::push_u8(&mut payload, tid);
        let op = if ack { opcode::LIGHTNESS_SET } else { opcode::LIGHTNESS_SET_UNACK };
        self.send(model, Opcode::from(op), dst_addr, net_idx, app_idx, payload)
    }

    pub fn send_range_get(&self, model: ModelRef, dst_addr: Address, net_idx: u16, app_idx: u16) -> Result<()> {
        self.send(model, Opcode::from(opcode::LIGHTNESS_RANGE_GET), dst_addr, net_idx, app_idx, Vec::new())
    }

    fn send(&self, model: ModelRef, opcode: Opcode, dst_addr: Address, net_idx: u16, app_idx: u16, payload: Vec<u8>) -> Result<()> {
        let is_get = LightFamily::is_get_opcode(opcode);
        let transport = self.transport.clone();
        let buf = payload.clone();
        let send_fn = Arc::new(move |_: &[u8]| transport.plat_send_msg(model, opcode, dst_addr, net_idx, app_idx, is_get, &buf));
        self.registry.plat_send_msg(model, opcode, dst_addr, net_idx, app_idx, payload, send_fn)
    }
}

pub struct LightnessServer {
    registry: Arc<ServerRegistry<LightFamily>>,
}

impl LightnessServer {
    pub fn construct(bus: Arc<Bus>, transport: Arc<dyn ServerTransport>) -> Result<Arc<Self>> {
        let registry = ServerRegistry::<LightFamily>::new(bus, transport);
        registry.construct(model_id::LIGHTNESS_SERVER, Arc::new(Self::handle_inbound))?;
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

        let (status_op, status_payload) = match op {
            opcode::LIGHTNESS_GET | opcode::LIGHTNESS_SET | opcode::LIGHTNESS_SET_UNACK => {
                let value = wire::read_u16(&event.payload, 0).unwrap_or(0);
                let mut buf = Vec::with_capacity(2);
                wire::push_u16(&mut buf, value);
                (opcode::LIGHTNESS_STATUS, buf)
            }
            opcode::LIGHTNESS_RANGE_GET => {
                let mut buf = Vec::with_capacity(5);
                wire::push_u8(&mut buf, 0);
                wire::push_u16(&mut buf, 0);
                wire::push_u16(&mut buf, 0xFFFF);
                (opcode::LIGHTNESS_RANGE_STATUS, buf)
            }
            opcode::LIGHTNESS_DEFAULT_GET => {
                let mut buf = Vec::with_capacity(2);
                wire::push_u16(&mut buf, 0);
                (opcode::LIGHTNESS_DEFAULT_STATUS, buf)
            }
            _ => return Ok(ServerDecision::default()),
        };

        let mut decision = ServerDecision::default();
        let is_get = LightFamily::is_get_opcode(event.opcode);
        if !is_get {
            decision.notify_state_change = Some(status_payload.clone());
        }
        if !LightFamily::is_unack_opcode(event.opcode) {
            decision.status_reply = Some((Opcode::from(status_op), status_payload.clone()));
        }
        if event.ctx.src_addr != event.ctx.dst_addr {
            decision.publish_update = Some((Opcode::from(status_op), status_payload));
        }
        Ok(decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_set_encodes_u16_status() {
        let decision = LightnessServer::handle_inbound(&ServerInboundEvent {
            ctx: Ctx { src_addr: Address(0x0003), dst_addr: Address(0x0001), net_idx: 0, app_idx: 0, opcode: Opcode::from(opcode::LIGHTNESS_SET), reply_handle: None },
            model_id: model_id::LIGHTNESS_SERVER,
            opcode: Opcode::from(opcode::LIGHTNESS_SET),
            payload: vec![0x00, 0x80, 0x05],
        })
        .unwrap();
        let (op, payload) = decision.status_reply.unwrap();
        assert_eq!(op, Opcode::from(opcode::LIGHTNESS_STATUS));
        assert_eq!(payload, vec![0x00, 0x80]);
    }

    #[test]
    fn server_range_get_returns_full_range() {
        let decision = LightnessServer::handle_inbound(&ServerInboundEvent {
            ctx: Ctx { src_addr: Address(0x0003), dst_addr: Address(0x0001), net_idx: 0, app_idx: 0, opcode: Opcode::from(opcode::LIGHTNESS_RANGE_GET), reply_handle: None },
            model_id: model_id::LIGHTNESS_SERVER,
            opcode: Opcode::from(opcode::LIGHTNESS_RANGE_GET),
            payload: Vec::new(),
        })
        .unwrap();
        let (op, payload) = decision.status_reply.unwrap();
        assert_eq!(op, Opcode::from(opcode::LIGHTNESS_RANGE_STATUS));
        assert_eq!(payload.len(), 5);
    }
}
