//! Light LC (lightness controller) client/server, grounded on
//! `original_source/.../light_model/meshx_model_lc.cpp`. Covers the
//! three boolean/enum sub-states: Mode, Occupancy Mode, Light OnOff.

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
pub struct LcClientElMsg {
    pub ctx: Ctx,
    pub model_id: ModelId,
    pub opcode: Opcode,
    pub value: Option<bool>,
    pub timed_out: bool,
}

pub struct LcClient {
    registry: Arc<ClientRegistry<LightFamily>>,
    transport: Arc<dyn ClientTransport>,
    bus: Arc<Bus>,
}

impl LcClient {
    pub fn construct(bus: Arc<Bus>, txcm: Arc<Txcm>, config: MeshxConfig, transport: Arc<dyn ClientTransport>) -> Result<Arc<Self>> {
        let registry = ClientRegistry::<LightFamily>::new(bus.clone(), txcm, config);
        let adapter = Arc::new(Self { registry: registry.clone(), transport, bus: bus.clone() });
        let this = adapter.clone();
        registry.construct(model_id::LC_CLIENT, Arc::new(move |event: &ClientInboundEvent| this.handle_inbound(event)))?;
        Ok(adapter)
    }

    fn handle_inbound(&self, event: &ClientInboundEvent) -> Result<()> {
        let value = wire::read_u8(&event.payload, 0).map(|b| b != 0);
        self.bus.publish(
            Topic::ElStateCh,
            el_event::SET_LC,
            &LcClientElMsg { ctx: event.ctx, model_id: event.model_id, opcode: event.ctx.opcode, value, timed_out: event.timed_out },
        );
        Ok(())
    }

    pub fn send_mode_get(&self, model: ModelRef, dst_addr: Address, net_idx: u16, app_idx: u16) -> Result<()> {
        self.send(model, Opcode::from(opcode::LC_MODE_GET), dst_addr, net_idx, app_idx, Vec::new())
    }

    pub fn send_mode_set(&self, model: ModelRef, dst_addr: Address, net_idx: u16, app_idx: u16, mode: bool, ack: bool) -> Result<()> {
        let op = if ack { opcode::LC_MODE_SET } else { opcode::LC_MODE_SET_UNACK };
        self.send(model, Opcode::from(op), dst_addr, net_idx, app_idx, vec![mode as u8])
    }

    pub fn send_light_onoff_set(&self, model: ModelRef, dst_addr: Address, net_idx: u16, app_idx: u16, on: bool, tid: u8, ack: bool) -> Result<()> {
        let payload = vec![on as u8, tid];
        let op = if ack { opcode::LC_LIGHT_ONOFF_SET } else { opcode::LC_LIGHT_ONOFF_SET_UNACK };
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

pub struct LcServer {
    registry: Arc<ServerRegistry<LightFamily>>,
}

impl LcServer {
    pub fn construct(bus: Arc<Bus>, transport: Arc<dyn ServerTransport>) -> Result<Arc<Self>> {
        let registry = ServerRegistry::<LightFamily>::new(bus, transport);
        registry.construct(model_id::LC_SERVER, Arc::new(Self::handle_inbound))?;
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

        let (get_op, set_op, set_unack_op, status_op) = match op {
            opcode::LC_MODE_GET | opcode::LC_MODE_SET | opcode::LC_MODE_SET_UNACK => {
                (opcode::LC_MODE_GET, opcode::LC_MODE_SET, opcode::LC_MODE_SET_UNACK, opcode::LC_MODE_STATUS)
            }
            opcode::LC_OM_GET | opcode::LC_OM_SET | opcode::LC_OM_SET_UNACK => {
                (opcode::LC_OM_GET, opcode::LC_OM_SET, opcode::LC_OM_SET_UNACK, opcode::LC_OM_STATUS)
            }
            opcode::LC_LIGHT_ONOFF_GET | opcode::LC_LIGHT_ONOFF_SET | opcode::LC_LIGHT_ONOFF_SET_UNACK => {
                (opcode::LC_LIGHT_ONOFF_GET, opcode::LC_LIGHT_ONOFF_SET, opcode::LC_LIGHT_ONOFF_SET_UNACK, opcode::LC_LIGHT_ONOFF_STATUS)
            }
            _ => return Ok(ServerDecision::default()),
        };

        let value = wire::read_u8(&event.payload, 0).unwrap_or(0);
        let status_payload = vec![value];

        let mut decision = ServerDecision::default();
        if op != get_op {
            decision.notify_state_change = Some(status_payload.clone());
        }
        if op != set_unack_op {
            decision.status_reply = Some((Opcode::from(status_op), status_payload.clone()));
        }
        if event.ctx.src_addr != event.ctx.dst_addr {
            decision.publish_update = Some((Opcode::from(status_op), status_payload));
        }
        let _ = set_op;
        Ok(decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_mode_get_replies_mode_status() {
        let decision = LcServer::handle_inbound(&ServerInboundEvent {
            ctx: Ctx { src_addr: Address(0x0003), dst_addr: Address(0x0001), net_idx: 0, app_idx: 0, opcode: Opcode::from(opcode::LC_MODE_GET), reply_handle: None },
            model_id: model_id::LC_SERVER,
            opcode: Opcode::from(opcode::LC_MODE_GET),
            payload: vec![1],
        })
        .unwrap();
        let (op, payload) = decision.status_reply.unwrap();
        assert_eq!(op, Opcode::from(opcode::LC_MODE_STATUS));
        assert_eq!(payload, vec![1]);
        assert!(decision.notify_state_change.is_none());
    }

    #[test]
    fn server_light_onoff_set_unack_skips_reply() {
        let decision = LcServer::handle_inbound(&ServerInboundEvent {
            ctx: Ctx { src_addr: Address(0x0003), dst_addr: Address(0x0001), net_idx: 0, app_idx: 0, opcode: Opcode::from(opcode::LC_LIGHT_ONOFF_SET_UNACK), reply_handle: None },
            model_id: model_id::LC_SERVER,
            opcode: Opcode::from(opcode::LC_LIGHT_ONOFF_SET_UNACK),
            payload: vec![1, 4],
        })
        .unwrap();
        assert!(decision.status_reply.is_none());
        assert!(decision.notify_state_change.is_some());
    }
}
