//! Light HSL client/server, grounded on
//! `original_source/.../light_model/meshx_model_hsl.cpp`.

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

/// `LIGHT_HSL_STATUS` payload: `u16 lightness; u16 hue; u16 saturation` (6 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HslStatus {
    pub lightness: u16,
    pub hue: u16,
    pub saturation: u16,
}

impl HslStatus {
    pub fn decode(payload: &[u8]) -> Option<Self> {
        Some(Self {
            lightness: wire::read_u16(payload, 0)?,
            hue: wire::read_u16(payload, 2)?,
            saturation: wire::read_u16(payload, 4)?,
        })
    }

    pub fn encode(self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(6);
        wire::push_u16(&mut buf, self.lightness);
        wire::push_u16(&mut buf, self.hue);
        wire::push_u16(&mut buf, self.saturation);
        buf
    }
}

#[derive(Debug, Clone)]
pub struct HslClientElMsg {
    pub ctx: Ctx,
    pub model_id: ModelId,
    pub status: Option<HslStatus>,
    pub timed_out: bool,
}

pub struct HslClient {
    registry: Arc<ClientRegistry<LightFamily>>,
    transport: Arc<dyn ClientTransport>,
    bus: Arc<Bus>,
}

impl HslClient {
    pub fn construct(bus: Arc<Bus>, txcm: Arc<Txcm>, config: MeshxConfig, transport: Arc<dyn ClientTransport>) -> Result<Arc<Self>> {
        let registry = ClientRegistry::<LightFamily>::new(bus.clone(), txcm, config);
        let adapter = Arc::new(Self { registry: registry.clone(), transport, bus: bus.clone() });
        let this = adapter.clone();
        registry.construct(model_id::HSL_CLIENT, Arc::new(move |event: &ClientInboundEvent| this.handle_inbound(event)))?;
        Ok(adapter)
    }

    fn handle_inbound(&self, event: &ClientInboundEvent) -> Result<()> {
        let status = HslStatus::decode(&event.payload);
        self.bus.publish(
            Topic::ElStateCh,
            el_event::SET_HSL,
            &HslClientElMsg { ctx: event.ctx, model_id: event.model_id, status, timed_out: event.timed_out },
        );
        Ok(())
    }

    pub fn send_get(&self, model: ModelRef, dst_addr: Address, net_idx: u16, app_idx: u16) -> Result<()> {
        self.send(model, Opcode::from(opcode::HSL_GET), dst_addr, net_idx, app_idx, Vec::new())
    }

    pub fn send_set(&self, model: ModelRef, dst_addr: Address, net_idx: u16, app_idx: u16, status: HslStatus, tid: u8, ack: bool) -> Result<()> {
        let mut payload = status.encode();
        wire::push_u8(&mut payload, tid);
        let op = if ack { opcode::HSL_SET } else { opcode::HSL_SET_UNACK };
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

pub struct HslServer {
    registry: Arc<ServerRegistry<LightFamily>>,
}

impl HslServer {
    pub fn construct(bus: Arc<Bus>, transport: Arc<dyn ServerTransport>) -> Result<Arc<Self>> {
        let registry = ServerRegistry::<LightFamily>::new(bus, transport);
        registry.construct(model_id::HSL_SERVER, Arc::new(Self::handle_inbound))?;
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
        if op != opcode::HSL_GET && op != opcode::HSL_SET && op != opcode::HSL_SET_UNACK {
            return Ok(ServerDecision::default());
        }

        let status = HslStatus::decode(&event.payload).unwrap_or(HslStatus { lightness: 0, hue: 0, saturation: 0 });
        let status_payload = status.encode();

        let mut decision = ServerDecision::default();
        let is_get = op == opcode::HSL_GET;
        if !is_get {
            decision.notify_state_change = Some(status_payload.clone());
        }
        if op != opcode::HSL_SET_UNACK {
            decision.status_reply = Some((Opcode::from(opcode::HSL_STATUS), status_payload.clone()));
        }
        if event.ctx.src_addr != event.ctx.dst_addr {
            decision.publish_update = Some((Opcode::from(opcode::HSL_STATUS), status_payload));
        }
        Ok(decision)
    }
}
