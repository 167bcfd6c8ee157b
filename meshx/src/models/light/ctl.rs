//! Light CTL client/server. The four STATUS payload layouts below are
//! bit-exact per spec.md §6.3 and must not be reordered or resized.

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

/// `LIGHT_CTL_STATUS` payload: `u16 lightness; u16 temperature` (4 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CtlStatus {
    pub lightness: u16,
    pub temperature: u16,
}

impl CtlStatus {
    pub fn decode(payload: &[u8]) -> Option<Self> {
        Some(Self { lightness: wire::read_u16(payload, 0)?, temperature: wire::read_u16(payload, 2)? })
    }

    pub fn encode(self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(4);
        wire::push_u16(&mut buf, self.lightness);
        wire::push_u16(&mut buf, self.temperature);
        buf
    }
}

/// `LIGHT_CTL_TEMPERATURE_STATUS` payload: `u16 temperature; u16 delta_uv` (4 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CtlTemperatureStatus {
    pub temperature: u16,
    pub delta_uv: u16,
}

impl CtlTemperatureStatus {
    pub fn decode(payload: &[u8]) -> Option<Self> {
        Some(Self { temperature: wire::read_u16(payload, 0)?, delta_uv: wire::read_u16(payload, 2)? })
    }

    pub fn encode(self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(4);
        wire::push_u16(&mut buf, self.temperature);
        wire::push_u16(&mut buf, self.delta_uv);
        buf
    }
}

/// `LIGHT_CTL_DEFAULT_STATUS` payload: `u16 lightness_def; u16
/// temperature_def; u16 delta_uv_def` (6 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CtlDefaultStatus {
    pub lightness_def: u16,
    pub temperature_def: u16,
    pub delta_uv_def: u16,
}

impl CtlDefaultStatus {
    pub fn decode(payload: &[u8]) -> Option<Self> {
        Some(Self {
            lightness_def: wire::read_u16(payload, 0)?,
            temperature_def: wire::read_u16(payload, 2)?,
            delta_uv_def: wire::read_u16(payload, 4)?,
        })
    }

    pub fn encode(self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(6);
        wire::push_u16(&mut buf, self.lightness_def);
        wire::push_u16(&mut buf, self.temperature_def);
        wire::push_u16(&mut buf, self.delta_uv_def);
        buf
    }
}

/// `LIGHT_CTL_TEMPERATURE_RANGE_STATUS` payload: `u8 status_code; u16
/// range_min; u16 range_max` (5 bytes, packed).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CtlTemperatureRangeStatus {
    pub status_code: u8,
    pub range_min: u16,
    pub range_max: u16,
}

impl CtlTemperatureRangeStatus {
    pub fn decode(payload: &[u8]) -> Option<Self> {
        Some(Self {
            status_code: wire::read_u8(payload, 0)?,
            range_min: wire::read_u16(payload, 1)?,
            range_max: wire::read_u16(payload, 3)?,
        })
    }

    pub fn encode(self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(5);
        wire::push_u8(&mut buf, self.status_code);
        wire::push_u16(&mut buf, self.range_min);
        wire::push_u16(&mut buf, self.range_max);
        buf
    }
}

/// Which of the four STATUS shapes an inbound message carried, tagged
/// by opcode so a subscriber can match on it directly instead of
/// re-deriving the shape from payload length.
#[derive(Debug, Clone)]
pub enum CtlInbound {
    Status(CtlStatus),
    Temperature(CtlTemperatureStatus),
    Default(CtlDefaultStatus),
    TemperatureRange(CtlTemperatureRangeStatus),
}

#[derive(Debug, Clone)]
pub struct CtlClientElMsg {
    pub ctx: Ctx,
    pub model_id: ModelId,
    pub inbound: Option<CtlInbound>,
    pub timed_out: bool,
}

pub struct CtlClient {
    registry: Arc<ClientRegistry<LightFamily>>,
    transport: Arc<dyn ClientTransport>,
    bus: Arc<Bus>,
}

impl CtlClient {
    pub fn construct(bus: Arc<Bus>, txcm: Arc<Txcm>, config: MeshxConfig, transport: Arc<dyn ClientTransport>) -> Result<Arc<Self>> {
        let registry = ClientRegistry::<LightFamily>::new(bus.clone(), txcm, config);
        let adapter = Arc::new(Self { registry: registry.clone(), transport, bus: bus.clone() });
        let this = adapter.clone();
        registry.construct(model_id::CTL_CLIENT, Arc::new(move |event: &ClientInboundEvent| this.handle_inbound(event)))?;
        Ok(adapter)
    }

    fn handle_inbound(&self, event: &ClientInboundEvent) -> Result<()> {
        let op = event.ctx.opcode.raw() as u16;
        let inbound = match op {
            opcode::CTL_STATUS => CtlStatus::decode(&event.payload).map(CtlInbound::Status),
            opcode::CTL_TEMPERATURE_STATUS => CtlTemperatureStatus::decode(&event.payload).map(CtlInbound::Temperature),
            opcode::CTL_DEFAULT_STATUS => CtlDefaultStatus::decode(&event.payload).map(CtlInbound::Default),
            opcode::CTL_TEMPERATURE_RANGE_STATUS => CtlTemperatureRangeStatus::decode(&event.payload).map(CtlInbound::TemperatureRange),
            _ => None,
        };
        self.bus.publish(
            Topic::ElStateCh,
            el_event::SET_CTL,
            &CtlClientElMsg { ctx: event.ctx, model_id: event.model_id, inbound, timed_out: event.timed_out },
        );
        Ok(())
    }

    pub fn send_get(&self, model: ModelRef, dst_addr: Address, net_idx: u16, app_idx: u16) -> Result<()> {
        self.send(model, Opcode::from(opcode::CTL_GET), dst_addr, net_idx, app_idx, Vec::new())
    }

    pub fn send_set(&self, model: ModelRef, dst_addr: Address, net_idx: u16, app_idx: u16, status: CtlStatus, tid: u8, ack: bool) -> Result<()> {
        let mut payload = status.encode();
        wire::push_u8(&mut payload, tid);
        let op = if ack { opcode::CTL_SET } else { opcode::CTL_SET_UNACK };
        self.send(model, Opcode::from(op), dst_addr, net_idx, app_idx, payload)
    }

    pub fn send_temperature_range_get(&self, model: ModelRef, dst_addr: Address, net_idx: u16, app_idx: u16) -> Result<()> {
        self.send(model, Opcode::from(opcode::CTL_TEMPERATURE_RANGE_GET), dst_addr, net_idx, app_idx, Vec::new())
    }

    fn send(&self, model: ModelRef, opcode: Opcode, dst_addr: Address, net_idx: u16, app_idx: u16, payload: Vec<u8>) -> Result<()> {
        let is_get = LightFamily::is_get_opcode(opcode);
        let transport = self.transport.clone();
        let buf = payload.clone();
        let send_fn = Arc::new(move |_: &[u8]| transport.plat_send_msg(model, opcode, dst_addr, net_idx, app_idx, is_get, &buf));
        self.registry.plat_send_msg(model, opcode, dst_addr, net_idx, app_idx, payload, send_fn)
    }
}

pub struct CtlServer {
    registry: Arc<ServerRegistry<LightFamily>>,
}

impl CtlServer {
    pub fn construct(bus: Arc<Bus>, transport: Arc<dyn ServerTransport>) -> Result<Arc<Self>> {
        let registry = ServerRegistry::<LightFamily>::new(bus, transport);
        registry.construct(model_id::CTL_SERVER, Arc::new(Self::handle_inbound))?;
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

        let mut decision = ServerDecision::default();
        let (status_op, status_payload) = match op {
            opcode::CTL_GET | opcode::CTL_SET | opcode::CTL_SET_UNACK => {
                let status = CtlStatus::decode(&event.payload).unwrap_or(CtlStatus { lightness: 0, temperature: 0 });
                (opcode::CTL_STATUS, status.encode())
            }
            opcode::CTL_TEMPERATURE_GET | opcode::CTL_TEMPERATURE_SET | opcode::CTL_TEMPERATURE_SET_UNACK => {
                let status =
                    CtlTemperatureStatus::decode(&event.payload).unwrap_or(CtlTemperatureStatus { temperature: 0, delta_uv: 0 });
                (opcode::CTL_TEMPERATURE_STATUS, status.encode())
            }
            opcode::CTL_DEFAULT_GET | opcode::CTL_DEFAULT_SET | opcode::CTL_DEFAULT_SET_UNACK => {
                let status = CtlDefaultStatus::decode(&event.payload).unwrap_or(CtlDefaultStatus {
                    lightness_def: 0,
                    temperature_def: 0,
                    delta_uv_def: 0,
                });
                (opcode::CTL_DEFAULT_STATUS, status.encode())
            }
            opcode::CTL_TEMPERATURE_RANGE_GET | opcode::CTL_TEMPERATURE_RANGE_SET | opcode::CTL_TEMPERATURE_RANGE_SET_UNACK => {
                let status = CtlTemperatureRangeStatus::decode(&event.payload).unwrap_or(CtlTemperatureRangeStatus {
                    status_code: 0,
                    range_min: 0,
                    range_max: 0,
                });
                (opcode::CTL_TEMPERATURE_RANGE_STATUS, status.encode())
            }
            _ => return Ok(decision),
        };

        let is_get = LightFamily::is_get_opcode(event.opcode);
        let is_unack = LightFamily::is_unack_opcode(event.opcode);
        if !is_get {
            decision.notify_state_change = Some(status_payload.clone());
        }
        if !is_unack {
            decision.status_reply = Some((Opcode::from(status_op), status_payload.clone()));
        }
        if event.ctx.src_addr != event.ctx.dst_addr {
            decision.publish_update = Some((Opcode::from(status_op), status_payload));
        }
        Ok(decision)
    }
}
