//! Generic Power OnOff and Generic Power Level client/server, grounded on
//! `original_source/.../meshx_model_power_onoff.cpp` and
//! `.../meshx_model_power_level.cpp`. Combined in one file since both
//! models share the same "on power up" / range-and-default shape and
//! the original keeps their CRTP instantiations side by side too.

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

/// `OnPowerUp` state, per Mesh Model spec: 0 = off, 1 = default, 2 = restore.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OnPowerUp(pub u8);

#[derive(Debug, Clone)]
pub struct PowerOnOffClientElMsg {
    pub ctx: Ctx,
    pub model_id: ModelId,
    pub on_power_up: OnPowerUp,
    pub timed_out: bool,
}

pub struct PowerOnOffClient {
    registry: Arc<ClientRegistry<GenericFamily>>,
    transport: Arc<dyn ClientTransport>,
    bus: Arc<Bus>,
}

impl PowerOnOffClient {
    pub fn construct(bus: Arc<Bus>, txcm: Arc<Txcm>, config: MeshxConfig, transport: Arc<dyn ClientTransport>) -> Result<Arc<Self>> {
        let registry = ClientRegistry::<GenericFamily>::new(bus.clone(), txcm, config);
        let adapter = Arc::new(Self { registry: registry.clone(), transport, bus: bus.clone() });
        let this = adapter.clone();
        registry.construct(model_id::POWER_ONOFF_CLIENT, Arc::new(move |event: &ClientInboundEvent| this.handle_inbound(event)))?;
        Ok(adapter)
    }

    fn handle_inbound(&self, event: &ClientInboundEvent) -> Result<()> {
        let on_power_up = OnPowerUp(wire::read_u8(&event.payload, 0).unwrap_or(0));
        self.bus.publish(
            Topic::ElStateCh,
            el_event::SET_POWER_ONOFF,
            &PowerOnOffClientElMsg { ctx: event.ctx, model_id: event.model_id, on_power_up, timed_out: event.timed_out },
        );
        Ok(())
    }

    pub fn send_get(&self, model: ModelRef, dst_addr: Address, net_idx: u16, app_idx: u16) -> Result<()> {
        self.send(model, Opcode::from(opcode::ON_POWER_UP_GET), dst_addr, net_idx, app_idx, Vec::new())
    }

    pub fn send_set(&self, model: ModelRef, dst_addr: Address, net_idx: u16, app_idx: u16, on_power_up: OnPowerUp, ack: bool) -> Result<()> {
        let payload = vec![on_power_up.0];
        let op = if ack { opcode::ON_POWER_UP_SET } else { opcode::ON_POWER_UP_SET_UNACK };
        self.send(model, Opcode::from(op), dst_addr, net_idx, app_idx, payload)
    }

    fn send(&self, model: ModelRef, opcode: Opcode, dst_addr: Address, net_idx: u16, app_idx: u16, payload: Vec<u8>) -> Result<()> {
        let is_get = GenericFamily::is_get_opcode(opcode);
        let transport = self.transport.clone();
        let buf = payload.clone();
        let send_fn = Arc::new(move |_: &[u8]| transport.plat_send_msg(model, opcode, dst_addr, net_idx, app_idx, is_get, &buf));
        self.registry.plat_send_msg(model, opcode, dst_addr, net_idx, app_idx, payload, send_fn)
    }
}

pub struct PowerOnOffServer {
    registry: Arc<ServerRegistry<GenericFamily>>,
}

impl PowerOnOffServer {
    pub fn construct(bus: Arc<Bus>, transport: Arc<dyn ServerTransport>) -> Result<Arc<Self>> {
        let registry = ServerRegistry::<GenericFamily>::new(bus, transport);
        registry.construct(model_id::POWER_ONOFF_SERVER, Arc::new(Self::handle_inbound))?;
        Ok(Arc::new(Self { registry }))
    }

    pub fn registry(&self) -> &Arc<ServerRegistry<GenericFamily>> {
        &self.registry
    }

    fn handle_inbound(event: &ServerInboundEvent) -> Result<ServerDecision> {
        let op = event.opcode.raw() as u16;
        if op == opcode::ON_POWER_UP_STATUS {
            return Ok(ServerDecision::default());
        }

        let value = wire::read_u8(&event.payload, 0).unwrap_or(0);
        let status_payload = vec![value];

        let mut decision = ServerDecision::default();
        if op != opcode::ON_POWER_UP_GET {
            decision.notify_state_change = Some(status_payload.clone());
        }
        if op == opcode::ON_POWER_UP_SET {
            decision.status_reply = Some((Opcode::from(opcode::ON_POWER_UP_STATUS), status_payload.clone()));
        }
        if event.ctx.src_addr != event.ctx.dst_addr {
            decision.publish_update = Some((Opcode::from(opcode::ON_POWER_UP_STATUS), status_payload));
        }
        Ok(decision)
    }
}

/// Published on `EL_STATE_CH/SET_POWER_LEVEL`; carries whichever of the
/// four sub-states (actual/last/default/range) the inbound STATUS was
/// for, mirroring the original's single `power_level_cli_el_msg_t`
/// union keyed by opcode.
#[derive(Debug, Clone)]
pub struct PowerLevelClientElMsg {
    pub ctx: Ctx,
    pub model_id: ModelId,
    pub opcode: Opcode,
    pub payload: Vec<u8>,
    pub timed_out: bool,
}

pub struct PowerLevelClient {
    registry: Arc<ClientRegistry<GenericFamily>>,
    transport: Arc<dyn ClientTransport>,
    bus: Arc<Bus>,
}

impl PowerLevelClient {
    pub fn construct(bus: Arc<Bus>, txcm: Arc<Txcm>, config: MeshxConfig, transport: Arc<dyn ClientTransport>) -> Result<Arc<Self>> {
        let registry = ClientRegistry::<GenericFamily>::new(bus.clone(), txcm, config);
        let adapter = Arc::new(Self { registry: registry.clone(), transport, bus: bus.clone() });
        let this = adapter.clone();
        registry.construct(model_id::POWER_LEVEL_CLIENT, Arc::new(move |event: &ClientInboundEvent| this.handle_inbound(event)))?;
        Ok(adapter)
    }

    fn handle_inbound(&self, event: &ClientInboundEvent) -> Result<()> {
        self.bus.publish(
            Topic::ElStateCh,
            el_event::SET_POWER_LEVEL,
            &PowerLevelClientElMsg {
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
        self.send(model, Opcode::from(opcode::POWER_LEVEL_GET), dst_addr, net_idx, app_idx, Vec::new())
    }

    pub fn send_set(&self, model: ModelRef, dst_addr: Address, net_idx: u16, app_idx: u16, power: u16, tid: u8, ack: bool) -> Result<()> {
        let mut payload = Vec::with_capacity(3);
        wire::push_u16(&mut payload, power);
        wire::push_u8(&mut payload, tid);
        let op = if ack { opcode::POWER_LEVEL_SET } else { opcode::POWER_LEVEL_SET_UNACK };
        self.send(model, Opcode::from(op), dst_addr, net_idx, app_idx, payload)
    }

    pub fn send_default_get(&self, model: ModelRef, dst_addr: Address, net_idx: u16, app_idx: u16) -> Result<()> {
        self.send(model, Opcode::from(opcode::POWER_LEVEL_DEFAULT_GET), dst_addr, net_idx, app_idx, Vec::new())
    }

    pub fn send_range_get(&self, model: ModelRef, dst_addr: Address, net_idx: u16, app_idx: u16) -> Result<()> {
        self.send(model, Opcode::from(opcode::POWER_LEVEL_RANGE_GET), dst_addr, net_idx, app_idx, Vec::new())
    }

    fn send(&self, model: ModelRef, opcode: Opcode, dst_addr: Address, net_idx: u16, app_idx: u16, payload: Vec<u8>) -> Result<()> {
        let is_get = GenericFamily::is_get_opcode(opcode);
        let transport = self.transport.clone();
        let buf = payload.clone();
        let send_fn = Arc::new(move |_: &[u8]| transport.plat_send_msg(model, opcode, dst_addr, net_idx, app_idx, is_get, &buf));
        self.registry.plat_send_msg(model, opcode, dst_addr, net_idx, app_idx, payload, send_fn)
    }
}

pub struct PowerLevelServer {
    registry: Arc<ServerRegistry<GenericFamily>>,
}

impl PowerLevelServer {
    pub fn construct(bus: Arc<Bus>, transport: Arc<dyn ServerTransport>) -> Result<Arc<Self>> {
        let registry = ServerRegistry::<GenericFamily>::new(bus, transport);
        registry.construct(model_id::POWER_LEVEL_SERVER, Arc::new(Self::handle_inbound))?;
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

        let power = wire::read_u16(&event.payload, 0).unwrap_or(0);
        let mut status_payload = Vec::with_capacity(2);
        wire::push_u16(&mut status_payload, power);

        let mut decision = ServerDecision::default();
        if op != opcode::POWER_LEVEL_GET {
            decision.notify_state_change = Some(status_payload.clone());
        }
        if op == opcode::POWER_LEVEL_SET {
            decision.status_reply = Some((Opcode::from(opcode::POWER_LEVEL_STATUS), status_payload.clone()));
        }
        if event.ctx.src_addr != event.ctx.dst_addr {
            decision.publish_update = Some((Opcode::from(opcode::POWER_LEVEL_STATUS), status_payload));
        }
        Ok(decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::StubTransport;
    use crate::types::TransportHandle;
    use std::time::Duration;

    fn config() -> MeshxConfig {
        MeshxConfig { txcm_queue_depth: 4, txcm_max_payload: 64, txcm_max_retry: 2, txcm_ack_timeout: Duration::from_millis(200) }
    }

    #[test]
    fn power_onoff_client_set_ack_sends_single_byte() {
        let bus = Arc::new(Bus::new());
        let txcm = Arc::new(Txcm::init(config(), bus.clone()));
        let transport = Arc::new(StubTransport::new());
        let client = PowerOnOffClient::construct(bus, txcm, config(), transport.clone()).unwrap();

        let model = ModelRef { element_index: 0, model_id: model_id::POWER_ONOFF_CLIENT, pub_addr: Address(0x0001), transport_handle: TransportHandle(1) };
        client.send_set(model, Address(0x0003), 0, 0, OnPowerUp(2), true).unwrap();

        std::thread::sleep(Duration::from_millis(50));
        let sent = transport.client_sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].payload, vec![2]);
        assert_eq!(sent[0].opcode, Opcode::from(opcode::ON_POWER_UP_SET));
    }

    #[test]
    fn power_level_server_get_never_replies() {
        let decision = PowerLevelServer::handle_inbound(&ServerInboundEvent {
            ctx: Ctx { src_addr: Address(0x0003), dst_addr: Address(0x0001), net_idx: 0, app_idx: 0, opcode: Opcode::from(opcode::POWER_LEVEL_GET), reply_handle: None },
            model_id: model_id::POWER_LEVEL_SERVER,
            opcode: Opcode::from(opcode::POWER_LEVEL_GET),
            payload: Vec::new(),
        })
        .unwrap();
        assert!(decision.status_reply.is_none());
        assert!(decision.notify_state_change.is_none());
    }
}
