//! Generic Level client/server (model ids `0x1003`/`0x1002`), grounded
//! on `original_source/.../meshx_model_level.cpp`.

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

#[derive(Debug, Clone)]
pub struct LevelClientElMsg {
    pub ctx: Ctx,
    pub model_id: ModelId,
    pub level: i16,
    pub timed_out: bool,
}

pub struct LevelClient {
    registry: Arc<ClientRegistry<GenericFamily>>,
    transport: Arc<dyn ClientTransport>,
    bus: Arc<Bus>,
}

impl LevelClient {
    pub fn construct(bus: Arc<Bus>, txcm: Arc<Txcm>, config: MeshxConfig, transport: Arc<dyn ClientTransport>) -> Result<Arc<Self>> {
        let registry = ClientRegistry::<GenericFamily>::new(bus.clone(), txcm, config);
        let adapter = Arc::new(Self { registry: registry.clone(), transport, bus: bus.clone() });
        let this = adapter.clone();
        registry.construct(model_id::LEVEL_CLIENT, Arc::new(move |event: &ClientInboundEvent| this.handle_inbound(event)))?;
        Ok(adapter)
    }

    fn handle_inbound(&self, event: &ClientInboundEvent) -> Result<()> {
        let level = wire::read_u16(&event.payload, 0).unwrap_or(0) as i16;
        self.bus.publish(
            Topic::ElStateCh,
            el_event::SET_LEVEL,
            &LevelClientElMsg { ctx: event.ctx, model_id: event.model_id, level, timed_out: event.timed_out },
        );
        Ok(())
    }

    pub fn send_get(&self, model: ModelRef, dst_addr: Address, net_idx: u16, app_idx: u16) -> Result<()> {
        self.send(model, Opcode::from(opcode::LEVEL_GET), dst_addr, net_idx, app_idx, Vec::new())
    }

    pub fn send_set(&self, model: ModelRef, dst_addr: Address, net_idx: u16, app_idx: u16, level: i16, tid: u8, ack: bool) -> Result<()> {
        let mut payload = Vec::with_capacity(3);
        wire::push_u16(&mut payload, level as u16);
        wire::push_u8(&mut payload, tid);
        let op = if ack { opcode::LEVEL_SET } else { opcode::LEVEL_SET_UNACK };
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

pub struct LevelServer {
    registry: Arc<ServerRegistry<GenericFamily>>,
}

impl LevelServer {
    pub fn construct(bus: Arc<Bus>, transport: Arc<dyn ServerTransport>) -> Result<Arc<Self>> {
        let registry = ServerRegistry::<GenericFamily>::new(bus, transport);
        registry.construct(model_id::LEVEL_SERVER, Arc::new(Self::handle_inbound))?;
        Ok(Arc::new(Self { registry }))
    }

    pub fn registry(&self) -> &Arc<ServerRegistry<GenericFamily>> {
        &self.registry
    }

    fn handle_inbound(event: &ServerInboundEvent) -> Result<ServerDecision> {
        let op = event.opcode.raw() as u16;
        if op == opcode::LEVEL_STATUS {
            return Ok(ServerDecision::default());
        }

        let level = wire::read_u16(&event.payload, 0).unwrap_or(0);
        let mut status_payload = Vec::with_capacity(2);
        wire::push_u16(&mut status_payload, level);

        let mut decision = ServerDecision::default();
        if op != opcode::LEVEL_GET {
            decision.notify_state_change = Some(status_payload.clone());
        }
        if op == opcode::LEVEL_SET {
            decision.status_reply = Some((Opcode::from(opcode::LEVEL_STATUS), status_payload.clone()));
        }
        if event.ctx.src_addr != event.ctx.dst_addr {
            decision.publish_update = Some((Opcode::from(opcode::LEVEL_STATUS), status_payload));
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

    #[test]
    fn client_get_sends_no_payload() {
        let bus = Arc::new(Bus::new());
        let config = MeshxConfig { txcm_queue_depth: 4, txcm_max_payload: 64, txcm_max_retry: 2, txcm_ack_timeout: Duration::from_millis(200) };
        let txcm = Arc::new(Txcm::init(config, bus.clone()));
        let transport = Arc::new(StubTransport::new());
        let client = LevelClient::construct(bus, txcm, config, transport.clone()).unwrap();

        let model = ModelRef { element_index: 0, model_id: model_id::LEVEL_CLIENT, pub_addr: Address(0x0001), transport_handle: TransportHandle(1) };
        client.send_get(model, Address(0x0003), 0, 0).unwrap();

        std::thread::sleep(Duration::from_millis(50));
        let sent = transport.client_sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].is_get);
        assert!(sent[0].payload.is_empty());
    }

    #[test]
    fn server_status_reply_encodes_level_le() {
        let decision = LevelServer::handle_inbound(&ServerInboundEvent {
            ctx: Ctx { src_addr: Address(0x0003), dst_addr: Address(0x0001), net_idx: 0, app_idx: 0, opcode: Opcode::from(opcode::LEVEL_SET), reply_handle: None },
            model_id: model_id::LEVEL_SERVER,
            opcode: Opcode::from(opcode::LEVEL_SET),
            payload: vec![0x34, 0x12],
        })
        .unwrap();

        let (status_op, payload) = decision.status_reply.unwrap();
        assert_eq!(status_op, Opcode::from(opcode::LEVEL_STATUS));
        assert_eq!(payload, vec![0x34, 0x12]);
    }
}
