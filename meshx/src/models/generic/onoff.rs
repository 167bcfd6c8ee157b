//! Generic OnOff client/server (model ids `0x1001`/`0x1000`), grounded on
//! `original_source/.../meshx_onoff_client.c` and
//! `.../gen_onoff_server/meshx_onoff_server.c`.

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

/// Published on `EL_STATE_CH/SET_ON_OFF` by the client adapter, mirroring
/// the original's `meshx_on_off_cli_el_msg_t`.
#[derive(Debug, Clone)]
pub struct OnOffClientElMsg {
    pub ctx: Ctx,
    pub model_id: ModelId,
    pub on_off: bool,
    pub timed_out: bool,
}

/// Thin client adapter binding [`ClientRegistry<GenericFamily>`] to the
/// Generic OnOff opcode set.
pub struct OnOffClient {
    registry: Arc<ClientRegistry<GenericFamily>>,
    transport: Arc<dyn ClientTransport>,
    bus: Arc<Bus>,
}

impl OnOffClient {
    pub fn construct(bus: Arc<Bus>, txcm: Arc<Txcm>, config: MeshxConfig, transport: Arc<dyn ClientTransport>) -> Result<Arc<Self>> {
        let registry = ClientRegistry::<GenericFamily>::new(bus.clone(), txcm, config);
        let adapter = Arc::new(Self { registry: registry.clone(), transport, bus: bus.clone() });

        let this = adapter.clone();
        registry.construct(
            model_id::ONOFF_CLIENT,
            Arc::new(move |event: &ClientInboundEvent| this.handle_inbound(event)),
        )?;
        Ok(adapter)
    }

    fn handle_inbound(&self, event: &ClientInboundEvent) -> Result<()> {
        let on_off = wire::read_u8(&event.payload, 0).map(|b| b != 0).unwrap_or(false);
        self.bus.publish(
            Topic::ElStateCh,
            el_event::SET_ON_OFF,
            &OnOffClientElMsg { ctx: event.ctx, model_id: event.model_id, on_off, timed_out: event.timed_out },
        );
        Ok(())
    }

    /// Send a GET, or a SET/SET_UNACK for `on_off`, per spec.md §4.3.1's
    /// send dispatch policy (the registry itself decides DIRECT_SEND vs
    /// ENQ_SEND based on opcode/destination).
    pub fn send_get(&self, model: ModelRef, dst_addr: Address, net_idx: u16, app_idx: u16) -> Result<()> {
        self.send(model, Opcode::from(opcode::ONOFF_GET), dst_addr, net_idx, app_idx, Vec::new())
    }

    pub fn send_set(&self, model: ModelRef, dst_addr: Address, net_idx: u16, app_idx: u16, on: bool, tid: u8, ack: bool) -> Result<()> {
        let mut payload = Vec::with_capacity(2);
        wire::push_u8(&mut payload, on as u8);
        wire::push_u8(&mut payload, tid);
        let op = if ack { opcode::ONOFF_SET } else { opcode::ONOFF_SET_UNACK };
        self.send(model, Opcode::from(op), dst_addr, net_idx, app_idx, payload)
    }

    fn send(&self, model: ModelRef, opcode: Opcode, dst_addr: Address, net_idx: u16, app_idx: u16, payload: Vec<u8>) -> Result<()> {
        let is_get = GenericFamily::is_get_opcode(opcode);
        let transport = self.transport.clone();
        let send_fn_payload = payload.clone();
        let send_fn = Arc::new(move |_: &[u8]| {
            transport.plat_send_msg(model, opcode, dst_addr, net_idx, app_idx, is_get, &send_fn_payload)
        });
        self.registry.plat_send_msg(model, opcode, dst_addr, net_idx, app_idx, payload, send_fn)
    }
}

/// Published when the server decides to notify the element of a new
/// OnOff state (spec.md §4.3.2).
#[derive(Debug, Clone)]
pub struct OnOffServerElMsg {
    pub ctx: Ctx,
    pub model_id: ModelId,
    pub on_off: bool,
}

pub struct OnOffServer {
    registry: Arc<ServerRegistry<GenericFamily>>,
}

impl OnOffServer {
    pub fn construct(bus: Arc<Bus>, transport: Arc<dyn ServerTransport>) -> Result<Arc<Self>> {
        let registry = ServerRegistry::<GenericFamily>::new(bus, transport);
        registry.construct(model_id::ONOFF_SERVER, Arc::new(Self::handle_inbound))?;
        Ok(Arc::new(Self { registry }))
    }

    pub fn registry(&self) -> &Arc<ServerRegistry<GenericFamily>> {
        &self.registry
    }

    fn handle_inbound(event: &ServerInboundEvent) -> Result<ServerDecision> {
        let op = event.opcode.raw() as u16;
        if op == opcode::ONOFF_STATUS {
            // Inbound status echoes are ignored by a server (spec.md
            // §4.3.2 never expects a server to act on a STATUS).
            return Ok(ServerDecision::default());
        }

        let on_off = wire::read_u8(&event.payload, 0).map(|b| b != 0).unwrap_or(false);
        let mut status_payload = Vec::with_capacity(1);
        wire::push_u8(&mut status_payload, on_off as u8);

        let mut decision = ServerDecision::default();
        if op != opcode::ONOFF_GET {
            decision.notify_state_change = Some(status_payload.clone());
        }
        if op == opcode::ONOFF_SET {
            decision.status_reply = Some((Opcode::from(opcode::ONOFF_STATUS), status_payload.clone()));
        }
        if event.ctx.src_addr != event.ctx.dst_addr {
            decision.publish_update = Some((Opcode::from(opcode::ONOFF_STATUS), status_payload));
        }
        Ok(decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::family::ModelFamily;
    use crate::test_support::StubTransport;
    use crate::types::TransportHandle;
    use std::sync::Mutex;
    use std::time::Duration;

    fn config() -> MeshxConfig {
        MeshxConfig { txcm_queue_depth: 4, txcm_max_payload: 64, txcm_max_retry: 3, txcm_ack_timeout: Duration::from_millis(200) }
    }

    #[test]
    fn client_set_unack_sends_on_off_and_tid() {
        let bus = Arc::new(Bus::new());
        let txcm = Arc::new(Txcm::init(config(), bus.clone()));
        let transport = Arc::new(StubTransport::new());
        let client = OnOffClient::construct(bus, txcm, config(), transport.clone()).unwrap();

        let model = ModelRef { element_index: 0, model_id: model_id::ONOFF_CLIENT, pub_addr: Address(0x0001), transport_handle: TransportHandle(1) };
        client.send_set(model, Address(0x0003), 0, 0, true, 7, false).unwrap();

        std::thread::sleep(Duration::from_millis(50));
        let sent = transport.client_sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].payload, vec![1, 7]);
        assert_eq!(sent[0].opcode, Opcode::from(opcode::ONOFF_SET_UNACK));
    }

    #[test]
    fn server_set_notifies_and_replies_status() {
        let bus = Arc::new(Bus::new());
        let transport = Arc::new(StubTransport::new());
        let server = OnOffServer::construct(bus.clone(), transport.clone()).unwrap();
        let _ = &server;

        let notified = Arc::new(Mutex::new(Vec::new()));
        let n = notified.clone();
        bus.subscribe::<crate::model::server::ElStateChangeEvent, _>(Topic::ElStateCh, model_id::ONOFF_SERVER, move |evt| {
            n.lock().unwrap().push(evt.clone());
            Ok(())
        });

        let ctx = Ctx {
            src_addr: Address(0x0003),
            dst_addr: Address(0x0001),
            net_idx: 0,
            app_idx: 0,
            opcode: Opcode::from(opcode::ONOFF_SET),
            reply_handle: None,
        };
        bus.publish(
            Topic::FromBle,
            model_id::ONOFF_SERVER,
            &ServerInboundEvent { ctx, model_id: model_id::ONOFF_SERVER, opcode: ctx.opcode, payload: vec![1] },
        );

        assert_eq!(notified.lock().unwrap().len(), 1);
        assert_eq!(notified.lock().unwrap()[0].payload, vec![1]);

        let sent = transport.server_sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].opcode, Opcode::from(opcode::ONOFF_STATUS));
    }

    #[test]
    fn send_set_rejects_oversized_payload() {
        let bus = Arc::new(Bus::new());
        let small_config = MeshxConfig { txcm_max_payload: 1, ..config() };
        let txcm = Arc::new(Txcm::init(small_config, bus.clone()));
        let transport = Arc::new(StubTransport::new());
        let client = OnOffClient::construct(bus, txcm, small_config, transport.clone()).unwrap();

        let model = ModelRef { element_index: 0, model_id: model_id::ONOFF_CLIENT, pub_addr: Address(0x0001), transport_handle: TransportHandle(1) };
        // on_off + tid = 2 bytes, exceeding the 1-byte max configured above.
        let err = client.send_set(model, Address(0x0003), 0, 0, true, 7, false).unwrap_err();
        assert_eq!(err, crate::error::MeshxError::InvalidArg);

        std::thread::sleep(Duration::from_millis(20));
        assert!(transport.client_sent.lock().unwrap().is_empty());
    }

    #[test]
    fn family_classifies_onoff_opcodes() {
        assert!(GenericFamily::is_get_opcode(Opcode::from(opcode::ONOFF_GET)));
        assert!(GenericFamily::is_unack_opcode(Opcode::from(opcode::ONOFF_SET_UNACK)));
        assert!(!GenericFamily::is_unack_opcode(Opcode::from(opcode::ONOFF_SET)));
        assert!(GenericFamily::is_status_opcode(Opcode::from(opcode::ONOFF_STATUS)));
    }
}
