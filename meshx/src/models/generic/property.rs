//! Generic Property client/server, grounded on
//! `original_source/.../meshx_model_property.cpp`. That file only
//! instantiates the User Property sub-model (no Admin/Manufacturer/
//! Client Property adapter exists in the original), so this adapter
//! covers User Property only; `GenericFamily` still validates the
//! other three server model ids so a composition can register them,
//! they simply have no C4 adapter here.

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
pub struct PropertyClientElMsg {
    pub ctx: Ctx,
    pub model_id: ModelId,
    pub property_id: u16,
    pub value: Vec<u8>,
    pub timed_out: bool,
}

pub struct PropertyClient {
    registry: Arc<ClientRegistry<GenericFamily>>,
    transport: Arc<dyn ClientTransport>,
    bus: Arc<Bus>,
}

impl PropertyClient {
    pub fn construct(bus: Arc<Bus>, txcm: Arc<Txcm>, config: MeshxConfig, transport: Arc<dyn ClientTransport>) -> Result<Arc<Self>> {
        let registry = ClientRegistry::<GenericFamily>::new(bus.clone(), txcm, config);
        let adapter = Arc::new(Self { registry: registry.clone(), transport, bus: bus.clone() });
        let this = adapter.clone();
        registry.construct(model_id::PROPERTY_CLIENT, Arc::new(move |event: &ClientInboundEvent| this.handle_inbound(event)))?;
        Ok(adapter)
    }

    fn handle_inbound(&self, event: &ClientInboundEvent) -> Result<()> {
        let property_id = wire::read_u16(&event.payload, 0).unwrap_or(0);
        let value = event.payload.get(2..).map(|s| s.to_vec()).unwrap_or_default();
        self.bus.publish(
            Topic::ElStateCh,
            el_event::SET_PROPERTY,
            &PropertyClientElMsg { ctx: event.ctx, model_id: event.model_id, property_id, value, timed_out: event.timed_out },
        );
        Ok(())
    }

    pub fn send_get(&self, model: ModelRef, dst_addr: Address, net_idx: u16, app_idx: u16, property_id: u16) -> Result<()> {
        let mut payload = Vec::with_capacity(2);
        wire::push_u16(&mut payload, property_id);
        self.send(model, Opcode::from(opcode::USER_PROPERTY_GET), dst_addr, net_idx, app_idx, payload)
    }

    pub fn send_set(&self, model: ModelRef, dst_addr: Address, net_idx: u16, app_idx: u16, property_id: u16, value: &[u8], ack: bool) -> Result<()> {
        let mut payload = Vec::with_capacity(2 + value.len());
        wire::push_u16(&mut payload, property_id);
        payload.extend_from_slice(value);
        let op = if ack { opcode::USER_PROPERTY_SET } else { opcode::USER_PROPERTY_SET_UNACK };
        self.send(model, Opcode::from(op), dst_addr, net_idx, app_idx, payload)
    }

    pub fn send_list_get(&self, model: ModelRef, dst_addr: Address, net_idx: u16, app_idx: u16) -> Result<()> {
        self.send(model, Opcode::from(opcode::USER_PROPERTIES_GET), dst_addr, net_idx, app_idx, Vec::new())
    }

    fn send(&self, model: ModelRef, opcode: Opcode, dst_addr: Address, net_idx: u16, app_idx: u16, payload: Vec<u8>) -> Result<()> {
        let is_get = GenericFamily::is_get_opcode(opcode);
        let transport = self.transport.clone();
        let buf = payload.clone();
        let send_fn = Arc::new(move |_: &[u8]| transport.plat_send_msg(model, opcode, dst_addr, net_idx, app_idx, is_get, &buf));
        self.registry.plat_send_msg(model, opcode, dst_addr, net_idx, app_idx, payload, send_fn)
    }
}

pub struct PropertyServer {
    registry: Arc<ServerRegistry<GenericFamily>>,
}

impl PropertyServer {
    pub fn construct(bus: Arc<Bus>, transport: Arc<dyn ServerTransport>) -> Result<Arc<Self>> {
        let registry = ServerRegistry::<GenericFamily>::new(bus, transport);
        registry.construct(model_id::USER_PROPERTY_SERVER, Arc::new(Self::handle_inbound))?;
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
        if op == opcode::USER_PROPERTIES_GET {
            return Ok(decision);
        }

        if op == opcode::USER_PROPERTY_SET {
            decision.notify_state_change = Some(event.payload.clone());
            decision.status_reply = Some((Opcode::from(opcode::USER_PROPERTY_STATUS), event.payload.clone()));
        }
        if event.ctx.src_addr != event.ctx.dst_addr && op != opcode::USER_PROPERTY_GET {
            decision.publish_update = Some((Opcode::from(opcode::USER_PROPERTY_STATUS), event.payload.clone()));
        }
        Ok(decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_set_notifies_and_replies_status() {
        let mut payload = vec![0x01, 0x00];
        payload.extend_from_slice(&[0xAA, 0xBB]);
        let decision = PropertyServer::handle_inbound(&ServerInboundEvent {
            ctx: Ctx { src_addr: Address(0x0003), dst_addr: Address(0x0001), net_idx: 0, app_idx: 0, opcode: Opcode::from(opcode::USER_PROPERTY_SET), reply_handle: None },
            model_id: model_id::USER_PROPERTY_SERVER,
            opcode: Opcode::from(opcode::USER_PROPERTY_SET),
            payload: payload.clone(),
        })
        .unwrap();
        assert_eq!(decision.notify_state_change, Some(payload.clone()));
        let (status_op, status_payload) = decision.status_reply.unwrap();
        assert_eq!(status_op, Opcode::from(opcode::USER_PROPERTY_STATUS));
        assert_eq!(status_payload, payload);
    }

    #[test]
    fn server_list_get_produces_no_decision() {
        let decision = PropertyServer::handle_inbound(&ServerInboundEvent {
            ctx: Ctx { src_addr: Address(0x0003), dst_addr: Address(0x0001), net_idx: 0, app_idx: 0, opcode: Opcode::from(opcode::USER_PROPERTIES_GET), reply_handle: None },
            model_id: model_id::USER_PROPERTY_SERVER,
            opcode: Opcode::from(opcode::USER_PROPERTIES_GET),
            payload: Vec::new(),
        })
        .unwrap();
        assert!(decision.notify_state_change.is_none());
        assert!(decision.status_reply.is_none());
    }
}
