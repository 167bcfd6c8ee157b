//! Generic server model registry (spec.md §4.3.2), parameterized over a
//! [`ModelFamily`] the same way [`super::client::ClientRegistry`] is.

use std::sync::{Arc, Mutex};

use crate::bus::{Bus, SubscriptionId, Topic};
use crate::error::{MeshxError, Result};
use crate::transport::ServerTransport;
use crate::types::{Address, Ctx, ModelId, ModelRef, Opcode};

use super::family::ModelFamily;

/// Event published on `EL_STATE_CH` when a server observes an inbound
/// SET that the owning element/application should act on.
#[derive(Debug, Clone)]
pub struct ElStateChangeEvent {
    pub ctx: Ctx,
    pub model_id: ModelId,
    pub payload: Vec<u8>,
}

/// Inbound message handed to a server's application callback.
#[derive(Debug, Clone)]
pub struct ServerInboundEvent {
    pub ctx: Ctx,
    pub model_id: ModelId,
    pub opcode: Opcode,
    pub payload: Vec<u8>,
}

/// A server callback decides, per-message, whether the event merits an
/// `EL_STATE_CH` notification and/or a STATUS reply; it returns the
/// reply payload (if any) so [`ServerRegistry`] can route it.
pub type ServerCallback =
    Arc<dyn Fn(&ServerInboundEvent) -> Result<ServerDecision> + Send + Sync>;

/// What the server adapter decided to do with an inbound message.
#[derive(Debug, Clone, Default)]
pub struct ServerDecision {
    /// Notify the owning element/application of a state change.
    pub notify_state_change: Option<Vec<u8>>,
    /// Send a STATUS reply with this payload, to `reply_addr` (usually
    /// the inbound source) using `reply_opcode`.
    pub status_reply: Option<(Opcode, Vec<u8>)>,
    /// Publish a status update to the model's configured publish address
    /// (spec.md §4.3.2: only when the inbound source differs from it).
    pub publish_update: Option<(Opcode, Vec<u8>)>,
}

struct Entry {
    model_id: ModelId,
    callback: ServerCallback,
}

/// Server-side model registry for one family.
pub struct ServerRegistry<F: ModelFamily> {
    bus: Arc<Bus>,
    transport: Arc<dyn ServerTransport>,
    entries: Mutex<Vec<Entry>>,
    subscriptions: Mutex<Vec<(ModelId, SubscriptionId)>>,
    model_init_done: std::sync::Once,
    _family: std::marker::PhantomData<F>,
}

impl<F: ModelFamily> ServerRegistry<F> {
    pub fn new(bus: Arc<Bus>, transport: Arc<dyn ServerTransport>) -> Arc<Self> {
        Arc::new(Self {
            bus,
            transport,
            entries: Mutex::new(Vec::new()),
            subscriptions: Mutex::new(Vec::new()),
            model_init_done: std::sync::Once::new(),
            _family: std::marker::PhantomData,
        })
    }

    pub fn construct(self: &Arc<Self>, model_id: ModelId, callback: ServerCallback) -> Result<()> {
        if !F::validate_server_model_id(model_id) {
            return Err(MeshxError::NotSupported);
        }

        let mut init_result = Ok(());
        self.model_init_done.call_once(|| {
            init_result = F::plat_model_init();
        });
        init_result?;

        self.entries.lock().expect("server registry lock poisoned").insert(0, Entry { model_id, callback });

        let mut subscriptions = self.subscriptions.lock().expect("server registry lock poisoned");
        if !subscriptions.iter().any(|(id, _)| *id == model_id) {
            let this = self.clone();
            let sub_id = self.bus.subscribe::<ServerInboundEvent, _>(Topic::FromBle, model_id, move |event| {
                this.dispatch_from_ble(event)
            });
            subscriptions.push((model_id, sub_id));
        }

        Ok(())
    }

    pub fn destruct(self: &Arc<Self>) {
        let mut subscriptions = self.subscriptions.lock().expect("server registry lock poisoned");
        for (model_id, sub_id) in subscriptions.drain(..) {
            if let Err(err) = self.bus.unsubscribe(Topic::FromBle, model_id, sub_id) {
                log::warn!("server registry: unsubscribe for {model_id} failed: {err}");
            }
        }
    }

    /// Find `model` among this registry's entries and route `payload` to
    /// the transport. Concrete adapters call this after building the
    /// status payload layout for their model (spec.md §4.4, §6.3).
    pub fn plat_send_msg(&self, model: ModelRef, opcode: Opcode, ctx: &Ctx, payload: &[u8]) -> Result<()> {
        if !F::is_status_opcode(opcode) {
            return Err(MeshxError::NotSupported);
        }
        self.transport.plat_server_model_send(model, ctx, opcode, payload)
    }

    fn dispatch_from_ble(&self, event: &ServerInboundEvent) -> Result<()> {
        let entries = self.entries.lock().expect("server registry lock poisoned");
        for entry in entries.iter().filter(|e| e.model_id == event.model_id) {
            match (entry.callback)(event) {
                Ok(decision) => self.apply_decision(event, decision),
                Err(err) => log::warn!("server registry: app callback for {} returned an error: {err}", event.model_id),
            }
        }
        Ok(())
    }

    /// Address-class gate for `EL_STATE_CH` notification (spec.md
    /// §4.3.2): unicast or a subscribed group destination always
    /// notifies; broadcast notifies only for a qualifying SET (the
    /// caller's `notify_state_change` already encodes that judgment —
    /// this only screens out a non-subscribed group destination).
    fn should_notify(&self, model_id: ModelId, ctx: &Ctx) -> bool {
        if ctx.dst_addr.is_unicast() || ctx.dst_addr.is_broadcast() {
            return true;
        }
        if ctx.dst_addr.is_group() {
            let model = ModelRef { element_index: 0, model_id, pub_addr: Address::UNASSIGNED, transport_handle: crate::types::TransportHandle(0) };
            return self.transport.plat_is_group_subscribed(model, ctx.dst_addr);
        }
        false
    }

    fn apply_decision(&self, event: &ServerInboundEvent, decision: ServerDecision) {
        if let Some(payload) = decision.notify_state_change {
            if self.should_notify(event.model_id, &event.ctx) {
                self.bus.publish(
                    Topic::ElStateCh,
                    event.model_id,
                    &ElStateChangeEvent { ctx: event.ctx, model_id: event.model_id, payload },
                );
            }
        }

        if let Some((opcode, payload)) = decision.status_reply {
            let model = ModelRef {
                element_index: 0,
                model_id: event.model_id,
                pub_addr: Address::UNASSIGNED,
                transport_handle: event.ctx.reply_handle.unwrap_or(crate::types::TransportHandle(0)),
            };
            if let Err(err) = self.plat_send_msg(model, opcode, &event.ctx, &payload) {
                log::warn!("server registry: status reply for {} failed: {err}", event.model_id);
            }
        }

        if let Some((opcode, payload)) = decision.publish_update {
            let model = ModelRef {
                element_index: 0,
                model_id: event.model_id,
                pub_addr: event.ctx.dst_addr,
                transport_handle: crate::types::TransportHandle(0),
            };
            // Publish only when the source that triggered this wasn't
            // already the publish address (spec.md §4.3.2).
            if event.ctx.src_addr != model.pub_addr {
                let publish_ctx = Ctx { dst_addr: model.pub_addr, ..event.ctx };
                if let Err(err) = self.plat_send_msg(model, opcode, &publish_ctx, &payload) {
                    log::warn!("server registry: publish update for {} failed: {err}", event.model_id);
                }
            }
        }
    }
}
