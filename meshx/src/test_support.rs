//! Host-only test plumbing: an in-memory transport stub and a
//! deterministic clock, so TXCM/model-registry behaviour can be
//! exercised without real time or a real radio (SPEC_FULL.md's Test
//! tooling section).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::error::Result;
use crate::platform::Clock;
use crate::transport::{ClientTransport, ServerTransport};
use crate::types::{Address, Ctx, ModelRef, Opcode};

/// Records every outbound call a model registry makes through
/// [`ClientTransport`]/[`ServerTransport`], so a test can assert on
/// exactly what was sent without a real mesh stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentClientMsg {
    pub model: ModelRef,
    pub opcode: Opcode,
    pub dst_addr: Address,
    pub is_get: bool,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentServerMsg {
    pub model: ModelRef,
    pub opcode: Opcode,
    pub dst_addr: Address,
    pub payload: Vec<u8>,
}

#[derive(Default)]
pub struct StubTransport {
    pub client_sent: Mutex<Vec<SentClientMsg>>,
    pub server_sent: Mutex<Vec<SentServerMsg>>,
    pub group_subscriptions: Mutex<Vec<Address>>,
    pub fail_next_send: std::sync::atomic::AtomicBool,
}

impl StubTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe_group(&self, addr: Address) {
        self.group_subscriptions.lock().expect("stub transport lock poisoned").push(addr);
    }
}

impl ClientTransport for StubTransport {
    fn plat_send_msg(
        &self,
        model: ModelRef,
        opcode: Opcode,
        dst_addr: Address,
        _net_idx: u16,
        _app_idx: u16,
        is_get: bool,
        payload: &[u8],
    ) -> Result<()> {
        if self.fail_next_send.swap(false, Ordering::SeqCst) {
            return Err(crate::error::MeshxError::Platform("stub send failure".into()));
        }
        self.client_sent
            .lock()
            .expect("stub transport lock poisoned")
            .push(SentClientMsg { model, opcode, dst_addr, is_get, payload: payload.to_vec() });
        Ok(())
    }
}

impl ServerTransport for StubTransport {
    fn plat_server_model_send(&self, model: ModelRef, ctx: &Ctx, opcode: Opcode, payload: &[u8]) -> Result<()> {
        self.server_sent
            .lock()
            .expect("stub transport lock poisoned")
            .push(SentServerMsg { model, opcode, dst_addr: ctx.dst_addr, payload: payload.to_vec() });
        Ok(())
    }

    fn plat_is_group_subscribed(&self, _model: ModelRef, addr: Address) -> bool {
        self.group_subscriptions.lock().expect("stub transport lock poisoned").contains(&addr)
    }
}

/// A clock whose `now()` is whatever the test last set it to via
/// [`ManualClock::advance`] — no relation to wall-clock time.
#[derive(Default)]
pub struct ManualClock {
    micros: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, delta: core::time::Duration) {
        self.micros.fetch_add(delta.as_micros() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> core::time::Duration {
        core::time::Duration::from_micros(self.micros.load(Ordering::SeqCst))
    }
}
