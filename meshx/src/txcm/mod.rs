//! Transmit Control Module (C2): a single background worker that owns a
//! [`queue::TxQueue`] and serializes all outbound, potentially-retried
//! sends through it.
//!
//! Mirrors the original's `meshx_txcm_task_handler` driven by a signal
//! queue (`meshx_txcm_sig_enq_send` / `_direct_send` / `_resend` /
//! `_ack`): here the signal queue is a bounded [`mpsc::SyncSender`], and
//! the worker does a plain blocking receive — same as the original's
//! `meshx_msg_q_recv(&sig_queue, &request, UINT32_MAX)`. TXCM itself
//! never times anything out; a RESEND is always a signal sent in from
//! the outside (here, [`Txcm::resend`]) the same way ENQ_SEND, DIRECT_SEND
//! and ACK are.
//!
//! The distinction the original draws between the signal queue (bounded,
//! returns a synchronous failure to the caller when full) and the Txcm
//! item queue (the `TxQueue`, whose overflow is only ever logged inside
//! the worker) is preserved: [`Txcm::request_send`] can fail with
//! [`MeshxError::NoMem`] only because the *signal* channel is full;
//! a full `TxQueue` is never surfaced to the caller.

pub mod queue;

use std::sync::mpsc::{self, SyncSender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::bus::{Bus, Topic};
use crate::config::MeshxConfig;
use crate::error::{MeshxError, Result};
use crate::types::{Address, Ctx, ModelId};

pub use queue::{FrontTrySendOutcome, MsgState, MsgType, SendFn, SentItem, TxItem, TxQueue};

/// Event key published on [`Topic::Txcm`] when a message's retry budget
/// is exhausted without an ACK.
pub const EVT_MSG_TIMEOUT: u32 = 1;

/// Event key published on [`Topic::Txcm`] immediately after an item has
/// been handed to its `send_fn` (useful for `ut`-style tracing).
pub const EVT_MSG_SENT: u32 = 2;

/// A message whose retry budget was exhausted. Published as the payload
/// of [`EVT_MSG_TIMEOUT`]; also reused (with `exhausted = false`) for
/// [`EVT_MSG_SENT`] tracing.
#[derive(Debug, Clone)]
pub struct MsgTimeout {
    pub dest_addr: Address,
    pub model_id: ModelId,
    pub ctx: Ctx,
}

enum Signal {
    EnqSend(TxItem),
    DirectSend(TxItem),
    Resend,
    Ack(Address),
    Shutdown,
}

/// The threaded Txcm facade. Owns a worker thread for the lifetime of
/// the value; dropping it signals the worker to exit and joins it.
pub struct Txcm {
    sender: SyncSender<Signal>,
    worker: Option<JoinHandle<()>>,
}

impl Txcm {
    /// Spin up the worker thread and its bounded signal channel.
    ///
    /// `bus` receives [`EVT_MSG_TIMEOUT`] notifications on [`Topic::Txcm`]
    /// as the worker observes them; this is the Rust equivalent of the
    /// original's `meshx_txcm_event_cb_reg`.
    pub fn init(config: MeshxConfig, bus: Arc<Bus>) -> Self {
        let (tx, rx) = mpsc::sync_channel::<Signal>(config.txcm_queue_depth);
        let queue_depth = config.txcm_queue_depth;

        let worker = thread::Builder::new()
            .name("meshx-txcm".into())
            .spawn(move || {
                let mut queue = TxQueue::new(queue_depth);
                loop {
                    match rx.recv() {
                        Ok(Signal::EnqSend(item)) | Ok(Signal::DirectSend(item)) => {
                            // ENQ_SEND and DIRECT_SEND share the identical
                            // dedup/enqueue/front-try-send(false) path
                            // (spec.md §4.2); `front_try_send` already
                            // skips requeuing an `Unacked` item, which is
                            // what makes DIRECT_SEND not wait for an ACK.
                            if queue.contains(item.dest_addr, &item.payload) {
                                log::debug!("txcm: dropping duplicate send to {}", item.dest_addr);
                                continue;
                            }
                            if let Err(err) = queue.enqueue(item) {
                                log::warn!("txcm: item queue full, dropping enqueued send: {err}");
                                continue;
                            }
                            Self::drive(&mut queue, false, &bus);
                        }
                        Ok(Signal::Resend) => Self::drive(&mut queue, true, &bus),
                        Ok(Signal::Ack(addr)) => {
                            if queue.take_if_dest_matches(addr).is_some() {
                                Self::drive(&mut queue, false, &bus);
                            } else {
                                log::debug!("txcm: ack from {addr} does not match head, dropped");
                            }
                        }
                        Ok(Signal::Shutdown) => break,
                        Err(_) => break,
                    }
                }
            })
            .expect("failed to spawn meshx-txcm worker thread");

        Self { sender: tx, worker: Some(worker) }
    }

    /// Run `front_try_send`, publishing `EVT_MSG_SENT`/`EVT_MSG_TIMEOUT`
    /// for the observable outcome and re-arming the next head if the
    /// current one just timed out.
    fn drive(queue: &mut TxQueue, resend: bool, bus: &Bus) {
        match queue.front_try_send(resend) {
            Ok(FrontTrySendOutcome::Sent(sent)) => {
                bus.publish(
                    Topic::Txcm,
                    EVT_MSG_SENT,
                    &MsgTimeout { dest_addr: sent.dest_addr, model_id: sent.model_id, ctx: sent.ctx },
                );
            }
            Ok(FrontTrySendOutcome::TimedOut(exhausted)) => {
                bus.publish(
                    Topic::Txcm,
                    EVT_MSG_TIMEOUT,
                    &MsgTimeout { dest_addr: exhausted.dest_addr, model_id: exhausted.model_id, ctx: exhausted.ctx },
                );
                Self::drive(queue, false, bus);
            }
            Ok(FrontTrySendOutcome::Idle) => {}
            Err(err) => log::warn!("txcm: send_fn failed: {err}"),
        }
    }

    /// Enqueue a message to be sent (and, if ACKed, retried until ACK or
    /// retry-budget exhaustion). Fails with [`MeshxError::NoMem`] only
    /// when the signal channel itself is full — a request the worker
    /// hasn't even looked at yet.
    pub fn request_send(&self, item: TxItem) -> Result<()> {
        self.sender
            .try_send(Signal::EnqSend(item))
            .map_err(|_| MeshxError::NoMem)
    }

    /// Send an UNACKED message (spec.md §4.2: "same as ENQ_SEND but
    /// msg_type=UNACKED"). Goes through the identical dedup/enqueue/
    /// front-try-send path as [`Self::request_send`]; the only difference
    /// is that `front_try_send` never requeues an `Unacked` item waiting
    /// for an ACK, so it never blocks behind one.
    pub fn direct_send(&self, item: TxItem) -> Result<()> {
        self.sender
            .try_send(Signal::DirectSend(item))
            .map_err(|_| MeshxError::NoMem)
    }

    /// Notify the worker that an ACK arrived from `dest_addr`.
    pub fn ack(&self, dest_addr: Address) -> Result<()> {
        self.sender
            .try_send(Signal::Ack(dest_addr))
            .map_err(|_| MeshxError::NoMem)
    }

    /// Force a retry of the current head, as if its ACK wait had expired.
    /// Mirrors the original's `meshx_txcm_sig_resend`, which is itself
    /// only ever posted from outside TXCM — by the transport reporting a
    /// timeout/error on the in-flight message (spec.md §4.3.1), never by a
    /// clock TXCM owns itself.
    pub fn resend(&self) -> Result<()> {
        self.sender.try_send(Signal::Resend).map_err(|_| MeshxError::NoMem)
    }
}

impl Drop for Txcm {
    fn drop(&mut self) {
        let _ = self.sender.try_send(Signal::Shutdown);
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    fn config() -> MeshxConfig {
        MeshxConfig {
            txcm_queue_depth: 4,
            txcm_max_payload: 64,
            txcm_max_retry: 2,
            txcm_ack_timeout: Duration::from_millis(200),
        }
    }

    fn recording_send_fn(record: Arc<Mutex<Vec<Vec<u8>>>>) -> SendFn {
        Arc::new(move |payload: &[u8]| {
            record.lock().unwrap().push(payload.to_vec());
            Ok(())
        })
    }

    #[test]
    fn acked_message_is_sent_and_cleared_on_ack() {
        let bus = Arc::new(Bus::new());
        let txcm = Txcm::init(config(), bus);
        let record = Arc::new(Mutex::new(Vec::new()));

        txcm.request_send(TxItem {
            dest_addr: Address(0x0003),
            model_id: ModelId::new(0x1001),
            ctx: Ctx::default(),
            retry_count: 2,
            msg_state: MsgState::New,
            msg_type: MsgType::Acked,
            send_fn: recording_send_fn(record.clone()),
            payload: vec![1, 2, 3],
        })
        .unwrap();

        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(record.lock().unwrap().len(), 1);

        txcm.ack(Address(0x0003)).unwrap();
        std::thread::sleep(Duration::from_millis(50));
        // No further retries after ack.
        assert_eq!(record.lock().unwrap().len(), 1);
    }

    #[test]
    fn worker_never_resends_on_its_own() {
        // spec.md §5: the worker's only suspension point is the blocking
        // signal-queue read. Nothing it owns ever fires a retry by itself
        // — a resend only happens if something calls `Txcm::resend`.
        let bus = Arc::new(Bus::new());
        let seen_timeout = Arc::new(AtomicUsize::new(0));
        let st = seen_timeout.clone();
        bus.subscribe::<MsgTimeout, _>(Topic::Txcm, EVT_MSG_TIMEOUT, move |_| {
            st.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let txcm = Txcm::init(config(), bus);
        let record = Arc::new(Mutex::new(Vec::new()));

        txcm.request_send(TxItem {
            dest_addr: Address(0x0005),
            model_id: ModelId::new(0x1001),
            ctx: Ctx::default(),
            retry_count: 1,
            msg_state: MsgState::New,
            msg_type: MsgType::Acked,
            send_fn: recording_send_fn(record.clone()),
            payload: vec![9],
        })
        .unwrap();

        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(record.lock().unwrap().len(), 1);

        // Still just the one attempt well after any historical ack-timeout
        // would have fired.
        std::thread::sleep(Duration::from_millis(200));
        assert_eq!(record.lock().unwrap().len(), 1);
        assert_eq!(seen_timeout.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn explicit_resend_retries_until_retry_budget_is_exhausted() {
        let bus = Arc::new(Bus::new());
        let seen_timeout = Arc::new(AtomicUsize::new(0));
        let st = seen_timeout.clone();
        bus.subscribe::<MsgTimeout, _>(Topic::Txcm, EVT_MSG_TIMEOUT, move |_| {
            st.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let txcm = Txcm::init(config(), bus);
        let record = Arc::new(Mutex::new(Vec::new()));

        txcm.request_send(TxItem {
            dest_addr: Address(0x0005),
            model_id: ModelId::new(0x1001),
            ctx: Ctx::default(),
            retry_count: 1,
            msg_state: MsgState::New,
            msg_type: MsgType::Acked,
            send_fn: recording_send_fn(record.clone()),
            payload: vec![9],
        })
        .unwrap();
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(record.lock().unwrap().len(), 1);

        // retry_count = 1 -> one retry is allowed before the budget runs out.
        txcm.resend().unwrap();
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(record.lock().unwrap().len(), 2);
        assert_eq!(seen_timeout.load(Ordering::SeqCst), 0);

        txcm.resend().unwrap();
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(record.lock().unwrap().len(), 2);
        assert_eq!(seen_timeout.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn direct_send_reaches_the_transport_without_waiting_for_an_ack() {
        let bus = Arc::new(Bus::new());
        let txcm = Txcm::init(config(), bus);
        let record = Arc::new(Mutex::new(Vec::new()));

        txcm.direct_send(TxItem {
            dest_addr: Address(0xC001),
            model_id: ModelId::new(0x1001),
            ctx: Ctx::default(),
            retry_count: 0,
            msg_state: MsgState::New,
            msg_type: MsgType::Unacked,
            send_fn: recording_send_fn(record.clone()),
            payload: vec![7],
        })
        .unwrap();

        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(record.lock().unwrap().len(), 1);
    }

    #[test]
    fn direct_send_dedupes_against_a_matching_message_already_in_flight() {
        let bus = Arc::new(Bus::new());
        let txcm = Txcm::init(config(), bus);
        let record = Arc::new(Mutex::new(Vec::new()));

        // An ACKED send stays WAITING_ACK (still "in the queue") until acked.
        txcm.request_send(TxItem {
            dest_addr: Address(0x0009),
            model_id: ModelId::new(0x1001),
            ctx: Ctx::default(),
            retry_count: 2,
            msg_state: MsgState::New,
            msg_type: MsgType::Acked,
            send_fn: recording_send_fn(record.clone()),
            payload: vec![4, 2],
        })
        .unwrap();
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(record.lock().unwrap().len(), 1);

        // A DIRECT_SEND for the identical (dest_addr, payload) must dedupe
        // the same way an ENQ_SEND would (spec.md §3/§9), not fire again.
        txcm.direct_send(TxItem {
            dest_addr: Address(0x0009),
            model_id: ModelId::new(0x1001),
            ctx: Ctx::default(),
            retry_count: 0,
            msg_state: MsgState::New,
            msg_type: MsgType::Unacked,
            send_fn: recording_send_fn(record.clone()),
            payload: vec![4, 2],
        })
        .unwrap();
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(record.lock().unwrap().len(), 1);
    }

    #[test]
    fn direct_send_queues_behind_an_in_flight_waiting_ack_item() {
        let bus = Arc::new(Bus::new());
        let txcm = Txcm::init(config(), bus);
        let record = Arc::new(Mutex::new(Vec::new()));

        txcm.request_send(TxItem {
            dest_addr: Address(0x0001),
            model_id: ModelId::new(0x1001),
            ctx: Ctx::default(),
            retry_count: 2,
            msg_state: MsgState::New,
            msg_type: MsgType::Acked,
            send_fn: recording_send_fn(record.clone()),
            payload: vec![1],
        })
        .unwrap();
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(record.lock().unwrap().len(), 1);

        txcm.direct_send(TxItem {
            dest_addr: Address(0x0002),
            model_id: ModelId::new(0x1001),
            ctx: Ctx::default(),
            retry_count: 0,
            msg_state: MsgState::New,
            msg_type: MsgType::Unacked,
            send_fn: recording_send_fn(record.clone()),
            payload: vec![2],
        })
        .unwrap();

        std::thread::sleep(Duration::from_millis(30));
        // Only one item may be SENDING/WAITING_ACK at a time (spec.md §3):
        // the direct send queues behind the still-unacked head instead of
        // firing out of order.
        assert_eq!(record.lock().unwrap().len(), 1);

        txcm.ack(Address(0x0001)).unwrap();
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(record.lock().unwrap().len(), 2);
    }
}
