//! The bounded, single-in-flight Txcm item queue and its front-try-send
//! algorithm (spec.md §3, §4.2), isolated from threading so it can be
//! driven synchronously in tests.
//!
//! This is a direct, de-macro'd port of the original's
//! `meshx_tx_queue_*` ring buffer plus `meshx_txcm_msg_q_front_try_send`:
//! same invariants (single in-flight item, dequeue-then-maybe-requeue),
//! same dedup-by-bytewise-payload-and-dest-addr search, same retry
//! decrement-before-send accounting. The ring buffer itself becomes a
//! `VecDeque` — the original's fixed head/tail/count bookkeeping is an
//! implementation detail `VecDeque` already gets right.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::error::{MeshxError, Result};
use crate::types::{Address, Ctx, ModelId};

/// State of a single queued item (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MsgState {
    New,
    Sending,
    WaitingAck,
    Ack,
    Nack,
}

/// Whether a queued item expects an ACK.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MsgType {
    Acked,
    Unacked,
}

/// A callable that hands a payload to the transport. Consumes one retry
/// attempt whether it succeeds or fails.
pub type SendFn = Arc<dyn Fn(&[u8]) -> Result<()> + Send + Sync>;

/// An outbound request waiting in (or passing through) the queue.
#[derive(Clone)]
pub struct TxItem {
    pub dest_addr: Address,
    /// The client model this request originated from, carried through so
    /// a terminal timeout can be attributed to the right family/app
    /// callback (spec.md §4.2's `msg_param` carrying `{model_id, param}`).
    pub model_id: ModelId,
    /// Originating context, echoed back to the app on timeout so it sees
    /// the same `(src_addr, dst_addr, opcode)` it sent with.
    pub ctx: Ctx,
    pub retry_count: i32,
    pub msg_state: MsgState,
    pub msg_type: MsgType,
    pub send_fn: SendFn,
    pub payload: Vec<u8>,
}

impl std::fmt::Debug for TxItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TxItem")
            .field("dest_addr", &self.dest_addr)
            .field("retry_count", &self.retry_count)
            .field("msg_state", &self.msg_state)
            .field("msg_type", &self.msg_type)
            .field("payload_len", &self.payload.len())
            .finish()
    }
}

/// Identity of a just-sent item, carried out of [`FrontTrySendOutcome::Sent`]
/// so the caller can publish an accurate notification without re-peeking
/// the queue (an `Unacked` item is not requeued, so by the time control
/// returns to the caller the head may already be a different item, or the
/// queue may be empty).
#[derive(Debug, Clone, Copy)]
pub struct SentItem {
    pub dest_addr: Address,
    pub model_id: ModelId,
    pub ctx: Ctx,
}

/// Outcome of a [`TxQueue::front_try_send`] call.
#[derive(Debug)]
pub enum FrontTrySendOutcome {
    /// Nothing needed to be done (not a resend, head already waiting).
    Idle,
    /// The head was sent and, if ACKED, is now waiting for an ACK.
    Sent(SentItem),
    /// Retry budget for the head was exhausted; the item was discarded.
    /// Carries the discarded item so the caller can attribute a
    /// notification to the right model/ctx.
    TimedOut(Box<TxItem>),
}

impl PartialEq for FrontTrySendOutcome {
    fn eq(&self, other: &Self) -> bool {
        matches!(
            (self, other),
            (Self::Idle, Self::Idle) | (Self::Sent(_), Self::Sent(_)) | (Self::TimedOut(_), Self::TimedOut(_))
        )
    }
}
impl Eq for FrontTrySendOutcome {}

/// The bounded circular queue of in-flight / pending Txcm items.
pub struct TxQueue {
    items: VecDeque<TxItem>,
    capacity: usize,
}

impl TxQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn is_full(&self) -> bool {
        self.items.len() >= self.capacity
    }

    /// Dedup scan: does an item with identical `(dest_addr, payload)`
    /// already reside in the queue? Net/app key indices are deliberately
    /// excluded from the comparison (see spec.md §9's open point: the
    /// encoded payload already carries them).
    pub fn contains(&self, dest_addr: Address, payload: &[u8]) -> bool {
        self.items.iter().any(|it| it.dest_addr == dest_addr && it.payload == payload)
    }

    /// Enqueue at the tail. Fails with `NoMem` if the queue is full.
    pub fn enqueue(&mut self, item: TxItem) -> Result<()> {
        if self.is_full() {
            return Err(MeshxError::NoMem);
        }
        self.items.push_back(item);
        Ok(())
    }

    /// Enqueue at the front (used to requeue the in-flight item while it
    /// waits for an ACK). A full queue here is a programming error: it
    /// can only happen if `MAX_RETRY + 1 > capacity`.
    fn enqueue_front(&mut self, item: TxItem) -> Result<()> {
        if self.is_full() {
            return Err(MeshxError::NoMem);
        }
        self.items.push_front(item);
        Ok(())
    }

    /// Remove and return the head.
    pub fn dequeue(&mut self) -> Option<TxItem> {
        self.items.pop_front()
    }

    /// Inspect the head without removing it.
    pub fn peek(&self) -> Option<&TxItem> {
        self.items.front()
    }

    /// Dequeue the head if its `dest_addr` matches; otherwise leave the
    /// queue unchanged (an out-of-order ACK is dropped, not applied).
    pub fn take_if_dest_matches(&mut self, dest_addr: Address) -> Option<TxItem> {
        match self.peek() {
            Some(item) if item.dest_addr == dest_addr => self.dequeue(),
            _ => None,
        }
    }

    /// The front-try-send algorithm (spec.md §4.2).
    ///
    /// `resend = false`: only proceeds if the head is `New` (a just-enqueued
    /// item); otherwise a no-op (the head is still `WaitingAck`).
    /// `resend = true`: always proceeds against the current head (the
    /// item being retried).
    pub fn front_try_send(&mut self, resend: bool) -> Result<FrontTrySendOutcome> {
        if !resend {
            match self.peek() {
                Some(item) if item.msg_state == MsgState::New => {}
                _ => return Ok(FrontTrySendOutcome::Idle),
            }
        }

        let mut front = match self.dequeue() {
            Some(item) => item,
            None => return Ok(FrontTrySendOutcome::Idle),
        };

        front.retry_count -= 1;
        if front.retry_count < 0 {
            front.msg_state = MsgState::Nack;
            return Ok(FrontTrySendOutcome::TimedOut(Box::new(front)));
        }

        front.msg_state = MsgState::Sending;
        if let Err(err) = (front.send_fn)(&front.payload) {
            front.msg_state = MsgState::Nack;
            return Err(err);
        }

        let sent = SentItem { dest_addr: front.dest_addr, model_id: front.model_id, ctx: front.ctx };
        if front.msg_type == MsgType::Acked {
            front.msg_state = MsgState::WaitingAck;
            self.enqueue_front(front)?;
        }

        Ok(FrontTrySendOutcome::Sent(sent))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_send_fn(counter: Arc<AtomicUsize>) -> SendFn {
        Arc::new(move |_payload: &[u8]| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    fn failing_send_fn() -> SendFn {
        Arc::new(|_| Err(MeshxError::Platform("nope".into())))
    }

    fn item(dest: u16, payload: &[u8], retry: i32, msg_type: MsgType, send_fn: SendFn) -> TxItem {
        TxItem {
            dest_addr: Address(dest),
            model_id: ModelId::new(0x1001),
            ctx: Ctx::default(),
            retry_count: retry,
            msg_state: MsgState::New,
            msg_type,
            send_fn,
            payload: payload.to_vec(),
        }
    }

    #[test]
    fn s1_happy_path_acked() {
        let mut q = TxQueue::new(10);
        let sends = Arc::new(AtomicUsize::new(0));
        q.enqueue(item(3, b"A", 3, MsgType::Acked, counting_send_fn(sends.clone()))).unwrap();

        let outcome = q.front_try_send(false).unwrap();
        assert!(matches!(outcome, FrontTrySendOutcome::Sent(_)));
        assert_eq!(sends.load(Ordering::SeqCst), 1);
        assert_eq!(q.len(), 1);
        assert_eq!(q.peek().unwrap().msg_state, MsgState::WaitingAck);

        let acked = q.take_if_dest_matches(Address(3)).unwrap();
        assert_eq!(acked.dest_addr, Address(3));
        assert!(q.is_empty());
    }

    #[test]
    fn s2_dedupe_keeps_queue_length_one() {
        let mut q = TxQueue::new(10);
        let sends = Arc::new(AtomicUsize::new(0));

        if !q.contains(Address(3), b"A") {
            q.enqueue(item(3, b"A", 3, MsgType::Acked, counting_send_fn(sends.clone()))).unwrap();
        }
        q.front_try_send(false).unwrap();

        if !q.contains(Address(3), b"A") {
            q.enqueue(item(3, b"A", 3, MsgType::Acked, counting_send_fn(sends.clone()))).unwrap();
        }

        assert_eq!(q.len(), 1);
        assert_eq!(sends.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn s3_retry_then_timeout_after_max_retry() {
        let mut q = TxQueue::new(10);
        let sends = Arc::new(AtomicUsize::new(0));
        // retry_count = MAX_RETRY = 2 -> three attempts total before timeout.
        q.enqueue(item(3, b"A", 2, MsgType::Acked, counting_send_fn(sends.clone()))).unwrap();

        assert!(matches!(q.front_try_send(false).unwrap(), FrontTrySendOutcome::Sent(_)));
        assert!(matches!(q.front_try_send(true).unwrap(), FrontTrySendOutcome::Sent(_)));
        assert!(matches!(q.front_try_send(true).unwrap(), FrontTrySendOutcome::Sent(_)));
        assert!(matches!(q.front_try_send(true).unwrap(), FrontTrySendOutcome::TimedOut(_)));

        assert_eq!(sends.load(Ordering::SeqCst), 3);
        assert!(q.is_empty());
    }

    #[test]
    fn s4_unack_direct_send_leaves_queue_empty() {
        let mut q = TxQueue::new(10);
        let sends = Arc::new(AtomicUsize::new(0));
        q.enqueue(item(3, b"B", 3, MsgType::Unacked, counting_send_fn(sends.clone()))).unwrap();

        assert!(matches!(q.front_try_send(false).unwrap(), FrontTrySendOutcome::Sent(_)));
        assert_eq!(sends.load(Ordering::SeqCst), 1);
        assert!(q.is_empty());
    }

    #[test]
    fn s6_out_of_order_ack_is_dropped() {
        let mut q = TxQueue::new(10);
        let sends = Arc::new(AtomicUsize::new(0));
        q.enqueue(item(3, b"A", 3, MsgType::Acked, counting_send_fn(sends.clone()))).unwrap();
        q.front_try_send(false).unwrap();

        let dropped = q.take_if_dest_matches(Address(7));
        assert!(dropped.is_none());
        assert_eq!(q.len(), 1);
        assert_eq!(q.peek().unwrap().dest_addr, Address(3));
    }

    #[test]
    fn queue_full_on_enqueue_returns_no_mem() {
        let mut q = TxQueue::new(1);
        let sends = Arc::new(AtomicUsize::new(0));
        q.enqueue(item(1, b"A", 3, MsgType::Acked, counting_send_fn(sends.clone()))).unwrap();
        let err = q.enqueue(item(2, b"B", 3, MsgType::Acked, counting_send_fn(sends))).unwrap_err();
        assert_eq!(err, MeshxError::NoMem);
    }

    #[test]
    fn max_retry_zero_sends_once_then_times_out() {
        let mut q = TxQueue::new(10);
        let sends = Arc::new(AtomicUsize::new(0));
        q.enqueue(item(1, b"A", 0, MsgType::Acked, counting_send_fn(sends.clone()))).unwrap();

        assert!(matches!(q.front_try_send(false).unwrap(), FrontTrySendOutcome::Sent(_)));
        assert!(matches!(q.front_try_send(true).unwrap(), FrontTrySendOutcome::TimedOut(_)));
        assert_eq!(sends.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn send_failure_is_one_consumed_attempt_and_nacks() {
        let mut q = TxQueue::new(10);
        q.enqueue(item(1, b"A", 3, MsgType::Acked, failing_send_fn())).unwrap();

        let err = q.front_try_send(false).unwrap_err();
        assert_eq!(err, MeshxError::Platform("nope".into()));
        assert!(q.is_empty());
    }
}
