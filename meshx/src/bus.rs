//! Control Task message bus (C1).
//!
//! A process-local, in-memory publish/subscribe dispatcher. There is no
//! network layer here: `publish` synchronously invokes every callback
//! registered for `(topic, event_key)`, in registration order, and does
//! not return until all of them have.
//!
//! Event payloads are type-erased (`dyn Any`) rather than raw byte
//! buffers: each topic's publishers and subscribers agree out-of-band on
//! the concrete Rust type carried for that `(topic, event_key)` pair,
//! the same way the original's `void *param` is interpreted by
//! convention at each callback site. A callback subscribed for the wrong
//! type simply never fires for a mismatched publish instead of hard
//! erroring — construction-site agreement on types removes the
//! possibility of the original's raw-cast mistakes.

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::{MeshxError, Result};
use crate::types::ModelId;

/// Closed set of bus topics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Transport has delivered a mesh message. Event key = model id.
    FromBle,
    /// A reply/status the core wants the transport to send.
    ToBle,
    /// The core tells elements/apps that a tracked state has changed.
    ElStateCh,
    /// Internal signalling from TXCM back upward.
    Txcm,
}

/// Event key within a topic (a model id, or a small event-kind enum cast
/// to its discriminant).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventKey(pub u64);

impl From<ModelId> for EventKey {
    fn from(id: ModelId) -> Self {
        EventKey(id.raw() as u64)
    }
}

impl From<u32> for EventKey {
    fn from(v: u32) -> Self {
        EventKey(v as u64)
    }
}

impl From<u16> for EventKey {
    fn from(v: u16) -> Self {
        EventKey(v as u64)
    }
}

/// Token returned by [`Bus::subscribe`], required to [`Bus::unsubscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type BoxedCallback = Arc<dyn Fn(&(dyn Any + Send + Sync)) -> Result<()> + Send + Sync>;

struct Subscriber {
    id: SubscriptionId,
    callback: BoxedCallback,
}

/// The process-local pub/sub dispatcher.
pub struct Bus {
    subs: Mutex<HashMap<(Topic, EventKey), Vec<Subscriber>>>,
    next_id: AtomicU64,
}

impl Default for Bus {
    fn default() -> Self {
        Self::new()
    }
}

impl Bus {
    pub fn new() -> Self {
        Self {
            subs: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Subscribe `callback` to `(topic, key)`. `T` is the event payload
    /// type publishers on this `(topic, key)` are expected to use.
    ///
    /// Returns a token; hold onto it to later `unsubscribe`.
    pub fn subscribe<T, F>(&self, topic: Topic, key: impl Into<EventKey>, callback: F) -> SubscriptionId
    where
        T: Send + Sync + 'static,
        F: Fn(&T) -> Result<()> + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let wrapped: BoxedCallback = Arc::new(move |data: &(dyn Any + Send + Sync)| match data.downcast_ref::<T>() {
            Some(typed) => callback(typed),
            None => Ok(()),
        });

        let mut subs = self.subs.lock().expect("bus subscription lock poisoned");
        subs.entry((topic, key.into())).or_default().push(Subscriber { id, callback: wrapped });
        id
    }

    /// Remove a previously registered subscription.
    pub fn unsubscribe(&self, topic: Topic, key: impl Into<EventKey>, id: SubscriptionId) -> Result<()> {
        let mut subs = self.subs.lock().expect("bus subscription lock poisoned");
        match subs.get_mut(&(topic, key.into())) {
            Some(list) => {
                let before = list.len();
                list.retain(|s| s.id != id);
                if list.len() == before {
                    Err(MeshxError::NotFound)
                } else {
                    Ok(())
                }
            }
            None => Err(MeshxError::NotFound),
        }
    }

    /// Synchronously invoke every callback registered for `(topic, key)`,
    /// in registration order. Succeeds even if no callback matches.
    ///
    /// A callback's own error is logged and does not prevent the next
    /// callback in the list from running (this is the core's chosen
    /// resolution of the spec's two conflicting error-policy statements;
    /// see DESIGN.md).
    pub fn publish<T>(&self, topic: Topic, key: impl Into<EventKey>, data: &T)
    where
        T: Send + Sync + 'static,
    {
        let key = key.into();
        let callbacks: Vec<BoxedCallback> = {
            let subs = self.subs.lock().expect("bus subscription lock poisoned");
            match subs.get(&(topic, key)) {
                Some(list) => list.iter().map(|s| s.callback.clone()).collect(),
                None => return,
            }
        };

        let erased: &(dyn Any + Send + Sync) = data;
        for callback in callbacks {
            if let Err(err) = callback(erased) {
                log::warn!("bus callback for {:?}/{:?} returned an error: {err}", topic, key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[test]
    fn publish_invokes_matching_callbacks_in_order() {
        let bus = Bus::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let o1 = order.clone();
        bus.subscribe::<u32, _>(Topic::ElStateCh, 1u32, move |v| {
            o1.lock().unwrap().push((1, *v));
            Ok(())
        });
        let o2 = order.clone();
        bus.subscribe::<u32, _>(Topic::ElStateCh, 1u32, move |v| {
            o2.lock().unwrap().push((2, *v));
            Ok(())
        });

        bus.publish(Topic::ElStateCh, 1u32, &42u32);

        assert_eq!(*order.lock().unwrap(), vec![(1, 42), (2, 42)]);
    }

    #[test]
    fn publish_with_no_subscribers_succeeds() {
        let bus = Bus::new();
        bus.publish(Topic::FromBle, 7u32, &"unused");
    }

    #[test]
    fn unsubscribe_stops_future_delivery() {
        let bus = Bus::new();
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let id = bus.subscribe::<u32, _>(Topic::Txcm, 0u32, move |_| {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        bus.publish(Topic::Txcm, 0u32, &1u32);
        bus.unsubscribe(Topic::Txcm, 0u32, id).unwrap();
        bus.publish(Topic::Txcm, 0u32, &1u32);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unsubscribe_of_unknown_id_returns_not_found() {
        let bus = Bus::new();
        bus.subscribe::<u32, _>(Topic::Txcm, 0u32, |_| Ok(()));
        let bogus = SubscriptionId(99999);
        assert_eq!(bus.unsubscribe(Topic::Txcm, 0u32, bogus), Err(MeshxError::NotFound));
    }

    #[test]
    fn mismatched_event_type_is_silently_skipped() {
        let bus = Bus::new();
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        bus.subscribe::<u32, _>(Topic::ElStateCh, 3u32, move |_| {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        // Same (topic, key) but published with a different concrete type.
        bus.publish(Topic::ElStateCh, 3u32, &"not a u32".to_string());

        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
