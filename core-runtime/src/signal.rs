//! # Signal/Slot Dispatch
//!
//! A [`Signal`] is a named in-process multicast channel. Components expose
//! signals as public fields and other components connect receivers to them.
//! This keeps the playlist, player, library and server decoupled: none of
//! them holds a back-pointer to the others, every coupling goes through a
//! signal.
//!
//! ## Receivers
//!
//! - **Strong** receivers are closures kept alive by the signal itself.
//! - **Method** receivers pair a `Weak<T>` with a plain `fn(&Arc<T>, A)`.
//!   When the last `Arc<T>` is dropped the receiver is considered dead and is
//!   pruned on the next emit.
//!
//! ## Delivery
//!
//! ```text
//!                        ┌──────────────┐
//!  emit(args) ──────────>│    Signal    │
//!                        └──────┬───────┘
//!              Direct           │           Queued
//!        ┌──────────────────────┴──────────────────────┐
//!        v                                             v
//!  receiver(args)                           ┌────────────────────┐
//!  (inline, same thread)                    │ SlotQueue (FIFO)   │
//!                                           └─────────┬──────────┘
//!                                                     v
//!                                           worker task on the runtime
//!                                           that called `install()`
//! ```
//!
//! Direct receivers run inline in emit order. Queued receivers are appended
//! to a [`SlotQueue`] and executed one by one by its worker, preserving FIFO
//! order across every signal sharing that queue. When no worker is installed
//! a queued call is dropped with a warning.
//!
//! A panicking receiver is logged and the remaining receivers still run.
//! Emission works on a snapshot of the receiver list, so receivers may
//! connect or disconnect (including themselves) while an emit is in flight.
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::signal::{Delivery, Signal};
//! use std::sync::Arc;
//!
//! struct Counter(std::sync::atomic::AtomicUsize);
//!
//! impl Counter {
//!     fn on_tick(self: &Arc<Self>, step: usize) {
//!         self.0.fetch_add(step, std::sync::atomic::Ordering::SeqCst);
//!     }
//! }
//!
//! let ticked: Signal<usize> = Signal::new("clock.ticked");
//! let counter = Arc::new(Counter(Default::default()));
//! ticked.connect_method(&counter, Counter::on_tick, Delivery::Direct);
//! ticked.emit(2);
//! assert_eq!(counter.0.load(std::sync::atomic::Ordering::SeqCst), 2);
//! ```

use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

// ============================================================================
// Slot identity
// ============================================================================

/// Identity of a connected receiver, used to disconnect it later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotKey(KeyRepr);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum KeyRepr {
    Closure(u64),
    Method { object: usize, func: usize },
}

impl SlotKey {
    fn method<T>(object: &Arc<T>, func: usize) -> Self {
        SlotKey(KeyRepr::Method {
            object: Arc::as_ptr(object) as *const () as usize,
            func,
        })
    }
}

// ============================================================================
// Queued delivery
// ============================================================================

type QueuedCall = Box<dyn FnOnce() + Send>;

/// FIFO of receiver invocations drained by a single worker task.
///
/// Cloning a `SlotQueue` yields another handle to the same queue. The queue
/// is inert until [`install`](SlotQueue::install) spawns its worker.
#[derive(Clone, Default)]
pub struct SlotQueue {
    sender: Arc<RwLock<Option<mpsc::UnboundedSender<QueuedCall>>>>,
}

impl SlotQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn the worker on the current tokio runtime.
    ///
    /// Must be called from within a runtime context. Installing again replaces
    /// the previous worker, which finishes the calls already queued to it.
    pub fn install(&self) -> JoinHandle<()> {
        let (tx, mut rx) = mpsc::unbounded_channel::<QueuedCall>();
        *self.sender.write() = Some(tx);
        tokio::spawn(async move {
            while let Some(call) = rx.recv().await {
                if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(call)) {
                    error!(
                        panic = %panic_message(&payload),
                        "Queued signal receiver panicked"
                    );
                }
            }
            debug!("Signal queue worker stopped");
        })
    }

    /// Stop accepting calls. The worker exits once the backlog is drained.
    pub fn teardown(&self) {
        self.sender.write().take();
    }

    pub fn is_installed(&self) -> bool {
        self.sender.read().is_some()
    }

    fn push(&self, call: QueuedCall) -> bool {
        match self.sender.read().as_ref() {
            Some(tx) => tx.send(call).is_ok(),
            None => false,
        }
    }
}

impl fmt::Debug for SlotQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotQueue")
            .field("installed", &self.is_installed())
            .finish()
    }
}

/// How a receiver is invoked when the signal fires.
#[derive(Clone, Debug, Default)]
pub enum Delivery {
    /// Call inline from `emit`.
    #[default]
    Direct,
    /// Defer to the worker of the given queue.
    Queued(SlotQueue),
}

impl Delivery {
    pub fn queued(queue: &SlotQueue) -> Self {
        Delivery::Queued(queue.clone())
    }
}

// ============================================================================
// Receivers
// ============================================================================

trait MethodReceiver<A>: Send + Sync {
    /// Invoke the method if the object is alive; returns whether it was.
    fn call(&self, args: A) -> bool;
    fn is_alive(&self) -> bool;
}

struct WeakMethod<T, A> {
    object: Weak<T>,
    func: fn(&Arc<T>, A),
}

impl<T, A> MethodReceiver<A> for WeakMethod<T, A>
where
    T: Send + Sync + 'static,
    A: 'static,
{
    fn call(&self, args: A) -> bool {
        match self.object.upgrade() {
            Some(object) => {
                (self.func)(&object, args);
                true
            }
            None => false,
        }
    }

    fn is_alive(&self) -> bool {
        self.object.strong_count() > 0
    }
}

enum Receiver<A> {
    Strong(Arc<dyn Fn(A) + Send + Sync>),
    Method(Arc<dyn MethodReceiver<A>>),
}

impl<A> Clone for Receiver<A> {
    fn clone(&self) -> Self {
        match self {
            Receiver::Strong(f) => Receiver::Strong(Arc::clone(f)),
            Receiver::Method(m) => Receiver::Method(Arc::clone(m)),
        }
    }
}

impl<A> Receiver<A> {
    fn is_alive(&self) -> bool {
        match self {
            Receiver::Strong(_) => true,
            Receiver::Method(m) => m.is_alive(),
        }
    }

    fn call(&self, args: A) -> bool {
        match self {
            Receiver::Strong(f) => {
                f(args);
                true
            }
            Receiver::Method(m) => m.call(args),
        }
    }
}

struct Slot<A> {
    key: SlotKey,
    receiver: Receiver<A>,
    delivery: Delivery,
}

impl<A> Clone for Slot<A> {
    fn clone(&self) -> Self {
        Self {
            key: self.key,
            receiver: self.receiver.clone(),
            delivery: self.delivery.clone(),
        }
    }
}

// ============================================================================
// Signal
// ============================================================================

/// Named multicast channel carrying values of type `A`.
pub struct Signal<A> {
    name: String,
    slots: Mutex<Vec<Slot<A>>>,
    next_id: AtomicU64,
}

impl<A> Signal<A>
where
    A: Clone + Send + 'static,
{
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            slots: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Connect a closure. The signal keeps it alive until disconnected.
    pub fn connect<F>(&self, receiver: F, delivery: Delivery) -> SlotKey
    where
        F: Fn(A) + Send + Sync + 'static,
    {
        let key = SlotKey(KeyRepr::Closure(self.next_id.fetch_add(1, Ordering::Relaxed)));
        self.slots.lock().push(Slot {
            key,
            receiver: Receiver::Strong(Arc::new(receiver)),
            delivery,
        });
        key
    }

    /// Connect a method of an `Arc`-owned object without keeping it alive.
    ///
    /// Connecting the same `(object, func)` pair twice keeps one slot and
    /// replaces its delivery with the latest one.
    pub fn connect_method<T>(
        &self,
        object: &Arc<T>,
        func: fn(&Arc<T>, A),
        delivery: Delivery,
    ) -> SlotKey
    where
        T: Send + Sync + 'static,
    {
        let key = SlotKey::method(object, func as usize);
        let mut slots = self.slots.lock();
        if let Some(existing) = slots.iter_mut().find(|slot| slot.key == key) {
            existing.delivery = delivery;
            return key;
        }
        slots.push(Slot {
            key,
            receiver: Receiver::Method(Arc::new(WeakMethod {
                object: Arc::downgrade(object),
                func,
            })),
            delivery,
        });
        key
    }

    /// Remove a receiver. Returns `false` when it was not connected.
    pub fn disconnect(&self, key: SlotKey) -> bool {
        let mut slots = self.slots.lock();
        let before = slots.len();
        slots.retain(|slot| slot.key != key);
        slots.len() != before
    }

    /// Remove a method receiver by its `(object, func)` pair.
    pub fn disconnect_method<T>(&self, object: &Arc<T>, func: fn(&Arc<T>, A)) -> bool
    where
        T: Send + Sync + 'static,
    {
        self.disconnect(SlotKey::method(object, func as usize))
    }

    pub fn is_connected(&self, key: SlotKey) -> bool {
        self.slots.lock().iter().any(|slot| slot.key == key)
    }

    /// Number of receivers whose referent is still alive.
    pub fn receiver_count(&self) -> usize {
        self.slots
            .lock()
            .iter()
            .filter(|slot| slot.receiver.is_alive())
            .count()
    }

    /// Invoke every alive receiver once with a clone of `args`.
    pub fn emit(&self, args: A) {
        let snapshot: Vec<Slot<A>> = self.slots.lock().clone();
        let mut saw_dead = false;

        for slot in snapshot {
            if !slot.receiver.is_alive() {
                debug!(signal = %self.name, "Receiver is dead");
                saw_dead = true;
                continue;
            }
            match &slot.delivery {
                Delivery::Direct => {
                    let receiver = slot.receiver;
                    let args = args.clone();
                    match panic::catch_unwind(AssertUnwindSafe(move || receiver.call(args))) {
                        Ok(alive) => saw_dead |= !alive,
                        Err(payload) => error!(
                            signal = %self.name,
                            panic = %panic_message(&payload),
                            "Signal receiver panicked"
                        ),
                    }
                }
                Delivery::Queued(queue) => {
                    let receiver = slot.receiver;
                    let args = args.clone();
                    let queued = queue.push(Box::new(move || {
                        receiver.call(args);
                    }));
                    if !queued {
                        warn!(
                            signal = %self.name,
                            "No queue worker installed, dropping queued receiver call"
                        );
                    }
                }
            }
        }

        if saw_dead {
            self.slots.lock().retain(|slot| slot.receiver.is_alive());
        }
    }
}

impl<A> fmt::Debug for Signal<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("name", &self.name)
            .field("receivers", &self.slots.lock().len())
            .finish()
    }
}

pub(crate) fn panic_message(payload: &Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn on_value(self: &Arc<Self>, value: String) {
            self.seen.lock().push(value);
        }

        fn on_other(self: &Arc<Self>, value: String) {
            self.seen.lock().push(format!("other:{value}"));
        }
    }

    #[test]
    fn test_direct_receivers_run_in_connect_order() {
        let signal: Signal<u32> = Signal::new("test.order");
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in ["a", "b", "c"] {
            let seen = Arc::clone(&seen);
            signal.connect(move |v| seen.lock().push(format!("{tag}{v}")), Delivery::Direct);
        }

        signal.emit(1);
        assert_eq!(*seen.lock(), vec!["a1", "b1", "c1"]);
    }

    #[test]
    fn test_method_receiver_is_weak() {
        let signal: Signal<String> = Signal::new("test.weak");
        let recorder = Arc::new(Recorder::default());
        signal.connect_method(&recorder, Recorder::on_value, Delivery::Direct);

        signal.emit("x".into());
        assert_eq!(*recorder.seen.lock(), vec!["x"]);
        assert_eq!(signal.receiver_count(), 1);

        drop(recorder);
        assert_eq!(signal.receiver_count(), 0);
        signal.emit("y".into());
        assert!(signal.slots.lock().is_empty());
    }

    #[test]
    fn test_duplicate_method_connect_is_idempotent() {
        let signal: Signal<String> = Signal::new("test.dup");
        let recorder = Arc::new(Recorder::default());
        let queue = SlotQueue::new();

        let first = signal.connect_method(&recorder, Recorder::on_value, Delivery::Direct);
        let second =
            signal.connect_method(&recorder, Recorder::on_value, Delivery::queued(&queue));
        assert_eq!(first, second);
        assert_eq!(signal.slots.lock().len(), 1);
        assert!(matches!(
            signal.slots.lock()[0].delivery,
            Delivery::Queued(_)
        ));

        let third = signal.connect_method(&recorder, Recorder::on_other, Delivery::Direct);
        assert_ne!(first, third);
        assert_eq!(signal.slots.lock().len(), 2);
    }

    #[test]
    fn test_disconnect() {
        let signal: Signal<()> = Signal::new("test.disconnect");
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let key = signal.connect(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        }, Delivery::Direct);

        assert!(signal.disconnect(key));
        assert!(!signal.disconnect(key));
        signal.emit(());
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        let recorder = Arc::new(Recorder::default());
        signal_string_disconnect(&recorder);
    }

    fn signal_string_disconnect(recorder: &Arc<Recorder>) {
        let signal: Signal<String> = Signal::new("test.disconnect_method");
        signal.connect_method(recorder, Recorder::on_value, Delivery::Direct);
        assert!(signal.disconnect_method(recorder, Recorder::on_value));
        signal.emit("ignored".into());
        assert!(recorder.seen.lock().is_empty());
    }

    #[test]
    fn test_panicking_receiver_does_not_stop_others() {
        let signal: Signal<u8> = Signal::new("test.panic");
        let hits = Arc::new(AtomicUsize::new(0));
        signal.connect(|_| panic!("boom"), Delivery::Direct);
        let h = Arc::clone(&hits);
        signal.connect(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        }, Delivery::Direct);

        signal.emit(0);
        signal.emit(0);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_disconnect_during_emit_uses_snapshot() {
        let signal: Arc<Signal<()>> = Arc::new(Signal::new("test.snapshot"));
        let hits = Arc::new(AtomicUsize::new(0));

        let victim_hits = Arc::clone(&hits);
        let victim = signal.connect(move |_| {
            victim_hits.fetch_add(1, Ordering::SeqCst);
        }, Delivery::Direct);

        let sig = Arc::clone(&signal);
        signal.connect(move |_| {
            sig.disconnect(victim);
        }, Delivery::Direct);

        signal.emit(());
        // the snapshot was taken before the disconnect
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        signal.emit(());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_queued_without_worker_is_dropped() {
        let signal: Signal<u8> = Signal::new("test.no_worker");
        let queue = SlotQueue::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        signal.connect(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        }, Delivery::queued(&queue));

        signal.emit(1);
        assert!(!queue.is_installed());
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_queued_delivery_preserves_fifo_across_signals() {
        let queue = SlotQueue::new();
        let worker = queue.install();

        let first: Signal<u32> = Signal::new("test.first");
        let second: Signal<u32> = Signal::new("test.second");
        let seen = Arc::new(Mutex::new(Vec::new()));

        for (signal, tag) in [(&first, "first"), (&second, "second")] {
            let seen = Arc::clone(&seen);
            signal.connect(
                move |v| seen.lock().push(format!("{tag}:{v}")),
                Delivery::queued(&queue),
            );
        }

        first.emit(1);
        second.emit(2);
        first.emit(3);
        // nothing runs inline
        assert!(seen.lock().is_empty());

        queue.teardown();
        tokio::time::timeout(Duration::from_secs(1), worker)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(*seen.lock(), vec!["first:1", "second:2", "first:3"]);
    }

    #[tokio::test]
    async fn test_queued_panic_keeps_worker_alive() {
        let queue = SlotQueue::new();
        let worker = queue.install();
        let signal: Signal<u8> = Signal::new("test.queued_panic");
        let hits = Arc::new(AtomicUsize::new(0));

        signal.connect(|_| panic!("queued boom"), Delivery::queued(&queue));
        let h = Arc::clone(&hits);
        signal.connect(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        }, Delivery::queued(&queue));

        signal.emit(0);
        queue.teardown();
        worker.await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
