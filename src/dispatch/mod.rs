//! Cross-thread dispatcher
//!
//! Native worker threads post [`WorkUnit`]s through a cloneable
//! [`DispatchHandle`]; the host thread that created the [`Dispatcher`] is the
//! only consumer and runs the units in submission order.
//!
//! ```text
//! engine worker ──dispatch()──┐
//! engine worker ──dispatch()──┼──> unbounded mpsc ──> Dispatcher::drain() [host thread]
//! engine worker ──dispatch()──┘
//! ```
//!
//! Wrappers that expect callbacks hold a [`Registration`]. While any
//! registration is alive, [`Dispatcher::run_until_idle`] keeps waiting for
//! work, the same way a live handle keeps a host event loop running.
//! Dropping the last registration posts a wake-up that is neither counted as
//! pending nor as executed.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};

use tokio::sync::mpsc;

use crate::config::DispatchConfig;
use crate::error::BridgeError;

mod async_wrap;

pub use async_wrap::AsyncObjectWrap;

/// Deferred closure executed once on the host thread
pub type WorkUnit = Box<dyn FnOnce() + Send + 'static>;

enum Message {
    Work(WorkUnit),
    /// Lets a consumer parked in `turn` re-check whether it is idle
    Wake,
}

#[derive(Default)]
struct Counters {
    pending: AtomicUsize,
    registrations: AtomicUsize,
}

/// Consumer side, owned by the host thread
pub struct Dispatcher {
    tx: mpsc::UnboundedSender<Message>,
    rx: mpsc::UnboundedReceiver<Message>,
    counters: Arc<Counters>,
    home: ThreadId,
    queue_warn_depth: usize,
}

impl Dispatcher {
    /// Create a dispatcher bound to the calling thread
    pub fn new(config: &DispatchConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let home = thread::current().id();
        tracing::debug!("[Dispatcher] Bound to home thread {:?}", home);
        Self {
            tx,
            rx,
            counters: Arc::new(Counters::default()),
            home,
            queue_warn_depth: config.queue_warn_depth,
        }
    }

    pub fn handle(&self) -> DispatchHandle {
        DispatchHandle {
            tx: self.tx.clone(),
            counters: Arc::clone(&self.counters),
            home: self.home,
        }
    }

    pub fn home_thread(&self) -> ThreadId {
        self.home
    }

    pub fn is_home_thread(&self) -> bool {
        thread::current().id() == self.home
    }

    /// Units queued but not yet run
    pub fn pending(&self) -> usize {
        self.counters.pending.load(Ordering::SeqCst)
    }

    /// Live registrations holding the dispatcher open
    pub fn active_registrations(&self) -> usize {
        self.counters.registrations.load(Ordering::SeqCst)
    }

    fn ensure_home_thread(&self, operation: &str) -> Result<(), BridgeError> {
        if self.is_home_thread() {
            Ok(())
        } else {
            Err(BridgeError::WrongThread {
                operation: operation.to_string(),
            })
        }
    }

    /// Run a message. Returns true if it was a work unit.
    fn run_message(&self, message: Message) -> bool {
        match message {
            Message::Work(unit) => {
                self.counters.pending.fetch_sub(1, Ordering::SeqCst);
                unit();
                true
            }
            Message::Wake => false,
        }
    }

    /// Run every unit queued so far, including units queued while draining.
    pub fn drain(&mut self) -> Result<usize, BridgeError> {
        self.ensure_home_thread("Dispatcher::drain")?;

        let depth = self.pending();
        if depth > self.queue_warn_depth {
            tracing::warn!(
                "[Dispatcher] {} work units pending (warn depth {})",
                depth,
                self.queue_warn_depth
            );
        }

        let mut executed = 0;
        while let Ok(message) = self.rx.try_recv() {
            if self.run_message(message) {
                executed += 1;
            }
        }
        Ok(executed)
    }

    /// Wait for the next message and run it.
    ///
    /// Returns `Some(true)` after a work unit, `Some(false)` after a wake-up
    /// and `None` once the queue is closed.
    pub async fn turn(&mut self) -> Result<Option<bool>, BridgeError> {
        self.ensure_home_thread("Dispatcher::turn")?;
        let message = self.rx.recv().await;
        Ok(message.map(|message| self.run_message(message)))
    }

    /// Keep running units until nothing is queued and no registration is alive.
    pub async fn run_until_idle(&mut self) -> Result<usize, BridgeError> {
        self.ensure_home_thread("Dispatcher::run_until_idle")?;
        let mut executed = 0;
        loop {
            executed += self.drain()?;
            if self.active_registrations() == 0 && self.pending() == 0 {
                tracing::debug!("[Dispatcher] Idle after {} work units", executed);
                return Ok(executed);
            }
            match self.turn().await? {
                Some(true) => executed += 1,
                Some(false) => {}
                None => return Ok(executed),
            }
        }
    }

    /// Stop accepting work and run what is already queued
    pub fn close(&mut self) -> Result<usize, BridgeError> {
        self.ensure_home_thread("Dispatcher::close")?;
        self.rx.close();
        let executed = self.drain()?;
        tracing::debug!("[Dispatcher] Closed after flushing {} work units", executed);
        Ok(executed)
    }
}

/// Producer side; cheap to clone and safe to use from any thread
#[derive(Clone)]
pub struct DispatchHandle {
    tx: mpsc::UnboundedSender<Message>,
    counters: Arc<Counters>,
    home: ThreadId,
}

impl DispatchHandle {
    /// Queue a unit for the host thread. Returns false if the dispatcher is closed.
    pub fn dispatch(&self, unit: WorkUnit) -> bool {
        self.counters.pending.fetch_add(1, Ordering::SeqCst);
        if self.tx.send(Message::Work(unit)).is_err() {
            self.counters.pending.fetch_sub(1, Ordering::SeqCst);
            tracing::debug!("[Dispatcher] Dropped work unit: dispatcher closed");
            return false;
        }
        true
    }

    /// Hold the dispatcher open until the returned registration is dropped
    pub fn register(&self, name: &'static str) -> Registration {
        let active = self.counters.registrations.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::trace!("[Dispatcher] {} registered (active={})", name, active);
        Registration {
            name,
            handle: self.clone(),
        }
    }

    pub fn home_thread(&self) -> ThreadId {
        self.home
    }

    pub fn is_home_thread(&self) -> bool {
        thread::current().id() == self.home
    }
}

/// Keeps a [`Dispatcher`] from going idle while alive
pub struct Registration {
    name: &'static str,
    handle: DispatchHandle,
}

impl Drop for Registration {
    fn drop(&mut self) {
        let active = self
            .handle
            .counters
            .registrations
            .fetch_sub(1, Ordering::SeqCst)
            - 1;
        tracing::trace!("[Dispatcher] {} unregistered (active={})", self.name, active);
        if active == 0 {
            let _ = self.handle.tx.send(Message::Wake);
        }
    }
}
