use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::thread::ThreadId;

use super::{DispatchHandle, Registration};

/// Host-dispatch capability of a wrapper object.
///
/// Owns the wrapper's dispatcher registration and refuses new work once
/// stopped. Units already queued still run; they check
/// [`AsyncObjectWrap::is_stopped`] themselves.
pub struct AsyncObjectWrap {
    name: &'static str,
    handle: DispatchHandle,
    registration: Mutex<Option<Registration>>,
    stopped: AtomicBool,
}

impl AsyncObjectWrap {
    pub fn new(name: &'static str, handle: DispatchHandle) -> Self {
        let registration = handle.register(name);
        Self {
            name,
            handle,
            registration: Mutex::new(Some(registration)),
            stopped: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn home_thread(&self) -> ThreadId {
        self.handle.home_thread()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Queue `unit` for the host thread unless this wrapper is stopped
    pub fn dispatch(&self, unit: impl FnOnce() + Send + 'static) -> bool {
        if self.is_stopped() {
            log::trace!("[{}] Ignoring dispatch after stop", self.name);
            return false;
        }
        self.handle.dispatch(Box::new(unit))
    }

    /// Detach from the dispatcher. Returns true only for the first call.
    pub fn stop(&self) -> bool {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return false;
        }
        let registration = self
            .registration
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        drop(registration);
        log::debug!("[{}] Detached from dispatcher", self.name);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DispatchConfig;
    use crate::dispatch::Dispatcher;

    #[test]
    fn test_stop_is_idempotent_and_detaches() {
        let mut dispatcher = Dispatcher::new(&DispatchConfig::default());
        let wrap = AsyncObjectWrap::new("Test", dispatcher.handle());
        assert_eq!(dispatcher.active_registrations(), 1);

        assert!(wrap.dispatch(|| {}));
        assert!(wrap.stop());
        assert!(!wrap.stop());
        assert!(wrap.is_stopped());
        assert_eq!(dispatcher.active_registrations(), 0);

        assert!(!wrap.dispatch(|| {}));
        // only the unit queued before stop
        assert_eq!(dispatcher.drain().unwrap(), 1);
    }
}
