//! Identity registry ("wrap")
//!
//! Maps a native object's identity to the one wrapper that represents it.
//! Entries are weak: the registry never keeps a wrapper alive. A wrapper
//! removes its own entry on destruction through the [`ReleaseHandle`] it was
//! created with.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use log::debug;

use crate::error::BridgeError;
use crate::native::{native_id, NativeId};

type Entries<T> = Mutex<HashMap<NativeId, Weak<T>>>;

/// Builds a wrapper for a native object the registry has not seen yet
pub type CreateFn<T, N, F> =
    Box<dyn Fn(F, Arc<N>, ReleaseHandle<T>) -> Result<Arc<T>, BridgeError> + Send + Sync>;

pub struct WrapRegistry<T, N: ?Sized, F> {
    name: &'static str,
    entries: Arc<Entries<T>>,
    create: CreateFn<T, N, F>,
}

impl<T, N: ?Sized, F> WrapRegistry<T, N, F> {
    pub fn new(
        name: &'static str,
        create: impl Fn(F, Arc<N>, ReleaseHandle<T>) -> Result<Arc<T>, BridgeError>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self {
            name,
            entries: Arc::new(Mutex::new(HashMap::new())),
            create: Box::new(create),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<NativeId, Weak<T>>>, BridgeError> {
        self.entries.lock().map_err(|_| BridgeError::LockPoisoned {
            component: self.name.to_string(),
        })
    }

    /// Return the wrapper for `native`, creating it on first sight.
    pub fn get_or_create(&self, factory: F, native: Arc<N>) -> Result<Arc<T>, BridgeError> {
        let id = native_id(&native);
        let mut entries = self.lock()?;

        if let Some(existing) = entries.get(&id).and_then(Weak::upgrade) {
            return Ok(existing);
        }

        let release = ReleaseHandle {
            id,
            entries: Arc::downgrade(&self.entries),
        };
        let wrapper = (self.create)(factory, native, release)?;
        entries.insert(id, Arc::downgrade(&wrapper));
        debug!("[{}] Created wrapper for native {:#x}", self.name, id);
        Ok(wrapper)
    }

    /// Existing wrapper for `native`, if one is alive
    pub fn get(&self, native: &Arc<N>) -> Option<Arc<T>> {
        let entries = self.lock().ok()?;
        entries.get(&native_id(native)).and_then(Weak::upgrade)
    }

    /// Number of tracked native identities
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Lets a wrapper remove its registry entry when it is destroyed
pub struct ReleaseHandle<T> {
    id: NativeId,
    entries: Weak<Entries<T>>,
}

impl<T> ReleaseHandle<T> {
    pub fn native_id(&self) -> NativeId {
        self.id
    }

    /// Remove the entry unless it already points at a newer, live wrapper.
    pub fn release(self) -> bool {
        let Some(entries) = self.entries.upgrade() else {
            return false;
        };
        let mut entries = entries.lock().unwrap_or_else(PoisonError::into_inner);
        match entries.get(&self.id) {
            Some(entry) if entry.strong_count() == 0 => {
                entries.remove(&self.id);
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Native;

    struct Wrapper {
        release: Mutex<Option<ReleaseHandle<Wrapper>>>,
    }

    impl Drop for Wrapper {
        fn drop(&mut self) {
            if let Some(release) = self.release.lock().unwrap().take() {
                release.release();
            }
        }
    }

    fn registry(created: Arc<AtomicUsize>) -> WrapRegistry<Wrapper, Native, ()> {
        WrapRegistry::new("TestWrap", move |_, _native, release| {
            created.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(Wrapper {
                release: Mutex::new(Some(release)),
            }))
        })
    }

    #[test]
    fn test_same_native_yields_same_wrapper() {
        let created = Arc::new(AtomicUsize::new(0));
        let registry = registry(Arc::clone(&created));
        let native = Arc::new(Native);

        let first = registry.get_or_create((), Arc::clone(&native)).unwrap();
        let second = registry.get_or_create((), Arc::clone(&native)).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(created.load(Ordering::SeqCst), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_distinct_natives_get_distinct_wrappers() {
        let registry = registry(Arc::new(AtomicUsize::new(0)));
        // both natives stay alive so their identities cannot be reused
        let native_a = Arc::new(Native);
        let a = registry.get_or_create((), Arc::clone(&native_a)).unwrap();
        let native_b = Arc::new(Native);
        let b = registry.get_or_create((), Arc::clone(&native_b)).unwrap();

        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_drop_releases_entry() {
        let created = Arc::new(AtomicUsize::new(0));
        let registry = registry(Arc::clone(&created));
        let native = Arc::new(Native);

        let wrapper = registry.get_or_create((), Arc::clone(&native)).unwrap();
        assert!(registry.get(&native).is_some());
        drop(wrapper);

        assert!(registry.is_empty());
        assert!(registry.get(&native).is_none());

        registry.get_or_create((), Arc::clone(&native)).unwrap();
        assert_eq!(created.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_create_failure_leaves_no_entry() {
        let registry: WrapRegistry<Wrapper, Native, ()> =
            WrapRegistry::new("Failing", |_, _, _| {
                Err(BridgeError::IllegalConstructor {
                    class: "Wrapper".to_string(),
                })
            });
        assert!(registry.get_or_create((), Arc::new(Native)).is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_release_keeps_live_replacement() {
        let registry = registry(Arc::new(AtomicUsize::new(0)));
        let native = Arc::new(Native);
        let wrapper = registry.get_or_create((), Arc::clone(&native)).unwrap();

        let stale = ReleaseHandle::<Wrapper> {
            id: native_id(&native),
            entries: Arc::downgrade(&registry.entries),
        };
        assert!(!stale.release());
        assert!(registry.get(&native).is_some());
        drop(wrapper);
    }
}
