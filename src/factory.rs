//! Peer connection factory: owner of the media engine.
//!
//! Wrappers keep the factory alive through a [`FactoryRef`]. Acquiring one
//! bumps the factory's external reference count, dropping it releases that
//! reference again, so the count can never be decremented twice or used
//! after release.

use std::ops::Deref;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use log::{debug, info};

use crate::config::EngineConfig;
use crate::native::SimulatedDtmfSender;

static NEXT_FACTORY_ID: AtomicU64 = AtomicU64::new(1);

pub struct PeerConnectionFactory {
    id: u64,
    engine: EngineConfig,
    external_refs: AtomicUsize,
}

impl PeerConnectionFactory {
    pub fn new(engine: EngineConfig) -> Arc<Self> {
        let id = NEXT_FACTORY_ID.fetch_add(1, Ordering::Relaxed);
        info!("[Factory] Created peer connection factory #{}", id);
        Arc::new(Self {
            id,
            engine,
            external_refs: AtomicUsize::new(0),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Take an external reference on the factory
    pub fn acquire(self: &Arc<Self>) -> FactoryRef {
        let refs = self.external_refs.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("[Factory] #{} acquired (refs={})", self.id, refs);
        FactoryRef {
            factory: Arc::clone(self),
        }
    }

    /// Outstanding external references
    pub fn ref_count(&self) -> usize {
        self.external_refs.load(Ordering::SeqCst)
    }

    /// Open a DTMF channel on this factory's engine
    pub fn create_dtmf_sender(&self) -> Arc<SimulatedDtmfSender> {
        Arc::new(SimulatedDtmfSender::new(self.engine.clone()))
    }

    fn release(&self) {
        let refs = self.external_refs.fetch_sub(1, Ordering::SeqCst) - 1;
        if refs == 0 {
            info!("[Factory] #{} released its last external reference", self.id);
        } else {
            debug!("[Factory] #{} released (refs={})", self.id, refs);
        }
    }
}

/// Owned external reference to a [`PeerConnectionFactory`]
pub struct FactoryRef {
    factory: Arc<PeerConnectionFactory>,
}

impl FactoryRef {
    pub fn factory(&self) -> &Arc<PeerConnectionFactory> {
        &self.factory
    }
}

impl Deref for FactoryRef {
    type Target = PeerConnectionFactory;

    fn deref(&self) -> &Self::Target {
        &self.factory
    }
}

impl Drop for FactoryRef {
    fn drop(&mut self) {
        self.factory.release();
    }
}
