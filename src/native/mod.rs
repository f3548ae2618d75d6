//! Native media engine interfaces
//!
//! The bridge only talks to the engine through these traits. A DTMF sender
//! lives as long as anyone holds an `Arc` to it; the engine keeps its own
//! clone and the bridge wrapper keeps another.

use std::sync::Arc;

use crate::error::DtmfError;

pub mod mock;
pub mod simulated;

pub use mock::{NativeCall, RecordingDtmfSender};
pub use simulated::SimulatedDtmfSender;

/// Characters the engine accepts in a tone string
pub const VALID_TONES: &str = ",0123456789*#ABCDabcd";

/// Identity of a native object, stable for as long as the object is alive
pub type NativeId = usize;

/// Identity of the object behind a shared native handle
pub fn native_id<N: ?Sized>(handle: &Arc<N>) -> NativeId {
    Arc::as_ptr(handle) as *const () as usize
}

/// Reject tone strings containing characters outside [`VALID_TONES`]
pub fn validate_tones(tones: &str) -> Result<(), DtmfError> {
    if tones.chars().all(|c| VALID_TONES.contains(c)) {
        Ok(())
    } else {
        Err(DtmfError::InvalidTones {
            tones: tones.to_string(),
        })
    }
}

/// Sink for tone-change events.
///
/// Called on an engine worker thread, never on the host thread.
pub trait DtmfSenderObserver: Send + Sync {
    /// `tone` is the tone that just started (empty once the buffer drained);
    /// `tone_buffer` is what is still queued behind it.
    fn on_tone_change(&self, tone: &str, tone_buffer: &str);
}

/// A DTMF-capable channel owned by the media engine
pub trait DtmfSenderInterface: Send + Sync {
    /// Install the observer, replacing any previous one
    fn register_observer(&self, observer: Arc<dyn DtmfSenderObserver>);

    /// Drop the current observer, if any
    fn unregister_observer(&self);

    fn can_insert_dtmf(&self) -> bool;

    /// Replace the pending tone buffer and start sending it
    fn insert_dtmf(
        &self,
        tones: &str,
        duration_ms: i32,
        inter_tone_gap_ms: i32,
    ) -> Result<(), DtmfError>;

    /// Tones still waiting to be played
    fn tones(&self) -> String;

    fn duration(&self) -> i32;

    fn inter_tone_gap(&self) -> i32;
}
