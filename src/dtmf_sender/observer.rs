use std::sync::{Arc, Weak};

use super::{RtcDtmfSender, ToneChangeEvent};
use crate::dispatch::AsyncObjectWrap;
use crate::native::DtmfSenderObserver;

/// Native-observer capability of an [`RtcDtmfSender`].
///
/// The engine holds this object, not the wrapper. It only keeps a weak link
/// back, so the engine can never keep a wrapper alive, and it never upgrades
/// that link off the host thread.
pub(super) struct ToneChangeForwarder {
    target: Weak<RtcDtmfSender>,
    async_wrap: Arc<AsyncObjectWrap>,
}

impl ToneChangeForwarder {
    pub(super) fn new(target: Weak<RtcDtmfSender>, async_wrap: Arc<AsyncObjectWrap>) -> Self {
        Self { target, async_wrap }
    }
}

impl DtmfSenderObserver for ToneChangeForwarder {
    fn on_tone_change(&self, tone: &str, tone_buffer: &str) {
        let target = self.target.clone();
        let tone = tone.to_string();
        let tone_buffer = tone_buffer.to_string();

        self.async_wrap.dispatch(move || {
            // remaining buffer is not part of the event
            log::trace!("[RTCDTMFSender] tone {:?}, remaining {:?}", tone, tone_buffer);
            if let Some(sender) = target.upgrade() {
                sender.emit_tone_change(ToneChangeEvent { tone });
            }
        });
    }
}
