//! Recording DTMF sender for tests and host-side harnesses.
//!
//! Every call is appended to a log; tone-change callbacks are fired by hand
//! with [`RecordingDtmfSender::fire_tone_change`], from any thread.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{DtmfSenderInterface, DtmfSenderObserver};
use crate::error::DtmfError;

/// Call received by a [`RecordingDtmfSender`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeCall {
    RegisterObserver,
    UnregisterObserver,
    CanInsertDtmf,
    Tones,
    InsertDtmf {
        tones: String,
        duration_ms: i32,
        inter_tone_gap_ms: i32,
    },
}

type Hook = Box<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct MockState {
    calls: Vec<NativeCall>,
    observer: Option<Arc<dyn DtmfSenderObserver>>,
    tones: String,
    can_insert: bool,
    duration_ms: i32,
    inter_tone_gap_ms: i32,
    reject_with: Option<DtmfError>,
}

pub struct RecordingDtmfSender {
    state: Mutex<MockState>,
    unregister_hook: Mutex<Option<Hook>>,
}

impl RecordingDtmfSender {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                can_insert: true,
                ..MockState::default()
            }),
            unregister_hook: Mutex::new(None),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn calls(&self) -> Vec<NativeCall> {
        self.lock().calls.clone()
    }

    /// Only the `InsertDtmf` calls, in order
    pub fn inserts(&self) -> Vec<NativeCall> {
        self.lock()
            .calls
            .iter()
            .filter(|call| matches!(call, NativeCall::InsertDtmf { .. }))
            .cloned()
            .collect()
    }

    pub fn has_observer(&self) -> bool {
        self.lock().observer.is_some()
    }

    pub fn set_can_insert(&self, can_insert: bool) {
        self.lock().can_insert = can_insert;
    }

    pub fn set_tones(&self, tones: &str) {
        self.lock().tones = tones.to_string();
    }

    /// Make every following insert fail with `err`
    pub fn reject_inserts_with(&self, err: Option<DtmfError>) {
        self.lock().reject_with = err;
    }

    /// Run `hook` at the moment the observer is unregistered
    pub fn on_unregister(&self, hook: impl Fn() + Send + Sync + 'static) {
        *self
            .unregister_hook
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Box::new(hook));
    }

    /// Invoke the registered observer as the engine would.
    ///
    /// Returns false when no observer is registered.
    pub fn fire_tone_change(&self, tone: &str, tone_buffer: &str) -> bool {
        let observer = self.lock().observer.clone();
        match observer {
            Some(observer) => {
                observer.on_tone_change(tone, tone_buffer);
                true
            }
            None => false,
        }
    }
}

impl Default for RecordingDtmfSender {
    fn default() -> Self {
        Self::new()
    }
}

impl DtmfSenderInterface for RecordingDtmfSender {
    fn register_observer(&self, observer: Arc<dyn DtmfSenderObserver>) {
        let mut state = self.lock();
        state.calls.push(NativeCall::RegisterObserver);
        state.observer = Some(observer);
    }

    fn unregister_observer(&self) {
        {
            let mut state = self.lock();
            state.calls.push(NativeCall::UnregisterObserver);
            state.observer = None;
        }
        if let Some(hook) = self
            .unregister_hook
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            hook();
        }
    }

    fn can_insert_dtmf(&self) -> bool {
        let mut state = self.lock();
        state.calls.push(NativeCall::CanInsertDtmf);
        state.can_insert
    }

    fn insert_dtmf(
        &self,
        tones: &str,
        duration_ms: i32,
        inter_tone_gap_ms: i32,
    ) -> Result<(), DtmfError> {
        let mut state = self.lock();
        state.calls.push(NativeCall::InsertDtmf {
            tones: tones.to_string(),
            duration_ms,
            inter_tone_gap_ms,
        });
        if let Some(err) = state.reject_with.clone() {
            return Err(err);
        }
        state.tones = tones.to_string();
        state.duration_ms = duration_ms;
        state.inter_tone_gap_ms = inter_tone_gap_ms;
        Ok(())
    }

    fn tones(&self) -> String {
        let mut state = self.lock();
        state.calls.push(NativeCall::Tones);
        state.tones.clone()
    }

    fn duration(&self) -> i32 {
        self.lock().duration_ms
    }

    fn inter_tone_gap(&self) -> i32 {
        self.lock().inter_tone_gap_ms
    }
}
