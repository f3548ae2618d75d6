//! RTCDTMFSender: host wrapper around a native DTMF sender.
//!
//! # Ownership
//! ```text
//! host ──Arc──> RtcDtmfSender ──FactoryRef──> PeerConnectionFactory
//!                    │  └──Arc──> dyn DtmfSenderInterface <──Arc── engine
//!                    └──Arc──> ToneChangeForwarder <──observer── engine
//!                                   └──Weak──> RtcDtmfSender
//! ```
//!
//! # Teardown
//! Dropping the last host reference runs, in order: unregister the observer,
//! detach from the dispatcher, release the factory reference, remove the
//! identity-registry entry.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::dispatch::{AsyncObjectWrap, DispatchHandle};
use crate::error::{log_bridge_error, BridgeError};
use crate::factory::{FactoryRef, PeerConnectionFactory};
use crate::host::{to_i32_arg, to_string_arg, ClassDefinition, HostValue, NativeExternal};
use crate::native::{native_id, DtmfSenderInterface, NativeId};
use crate::registry::ReleaseHandle;
use crate::telemetry::{LifecycleEventKind, LifecycleTelemetry};

mod observer;

use observer::ToneChangeForwarder;

/// Host-visible class name
pub const CLASS_NAME: &str = "RTCDTMFSender";

/// Tone duration used when the caller gives none (or an unusable one)
pub const DTMF_DEFAULT_DURATION_MS: i32 = 100;

/// Inter-tone gap used when the caller gives none (or an unusable one)
pub const DTMF_DEFAULT_GAP_MS: i32 = 50;

/// Payload of the `tonechange` event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToneChangeEvent {
    /// Tone that just started; empty once the buffer has been played out
    pub tone: String,
}

/// `ontonechange` handler
pub type ToneChangeHandler = Box<dyn FnMut(&ToneChangeEvent) + Send>;

#[derive(Default)]
struct HandlerSlot {
    handler: Option<ToneChangeHandler>,
    generation: u64,
}

/// Everything the guarded constructor needs besides the factory.
///
/// Travels inside a [`NativeExternal`], which host code cannot create.
struct NativeDtmfInit {
    dtmf: Arc<dyn DtmfSenderInterface>,
    dispatch: DispatchHandle,
    telemetry: LifecycleTelemetry,
    release: Mutex<Option<ReleaseHandle<RtcDtmfSender>>>,
}

pub struct RtcDtmfSender {
    factory: Option<FactoryRef>,
    dtmf: Arc<dyn DtmfSenderInterface>,
    native_id: NativeId,
    async_wrap: Arc<AsyncObjectWrap>,
    observer: Arc<ToneChangeForwarder>,
    observer_registered: AtomicBool,
    ontonechange: Mutex<HandlerSlot>,
    telemetry: LifecycleTelemetry,
    release: Option<ReleaseHandle<RtcDtmfSender>>,
}

impl RtcDtmfSender {
    /// Host class exposing `canInsertDTMF`, `toneBuffer`, `insertDTMF` and `stop`
    pub fn class_definition() -> ClassDefinition<RtcDtmfSender> {
        ClassDefinition::new(CLASS_NAME, Self::construct)
            .accessor("canInsertDTMF", |sender| {
                Ok(HostValue::Bool(sender.can_insert_dtmf()))
            })
            .accessor("toneBuffer", |sender| {
                Ok(HostValue::String(sender.tone_buffer()))
            })
            .method("insertDTMF", Self::js_insert_dtmf)
            .method("stop", |sender, _| {
                sender.stop();
                Ok(HostValue::Undefined)
            })
    }

    /// Create through the guarded constructor, the way the identity registry does
    pub(crate) fn create(
        factory: Arc<PeerConnectionFactory>,
        dtmf: Arc<dyn DtmfSenderInterface>,
        release: Option<ReleaseHandle<RtcDtmfSender>>,
        dispatch: DispatchHandle,
        telemetry: LifecycleTelemetry,
    ) -> Result<Arc<Self>, BridgeError> {
        let init = NativeDtmfInit {
            dtmf,
            dispatch,
            telemetry,
            release: Mutex::new(release),
        };
        Self::construct(&[
            HostValue::object(factory),
            HostValue::External(NativeExternal::new(init)),
        ])
    }

    /// Guarded constructor: `(factory object, native external)` or a type error.
    fn construct(args: &[HostValue]) -> Result<Arc<Self>, BridgeError> {
        let illegal = || {
            let err = BridgeError::IllegalConstructor {
                class: CLASS_NAME.to_string(),
            };
            log_bridge_error(&err, "RTCDTMFSender::constructor");
            err
        };

        if args.len() != 2 || !args[0].is_object() || !args[1].is_external() {
            return Err(illegal());
        }

        let factory = args[0]
            .downcast_object::<PeerConnectionFactory>()
            .ok_or_else(illegal)?;
        let init = match &args[1] {
            HostValue::External(external) => external.downcast_ref::<NativeDtmfInit>(),
            _ => None,
        }
        .ok_or_else(illegal)?;
        let release = init
            .release
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        Ok(Self::new(
            factory.acquire(),
            Arc::clone(&init.dtmf),
            init.dispatch.clone(),
            init.telemetry.clone(),
            release,
        ))
    }

    fn new(
        factory: FactoryRef,
        dtmf: Arc<dyn DtmfSenderInterface>,
        dispatch: DispatchHandle,
        telemetry: LifecycleTelemetry,
        release: Option<ReleaseHandle<RtcDtmfSender>>,
    ) -> Arc<Self> {
        let id = native_id(&dtmf);
        let async_wrap = Arc::new(AsyncObjectWrap::new(CLASS_NAME, dispatch));

        let sender = Arc::new_cyclic(|weak| Self {
            factory: Some(factory),
            dtmf,
            native_id: id,
            observer: Arc::new(ToneChangeForwarder::new(
                weak.clone(),
                Arc::clone(&async_wrap),
            )),
            async_wrap,
            observer_registered: AtomicBool::new(false),
            ontonechange: Mutex::new(HandlerSlot::default()),
            telemetry,
            release,
        });
        sender.publish(LifecycleEventKind::WrapperCreated);

        sender.dtmf.register_observer(sender.observer.clone());
        sender.observer_registered.store(true, Ordering::SeqCst);
        sender.publish(LifecycleEventKind::ObserverRegistered);

        log::debug!("[RTCDTMFSender] Wrapped native sender {:#x}", id);
        sender
    }

    fn publish(&self, kind: LifecycleEventKind) {
        self.telemetry.publish(CLASS_NAME, self.native_id, kind);
    }

    pub fn native_id(&self) -> NativeId {
        self.native_id
    }

    pub fn factory(&self) -> Option<&Arc<PeerConnectionFactory>> {
        self.factory.as_ref().map(FactoryRef::factory)
    }

    pub fn is_stopped(&self) -> bool {
        self.async_wrap.is_stopped()
    }

    pub fn has_registered_observer(&self) -> bool {
        self.observer_registered.load(Ordering::SeqCst)
    }

    /// `canInsertDTMF`
    pub fn can_insert_dtmf(&self) -> bool {
        self.dtmf.can_insert_dtmf()
    }

    /// `toneBuffer`
    pub fn tone_buffer(&self) -> String {
        self.dtmf.tones()
    }

    /// Queue `tones` on the native sender.
    ///
    /// Missing timing falls back to [`DTMF_DEFAULT_DURATION_MS`] and
    /// [`DTMF_DEFAULT_GAP_MS`]. Engine rejections come back as
    /// [`BridgeError::Native`].
    pub fn insert_dtmf(
        &self,
        tones: &str,
        duration_ms: Option<i32>,
        inter_tone_gap_ms: Option<i32>,
    ) -> Result<(), BridgeError> {
        let duration_ms = duration_ms.unwrap_or(DTMF_DEFAULT_DURATION_MS);
        let inter_tone_gap_ms = inter_tone_gap_ms.unwrap_or(DTMF_DEFAULT_GAP_MS);

        self.dtmf
            .insert_dtmf(tones, duration_ms, inter_tone_gap_ms)
            .map_err(|source| {
                let err = BridgeError::Native { source };
                log_bridge_error(&err, "RTCDTMFSender::insertDTMF");
                err
            })
    }

    /// `insertDTMF(tones, durationMs?, gapMs?)` with host arguments.
    ///
    /// A non-string `tones` is a type error raised before touching the
    /// engine; timing arguments that do not convert are replaced by the
    /// defaults.
    fn js_insert_dtmf(&self, args: &[HostValue]) -> Result<HostValue, BridgeError> {
        let tones = to_string_arg(args.first()).map_err(|err| {
            log_bridge_error(&err, "RTCDTMFSender::insertDTMF");
            err
        })?;
        let duration_ms = to_i32_arg(args.get(1));
        let inter_tone_gap_ms = to_i32_arg(args.get(2));

        self.insert_dtmf(&tones, duration_ms, inter_tone_gap_ms)?;
        Ok(HostValue::Undefined)
    }

    /// Stop receiving native events. Safe to call any number of times.
    pub fn stop(&self) {
        if self.observer_registered.swap(false, Ordering::SeqCst) {
            self.dtmf.unregister_observer();
            self.publish(LifecycleEventKind::ObserverUnregistered);
        }
        if self.async_wrap.stop() {
            self.publish(LifecycleEventKind::DispatchDetached);
        }
    }

    fn lock_handler(&self) -> MutexGuard<'_, HandlerSlot> {
        self.ontonechange
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Set `ontonechange`, replacing the previous handler
    pub fn set_ontonechange(&self, handler: impl FnMut(&ToneChangeEvent) + Send + 'static) {
        let mut slot = self.lock_handler();
        slot.handler = Some(Box::new(handler));
        slot.generation += 1;
    }

    /// `ontonechange = null`
    pub fn clear_ontonechange(&self) {
        let mut slot = self.lock_handler();
        slot.handler = None;
        slot.generation += 1;
    }

    /// Route `ontonechange` into a stream.
    ///
    /// The stream ends when the handler is replaced or the wrapper is dropped.
    pub fn tone_change_stream(&self) -> UnboundedReceiverStream<ToneChangeEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.set_ontonechange(move |event| {
            let _ = tx.send(event.clone());
        });
        UnboundedReceiverStream::new(rx)
    }

    /// Deliver a tone change on the host thread. Returns true if a handler ran.
    fn emit_tone_change(&self, event: ToneChangeEvent) -> bool {
        if self.is_stopped() {
            log::trace!("[RTCDTMFSender] Dropping tone change after stop");
            return false;
        }

        // Run the handler without holding the lock so it may replace itself.
        let (handler, generation) = {
            let mut slot = self.lock_handler();
            (slot.handler.take(), slot.generation)
        };
        let Some(mut handler) = handler else {
            return false;
        };
        handler(&event);

        let mut slot = self.lock_handler();
        if slot.generation == generation && slot.handler.is_none() {
            slot.handler = Some(handler);
        }
        true
    }
}

impl Drop for RtcDtmfSender {
    fn drop(&mut self) {
        self.stop();

        if let Some(factory) = self.factory.take() {
            drop(factory);
            self.publish(LifecycleEventKind::FactoryReleased);
        }

        if let Some(release) = self.release.take() {
            release.release();
        }
        self.publish(LifecycleEventKind::WrapperDestroyed);
        log::debug!("[RTCDTMFSender] Destroyed wrapper for {:#x}", self.native_id);
    }
}
