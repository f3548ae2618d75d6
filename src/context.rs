// BridgeContext: process-scoped state of the host binding
//
// Owns what would otherwise be process-wide statics: the cross-thread
// dispatcher, the identity registry of DTMF sender wrappers and the host
// class definition. Created by the host's module initialisation on its
// main thread and shut down when the host unloads the module.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::config::BridgeConfig;
use crate::dispatch::{DispatchHandle, Dispatcher};
use crate::dtmf_sender::RtcDtmfSender;
use crate::error::{log_bridge_error, BridgeError};
use crate::factory::PeerConnectionFactory;
use crate::host::{ClassDefinition, HostValue};
use crate::native::DtmfSenderInterface;
use crate::registry::WrapRegistry;
use crate::telemetry::{LifecycleEvent, LifecycleTelemetry};

/// Identity registry for DTMF sender wrappers
pub type DtmfSenderRegistry =
    WrapRegistry<RtcDtmfSender, dyn DtmfSenderInterface, Arc<PeerConnectionFactory>>;

pub struct BridgeContext {
    config: BridgeConfig,
    dispatcher: Dispatcher,
    dtmf_senders: DtmfSenderRegistry,
    dtmf_sender_class: ClassDefinition<RtcDtmfSender>,
    telemetry: LifecycleTelemetry,
    shut_down: bool,
}

impl BridgeContext {
    /// Initialise the binding. The calling thread becomes the home thread.
    pub fn init(config: BridgeConfig) -> Self {
        let dispatcher = Dispatcher::new(&config.dispatch);
        let telemetry = LifecycleTelemetry::default();

        let handle = dispatcher.handle();
        let registry_telemetry = telemetry.clone();
        let dtmf_senders: DtmfSenderRegistry =
            WrapRegistry::new("RTCDTMFSender", move |factory, dtmf, release| {
                RtcDtmfSender::create(
                    factory,
                    dtmf,
                    Some(release),
                    handle.clone(),
                    registry_telemetry.clone(),
                )
            });

        log::info!(
            "[BridgeContext] Initialised on {:?}",
            dispatcher.home_thread()
        );

        Self {
            config,
            dispatcher,
            dtmf_senders,
            dtmf_sender_class: RtcDtmfSender::class_definition(),
            telemetry,
            shut_down: false,
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn dispatch_handle(&self) -> DispatchHandle {
        self.dispatcher.handle()
    }

    pub fn subscribe_lifecycle(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.telemetry.subscribe()
    }

    pub fn dtmf_sender_class(&self) -> &ClassDefinition<RtcDtmfSender> {
        &self.dtmf_sender_class
    }

    /// Wrappers currently tracked by the identity registry
    pub fn live_dtmf_senders(&self) -> usize {
        self.dtmf_senders.len()
    }

    /// Units waiting for the home thread
    pub fn pending(&self) -> usize {
        self.dispatcher.pending()
    }

    fn ensure_usable(&self, operation: &str) -> Result<(), BridgeError> {
        let result = if self.shut_down {
            Err(BridgeError::ContextShutDown)
        } else if !self.dispatcher.is_home_thread() {
            Err(BridgeError::WrongThread {
                operation: operation.to_string(),
            })
        } else {
            Ok(())
        };
        if let Err(err) = &result {
            log_bridge_error(err, operation);
        }
        result
    }

    /// The one wrapper for `dtmf`, created on first request
    pub fn dtmf_sender(
        &self,
        factory: &Arc<PeerConnectionFactory>,
        dtmf: Arc<dyn DtmfSenderInterface>,
    ) -> Result<Arc<RtcDtmfSender>, BridgeError> {
        self.ensure_usable("dtmf_sender")?;
        self.dtmf_senders.get_or_create(Arc::clone(factory), dtmf)
    }

    /// Host `new RTCDTMFSender(...args)`
    pub fn construct_dtmf_sender(
        &self,
        args: &[HostValue],
    ) -> Result<Arc<RtcDtmfSender>, BridgeError> {
        self.ensure_usable("RTCDTMFSender::constructor")?;
        self.dtmf_sender_class.construct(args)
    }

    /// Host property read on a DTMF sender
    pub fn get(&self, sender: &RtcDtmfSender, name: &str) -> Result<HostValue, BridgeError> {
        self.ensure_usable(name)?;
        self.dtmf_sender_class.get(sender, name)
    }

    /// Host method call on a DTMF sender
    pub fn call(
        &self,
        sender: &RtcDtmfSender,
        name: &str,
        args: &[HostValue],
    ) -> Result<HostValue, BridgeError> {
        self.ensure_usable(name)?;
        self.dtmf_sender_class.call(sender, name, args)
    }

    /// Run every queued work unit
    pub fn run_pending(&mut self) -> Result<usize, BridgeError> {
        self.dispatcher.drain()
    }

    /// Run work units until no wrapper is listening and nothing is queued
    pub async fn run_until_idle(&mut self) -> Result<usize, BridgeError> {
        self.dispatcher.run_until_idle().await
    }

    /// Close the dispatcher, flushing queued units. Later calls are no-ops.
    pub fn shutdown(&mut self) -> Result<usize, BridgeError> {
        if self.shut_down {
            return Ok(0);
        }
        let flushed = self.dispatcher.close()?;
        self.shut_down = true;
        log::info!(
            "[BridgeContext] Shut down ({} units flushed, {} wrappers still alive)",
            flushed,
            self.dtmf_senders.len()
        );
        Ok(flushed)
    }
}

impl Drop for BridgeContext {
    fn drop(&mut self) {
        if !self.shut_down && self.dispatcher.is_home_thread() {
            let _ = self.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::RecordingDtmfSender;

    #[test]
    fn test_registry_deduplicates_wrappers() {
        let context = BridgeContext::init(BridgeConfig::default());
        let factory = PeerConnectionFactory::new(context.config().engine.clone());
        let native = Arc::new(RecordingDtmfSender::new());

        let first = context.dtmf_sender(&factory, native.clone()).unwrap();
        let second = context.dtmf_sender(&factory, native.clone()).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(context.live_dtmf_senders(), 1);
        assert_eq!(factory.ref_count(), 1);

        drop(first);
        drop(second);
        assert_eq!(context.live_dtmf_senders(), 0);
        assert_eq!(factory.ref_count(), 0);
    }

    #[test]
    fn test_host_constructor_is_guarded() {
        let context = BridgeContext::init(BridgeConfig::default());
        let err = context
            .construct_dtmf_sender(&[])
            .err()
            .expect("empty arguments must be rejected");
        assert!(err.is_type_error());
    }

    #[test]
    fn test_calls_off_home_thread_are_rejected() {
        let context = Arc::new(std::sync::Mutex::new(BridgeContext::init(
            BridgeConfig::default(),
        )));
        let factory = PeerConnectionFactory::new(Default::default());
        let native = Arc::new(RecordingDtmfSender::new());
        let sender = context
            .lock()
            .unwrap()
            .dtmf_sender(&factory, native)
            .unwrap();

        let remote_context = Arc::clone(&context);
        let remote_sender = Arc::clone(&sender);
        let result = std::thread::spawn(move || {
            remote_context
                .lock()
                .unwrap()
                .get(&remote_sender, "toneBuffer")
        })
        .join()
        .unwrap();

        assert!(matches!(result, Err(BridgeError::WrongThread { .. })));
    }

    #[test]
    fn test_shutdown_rejects_new_wrappers() {
        let mut context = BridgeContext::init(BridgeConfig::default());
        let factory = PeerConnectionFactory::new(Default::default());

        context.shutdown().unwrap();
        assert_eq!(context.shutdown().unwrap(), 0);

        let err = context
            .dtmf_sender(&factory, Arc::new(RecordingDtmfSender::new()))
            .err()
            .expect("shut down context must refuse");
        assert_eq!(err, BridgeError::ContextShutDown);
    }
}
