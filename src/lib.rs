// RTC DTMF Bridge
// Host-runtime binding for a media engine's DTMF sender: shared ownership of
// native senders, tone-change callbacks marshaled onto the host thread.

// Module declarations
pub mod config;
pub mod context;
pub mod dispatch;
pub mod dtmf_sender;
pub mod error;
pub mod factory;
pub mod host;
pub mod native;
pub mod registry;
pub mod telemetry;

// Re-exports for convenience
pub use context::BridgeContext;
pub use dtmf_sender::{RtcDtmfSender, ToneChangeEvent};
pub use error::{BridgeError, DtmfError, ErrorCode};
pub use factory::{FactoryRef, PeerConnectionFactory};

use tracing_subscriber::filter::LevelFilter;

/// Install the global log subscriber.
///
/// `log` records from the library are captured as well. Calling this more
/// than once (or after the host installed its own subscriber) is harmless.
pub fn init_logging(level: &str) {
    let filter = level.parse::<LevelFilter>().unwrap_or(LevelFilter::INFO);
    let result = tracing_subscriber::fmt()
        .with_max_level(filter)
        .with_thread_names(true)
        .try_init();

    if result.is_ok() {
        log::info!("Logging initialised at {}", filter);
    }
}
