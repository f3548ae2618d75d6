// Error types for the DTMF bridge
//
// Bridge errors are what the host runtime sees; DTMF errors are raised by the
// media engine and wrapped into bridge errors when they cross over.

mod bridge;
mod dtmf;

pub use bridge::{log_bridge_error, BridgeError, BridgeErrorCodes};
pub use dtmf::{log_dtmf_error, DtmfError, DtmfErrorCodes};

/// Numeric code plus message carried by every bridge and engine error.
///
/// The host binding raises a [`BridgeError`] as a `TypeError` when
/// [`BridgeError::is_type_error`] holds and as a plain `Error` otherwise;
/// the code travels in the message (`"TypeError (code 1001): ..."`). A
/// [`DtmfError`] reaches the host wrapped in `BridgeError::Native` and keeps
/// its own 2xxx code as the error source.
pub trait ErrorCode {
    /// 1xxx for bridge errors, 2xxx for engine rejections
    fn code(&self) -> i32;

    fn message(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_engine_code_survives_host_mapping() {
        let err = BridgeError::from(DtmfError::CannotInsert);

        assert!(!err.is_type_error());
        assert_eq!(err.code(), BridgeErrorCodes::NATIVE);
        assert!(err.to_string().starts_with("Error (code 1004)"));

        let source = err.source().expect("engine error kept as source");
        assert!(source.to_string().contains("code 2001"));
    }
}
