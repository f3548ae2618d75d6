// Bridge error types and constants

use crate::error::{DtmfError, ErrorCode};
use log::error;
use std::fmt;

/// Bridge error code constants
///
/// Error code range: 1001-1007
pub struct BridgeErrorCodes {}

impl BridgeErrorCodes {
    /// Guarded constructor was called with the wrong argument shape
    pub const ILLEGAL_CONSTRUCTOR: i32 = 1001;

    /// A required host argument could not be converted
    pub const INVALID_ARGUMENT: i32 = 1002;

    /// Called a member that is not a method
    pub const NOT_A_FUNCTION: i32 = 1003;

    /// The media engine rejected the request
    pub const NATIVE: i32 = 1004;

    /// Host-facing call made off the home thread
    pub const WRONG_THREAD: i32 = 1005;

    /// Mutex/RwLock was poisoned
    pub const LOCK_POISONED: i32 = 1006;

    /// Bridge context has been shut down
    pub const CONTEXT_SHUT_DOWN: i32 = 1007;
}

/// Log a bridge error with structured context
///
/// Emits the numeric code, the component and the message so host-side
/// failures can be correlated with native logs.
pub fn log_bridge_error(err: &BridgeError, context: &str) {
    error!(
        "Bridge error in {}: code={}, component=RTCDTMFSender, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors surfaced to the host runtime
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    /// Wrong argument count or types passed to a guarded constructor
    IllegalConstructor { class: String },

    /// Required argument failed conversion
    InvalidArgument { message: String },

    /// Called something that is not a method
    NotAFunction { name: String },

    /// Media engine rejected the request
    Native { source: DtmfError },

    /// Host-facing operation invoked off the home thread
    WrongThread { operation: String },

    /// Mutex/RwLock was poisoned
    LockPoisoned { component: String },

    /// Bridge context has been shut down
    ContextShutDown,
}

impl BridgeError {
    /// True for the errors a host runtime raises as a `TypeError`
    pub fn is_type_error(&self) -> bool {
        matches!(
            self,
            BridgeError::IllegalConstructor { .. }
                | BridgeError::InvalidArgument { .. }
                | BridgeError::NotAFunction { .. }
        )
    }
}

impl ErrorCode for BridgeError {
    fn code(&self) -> i32 {
        match self {
            BridgeError::IllegalConstructor { .. } => BridgeErrorCodes::ILLEGAL_CONSTRUCTOR,
            BridgeError::InvalidArgument { .. } => BridgeErrorCodes::INVALID_ARGUMENT,
            BridgeError::NotAFunction { .. } => BridgeErrorCodes::NOT_A_FUNCTION,
            BridgeError::Native { .. } => BridgeErrorCodes::NATIVE,
            BridgeError::WrongThread { .. } => BridgeErrorCodes::WRONG_THREAD,
            BridgeError::LockPoisoned { .. } => BridgeErrorCodes::LOCK_POISONED,
            BridgeError::ContextShutDown => BridgeErrorCodes::CONTEXT_SHUT_DOWN,
        }
    }

    fn message(&self) -> String {
        match self {
            BridgeError::IllegalConstructor { class } => {
                format!("You cannot construct an {}", class)
            }
            BridgeError::InvalidArgument { message } => message.clone(),
            BridgeError::NotAFunction { name } => format!("{} is not a function", name),
            BridgeError::Native { source } => source.message(),
            BridgeError::WrongThread { operation } => {
                format!("{} must be called on the host runtime thread", operation)
            }
            BridgeError::LockPoisoned { component } => {
                format!("Lock poisoned on {}", component)
            }
            BridgeError::ContextShutDown => "Bridge context has been shut down".to_string(),
        }
    }
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_type_error() {
            "TypeError"
        } else {
            "Error"
        };
        write!(f, "{} (code {}): {}", kind, self.code(), self.message())
    }
}

impl std::error::Error for BridgeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BridgeError::Native { source } => Some(source),
            _ => None,
        }
    }
}

impl From<DtmfError> for BridgeError {
    fn from(source: DtmfError) -> Self {
        BridgeError::Native { source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bridge_error_codes() {
        assert_eq!(
            BridgeError::IllegalConstructor {
                class: "RTCDTMFSender".to_string()
            }
            .code(),
            BridgeErrorCodes::ILLEGAL_CONSTRUCTOR
        );
        assert_eq!(
            BridgeError::Native {
                source: DtmfError::CannotInsert
            }
            .code(),
            BridgeErrorCodes::NATIVE
        );
        assert_eq!(
            BridgeError::ContextShutDown.code(),
            BridgeErrorCodes::CONTEXT_SHUT_DOWN
        );
    }

    #[test]
    fn test_type_error_classification() {
        assert!(BridgeError::IllegalConstructor {
            class: "RTCDTMFSender".to_string()
        }
        .is_type_error());
        assert!(BridgeError::InvalidArgument {
            message: "Expected a string".to_string()
        }
        .is_type_error());
        assert!(!BridgeError::Native {
            source: DtmfError::CannotInsert
        }
        .is_type_error());
        assert!(!BridgeError::LockPoisoned {
            component: "x".to_string()
        }
        .is_type_error());
    }

    #[test]
    fn test_illegal_constructor_message() {
        let err = BridgeError::IllegalConstructor {
            class: "RTCDTMFSender".to_string(),
        };
        assert_eq!(err.message(), "You cannot construct an RTCDTMFSender");
        assert!(format!("{}", err).starts_with("TypeError"));
    }

    #[test]
    fn test_from_dtmf_error_keeps_source() {
        use std::error::Error;

        let err: BridgeError = DtmfError::CannotInsert.into();
        assert!(err.source().is_some());
        assert!(format!("{}", err).starts_with("Error"));
    }
}
