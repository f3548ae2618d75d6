// Native-layer DTMF error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Native DTMF error code constants
///
/// Error code range: 2001-2004
pub struct DtmfErrorCodes {}

impl DtmfErrorCodes {
    /// The channel cannot send DTMF right now (no audio track, not negotiated)
    pub const CANNOT_INSERT: i32 = 2001;

    /// The tone string contains characters outside the DTMF alphabet
    pub const INVALID_TONES: i32 = 2002;

    /// Tone duration is outside the range accepted by the engine
    pub const INVALID_DURATION: i32 = 2003;

    /// Inter-tone gap is below the engine minimum
    pub const INVALID_INTER_TONE_GAP: i32 = 2004;
}

/// Log a native DTMF error with structured context
pub fn log_dtmf_error(err: &DtmfError, context: &str) {
    error!(
        "DTMF error in {}: code={}, component=DtmfSender, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors reported by the media engine when it rejects an insert request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DtmfError {
    /// Channel is not ready to send DTMF
    CannotInsert,

    /// Tone string contains an unsupported character
    InvalidTones { tones: String },

    /// Duration outside `[min, max]` milliseconds
    InvalidDuration { duration_ms: i32, min: i32, max: i32 },

    /// Gap shorter than `min` milliseconds
    InvalidInterToneGap { gap_ms: i32, min: i32 },
}

impl ErrorCode for DtmfError {
    fn code(&self) -> i32 {
        match self {
            DtmfError::CannotInsert => DtmfErrorCodes::CANNOT_INSERT,
            DtmfError::InvalidTones { .. } => DtmfErrorCodes::INVALID_TONES,
            DtmfError::InvalidDuration { .. } => DtmfErrorCodes::INVALID_DURATION,
            DtmfError::InvalidInterToneGap { .. } => DtmfErrorCodes::INVALID_INTER_TONE_GAP,
        }
    }

    fn message(&self) -> String {
        match self {
            DtmfError::CannotInsert => "DTMF cannot be inserted on this channel".to_string(),
            DtmfError::InvalidTones { tones } => {
                format!("Invalid DTMF tones: {:?}", tones)
            }
            DtmfError::InvalidDuration {
                duration_ms,
                min,
                max,
            } => format!(
                "DTMF duration must be between {} and {} ms (got {})",
                min, max, duration_ms
            ),
            DtmfError::InvalidInterToneGap { gap_ms, min } => format!(
                "DTMF inter-tone gap must be at least {} ms (got {})",
                min, gap_ms
            ),
        }
    }
}

impl fmt::Display for DtmfError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DtmfError (code {}): {}", self.code(), self.message())
    }
}

impl std::error::Error for DtmfError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dtmf_error_codes() {
        assert_eq!(DtmfError::CannotInsert.code(), DtmfErrorCodes::CANNOT_INSERT);
        assert_eq!(
            DtmfError::InvalidTones {
                tones: "x".to_string()
            }
            .code(),
            DtmfErrorCodes::INVALID_TONES
        );
        assert_eq!(
            DtmfError::InvalidDuration {
                duration_ms: 1,
                min: 40,
                max: 6000
            }
            .code(),
            DtmfErrorCodes::INVALID_DURATION
        );
        assert_eq!(
            DtmfError::InvalidInterToneGap { gap_ms: 1, min: 30 }.code(),
            DtmfErrorCodes::INVALID_INTER_TONE_GAP
        );
    }

    #[test]
    fn test_dtmf_error_messages() {
        let err = DtmfError::InvalidDuration {
            duration_ms: 10,
            min: 40,
            max: 6000,
        };
        assert_eq!(
            err.message(),
            "DTMF duration must be between 40 and 6000 ms (got 10)"
        );

        let err = DtmfError::InvalidTones {
            tones: "12x".to_string(),
        };
        assert!(err.message().contains("12x"));
        assert!(format!("{}", err).contains("2002"));
    }
}
