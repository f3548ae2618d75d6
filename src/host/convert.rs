use super::HostValue;
use crate::error::BridgeError;

/// Convert a required string argument.
///
/// Anything other than a host string is a type error.
pub fn to_string_arg(value: Option<&HostValue>) -> Result<String, BridgeError> {
    match value {
        Some(HostValue::String(value)) => Ok(value.clone()),
        _ => Err(BridgeError::InvalidArgument {
            message: "Expected a string".to_string(),
        }),
    }
}

/// Convert an optional integer argument.
///
/// Only finite numbers inside the `i32` range convert (fractions are
/// truncated). Everything else, including absence, yields `None` so callers
/// can substitute their default.
pub fn to_i32_arg(value: Option<&HostValue>) -> Option<i32> {
    match value {
        Some(HostValue::Number(number))
            if number.is_finite()
                && *number >= i32::MIN as f64
                && *number <= i32::MAX as f64 =>
        {
            Some(number.trunc() as i32)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_arg() {
        assert_eq!(
            to_string_arg(Some(&HostValue::from("123#"))).unwrap(),
            "123#"
        );
        assert!(to_string_arg(None).unwrap_err().is_type_error());
        assert!(to_string_arg(Some(&HostValue::from(5)))
            .unwrap_err()
            .is_type_error());
    }

    #[test]
    fn test_i32_arg() {
        assert_eq!(to_i32_arg(Some(&HostValue::from(80))), Some(80));
        assert_eq!(to_i32_arg(Some(&HostValue::from(80.9))), Some(80));
        assert_eq!(to_i32_arg(Some(&HostValue::from(-5))), Some(-5));
        assert_eq!(to_i32_arg(Some(&HostValue::from("bad"))), None);
        assert_eq!(to_i32_arg(Some(&HostValue::from(f64::NAN))), None);
        assert_eq!(to_i32_arg(Some(&HostValue::from(1e12))), None);
        assert_eq!(to_i32_arg(Some(&HostValue::Undefined)), None);
        assert_eq!(to_i32_arg(None), None);
    }
}
