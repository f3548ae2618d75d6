//! Host runtime value model
//!
//! The bridge never sees the host runtime's real value system. Arguments
//! and results cross the boundary as [`HostValue`]s, and host-visible classes
//! are described by a [`ClassDefinition`].

use std::any::Any;
use std::fmt;
use std::sync::Arc;

mod class;
mod convert;

pub use class::{ClassDefinition, Member};
pub use convert::{to_i32_arg, to_string_arg};

/// Host object reference (a wrapped Rust object the host can pass around)
pub type HostObject = Arc<dyn Any + Send + Sync>;

/// Opaque carrier for a native pointer.
///
/// Only the crate can create one, so host code can hold and pass these
/// around but never fabricate them.
#[derive(Clone)]
pub struct NativeExternal {
    data: Arc<dyn Any + Send + Sync>,
}

impl NativeExternal {
    pub(crate) fn new<T: Any + Send + Sync>(data: T) -> Self {
        Self {
            data: Arc::new(data),
        }
    }

    pub(crate) fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.data.downcast_ref::<T>()
    }
}

/// A value crossing the host boundary
#[derive(Clone, Default)]
pub enum HostValue {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Object(HostObject),
    External(NativeExternal),
}

impl HostValue {
    /// Wrap a shared Rust object as a host object
    pub fn object<T: Any + Send + Sync>(object: Arc<T>) -> Self {
        HostValue::Object(object)
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, HostValue::Undefined)
    }

    pub fn is_object(&self) -> bool {
        matches!(self, HostValue::Object(_))
    }

    pub fn is_external(&self) -> bool {
        matches!(self, HostValue::External(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            HostValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            HostValue::String(value) => Some(value),
            _ => None,
        }
    }

    /// Downcast an object value to a concrete shared type
    pub fn downcast_object<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        match self {
            HostValue::Object(object) => Arc::clone(object).downcast::<T>().ok(),
            _ => None,
        }
    }
}

impl fmt::Debug for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostValue::Undefined => write!(f, "undefined"),
            HostValue::Null => write!(f, "null"),
            HostValue::Bool(value) => write!(f, "{}", value),
            HostValue::Number(value) => write!(f, "{}", value),
            HostValue::String(value) => write!(f, "{:?}", value),
            HostValue::Object(_) => write!(f, "[object]"),
            HostValue::External(_) => write!(f, "[external]"),
        }
    }
}

impl From<bool> for HostValue {
    fn from(value: bool) -> Self {
        HostValue::Bool(value)
    }
}

impl From<i32> for HostValue {
    fn from(value: i32) -> Self {
        HostValue::Number(value as f64)
    }
}

impl From<f64> for HostValue {
    fn from(value: f64) -> Self {
        HostValue::Number(value)
    }
}

impl From<&str> for HostValue {
    fn from(value: &str) -> Self {
        HostValue::String(value.to_string())
    }
}

impl From<String> for HostValue {
    fn from(value: String) -> Self {
        HostValue::String(value)
    }
}
