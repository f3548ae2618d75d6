use std::sync::Arc;

use super::HostValue;
use crate::error::BridgeError;

/// Read-only property getter
pub type Accessor<T> = fn(&T) -> Result<HostValue, BridgeError>;

/// Instance method taking positional host arguments
pub type Method<T> = fn(&T, &[HostValue]) -> Result<HostValue, BridgeError>;

/// Host-facing constructor
pub type Constructor<T> = fn(&[HostValue]) -> Result<Arc<T>, BridgeError>;

/// Instance member exposed to the host
pub enum Member<T> {
    Accessor(Accessor<T>),
    Method(Method<T>),
}

/// Host-visible class: a name, a guarded constructor, accessors and methods.
pub struct ClassDefinition<T> {
    name: &'static str,
    constructor: Constructor<T>,
    members: Vec<(&'static str, Member<T>)>,
}

impl<T> ClassDefinition<T> {
    pub fn new(name: &'static str, constructor: Constructor<T>) -> Self {
        Self {
            name,
            constructor,
            members: Vec::new(),
        }
    }

    pub fn accessor(mut self, name: &'static str, getter: Accessor<T>) -> Self {
        self.members.push((name, Member::Accessor(getter)));
        self
    }

    pub fn method(mut self, name: &'static str, method: Method<T>) -> Self {
        self.members.push((name, Member::Method(method)));
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn member_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.members.iter().map(|(name, _)| *name)
    }

    fn member(&self, name: &str) -> Option<&Member<T>> {
        self.members
            .iter()
            .find(|(member, _)| *member == name)
            .map(|(_, member)| member)
    }

    /// `new Class(...args)` from the host
    pub fn construct(&self, args: &[HostValue]) -> Result<Arc<T>, BridgeError> {
        (self.constructor)(args)
    }

    /// Property read. Unknown names and methods read as `undefined`.
    pub fn get(&self, instance: &T, name: &str) -> Result<HostValue, BridgeError> {
        match self.member(name) {
            Some(Member::Accessor(getter)) => getter(instance),
            _ => Ok(HostValue::Undefined),
        }
    }

    /// Method call. Anything that is not a method is a type error.
    pub fn call(
        &self,
        instance: &T,
        name: &str,
        args: &[HostValue],
    ) -> Result<HostValue, BridgeError> {
        match self.member(name) {
            Some(Member::Method(method)) => method(instance, args),
            _ => Err(BridgeError::NotAFunction {
                name: format!("{}.{}", self.name, name),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Counter {
        value: AtomicU32,
    }

    fn construct_counter(args: &[HostValue]) -> Result<Arc<Counter>, BridgeError> {
        if !args.is_empty() {
            return Err(BridgeError::IllegalConstructor {
                class: "Counter".to_string(),
            });
        }
        Ok(Arc::new(Counter {
            value: AtomicU32::new(0),
        }))
    }

    fn counter_class() -> ClassDefinition<Counter> {
        ClassDefinition::new("Counter", construct_counter)
            .accessor("value", |c| {
                Ok(HostValue::from(c.value.load(Ordering::SeqCst) as i32))
            })
            .method("increment", |c, _| {
                c.value.fetch_add(1, Ordering::SeqCst);
                Ok(HostValue::Undefined)
            })
    }

    #[test]
    fn test_accessor_and_method() {
        let class = counter_class();
        let counter = class.construct(&[]).unwrap();

        class.call(&counter, "increment", &[]).unwrap();
        let value = class.get(&counter, "value").unwrap();
        assert!(matches!(value, HostValue::Number(n) if n == 1.0));
    }

    #[test]
    fn test_unknown_members() {
        let class = counter_class();
        let counter = class.construct(&[]).unwrap();

        assert!(class.get(&counter, "missing").unwrap().is_undefined());
        assert!(class.get(&counter, "increment").unwrap().is_undefined());

        let err = class.call(&counter, "value", &[]).unwrap_err();
        assert_eq!(
            err,
            BridgeError::NotAFunction {
                name: "Counter.value".to_string()
            }
        );
    }

    #[test]
    fn test_guarded_constructor() {
        let class = counter_class();
        let err = class
            .construct(&[HostValue::Null])
            .err()
            .expect("constructor should reject arguments");
        assert!(err.is_type_error());
        assert_eq!(
            class.member_names().collect::<Vec<_>>(),
            vec!["value", "increment"]
        );
    }
}
