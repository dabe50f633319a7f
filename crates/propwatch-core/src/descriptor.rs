//! Property descriptors: data vs accessor, with enumerable/configurable flags.

use std::fmt;
use std::sync::Arc;

use crate::error::ObjectResult;
use crate::object::Object;
use crate::value::Value;

type GetterBody = dyn Fn(&Object) -> ObjectResult<Value> + Send + Sync;
type SetterBody = dyn Fn(&Object, Value) -> ObjectResult<()> + Send + Sync;

/// Read accessor of an accessor property.
#[derive(Clone)]
pub struct Getter(Arc<GetterBody>);

impl Getter {
    /// Create a getter.
    pub fn new<F>(body: F) -> Self
    where
        F: Fn(&Object) -> ObjectResult<Value> + Send + Sync + 'static,
    {
        Self(Arc::new(body))
    }

    /// Invoke the getter with `this` bound to `receiver`.
    pub fn get(&self, receiver: &Object) -> ObjectResult<Value> {
        (self.0)(receiver)
    }
}

impl PartialEq for Getter {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Getter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Getter({:p})", Arc::as_ptr(&self.0) as *const ())
    }
}

/// Write accessor of an accessor property.
#[derive(Clone)]
pub struct Setter(Arc<SetterBody>);

impl Setter {
    /// Create a setter.
    pub fn new<F>(body: F) -> Self
    where
        F: Fn(&Object, Value) -> ObjectResult<()> + Send + Sync + 'static,
    {
        Self(Arc::new(body))
    }

    /// Invoke the setter with `this` bound to `receiver`.
    pub fn set(&self, receiver: &Object, value: Value) -> ObjectResult<()> {
        (self.0)(receiver, value)
    }
}

impl PartialEq for Setter {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Setter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Setter({:p})", Arc::as_ptr(&self.0) as *const ())
    }
}

/// How a property stores or computes its value.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyDescriptor {
    /// Data descriptor: a stored value.
    Data {
        value: Value,
        writable: bool,
        enumerable: bool,
        configurable: bool,
    },
    /// Accessor descriptor: `get` and/or `set`.
    Accessor {
        get: Option<Getter>,
        set: Option<Setter>,
        enumerable: bool,
        configurable: bool,
    },
}

impl PropertyDescriptor {
    /// Create a default data descriptor (writable, enumerable, configurable).
    pub fn data(value: impl Into<Value>) -> Self {
        Self::Data {
            value: value.into(),
            writable: true,
            enumerable: true,
            configurable: true,
        }
    }

    /// Create an enumerable, configurable accessor descriptor.
    pub fn accessor(get: Option<Getter>, set: Option<Setter>) -> Self {
        Self::Accessor {
            get,
            set,
            enumerable: true,
            configurable: true,
        }
    }

    /// Is this descriptor configurable?
    pub fn is_configurable(&self) -> bool {
        match self {
            Self::Data { configurable, .. } | Self::Accessor { configurable, .. } => *configurable,
        }
    }

    /// Is this descriptor enumerable?
    pub fn is_enumerable(&self) -> bool {
        match self {
            Self::Data { enumerable, .. } | Self::Accessor { enumerable, .. } => *enumerable,
        }
    }

    /// Is this a data descriptor?
    pub fn is_data(&self) -> bool {
        matches!(self, Self::Data { .. })
    }

    /// Is this an accessor descriptor?
    pub fn is_accessor(&self) -> bool {
        matches!(self, Self::Accessor { .. })
    }

    /// Is this a data descriptor with writable=true?
    pub fn is_writable(&self) -> bool {
        match self {
            Self::Data { writable, .. } => *writable,
            Self::Accessor { .. } => false,
        }
    }

    /// Get the value if this is a data descriptor.
    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::Data { value, .. } => Some(value),
            Self::Accessor { .. } => None,
        }
    }

    /// Get the getter, if any.
    pub fn getter(&self) -> Option<&Getter> {
        match self {
            Self::Accessor { get, .. } => get.as_ref(),
            Self::Data { .. } => None,
        }
    }

    /// Get the setter, if any.
    pub fn setter(&self) -> Option<&Setter> {
        match self {
            Self::Accessor { set, .. } => set.as_ref(),
            Self::Data { .. } => None,
        }
    }

    /// Builder: set the enumerable flag.
    pub fn with_enumerable(mut self, flag: bool) -> Self {
        match &mut self {
            Self::Data { enumerable, .. } | Self::Accessor { enumerable, .. } => *enumerable = flag,
        }
        self
    }

    /// Builder: set the configurable flag.
    pub fn with_configurable(mut self, flag: bool) -> Self {
        match &mut self {
            Self::Data { configurable, .. } | Self::Accessor { configurable, .. } => {
                *configurable = flag
            }
        }
        self
    }

    /// Builder: set the writable flag (no-op for accessors).
    pub fn with_writable(mut self, flag: bool) -> Self {
        if let Self::Data { writable, .. } = &mut self {
            *writable = flag;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_defaults() {
        let desc = PropertyDescriptor::data(5);
        assert!(desc.is_data());
        assert!(desc.is_writable());
        assert!(desc.is_enumerable());
        assert!(desc.is_configurable());
        assert_eq!(desc.value(), Some(&Value::from(5)));
    }

    #[test]
    fn test_builder_flags() {
        let desc = PropertyDescriptor::data(5)
            .with_writable(false)
            .with_enumerable(false)
            .with_configurable(false);
        assert!(!desc.is_writable());
        assert!(!desc.is_enumerable());
        assert!(!desc.is_configurable());
    }

    #[test]
    fn test_accessor_identity() {
        let get = Getter::new(|_| Ok(Value::from(1)));
        let desc = PropertyDescriptor::accessor(Some(get.clone()), None);
        assert!(desc.is_accessor());
        assert!(!desc.is_writable());
        assert_eq!(desc.getter(), Some(&get));
        assert!(desc.setter().is_none());
        assert_ne!(get, Getter::new(|_| Ok(Value::from(1))));
    }
}
