//! The reflective object that observers instrument.
//!
//! `Object` is a shared handle over an ordered table of named properties.
//! Every clone refers to the same table, so an observer that redefines a
//! property is visible to every other holder of the handle. Properties keep
//! insertion order; deleting and redefining a property moves it to the end.
//!
//! Getters, setters and functions are always invoked with no internal lock
//! held, so accessor code may read or write other properties of the same
//! object.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::trace;

use crate::descriptor::PropertyDescriptor;
use crate::error::{ObjectError, ObjectResult};
use crate::value::Value;

/// A mutable, shared key-value object with reflective property descriptors.
#[derive(Clone, Default)]
pub struct Object {
    properties: Arc<RwLock<Vec<(String, PropertyDescriptor)>>>,
}

impl Object {
    /// Create an empty object.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an object from a JSON value. Non-object JSON yields an empty object.
    pub fn from_json(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Object(map) => Self::from_json_map(map),
            _ => Self::new(),
        }
    }

    pub(crate) fn from_json_map(map: serde_json::Map<String, serde_json::Value>) -> Self {
        let object = Self::new();
        for (name, value) in map {
            object.insert(name, Value::from(value));
        }
        object
    }

    /// Check whether two handles refer to the same object.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.properties, &other.properties)
    }

    /// Define (or replace) a plain data property with default flags.
    pub fn insert(&self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let desc = PropertyDescriptor::data(value);
        let mut properties = self.properties.write();
        match properties.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = desc,
            None => properties.push((name, desc)),
        }
    }

    /// Return a copy of the own property descriptor for `name`.
    pub fn get_own_property(&self, name: &str) -> Option<PropertyDescriptor> {
        self.properties
            .read()
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, desc)| desc.clone())
    }

    /// Does this object have an own property `name`?
    pub fn has_own_property(&self, name: &str) -> bool {
        self.properties.read().iter().any(|(n, _)| n == name)
    }

    /// Define or replace a property.
    ///
    /// # Errors
    ///
    /// Returns [`ObjectError::NotConfigurable`] if the existing property is
    /// non-configurable.
    pub fn define_property(
        &self,
        name: impl Into<String>,
        desc: PropertyDescriptor,
    ) -> ObjectResult<()> {
        let name = name.into();
        let mut properties = self.properties.write();
        match properties.iter_mut().find(|(n, _)| *n == name) {
            Some((_, current)) => {
                if !current.is_configurable() {
                    return Err(ObjectError::NotConfigurable(name));
                }
                *current = desc;
            }
            None => properties.push((name, desc)),
        }
        Ok(())
    }

    /// Delete a property. Returns `false` if it is non-configurable.
    pub fn delete(&self, name: &str) -> bool {
        let mut properties = self.properties.write();
        match properties.iter().position(|(n, _)| n == name) {
            Some(index) => {
                if !properties[index].1.is_configurable() {
                    return false;
                }
                properties.remove(index);
                true
            }
            None => true,
        }
    }

    /// Read a property: the stored value, the getter result, or `Undefined`.
    pub fn get(&self, name: &str) -> ObjectResult<Value> {
        match self.get_own_property(name) {
            Some(PropertyDescriptor::Data { value, .. }) => Ok(value),
            Some(PropertyDescriptor::Accessor { get: Some(get), .. }) => get.get(self),
            Some(PropertyDescriptor::Accessor { get: None, .. }) | None => Ok(Value::Undefined),
        }
    }

    /// Assign a property.
    ///
    /// An absent property is created as a default data property. Writes to a
    /// non-writable data property or to an accessor without a setter are
    /// silently ignored.
    pub fn set(&self, name: &str, value: impl Into<Value>) -> ObjectResult<()> {
        let value = value.into();
        let setter = {
            let mut properties = self.properties.write();
            match properties.iter_mut().find(|(n, _)| n == name) {
                Some((_, PropertyDescriptor::Data { value: slot, writable, .. })) => {
                    if *writable {
                        *slot = value;
                    } else {
                        trace!(property = name, "Ignored write to read-only property");
                    }
                    return Ok(());
                }
                Some((_, PropertyDescriptor::Accessor { set, .. })) => set.clone(),
                None => {
                    properties.push((name.to_string(), PropertyDescriptor::data(value)));
                    return Ok(());
                }
            }
        };

        match setter {
            Some(set) => set.set(self, value),
            None => {
                trace!(property = name, "Ignored write to accessor without setter");
                Ok(())
            }
        }
    }

    /// Call the function stored in property `name` with `this` bound to self.
    pub fn call(&self, name: &str, args: &[Value]) -> ObjectResult<Value> {
        match self.get(name)? {
            Value::Function(f) => f.call(self, args),
            _ => Err(ObjectError::NotCallable(name.to_string())),
        }
    }

    /// Own enumerable property names, in definition order.
    pub fn keys(&self) -> Vec<String> {
        self.properties
            .read()
            .iter()
            .filter(|(_, desc)| desc.is_enumerable())
            .map(|(n, _)| n.clone())
            .collect()
    }

    /// All own property names, enumerable or not.
    pub fn own_property_names(&self) -> Vec<String> {
        self.properties.read().iter().map(|(n, _)| n.clone()).collect()
    }

    /// Own enumerable data properties and their values. Accessors are skipped.
    pub fn data_entries(&self) -> Vec<(String, Value)> {
        self.properties
            .read()
            .iter()
            .filter(|(_, desc)| desc.is_enumerable())
            .filter_map(|(n, desc)| desc.value().map(|v| (n.clone(), v.clone())))
            .collect()
    }

    /// Number of own properties.
    pub fn len(&self) -> usize {
        self.properties.read().len()
    }

    /// Check if the object has no own properties.
    pub fn is_empty(&self) -> bool {
        self.properties.read().is_empty()
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("properties", &self.own_property_names())
            .finish()
    }
}
