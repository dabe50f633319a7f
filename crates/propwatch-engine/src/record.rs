//! Per-property instrumentation records.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use propwatch_core::{Getter, NativeFunction, PropertyDescriptor, Setter, Value};

use crate::protocol::Interception;

/// How a property is intercepted, decided once from its original
/// descriptor.
#[derive(Debug, Clone)]
pub enum PropertyKind {
    /// A data property holding a function. Replaced by a wrapper function.
    Callable(NativeFunction),
    /// A plain data property, or a property that does not exist yet.
    /// Replaced by an accessor pair over a cached value.
    Data {
        /// Whether the original accepted writes.
        writable: bool,
    },
    /// An accessor property. Replaced by wrappers around whichever of the
    /// original accessors exist.
    Accessor {
        get: Option<Getter>,
        set: Option<Setter>,
    },
}

impl PropertyKind {
    /// Classify a captured descriptor. Getters are never invoked here.
    pub fn classify(descriptor: Option<&PropertyDescriptor>) -> Self {
        match descriptor {
            None => PropertyKind::Data { writable: true },
            Some(PropertyDescriptor::Data {
                value: Value::Function(function),
                ..
            }) => PropertyKind::Callable(function.clone()),
            Some(PropertyDescriptor::Data { writable, .. }) => PropertyKind::Data {
                writable: *writable,
            },
            Some(PropertyDescriptor::Accessor { get, set, .. }) => PropertyKind::Accessor {
                get: get.clone(),
                set: set.clone(),
            },
        }
    }

    /// Short label for reports.
    pub fn label(&self) -> &'static str {
        match self {
            PropertyKind::Callable(_) => "function",
            PropertyKind::Data { .. } => "data",
            PropertyKind::Accessor { .. } => "accessor",
        }
    }
}

/// Metadata and cached state for one instrumented property.
///
/// A record exists exactly while its property is instrumented.
#[derive(Debug)]
pub struct PropertyRecord {
    name: String,
    descriptor: Option<PropertyDescriptor>,
    kind: PropertyKind,
    interception: Arc<Interception>,
    installed: Option<NativeFunction>,
}

impl PropertyRecord {
    pub(crate) fn new(
        name: String,
        descriptor: Option<PropertyDescriptor>,
        kind: PropertyKind,
        interception: Arc<Interception>,
    ) -> Self {
        Self {
            name,
            descriptor,
            kind,
            interception,
            installed: None,
        }
    }

    pub(crate) fn set_installed(&mut self, wrapper: NativeFunction) {
        self.installed = Some(wrapper);
    }

    /// Property name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The descriptor captured before instrumentation, if the property
    /// existed.
    pub fn descriptor(&self) -> Option<&PropertyDescriptor> {
        self.descriptor.as_ref()
    }

    /// Classification.
    pub fn kind(&self) -> &PropertyKind {
        &self.kind
    }

    /// The wrapper installed in place of a callable, if any.
    pub fn installed(&self) -> Option<&NativeFunction> {
        self.installed.as_ref()
    }

    pub fn has_getter(&self) -> bool {
        matches!(&self.kind, PropertyKind::Accessor { get: Some(_), .. })
    }

    pub fn has_setter(&self) -> bool {
        matches!(&self.kind, PropertyKind::Accessor { set: Some(_), .. })
    }

    pub fn is_getter_setter_mode(&self) -> bool {
        matches!(self.kind, PropertyKind::Accessor { .. })
    }

    pub fn is_getable(&self) -> bool {
        self.has_getter() || !self.is_getter_setter_mode()
    }

    /// True for setters and writable data properties.
    pub fn is_setable(&self) -> bool {
        match &self.kind {
            PropertyKind::Accessor { set, .. } => set.is_some(),
            PropertyKind::Data { writable } => *writable,
            PropertyKind::Callable(_) => self.descriptor.as_ref().is_none_or(|d| d.is_writable()),
        }
    }

    pub fn is_function(&self) -> bool {
        matches!(self.kind, PropertyKind::Callable(_))
    }

    /// Missing properties are treated as enumerable.
    pub fn is_enumerable(&self) -> bool {
        self.descriptor.as_ref().is_none_or(|d| d.is_enumerable())
    }

    /// The value held by the engine for a data property.
    pub fn cached_value(&self) -> Value {
        self.interception.cached_value()
    }

    /// Serializable description.
    pub fn summary(&self) -> PropertySummary {
        PropertySummary {
            name: self.name.clone(),
            kind: self.kind.label().to_string(),
            defined: self.descriptor.is_some(),
            has_getter: self.has_getter(),
            has_setter: self.has_setter(),
            is_getter_setter_mode: self.is_getter_setter_mode(),
            is_getable: self.is_getable(),
            is_setable: self.is_setable(),
            is_function: self.is_function(),
            is_enumerable: self.is_enumerable(),
        }
    }
}

/// Classification of an instrumented property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertySummary {
    pub name: String,
    pub kind: String,
    /// Whether the property existed when it was instrumented.
    pub defined: bool,
    pub has_getter: bool,
    pub has_setter: bool,
    pub is_getter_setter_mode: bool,
    pub is_getable: bool,
    pub is_setable: bool,
    pub is_function: bool,
    pub is_enumerable: bool,
}
