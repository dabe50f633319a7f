//! Event name grammar: `<operation>[:<phase>][:<property>]`.
//!
//! All four shapes are subscribable independently, and the engine always
//! fires both the property-qualified and the unqualified form.
//!
//! The grammar is ambiguous for properties literally named `before` or
//! `after`: `get:before` always parses as the phase.

use std::fmt;
use std::str::FromStr;

use crate::error::EventNameError;

/// Fired before a read or call; listeners may supply the result.
pub const GET_BEFORE: &str = "get:before";
/// Fired with the value of a read or call.
pub const GET: &str = "get";
/// Fired after a read or call.
pub const GET_AFTER: &str = "get:after";
/// Fired before a write; a listener returning `false` cancels it.
pub const SET_BEFORE: &str = "set:before";
/// Fired once a write has been applied.
pub const SET: &str = "set";
/// Fired after a write.
pub const SET_AFTER: &str = "set:after";

/// Every unqualified event name, in firing order per operation.
pub const ALL_EVENTS: [&str; 6] = [GET_BEFORE, GET, GET_AFTER, SET_BEFORE, SET, SET_AFTER];

/// The intercepted operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Property read or method call.
    Get,
    /// Property write.
    Set,
}

impl Operation {
    /// Name as it appears in event names.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Get => "get",
            Operation::Set => "set",
        }
    }
}

/// Notification phase. Absent means the result notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Before the operation runs.
    Before,
    /// After the operation and its result notification.
    After,
}

impl Phase {
    /// Name as it appears in event names.
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Before => "before",
            Phase::After => "after",
        }
    }
}

/// A parsed event name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventName {
    /// The operation.
    pub operation: Operation,
    /// The phase, if any.
    pub phase: Option<Phase>,
    /// The property qualifier, if any.
    pub property: Option<String>,
}

impl EventName {
    /// Unqualified result event for `operation`.
    pub fn new(operation: Operation) -> Self {
        Self {
            operation,
            phase: None,
            property: None,
        }
    }

    /// `get` event.
    pub fn get() -> Self {
        Self::new(Operation::Get)
    }

    /// `set` event.
    pub fn set() -> Self {
        Self::new(Operation::Set)
    }

    /// Builder: before phase.
    pub fn before(mut self) -> Self {
        self.phase = Some(Phase::Before);
        self
    }

    /// Builder: after phase.
    pub fn after(mut self) -> Self {
        self.phase = Some(Phase::After);
        self
    }

    /// Builder: qualify with a property name.
    pub fn for_property(mut self, property: impl Into<String>) -> Self {
        self.property = Some(property.into());
        self
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.operation.as_str())?;
        if let Some(phase) = self.phase {
            write!(f, ":{}", phase.as_str())?;
        }
        if let Some(property) = &self.property {
            write!(f, ":{property}")?;
        }
        Ok(())
    }
}

impl FromStr for EventName {
    type Err = EventNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (operation, rest) = match s.split_once(':') {
            Some((op, rest)) => (op, Some(rest)),
            None => (s, None),
        };
        let operation = match operation {
            "get" => Operation::Get,
            "set" => Operation::Set,
            _ => return Err(EventNameError::UnknownOperation(s.to_string())),
        };

        let mut name = EventName::new(operation);
        let Some(rest) = rest else {
            return Ok(name);
        };

        let (head, tail) = match rest.split_once(':') {
            Some((head, tail)) => (head, Some(tail)),
            None => (rest, None),
        };
        let property = match head {
            "before" => {
                name.phase = Some(Phase::Before);
                tail
            }
            "after" => {
                name.phase = Some(Phase::After);
                tail
            }
            _ => Some(rest),
        };

        if let Some(property) = property {
            if property.is_empty() {
                return Err(EventNameError::EmptyProperty(s.to_string()));
            }
            name.property = Some(property.to_string());
        }
        Ok(name)
    }
}

/// The six property-qualified event names of one property, built once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyEvents {
    pub get_before: String,
    pub get: String,
    pub get_after: String,
    pub set_before: String,
    pub set: String,
    pub set_after: String,
}

impl PropertyEvents {
    /// Build the qualified names for `property`.
    pub fn for_property(property: &str) -> Self {
        Self {
            get_before: format!("{GET_BEFORE}:{property}"),
            get: format!("{GET}:{property}"),
            get_after: format!("{GET_AFTER}:{property}"),
            set_before: format!("{SET_BEFORE}:{property}"),
            set: format!("{SET}:{property}"),
            set_after: format!("{SET_AFTER}:{property}"),
        }
    }
}
