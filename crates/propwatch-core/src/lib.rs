//! propwatch Core - values and reflective objects
//!
//! This crate provides the object model that propwatch observers instrument:
//!
//! - [`Value`]: dynamically typed property values
//! - [`NativeFunction`]: callable values bound to a receiver object
//! - [`PropertyDescriptor`]: data vs accessor descriptors with flags
//! - [`Object`]: a shared key-value object supporting reflective property
//!   description, redefinition and deletion
//!
//! # Quick Start
//!
//! ```ignore
//! use propwatch_core::prelude::*;
//!
//! let subject = Object::new();
//! subject.insert("x", 10);
//! subject.define_property(
//!     "double",
//!     PropertyDescriptor::accessor(
//!         Some(Getter::new(|this| {
//!             let x = this.get("x")?.as_number().unwrap_or(0.0);
//!             Ok(Value::Number(x * 2.0))
//!         })),
//!         None,
//!     ),
//! )?;
//!
//! assert_eq!(subject.get("double")?, Value::from(20));
//! ```

pub mod descriptor;
pub mod error;
pub mod object;
pub mod value;

// Re-export main types at crate root
pub use descriptor::{Getter, PropertyDescriptor, Setter};
pub use error::{ListenerError, ListenerResult, ObjectError, ObjectResult};
pub use object::Object;
pub use value::{NativeFunction, Value};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::descriptor::{Getter, PropertyDescriptor, Setter};
    pub use crate::error::{ListenerError, ObjectError, ObjectResult};
    pub use crate::object::Object;
    pub use crate::value::{NativeFunction, Value};
}
