//! The class-definition / back-reference registry
//!
//! Process-wide state binding caller-declared user types to wire class
//! names and ordered field-name lists, plus the append-only list of class
//! definitions observed on the wire. A single reader-writer lock guards
//! all three tables as one unit (deliberately not a sharded concurrent
//! map per table, which would let the tables observe each other's
//! mutations out of order — see SPEC_FULL.md §5).

use std::collections::HashMap;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::value::{ObjectValue, Value};

/// A caller-declared user type that carries a stable wire class name and
/// whose fields are serialized in declaration order.
///
/// Rust has no runtime struct reflection, so unlike the original dynamic
/// implementation this core asks the type to declare its own shape
/// rather than deriving it by inspection.
pub trait Pojo {
    /// Stable wire ("Java") class name for this type.
    fn wire_class_name() -> &'static str
    where
        Self: Sized;

    /// Declared field names, in declaration order. Lower-cased at
    /// registration time to match wire field-name conventions.
    fn field_names() -> &'static [&'static str]
    where
        Self: Sized;
}

/// An immutable, append-only wire-level schema record: class name plus
/// ordered field-name list, referenced by index from later object
/// instances.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassDef {
    /// Wire ("Java") class name.
    pub wire_class_name: String,
    /// Field names, lower-cased, in declaration order.
    pub field_names: Vec<String>,
}

impl ClassDef {
    /// Number of fields in this definition.
    pub fn field_count(&self) -> usize {
        self.field_names.len()
    }
}

/// The binding between a user-declared type and a [`ClassDef`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructInfo {
    /// A stable identifier for the user type (`std::any::type_name`).
    pub user_type_name: String,
    /// Wire ("Java") class name.
    pub wire_class_name: String,
    /// Field names, lower-cased, in declaration order.
    pub field_names: Vec<String>,
    /// Index at which the corresponding [`ClassDef`] was appended.
    pub class_index: usize,
}

#[derive(Default)]
struct Inner {
    class_defs: Vec<ClassDef>,
    wire_to_user: HashMap<String, String>,
    user_to_struct: HashMap<String, StructInfo>,
}

/// Process-wide class registry.
pub struct PojoRegistry {
    inner: RwLock<Inner>,
}

impl Default for PojoRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PojoRegistry {
    /// Construct an empty registry.
    pub fn new() -> Self {
        Self { inner: RwLock::new(Inner::default()) }
    }

    /// Register a user-declared type under its wire class name. Computes
    /// lower-cased field names preserving declaration order, appends a
    /// [`ClassDef`], and returns its index. If the wire class name is
    /// already registered, returns `-1` (idempotent; first registration
    /// wins).
    pub fn register<T: Pojo>(&self) -> i32 {
        let wire_class_name = T::wire_class_name();
        let user_type_name = std::any::type_name::<T>();

        let mut inner = self.inner.write();
        if inner.wire_to_user.contains_key(wire_class_name) {
            tracing::trace!(wire_class_name, "pojo already registered, no-op");
            return -1;
        }

        let field_names: Vec<String> =
            T::field_names().iter().map(|f| f.to_lowercase()).collect();

        let class_index = inner.class_defs.len();
        inner.class_defs.push(ClassDef {
            wire_class_name: wire_class_name.to_string(),
            field_names: field_names.clone(),
        });
        inner
            .wire_to_user
            .insert(wire_class_name.to_string(), user_type_name.to_string());
        inner.user_to_struct.insert(
            user_type_name.to_string(),
            StructInfo {
                user_type_name: user_type_name.to_string(),
                wire_class_name: wire_class_name.to_string(),
                field_names,
                class_index,
            },
        );

        tracing::debug!(wire_class_name, class_index, "registered pojo");
        class_index as i32
    }

    /// Look up the registered class index for a user type, or `None` if
    /// it has not been registered.
    pub fn lookup_by_user_type<T: 'static>(&self) -> Option<i32> {
        let user_type_name = std::any::type_name::<T>();
        let inner = self.inner.read();
        inner.user_to_struct.get(user_type_name).map(|s| s.class_index as i32)
    }

    /// Look up the [`StructInfo`] bound to a wire class name.
    pub fn lookup_by_wire_name(&self, wire_class_name: &str) -> Option<StructInfo> {
        let inner = self.inner.read();
        let user_type_name = inner.wire_to_user.get(wire_class_name)?;
        inner.user_to_struct.get(user_type_name).cloned()
    }

    /// Return the user-type name and [`ClassDef`] for the `i`-th
    /// appended class definition.
    pub fn struct_by_index(&self, index: i32) -> Result<(Option<String>, ClassDef)> {
        let inner = self.inner.read();
        if index < 0 || index as usize >= inner.class_defs.len() {
            return Err(Error::IllegalClassIndex { index, len: inner.class_defs.len() });
        }
        let def = inner.class_defs[index as usize].clone();
        let user_type_name = inner.wire_to_user.get(&def.wire_class_name).cloned();
        Ok((user_type_name, def))
    }

    /// Append a class definition learned from the wire (used by the
    /// decoder for definitions describing types the caller has not
    /// locally registered). Returns the assigned index.
    pub fn append_class_def(&self, wire_class_name: String, field_names: Vec<String>) -> usize {
        let mut inner = self.inner.write();
        let index = inner.class_defs.len();
        tracing::debug!(wire_class_name = %wire_class_name, class_index = index, "learned class definition from wire");
        inner.class_defs.push(ClassDef { wire_class_name, field_names });
        index
    }

    /// Construct a fresh, field-less [`ObjectValue`] skeleton for a
    /// registered user type, or `None` if it has not been registered.
    /// Fields are filled in by the caller (the decoder, when
    /// materializing a typed map into a registered object shape).
    pub fn new_instance(&self, user_type_name: &str) -> Option<ObjectValue> {
        let inner = self.inner.read();
        let info = inner.user_to_struct.get(user_type_name)?;
        Some(ObjectValue {
            class_index: info.class_index as i32,
            fields: vec![Value::Null; info.field_names.len()],
        })
    }

    /// Total number of class definitions observed so far (registered +
    /// learned from the wire).
    pub fn len(&self) -> usize {
        self.inner.read().class_defs.len()
    }

    /// Whether the registry has no class definitions yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The process-wide registry instance, created lazily on first access
/// and living for the process lifetime.
pub static REGISTRY: Lazy<PojoRegistry> = Lazy::new(PojoRegistry::new);
