//! Static type descriptors attached to items at declaration time.

use crate::tree::TreeNode;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::PathBuf;

/// Kind of a scalar leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    String,
    Bool,
    Integer,
    Unsigned,
    Float,
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ScalarKind::String => "string",
            ScalarKind::Bool => "bool",
            ScalarKind::Integer => "integer",
            ScalarKind::Unsigned => "unsigned integer",
            ScalarKind::Float => "float",
        })
    }
}

/// Closed description of the type an item binds to.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeDescriptor {
    /// Any node, passed through untouched.
    Any,
    Scalar(ScalarKind),
    List(Box<TypeDescriptor>),
    /// Map with string keys.
    Map(Box<TypeDescriptor>),
    /// Structure whose fields are relative to the node.
    Nested(Vec<Field>),
    /// String matched against the variant names.
    Enum(Vec<String>),
    Optional(Box<TypeDescriptor>),
}

impl TypeDescriptor {
    /// List whose elements are described by `element`.
    pub fn list(element: TypeDescriptor) -> Self {
        TypeDescriptor::List(Box::new(element))
    }

    /// String-keyed map whose values are described by `value`.
    pub fn map(value: TypeDescriptor) -> Self {
        TypeDescriptor::Map(Box::new(value))
    }

    /// Value that may be null or absent.
    pub fn optional(inner: TypeDescriptor) -> Self {
        TypeDescriptor::Optional(Box::new(inner))
    }

    /// Structure with the given fields.
    pub fn nested(fields: impl IntoIterator<Item = Field>) -> Self {
        TypeDescriptor::Nested(fields.into_iter().collect())
    }

    /// String matched exactly against one of `variants`.
    pub fn enumeration<I, S>(variants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        TypeDescriptor::Enum(variants.into_iter().map(Into::into).collect())
    }

    pub fn is_optional(&self) -> bool {
        matches!(self, TypeDescriptor::Optional(_))
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDescriptor::Any => f.write_str("any"),
            TypeDescriptor::Scalar(kind) => write!(f, "{kind}"),
            TypeDescriptor::List(element) => write!(f, "list<{element}>"),
            TypeDescriptor::Map(value) => write!(f, "map<string, {value}>"),
            TypeDescriptor::Nested(fields) => {
                let names = fields
                    .iter()
                    .map(|field| field.name.as_str())
                    .collect::<Vec<_>>();
                write!(f, "struct {{ {} }}", names.join(", "))
            }
            TypeDescriptor::Enum(variants) => write!(f, "one of [{}]", variants.join(", ")),
            TypeDescriptor::Optional(inner) => write!(f, "optional<{inner}>"),
        }
    }
}

/// One field of a [`TypeDescriptor::Nested`] structure.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub descriptor: TypeDescriptor,
    /// The field may be absent (the bound type supplies a default).
    pub optional: bool,
}

impl Field {
    /// Field that must be present.
    pub fn required(name: impl Into<String>, descriptor: TypeDescriptor) -> Self {
        Self {
            name: name.into(),
            descriptor,
            optional: false,
        }
    }

    /// Field that may be absent.
    pub fn optional(name: impl Into<String>, descriptor: TypeDescriptor) -> Self {
        Self {
            name: name.into(),
            descriptor,
            optional: true,
        }
    }

    /// Field typed after `T`, required unless `T` is an `Option`.
    pub fn of<T: ConfigValue>(name: impl Into<String>) -> Self {
        let descriptor = T::descriptor();
        let optional = descriptor.is_optional();
        Self {
            name: name.into(),
            descriptor,
            optional,
        }
    }
}

/// A type that config items can bind to.
///
/// Implemented for primitives, strings, paths, sequences, string-keyed maps
/// and options. Application enums and structs implement it by returning an
/// [`TypeDescriptor::Enum`] or [`TypeDescriptor::Nested`] descriptor.
pub trait ConfigValue: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    fn descriptor() -> TypeDescriptor;
}

macro_rules! scalar_config_value {
    ($kind:expr => $($ty:ty),+ $(,)?) => {
        $(
            impl ConfigValue for $ty {
                fn descriptor() -> TypeDescriptor {
                    TypeDescriptor::Scalar($kind)
                }
            }
        )+
    };
}

scalar_config_value!(ScalarKind::String => String, PathBuf);
scalar_config_value!(ScalarKind::Bool => bool);
scalar_config_value!(ScalarKind::Integer => i8, i16, i32, i64, isize);
scalar_config_value!(ScalarKind::Unsigned => u8, u16, u32, u64, usize);
scalar_config_value!(ScalarKind::Float => f32, f64);

impl<T: ConfigValue> ConfigValue for Vec<T> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::list(T::descriptor())
    }
}

impl<T: ConfigValue> ConfigValue for BTreeMap<String, T> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::map(T::descriptor())
    }
}

impl<T: ConfigValue> ConfigValue for HashMap<String, T> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::map(T::descriptor())
    }
}

impl<T: ConfigValue> ConfigValue for Option<T> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::optional(T::descriptor())
    }
}

impl ConfigValue for serde_json::Value {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::Any
    }
}

impl ConfigValue for TreeNode {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::Any
    }
}
