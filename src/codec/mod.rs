//! Schema-driven mapping between typed records and [`Node`] trees.
//!
//! A [`TypeDesc`] describes the wire shape of a value. The [`Dispatcher`]
//! turns a description into a [`Transform`], a pair of encode/decode closures
//! over the dynamic [`Value`] model. Typed records implement [`Streamable`] to
//! convert themselves to and from `Value`, and [`Codec`] ties the two layers
//! together.

mod dispatch;
mod record;
mod streamable;

pub use dispatch::{Dispatcher, Shape, Transform};
pub use streamable::{Codec, Streamable};

use crate::error::EncodingError;
use crate::node::Node;
use std::sync::Arc;

/// Dynamic value model shared by every transform.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Value {
    Bytes(Vec<u8>),
    Text(String),
    Int(i128),
    Node(Node),
    List(Vec<Value>),
    /// Values of both `Tuple` and `Frugal` descriptors.
    Tuple(Vec<Value>),
    Nullable(Option<Box<Value>>),
    /// Positional fields followed by key-tagged fields, in schema order.
    Record(Vec<Value>),
}

impl Value {
    pub fn into_bytes(self) -> Result<Vec<u8>, EncodingError> {
        match self {
            Value::Bytes(bytes) => Ok(bytes),
            _ => Err(EncodingError::ValueMismatch("bytes")),
        }
    }

    pub fn into_text(self) -> Result<String, EncodingError> {
        match self {
            Value::Text(text) => Ok(text),
            _ => Err(EncodingError::ValueMismatch("text")),
        }
    }

    pub fn into_int(self) -> Result<i128, EncodingError> {
        match self {
            Value::Int(i) => Ok(i),
            _ => Err(EncodingError::ValueMismatch("int")),
        }
    }

    pub fn into_node(self) -> Result<Node, EncodingError> {
        match self {
            Value::Node(node) => Ok(node),
            _ => Err(EncodingError::ValueMismatch("node")),
        }
    }

    pub fn into_list(self) -> Result<Vec<Value>, EncodingError> {
        match self {
            Value::List(items) => Ok(items),
            _ => Err(EncodingError::ValueMismatch("list")),
        }
    }

    pub fn into_tuple(self, arity: usize) -> Result<Vec<Value>, EncodingError> {
        match self {
            Value::Tuple(items) if items.len() == arity => Ok(items),
            Value::Tuple(items) => Err(EncodingError::SizeMismatch {
                expected: arity,
                found: items.len(),
            }),
            _ => Err(EncodingError::ValueMismatch("tuple")),
        }
    }

    pub fn into_record(self, fields: usize) -> Result<Vec<Value>, EncodingError> {
        match self {
            Value::Record(items) if items.len() == fields => Ok(items),
            Value::Record(items) => Err(EncodingError::SizeMismatch {
                expected: fields,
                found: items.len(),
            }),
            _ => Err(EncodingError::ValueMismatch("record")),
        }
    }

    pub fn into_nullable(self) -> Result<Option<Value>, EncodingError> {
        match self {
            Value::Nullable(inner) => Ok(inner.map(|v| *v)),
            _ => Err(EncodingError::ValueMismatch("nullable")),
        }
    }
}

/// Closed description of a wire shape.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeDesc {
    Bytes,
    Text,
    Int,
    /// A node passed through untouched.
    Node,
    /// The "none" alternative of a union. Not encodable on its own.
    Absent,
    /// An atom of exactly `size` bytes, such as a key or a hash.
    Fixed { name: &'static str, size: usize },
    List(Box<TypeDesc>),
    Tuple(Vec<TypeDesc>),
    /// A tuple without a nil terminator.
    Frugal(Vec<TypeDesc>),
    Union(Vec<TypeDesc>),
    Record(Arc<RecordSchema>),
    /// A reference to a type registered with [`Dispatcher::register`].
    Named(&'static str),
}

impl TypeDesc {
    pub fn list(item: TypeDesc) -> Self {
        TypeDesc::List(Box::new(item))
    }

    pub fn nullable(item: TypeDesc) -> Self {
        TypeDesc::Union(vec![item, TypeDesc::Absent])
    }

    pub fn record(schema: RecordSchema) -> Self {
        TypeDesc::Record(Arc::new(schema))
    }
}

/// How the positional part of a record is laid out.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Layout {
    /// Right-nested pairs with no terminator. Records with key-tagged fields
    /// always use this layout.
    Frugal,
    /// A nil-terminated list, which leaves room to append fields later.
    List,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Field {
    pub name: &'static str,
    pub ty: TypeDesc,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct KeyedField {
    pub name: &'static str,
    pub key: &'static str,
    pub ty: TypeDesc,
    /// `None` marks a required field.
    pub default: Option<Value>,
}

/// Per-record schema: ordered positional fields, then key-tagged fields.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RecordSchema {
    pub name: &'static str,
    pub layout: Layout,
    pub positional: Vec<Field>,
    pub keyed: Vec<KeyedField>,
}

impl RecordSchema {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            layout: Layout::Frugal,
            positional: Vec::new(),
            keyed: Vec::new(),
        }
    }

    pub fn layout(mut self, layout: Layout) -> Self {
        self.layout = layout;
        self
    }

    pub fn field(mut self, name: &'static str, ty: TypeDesc) -> Self {
        self.positional.push(Field { name, ty });
        self
    }

    pub fn keyed(
        mut self,
        name: &'static str,
        key: &'static str,
        ty: TypeDesc,
        default: Option<Value>,
    ) -> Self {
        self.keyed.push(KeyedField {
            name,
            key,
            ty,
            default,
        });
        self
    }

    pub fn field_count(&self) -> usize {
        self.positional.len() + self.keyed.len()
    }
}
