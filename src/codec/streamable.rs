use super::{Dispatcher, Transform, TypeDesc, Value};
use crate::error::{EncodingError, TypeResolutionError};
use crate::node::Node;
use std::fmt;
use std::marker::PhantomData;

/// A type with a fixed wire shape.
pub trait Streamable: Sized {
    fn type_desc() -> TypeDesc;

    fn to_value(&self) -> Value;

    fn from_value(value: Value) -> Result<Self, EncodingError>;
}

/// Typed front end over a resolved [`Transform`].
pub struct Codec<T> {
    transform: Transform,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Codec<T> {
    fn clone(&self) -> Self {
        Self {
            transform: self.transform.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Codec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Codec").finish_non_exhaustive()
    }
}

impl<T: Streamable> Codec<T> {
    pub fn new() -> Result<Self, TypeResolutionError> {
        Self::with_dispatcher(&Dispatcher::new())
    }

    pub fn with_dispatcher(d: &Dispatcher) -> Result<Self, TypeResolutionError> {
        Ok(Self {
            transform: d.resolve(&T::type_desc())?,
            _marker: PhantomData,
        })
    }

    pub fn to_node(&self, item: &T) -> Result<Node, EncodingError> {
        self.transform.encode(&item.to_value())
    }

    pub fn from_node(&self, node: &Node) -> Result<T, EncodingError> {
        T::from_value(self.transform.decode(node)?)
    }

    pub fn to_bytes(&self, item: &T) -> Result<Vec<u8>, EncodingError> {
        Ok(self.to_node(item)?.to_bytes())
    }

    pub fn from_bytes(&self, blob: &[u8]) -> Result<T, EncodingError> {
        self.from_node(&Node::from_bytes(blob)?)
    }
}

impl Streamable for Node {
    fn type_desc() -> TypeDesc {
        TypeDesc::Node
    }

    fn to_value(&self) -> Value {
        Value::Node(self.clone())
    }

    fn from_value(value: Value) -> Result<Self, EncodingError> {
        value.into_node()
    }
}

impl Streamable for String {
    fn type_desc() -> TypeDesc {
        TypeDesc::Text
    }

    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }

    fn from_value(value: Value) -> Result<Self, EncodingError> {
        value.into_text()
    }
}

impl Streamable for i128 {
    fn type_desc() -> TypeDesc {
        TypeDesc::Int
    }

    fn to_value(&self) -> Value {
        Value::Int(*self)
    }

    fn from_value(value: Value) -> Result<Self, EncodingError> {
        value.into_int()
    }
}

macro_rules! narrow_int {
    ($($t:ty),*) => {$(
        impl Streamable for $t {
            fn type_desc() -> TypeDesc {
                TypeDesc::Int
            }

            fn to_value(&self) -> Value {
                Value::Int(i128::from(*self))
            }

            fn from_value(value: Value) -> Result<Self, EncodingError> {
                let value = value.into_int()?;
                <$t>::try_from(value).map_err(|_| EncodingError::IntegerRange {
                    value,
                    target: stringify!($t),
                })
            }
        }
    )*};
}

narrow_int!(u64, u32, u8, i64);

impl<T: Streamable> Streamable for Vec<T> {
    fn type_desc() -> TypeDesc {
        TypeDesc::list(T::type_desc())
    }

    fn to_value(&self) -> Value {
        Value::List(self.iter().map(T::to_value).collect())
    }

    fn from_value(value: Value) -> Result<Self, EncodingError> {
        value.into_list()?.into_iter().map(T::from_value).collect()
    }
}

impl<T: Streamable> Streamable for Option<T> {
    fn type_desc() -> TypeDesc {
        TypeDesc::nullable(T::type_desc())
    }

    fn to_value(&self) -> Value {
        Value::Nullable(self.as_ref().map(|v| Box::new(v.to_value())))
    }

    fn from_value(value: Value) -> Result<Self, EncodingError> {
        value.into_nullable()?.map(T::from_value).transpose()
    }
}

impl<A: Streamable, B: Streamable> Streamable for (A, B) {
    fn type_desc() -> TypeDesc {
        TypeDesc::Tuple(vec![A::type_desc(), B::type_desc()])
    }

    fn to_value(&self) -> Value {
        Value::Tuple(vec![self.0.to_value(), self.1.to_value()])
    }

    fn from_value(value: Value) -> Result<Self, EncodingError> {
        let mut items = value.into_tuple(2)?.into_iter();
        match (items.next(), items.next()) {
            (Some(a), Some(b)) => Ok((A::from_value(a)?, B::from_value(b)?)),
            _ => Err(EncodingError::ValueMismatch("pair")),
        }
    }
}

impl<A: Streamable, B: Streamable, C: Streamable> Streamable for (A, B, C) {
    fn type_desc() -> TypeDesc {
        TypeDesc::Tuple(vec![A::type_desc(), B::type_desc(), C::type_desc()])
    }

    fn to_value(&self) -> Value {
        Value::Tuple(vec![
            self.0.to_value(),
            self.1.to_value(),
            self.2.to_value(),
        ])
    }

    fn from_value(value: Value) -> Result<Self, EncodingError> {
        let mut items = value.into_tuple(3)?.into_iter();
        match (items.next(), items.next(), items.next()) {
            (Some(a), Some(b), Some(c)) => {
                Ok((A::from_value(a)?, B::from_value(b)?, C::from_value(c)?))
            }
            _ => Err(EncodingError::ValueMismatch("triple")),
        }
    }
}
