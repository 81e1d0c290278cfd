use super::{record, TypeDesc, Value};
use crate::error::{EncodingError, TypeResolutionError};
use crate::node::Node;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::slice;
use std::sync::Arc;

type EncodeFn = dyn Fn(&Value) -> Result<Node, EncodingError> + Send + Sync;
type DecodeFn = dyn Fn(&Node) -> Result<Value, EncodingError> + Send + Sync;

/// A resolved encode/decode pair. Cheap to clone and safe to share.
#[derive(Clone)]
pub struct Transform {
    encode: Arc<EncodeFn>,
    decode: Arc<DecodeFn>,
}

impl Transform {
    pub fn new<E, D>(encode: E, decode: D) -> Self
    where
        E: Fn(&Value) -> Result<Node, EncodingError> + Send + Sync + 'static,
        D: Fn(&Node) -> Result<Value, EncodingError> + Send + Sync + 'static,
    {
        Self {
            encode: Arc::new(encode),
            decode: Arc::new(decode),
        }
    }

    pub fn encode(&self, value: &Value) -> Result<Node, EncodingError> {
        (self.encode)(value)
    }

    pub fn decode(&self, node: &Node) -> Result<Value, EncodingError> {
        (self.decode)(node)
    }
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Transform")
    }
}

/// Tag of a compound descriptor, used to key the builder table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Shape {
    List,
    Tuple,
    Frugal,
    Union,
}

impl TypeDesc {
    fn compound(&self) -> Option<(Shape, &[TypeDesc])> {
        match self {
            TypeDesc::List(item) => Some((Shape::List, slice::from_ref(item.as_ref()))),
            TypeDesc::Tuple(items) => Some((Shape::Tuple, items.as_slice())),
            TypeDesc::Frugal(items) => Some((Shape::Frugal, items.as_slice())),
            TypeDesc::Union(alternatives) => Some((Shape::Union, alternatives.as_slice())),
            _ => None,
        }
    }
}

type Builder = fn(&[TypeDesc], &Dispatcher) -> Result<Transform, TypeResolutionError>;

/// Resolves type descriptors into transforms.
///
/// Resolution order: the exact-match table of terminal types, then the
/// compound builder registered for the descriptor's [`Shape`], then the
/// fallback for fixed atoms, records and named types.
pub struct Dispatcher {
    terminals: HashMap<TypeDesc, Transform>,
    compounds: HashMap<Shape, Builder>,
    named: HashMap<&'static str, TypeDesc>,
    resolving: RefCell<Vec<&'static str>>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        let mut terminals = HashMap::new();
        terminals.insert(TypeDesc::Bytes, bytes_transform());
        terminals.insert(TypeDesc::Text, text_transform());
        terminals.insert(TypeDesc::Int, int_transform());
        terminals.insert(TypeDesc::Node, node_transform());

        let mut compounds: HashMap<Shape, Builder> = HashMap::new();
        compounds.insert(Shape::List, build_list);
        compounds.insert(Shape::Tuple, build_tuple);
        compounds.insert(Shape::Frugal, build_frugal);
        compounds.insert(Shape::Union, build_union);

        Self {
            terminals,
            compounds,
            named: HashMap::new(),
            resolving: RefCell::new(Vec::new()),
        }
    }

    /// Makes `desc` available as `TypeDesc::Named(name)`.
    pub fn register(&mut self, name: &'static str, desc: TypeDesc) {
        self.named.insert(name, desc);
    }

    pub fn resolve(&self, desc: &TypeDesc) -> Result<Transform, TypeResolutionError> {
        if let Some(transform) = self.terminals.get(desc) {
            return Ok(transform.clone());
        }
        if let Some((shape, args)) = desc.compound() {
            if let Some(builder) = self.compounds.get(&shape) {
                return builder(args, self);
            }
        }
        self.fallback(desc)
    }

    fn fallback(&self, desc: &TypeDesc) -> Result<Transform, TypeResolutionError> {
        match desc {
            TypeDesc::Fixed { name, size } => Ok(fixed_transform(*name, *size)),
            TypeDesc::Record(schema) => record::build(schema, self),
            TypeDesc::Named(name) => self.resolve_named(*name),
            other => Err(TypeResolutionError(format!("{other:?}"))),
        }
    }

    fn resolve_named(&self, name: &'static str) -> Result<Transform, TypeResolutionError> {
        let desc = self
            .named
            .get(name)
            .ok_or_else(|| TypeResolutionError(format!("unregistered type `{name}`")))?;
        if self.resolving.borrow().contains(&name) {
            return Err(TypeResolutionError(format!("recursive type `{name}`")));
        }
        self.resolving.borrow_mut().push(name);
        let resolved = self.resolve(desc);
        self.resolving.borrow_mut().pop();
        resolved
    }
}

fn bytes_transform() -> Transform {
    Transform::new(
        |value| match value {
            Value::Bytes(bytes) => Ok(Node::atom(bytes.clone())),
            _ => Err(EncodingError::ValueMismatch("bytes")),
        },
        |node| Ok(Value::Bytes(node.atom_bytes()?.to_vec())),
    )
}

fn text_transform() -> Transform {
    Transform::new(
        |value| match value {
            Value::Text(text) => Ok(Node::atom(text.as_bytes())),
            _ => Err(EncodingError::ValueMismatch("text")),
        },
        |node| {
            let text = String::from_utf8(node.atom_bytes()?.to_vec())
                .map_err(|_| EncodingError::InvalidUtf8)?;
            Ok(Value::Text(text))
        },
    )
}

fn int_transform() -> Transform {
    Transform::new(
        |value| match value {
            Value::Int(i) => Ok(Node::from_int(*i)),
            _ => Err(EncodingError::ValueMismatch("int")),
        },
        |node| Ok(Value::Int(node.as_int()?)),
    )
}

fn node_transform() -> Transform {
    Transform::new(
        |value| match value {
            Value::Node(node) => Ok(node.clone()),
            _ => Err(EncodingError::ValueMismatch("node")),
        },
        |node| Ok(Value::Node(node.clone())),
    )
}

fn fixed_transform(name: &'static str, size: usize) -> Transform {
    let check = move |found: usize| {
        if found == size {
            Ok(())
        } else {
            Err(EncodingError::AtomLength {
                name,
                expected: size,
                found,
            })
        }
    };
    Transform::new(
        move |value| match value {
            Value::Bytes(bytes) => {
                check(bytes.len())?;
                Ok(Node::atom(bytes.clone()))
            }
            _ => Err(EncodingError::ValueMismatch(name)),
        },
        move |node| {
            let bytes = node.atom_bytes()?;
            check(bytes.len())?;
            Ok(Value::Bytes(bytes.to_vec()))
        },
    )
}

fn resolve_all(args: &[TypeDesc], d: &Dispatcher) -> Result<Vec<Transform>, TypeResolutionError> {
    args.iter().map(|arg| d.resolve(arg)).collect()
}

fn build_list(args: &[TypeDesc], d: &Dispatcher) -> Result<Transform, TypeResolutionError> {
    let item = d.resolve(&args[0])?;
    let decode_item = item.clone();
    Ok(Transform::new(
        move |value| match value {
            Value::List(items) => {
                let nodes = items
                    .iter()
                    .map(|v| item.encode(v))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Node::list(nodes))
            }
            _ => Err(EncodingError::ValueMismatch("list")),
        },
        move |node| {
            let items = node
                .list_items()?
                .into_iter()
                .map(|n| decode_item.decode(n))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::List(items))
        },
    ))
}

fn encode_items(items: &[Transform], value: &Value) -> Result<Vec<Node>, EncodingError> {
    match value {
        Value::Tuple(values) if values.len() == items.len() => items
            .iter()
            .zip(values)
            .map(|(t, v)| t.encode(v))
            .collect(),
        Value::Tuple(values) => Err(EncodingError::SizeMismatch {
            expected: items.len(),
            found: values.len(),
        }),
        _ => Err(EncodingError::ValueMismatch("tuple")),
    }
}

fn build_tuple(args: &[TypeDesc], d: &Dispatcher) -> Result<Transform, TypeResolutionError> {
    let items = Arc::new(resolve_all(args, d)?);
    let decode_items = Arc::clone(&items);
    Ok(Transform::new(
        move |value| Ok(Node::list(encode_items(&items, value)?)),
        move |node| {
            let nodes = node.list_items()?;
            if nodes.len() != decode_items.len() {
                return Err(EncodingError::SizeMismatch {
                    expected: decode_items.len(),
                    found: nodes.len(),
                });
            }
            let values = decode_items
                .iter()
                .zip(nodes)
                .map(|(t, n)| t.decode(n))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::Tuple(values))
        },
    ))
}

fn build_frugal(args: &[TypeDesc], d: &Dispatcher) -> Result<Transform, TypeResolutionError> {
    let items = Arc::new(resolve_all(args, d)?);
    let decode_items = Arc::clone(&items);
    Ok(Transform::new(
        move |value| {
            let mut nodes = encode_items(&items, value)?;
            let Some(last) = nodes.pop() else {
                return Ok(Node::nil());
            };
            Ok(nodes
                .into_iter()
                .rev()
                .fold(last, |rest, first| Node::pair(first, rest)))
        },
        move |node| {
            let Some((last, leading)) = decode_items.split_last() else {
                return if node.is_nil() {
                    Ok(Value::Tuple(Vec::new()))
                } else {
                    Err(EncodingError::SizeMismatch {
                        expected: 0,
                        found: 1,
                    })
                };
            };
            let mut values = Vec::with_capacity(decode_items.len());
            let mut cursor = node;
            for item in leading {
                let (first, rest) = cursor.pair_parts()?;
                values.push(item.decode(first)?);
                cursor = rest;
            }
            values.push(last.decode(cursor)?);
            Ok(Value::Tuple(values))
        },
    ))
}

fn build_union(args: &[TypeDesc], d: &Dispatcher) -> Result<Transform, TypeResolutionError> {
    let present: Vec<&TypeDesc> = args.iter().filter(|a| **a != TypeDesc::Absent).collect();
    if args.len() != 2 || present.len() != 1 {
        return Err(TypeResolutionError(format!(
            "only unions of one type with absent are supported, got {args:?}"
        )));
    }
    let item = d.resolve(present[0])?;
    let decode_item = item.clone();
    Ok(Transform::new(
        move |value| match value {
            Value::Nullable(None) => Ok(Node::pair(Node::nil(), Node::nil())),
            Value::Nullable(Some(inner)) => Ok(Node::pair(Node::from_int(1), item.encode(inner)?)),
            _ => Err(EncodingError::ValueMismatch("nullable")),
        },
        move |node| {
            let (flag, rest) = node.pair_parts()?;
            flag.atom_bytes()?;
            if !flag.is_nil() {
                return Ok(Value::Nullable(Some(Box::new(decode_item.decode(rest)?))));
            }
            if !rest.is_nil() {
                return Err(EncodingError::ValueMismatch("absent placeholder"));
            }
            Ok(Value::Nullable(None))
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(n: usize) -> Vec<Value> {
        (0..n).map(|i| Value::Int(i as i128 * 7 - 3)).collect()
    }

    fn int_list(n: usize) -> Node {
        Node::list((0..n).map(|i| Node::from_int(i as i128 * 7 - 3)))
    }

    #[test]
    fn terminals_map_to_atoms() {
        let d = Dispatcher::new();
        let text = d.resolve(&TypeDesc::Text).unwrap();
        let bytes = d.resolve(&TypeDesc::Bytes).unwrap();
        let long = "1".repeat(1000);
        for s in ["", "foo", long.as_str()] {
            let node = text.encode(&Value::Text(s.to_string())).unwrap();
            assert_eq!(node, Node::atom(s.as_bytes()));
            assert_eq!(text.decode(&node).unwrap(), Value::Text(s.to_string()));

            let node = bytes.encode(&Value::Bytes(s.as_bytes().to_vec())).unwrap();
            assert_eq!(node, Node::atom(s.as_bytes()));
        }
        let int = d.resolve(&TypeDesc::Int).unwrap();
        assert_eq!(int.encode(&Value::Int(0)).unwrap(), Node::nil());
        assert_eq!(int.decode(&Node::nil()).unwrap(), Value::Int(0));
    }

    #[test]
    fn tuple_is_a_plain_list() {
        let d = Dispatcher::new();
        let t = d
            .resolve(&TypeDesc::Tuple(vec![TypeDesc::Text, TypeDesc::Bytes, TypeDesc::Int]))
            .unwrap();
        let value = Value::Tuple(vec![
            Value::Text("this is a test".into()),
            Value::Bytes(vec![5, 6, 7]),
            Value::Int(-94817),
        ]);
        let node = t.encode(&value).unwrap();
        assert_eq!(
            node,
            Node::list(vec![
                Node::atom(b"this is a test".to_vec()),
                Node::atom(vec![5, 6, 7]),
                Node::from_int(-94817),
            ])
        );
        assert_eq!(t.decode(&node).unwrap(), value);
    }

    #[test]
    fn tuple_arity_is_enforced() {
        let d = Dispatcher::new();
        for n in [0usize, 1, 2, 5] {
            let t = d.resolve(&TypeDesc::Tuple(vec![TypeDesc::Int; n])).unwrap();
            let mut lengths = vec![n + 1, n + n + 1, n * 2];
            if n >= 1 {
                lengths.push(n - 1);
                lengths.push(0);
            }
            for len in lengths.into_iter().filter(|len| *len != n) {
                assert_eq!(
                    t.decode(&int_list(len)),
                    Err(EncodingError::SizeMismatch {
                        expected: n,
                        found: len
                    }),
                    "arity {n} decoded from {len} items"
                );
            }
            assert_eq!(t.decode(&int_list(n)).unwrap(), Value::Tuple(ints(n)));
        }
    }

    #[test]
    fn frugal_tuple_has_no_terminator() {
        let d = Dispatcher::new();
        let t = d
            .resolve(&TypeDesc::Frugal(vec![TypeDesc::Int, TypeDesc::Text]))
            .unwrap();
        let value = Value::Tuple(vec![Value::Int(100), Value::Text("boss".into())]);
        let node = t.encode(&value).unwrap();
        assert_eq!(node, Node::pair(Node::from_int(100), Node::atom(b"boss".to_vec())));
        assert_eq!(t.decode(&node).unwrap(), value);

        let single = d.resolve(&TypeDesc::Frugal(vec![TypeDesc::Int])).unwrap();
        assert_eq!(
            single.encode(&Value::Tuple(vec![Value::Int(9)])).unwrap(),
            Node::from_int(9)
        );

        let empty = d.resolve(&TypeDesc::Frugal(vec![])).unwrap();
        assert_eq!(empty.encode(&Value::Tuple(vec![])).unwrap(), Node::nil());
        assert!(empty.decode(&Node::from_int(1)).is_err());

        let three = d.resolve(&TypeDesc::Frugal(vec![TypeDesc::Int; 3])).unwrap();
        assert_eq!(
            three.decode(&Node::from_int(1)),
            Err(EncodingError::ExpectedPair)
        );
    }

    #[test]
    fn nullable_distinguishes_empty_from_absent() {
        let d = Dispatcher::new();
        let t = d
            .resolve(&TypeDesc::nullable(TypeDesc::list(TypeDesc::Int)))
            .unwrap();
        let absent = Value::Nullable(None);
        let empty = Value::Nullable(Some(Box::new(Value::List(vec![]))));
        let absent_node = t.encode(&absent).unwrap();
        let empty_node = t.encode(&empty).unwrap();
        assert_ne!(absent_node, empty_node);
        assert_eq!(t.decode(&absent_node).unwrap(), absent);
        assert_eq!(t.decode(&empty_node).unwrap(), empty);

        let some = Value::Nullable(Some(Box::new(Value::List(vec![Value::Int(3)]))));
        assert_eq!(t.decode(&t.encode(&some).unwrap()).unwrap(), some);
    }

    #[test]
    fn general_unions_are_rejected() {
        let d = Dispatcher::new();
        assert!(d
            .resolve(&TypeDesc::Union(vec![TypeDesc::Int, TypeDesc::Text]))
            .is_err());
        assert!(d
            .resolve(&TypeDesc::Union(vec![
                TypeDesc::Int,
                TypeDesc::Text,
                TypeDesc::Absent
            ]))
            .is_err());
        assert!(d.resolve(&TypeDesc::Absent).is_err());
    }

    #[test]
    fn named_types_resolve_through_the_registry() {
        let mut d = Dispatcher::new();
        assert!(d.resolve(&TypeDesc::Named("pair")).is_err());

        d.register("pair", TypeDesc::Frugal(vec![TypeDesc::Int, TypeDesc::Int]));
        let list = d.resolve(&TypeDesc::list(TypeDesc::Named("pair"))).unwrap();
        let value = Value::List(vec![Value::Tuple(vec![Value::Int(1), Value::Int(2)])]);
        assert_eq!(list.decode(&list.encode(&value).unwrap()).unwrap(), value);

        d.register("loop", TypeDesc::list(TypeDesc::Named("loop")));
        assert!(d.resolve(&TypeDesc::Named("loop")).is_err());
    }

    #[test]
    fn fixed_atoms_check_length() {
        let d = Dispatcher::new();
        let t = d
            .resolve(&TypeDesc::Fixed {
                name: "bytes32",
                size: 32,
            })
            .unwrap();
        assert!(t.encode(&Value::Bytes(vec![0; 31])).is_err());
        assert_eq!(
            t.decode(&Node::atom(vec![1; 33])),
            Err(EncodingError::AtomLength {
                name: "bytes32",
                expected: 32,
                found: 33
            })
        );
        assert!(t.decode(&Node::atom(vec![1; 32])).is_ok());
    }

    #[test]
    fn transforms_are_shareable() {
        fn assert_send_sync<T: Send + Sync>(_: &T) {}
        let t = Dispatcher::new()
            .resolve(&TypeDesc::list(TypeDesc::Bytes))
            .unwrap();
        assert_send_sync(&t);
    }

    #[test]
    fn mismatched_values_are_rejected() {
        let d = Dispatcher::new();
        let t = d.resolve(&TypeDesc::list(TypeDesc::Int)).unwrap();
        assert_eq!(
            t.encode(&Value::Text("x".into())),
            Err(EncodingError::ValueMismatch("list"))
        );
        assert_eq!(
            t.decode(&Node::pair(Node::from_int(1), Node::from_int(2))),
            Err(EncodingError::ImproperList)
        );
    }
}
