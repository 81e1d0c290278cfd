use super::{Dispatcher, Layout, RecordSchema, Transform, TypeDesc, Value};
use crate::error::{EncodingError, TypeResolutionError};
use crate::node::Node;
use std::collections::HashMap;
use std::sync::Arc;

struct KeyedTransform {
    name: &'static str,
    key: &'static str,
    transform: Transform,
    default: Option<(Value, Node)>,
}

/// Builds the transform of a record schema.
///
/// Without key-tagged fields a record is its positional tuple, laid out
/// according to [`Layout`]. Otherwise the positional fields are followed,
/// frugally, by a list of `(key . value)` pairs for the key-tagged fields.
/// A key-tagged field whose encoding equals the encoding of its default is
/// left out of that list.
pub(super) fn build(
    schema: &Arc<RecordSchema>,
    d: &Dispatcher,
) -> Result<Transform, TypeResolutionError> {
    let types = schema.positional.iter().map(|f| f.ty.clone()).collect();
    if schema.keyed.is_empty() {
        let inner = match schema.layout {
            Layout::Frugal => d.resolve(&TypeDesc::Frugal(types))?,
            Layout::List => d.resolve(&TypeDesc::Tuple(types))?,
        };
        return Ok(positional_only(schema.name, inner));
    }

    let positional = Arc::new(
        schema
            .positional
            .iter()
            .map(|f| d.resolve(&f.ty))
            .collect::<Result<Vec<_>, _>>()?,
    );
    let keyed = Arc::new(
        schema
            .keyed
            .iter()
            .map(|f| {
                let transform = d.resolve(&f.ty)?;
                let default = match &f.default {
                    Some(value) => {
                        let node = transform.encode(value).map_err(|e| {
                            TypeResolutionError(format!(
                                "default of {}.{} does not encode: {e}",
                                schema.name, f.name
                            ))
                        })?;
                        Some((value.clone(), node))
                    }
                    None => None,
                };
                Ok(KeyedTransform {
                    name: f.name,
                    key: f.key,
                    transform,
                    default,
                })
            })
            .collect::<Result<Vec<_>, TypeResolutionError>>()?,
    );

    let fields = schema.field_count();
    let (enc_positional, enc_keyed) = (Arc::clone(&positional), Arc::clone(&keyed));
    Ok(Transform::new(
        move |value| {
            let values = match value {
                Value::Record(values) if values.len() == fields => values,
                Value::Record(values) => {
                    return Err(EncodingError::SizeMismatch {
                        expected: fields,
                        found: values.len(),
                    })
                }
                _ => return Err(EncodingError::ValueMismatch("record")),
            };
            let (head, tail) = values.split_at(enc_positional.len());

            let mut pairs = Vec::new();
            for (field, value) in enc_keyed.iter().zip(tail) {
                let node = field.transform.encode(value)?;
                if matches!(&field.default, Some((_, default)) if *default == node) {
                    continue;
                }
                pairs.push(Node::pair(Node::atom(field.key.as_bytes()), node));
            }

            let mut out = Node::list(pairs);
            for (t, v) in enc_positional.iter().zip(head).rev() {
                out = Node::pair(t.encode(v)?, out);
            }
            Ok(out)
        },
        move |node| {
            let mut values = Vec::with_capacity(fields);
            let mut cursor = node;
            for t in positional.iter() {
                let (first, rest) = cursor.pair_parts()?;
                values.push(t.decode(first)?);
                cursor = rest;
            }

            let mut by_key: HashMap<&[u8], &Node> = HashMap::new();
            for item in cursor.list_items()? {
                let (key, value) = item.pair_parts()?;
                by_key.insert(key.atom_bytes()?, value);
            }

            for field in keyed.iter() {
                let value = match (by_key.get(field.key.as_bytes()), &field.default) {
                    (Some(node), _) => field.transform.decode(node)?,
                    (None, Some((default, _))) => default.clone(),
                    (None, None) => {
                        return Err(EncodingError::MissingField {
                            name: field.name,
                            key: field.key,
                        })
                    }
                };
                values.push(value);
            }
            Ok(Value::Record(values))
        },
    ))
}

fn positional_only(name: &'static str, inner: Transform) -> Transform {
    let decode_inner = inner.clone();
    Transform::new(
        move |value| match value {
            Value::Record(values) => inner.encode(&Value::Tuple(values.clone())),
            _ => Err(EncodingError::ValueMismatch(name)),
        },
        move |node| match decode_inner.decode(node)? {
            Value::Tuple(values) => Ok(Value::Record(values)),
            _ => Err(EncodingError::ValueMismatch(name)),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(schema: RecordSchema) -> Transform {
        Dispatcher::new().resolve(&TypeDesc::record(schema)).unwrap()
    }

    #[test]
    fn positional_record_layouts() {
        let frugal = resolve(
            RecordSchema::new("Point")
                .field("x", TypeDesc::Int)
                .field("y", TypeDesc::Int),
        );
        let value = Value::Record(vec![Value::Int(3), Value::Int(4)]);
        let node = frugal.encode(&value).unwrap();
        assert_eq!(node, Node::pair(Node::from_int(3), Node::from_int(4)));
        assert_eq!(frugal.decode(&node).unwrap(), value);

        let listed = resolve(
            RecordSchema::new("Point")
                .layout(Layout::List)
                .field("x", TypeDesc::Int)
                .field("y", TypeDesc::Int),
        );
        let node = listed.encode(&value).unwrap();
        assert_eq!(node, Node::list(vec![Node::from_int(3), Node::from_int(4)]));
        assert_eq!(listed.decode(&node).unwrap(), value);
        assert!(listed
            .decode(&Node::list(vec![Node::from_int(3)]))
            .is_err());
    }

    fn mixed() -> RecordSchema {
        RecordSchema::new("Mixed")
            .field("id", TypeDesc::Bytes)
            .keyed("tags", "t", TypeDesc::list(TypeDesc::Text), Some(Value::List(vec![])))
            .keyed("weight", "w", TypeDesc::Int, Some(Value::Int(0)))
            .keyed("owner", "o", TypeDesc::Text, None)
    }

    #[test]
    fn defaults_are_omitted() {
        let t = resolve(mixed());
        let value = Value::Record(vec![
            Value::Bytes(b"abc".to_vec()),
            Value::List(vec![]),
            Value::Int(0),
            Value::Text("me".into()),
        ]);
        let node = t.encode(&value).unwrap();
        assert_eq!(
            node,
            Node::pair(
                Node::atom(b"abc".to_vec()),
                Node::list(vec![Node::pair(
                    Node::atom(b"o".to_vec()),
                    Node::atom(b"me".to_vec())
                )]),
            )
        );
        assert_eq!(t.decode(&node).unwrap(), value);
    }

    #[test]
    fn non_default_values_are_tagged() {
        let t = resolve(mixed());
        let value = Value::Record(vec![
            Value::Bytes(vec![]),
            Value::List(vec![Value::Text("a".into())]),
            Value::Int(-2),
            Value::Text(String::new()),
        ]);
        let node = t.encode(&value).unwrap();
        let (_, tagged) = node.pair_parts().unwrap();
        assert_eq!(tagged.list_items().unwrap().len(), 3);
        assert_eq!(t.decode(&node).unwrap(), value);
    }

    #[test]
    fn missing_required_key_is_reported() {
        let t = resolve(mixed());
        let node = Node::pair(Node::atom(b"abc".to_vec()), Node::nil());
        assert_eq!(
            t.decode(&node),
            Err(EncodingError::MissingField {
                name: "owner",
                key: "o"
            })
        );
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let t = resolve(mixed());
        let node = Node::pair(
            Node::nil(),
            Node::list(vec![
                Node::pair(Node::atom(b"zz".to_vec()), Node::from_int(5)),
                Node::pair(Node::atom(b"o".to_vec()), Node::atom(b"x".to_vec())),
            ]),
        );
        assert_eq!(
            t.decode(&node).unwrap(),
            Value::Record(vec![
                Value::Bytes(vec![]),
                Value::List(vec![]),
                Value::Int(0),
                Value::Text("x".into()),
            ])
        );
    }

    #[test]
    fn keyed_only_record_is_a_list_of_pairs() {
        let t = resolve(
            RecordSchema::new("Keyed")
                .keyed("a", "a", TypeDesc::Bytes, Some(Value::Bytes(vec![])))
                .keyed("n", "n", TypeDesc::Int, Some(Value::Int(0))),
        );
        let empty = Value::Record(vec![Value::Bytes(vec![]), Value::Int(0)]);
        assert_eq!(t.encode(&empty).unwrap(), Node::nil());
        assert_eq!(t.decode(&Node::nil()).unwrap(), empty);
    }

    #[test]
    fn record_values_are_checked_before_encoding() {
        let t = resolve(mixed());
        assert_eq!(
            t.encode(&Value::Record(vec![Value::Bytes(vec![])])),
            Err(EncodingError::SizeMismatch {
                expected: 4,
                found: 1
            })
        );
        assert_eq!(
            t.encode(&Value::Tuple(vec![])),
            Err(EncodingError::ValueMismatch("record"))
        );
    }

    #[test]
    fn unencodable_default_fails_resolution() {
        let schema = RecordSchema::new("Bad").keyed(
            "k",
            "k",
            TypeDesc::Int,
            Some(Value::Text("nope".into())),
        );
        assert!(Dispatcher::new()
            .resolve(&TypeDesc::record(schema))
            .is_err());
    }
}
