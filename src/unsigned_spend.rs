use crate::bls::{PublicPoint, SecretScalar, Signature, PUBLIC_KEY_SIZE, SCALAR_SIZE};
use crate::chunks;
use crate::codec::{Codec, RecordSchema, Streamable, TypeDesc, Value};
use crate::coin::CoinSpend;
use crate::error::{EncodingError, Result, TypeResolutionError};
use crate::node::Node;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::sync::OnceLock;

fn fixed_bytes(value: Value, size: usize) -> std::result::Result<Vec<u8>, EncodingError> {
    let bytes = value.into_bytes()?;
    if bytes.len() != size {
        return Err(EncodingError::SizeMismatch {
            expected: size,
            found: bytes.len(),
        });
    }
    Ok(bytes)
}

impl Streamable for PublicPoint {
    fn type_desc() -> TypeDesc {
        TypeDesc::Fixed {
            name: "public key",
            size: PUBLIC_KEY_SIZE,
        }
    }

    fn to_value(&self) -> Value {
        Value::Bytes(self.to_bytes().to_vec())
    }

    fn from_value(value: Value) -> std::result::Result<Self, EncodingError> {
        PublicPoint::from_bytes(&value.into_bytes()?)
            .map_err(|_| EncodingError::InvalidKey("public key"))
    }
}

impl Streamable for SecretScalar {
    fn type_desc() -> TypeDesc {
        TypeDesc::Fixed {
            name: "secret scalar",
            size: SCALAR_SIZE,
        }
    }

    fn to_value(&self) -> Value {
        Value::Bytes(self.to_bytes().to_vec())
    }

    fn from_value(value: Value) -> std::result::Result<Self, EncodingError> {
        SecretScalar::from_bytes(&value.into_bytes()?)
            .map_err(|_| EncodingError::InvalidKey("secret scalar"))
    }
}

/// Wire shape `(parent_coin_info program amount solution)`. The puzzle hash
/// is not transmitted and is recomputed on decode.
impl Streamable for CoinSpend {
    fn type_desc() -> TypeDesc {
        TypeDesc::Tuple(vec![
            TypeDesc::Fixed {
                name: "bytes32",
                size: 32,
            },
            TypeDesc::Node,
            TypeDesc::Int,
            TypeDesc::Node,
        ])
    }

    fn to_value(&self) -> Value {
        Value::Tuple(vec![
            Value::Bytes(self.coin.parent_coin_info.to_vec()),
            self.puzzle_reveal.to_value(),
            self.coin.amount.to_value(),
            self.solution.to_value(),
        ])
    }

    fn from_value(value: Value) -> std::result::Result<Self, EncodingError> {
        let mut fields = value.into_tuple(4)?.into_iter();
        let mut next = || fields.next().ok_or(EncodingError::ValueMismatch("coin spend"));
        let parent = fixed_bytes(next()?, 32)?;
        let puzzle_reveal = Node::from_value(next()?)?;
        let amount = u64::from_value(next()?)?;
        let solution = Node::from_value(next()?)?;
        let mut parent_coin_info = [0u8; 32];
        parent_coin_info.copy_from_slice(&parent);
        Ok(CoinSpend::new(parent_coin_info, puzzle_reveal, amount, solution))
    }
}

/// How a final public key is composed: the sum of component keys plus the
/// public key of a synthetic offset.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SumHint {
    pub public_keys: Vec<PublicPoint>,
    pub synthetic_offset: SecretScalar,
}

impl SumHint {
    pub fn new(public_keys: Vec<PublicPoint>, synthetic_offset: SecretScalar) -> Self {
        Self {
            public_keys,
            synthetic_offset,
        }
    }

    pub fn final_public_key(&self) -> PublicPoint {
        self.public_keys
            .iter()
            .fold(self.synthetic_offset.public_key(), |sum, pk| sum + *pk)
    }
}

impl Streamable for SumHint {
    fn type_desc() -> TypeDesc {
        TypeDesc::record(
            RecordSchema::new("SumHint")
                .field("public_keys", Vec::<PublicPoint>::type_desc())
                .field("synthetic_offset", SecretScalar::type_desc()),
        )
    }

    fn to_value(&self) -> Value {
        Value::Record(vec![
            self.public_keys.to_value(),
            self.synthetic_offset.to_value(),
        ])
    }

    fn from_value(value: Value) -> std::result::Result<Self, EncodingError> {
        let mut fields = value.into_record(2)?.into_iter();
        let mut next = || fields.next().ok_or(EncodingError::ValueMismatch("SumHint"));
        Ok(Self {
            public_keys: Vec::from_value(next()?)?,
            synthetic_offset: SecretScalar::from_value(next()?)?,
        })
    }
}

/// How a component key is derived: a root key and an unhardened path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathHint {
    pub root_public_key: PublicPoint,
    pub path: Vec<u32>,
}

impl PathHint {
    pub fn new(root_public_key: PublicPoint, path: Vec<u32>) -> Self {
        Self {
            root_public_key,
            path,
        }
    }

    pub fn public_key(&self) -> PublicPoint {
        self.root_public_key.child_for_path(&self.path)
    }
}

impl Streamable for PathHint {
    fn type_desc() -> TypeDesc {
        TypeDesc::record(
            RecordSchema::new("PathHint")
                .field("root_public_key", PublicPoint::type_desc())
                .field("path", Vec::<u32>::type_desc()),
        )
    }

    fn to_value(&self) -> Value {
        Value::Record(vec![self.root_public_key.to_value(), self.path.to_value()])
    }

    fn from_value(value: Value) -> std::result::Result<Self, EncodingError> {
        let mut fields = value.into_record(2)?.into_iter();
        let mut next = || fields.next().ok_or(EncodingError::ValueMismatch("PathHint"));
        Ok(Self {
            root_public_key: PublicPoint::from_value(next()?)?,
            path: Vec::from_value(next()?)?,
        })
    }
}

/// Everything an offline signer needs: the spends, how the keys in their
/// conditions were built, and the domain suffix of `AGG_SIG_ME` messages.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UnsignedSpend {
    pub coin_spends: Vec<CoinSpend>,
    pub sum_hints: Vec<SumHint>,
    pub path_hints: Vec<PathHint>,
    pub domain_suffix: Vec<u8>,
}

impl Streamable for UnsignedSpend {
    fn type_desc() -> TypeDesc {
        let empty = || Some(Value::List(Vec::new()));
        TypeDesc::record(
            RecordSchema::new("UnsignedSpend")
                .keyed("coin_spends", "c", Vec::<CoinSpend>::type_desc(), None)
                .keyed("sum_hints", "s", Vec::<SumHint>::type_desc(), empty())
                .keyed("path_hints", "p", Vec::<PathHint>::type_desc(), empty())
                .keyed(
                    "domain_suffix",
                    "a",
                    TypeDesc::Bytes,
                    Some(Value::Bytes(Vec::new())),
                ),
        )
    }

    fn to_value(&self) -> Value {
        Value::Record(vec![
            self.coin_spends.to_value(),
            self.sum_hints.to_value(),
            self.path_hints.to_value(),
            Value::Bytes(self.domain_suffix.clone()),
        ])
    }

    fn from_value(value: Value) -> std::result::Result<Self, EncodingError> {
        let mut fields = value.into_record(4)?.into_iter();
        let mut next = || fields.next().ok_or(EncodingError::ValueMismatch("UnsignedSpend"));
        Ok(Self {
            coin_spends: Vec::from_value(next()?)?,
            sum_hints: Vec::from_value(next()?)?,
            path_hints: Vec::from_value(next()?)?,
            domain_suffix: next()?.into_bytes()?,
        })
    }
}

impl UnsignedSpend {
    pub fn codec() -> std::result::Result<&'static Codec<Self>, TypeResolutionError> {
        static CODEC: OnceLock<std::result::Result<Codec<UnsignedSpend>, TypeResolutionError>> =
            OnceLock::new();
        CODEC.get_or_init(Codec::new).as_ref().map_err(Clone::clone)
    }

    pub fn to_node(&self) -> Result<Node> {
        Ok(Self::codec()?.to_node(self)?)
    }

    pub fn from_node(node: &Node) -> Result<Self> {
        Ok(Self::codec()?.from_node(node)?)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(Self::codec()?.to_bytes(self)?)
    }

    pub fn from_bytes(blob: &[u8]) -> Result<Self> {
        Ok(Self::codec()?.from_bytes(blob)?)
    }

    /// Serializes and splits into chunks carrying at most `max_payload`
    /// bytes of data each.
    pub fn chunk(&self, max_payload: usize) -> Result<Vec<Vec<u8>>> {
        Ok(chunks::split(&self.to_bytes()?, max_payload)?)
    }

    pub fn from_chunks<C: AsRef<[u8]>>(chunks: &[C]) -> Result<Self> {
        Self::from_bytes(&chunks::reassemble(chunks)?)
    }
}

/// One partial signature with what it signs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureInfo {
    pub signature: Signature,
    pub partial_public_key: PublicPoint,
    pub final_public_key: PublicPoint,
    #[serde(with = "hex")]
    pub message: Vec<u8>,
}

fn deserialize_hex<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Vec<u8>, D::Error> {
    let text = String::deserialize(deserializer)?;
    hex::decode(text).map_err(serde::de::Error::custom)
}

impl Serialize for PublicPoint {
    fn serialize<S: Serializer>(
        &self,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for PublicPoint {
    fn deserialize<D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        let bytes = deserialize_hex(deserializer)?;
        PublicPoint::from_bytes(&bytes).map_err(serde::de::Error::custom)
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(
        &self,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        let bytes = deserialize_hex(deserializer)?;
        Signature::from_bytes(&bytes).map_err(serde::de::Error::custom)
    }
}
