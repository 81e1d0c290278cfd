use blst::BLST_ERROR;
use thiserror::Error;

/// Specialisation of `std::Result`.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Error, Debug)]
/// error variants.
pub enum Error {
    #[error(transparent)]
    TypeResolution(#[from] TypeResolutionError),

    #[error(transparent)]
    Encoding(#[from] EncodingError),

    #[error(transparent)]
    Chunk(#[from] ChunkError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Key(#[from] KeyError),

    #[error(transparent)]
    Signing(#[from] SigningError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// No dispatch strategy matches a type descriptor.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unable to resolve type {0}")]
pub struct TypeResolutionError(pub String);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodingError {
    #[error("expected {expected} items, found {found}")]
    SizeMismatch { expected: usize, found: usize },

    #[error("missing required field `{name}` with key `{key}`")]
    MissingField {
        name: &'static str,
        key: &'static str,
    },

    #[error("expected atom, found pair")]
    ExpectedAtom,

    #[error("expected pair, found atom")]
    ExpectedPair,

    #[error("list is not nil-terminated")]
    ImproperList,

    #[error("expected {expected}-byte atom for {name}, found {found} bytes")]
    AtomLength {
        name: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("integer atom of {0} bytes does not fit in 128 bits")]
    IntegerOverflow(usize),

    #[error("integer {value} out of range for {target}")]
    IntegerRange { value: i128, target: &'static str },

    #[error("invalid utf-8 in text atom")]
    InvalidUtf8,

    #[error("invalid {0} bytes")]
    InvalidKey(&'static str),

    #[error("value does not match declared type {0}")]
    ValueMismatch(&'static str),

    #[error("malformed serialization: {0}")]
    Serialization(&'static str),

    #[error("{0} trailing bytes after serialized node")]
    TrailingBytes(usize),

    #[error(transparent)]
    TypeResolution(#[from] TypeResolutionError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChunkError {
    #[error("cannot chunk a blob into more than 256 chunks (would need {0})")]
    TooManyChunks(usize),

    #[error("chunk payload capacity must be positive")]
    ZeroCapacity,

    #[error("chunk of {0} bytes is too short to carry metadata")]
    Malformed(usize),

    #[error("chunk belongs to a set of {found} chunks, expected {expected}")]
    DifferentSet { expected: usize, found: usize },

    #[error("chunk {0} conflicts with an already received chunk")]
    Conflict(u8),

    #[error("chunk index {index} is beyond the last index {last}")]
    IndexOutOfRange { index: u8, last: u8 },

    #[error("have {received} of {expected} chunks")]
    Incomplete { received: usize, expected: usize },

    #[error("no chunks to reassemble")]
    Empty,
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("empty numeral string")]
    Empty,

    #[error("invalid character {0:?} in numeral string")]
    InvalidDigit(char),

    #[error("unknown format digit {0:?}")]
    UnknownFormat(char),

    #[error("decoded payload is missing its sentinel byte")]
    MissingSentinel,

    #[error("compression failed")]
    Compression(#[from] std::io::Error),

    #[error(transparent)]
    Chunk(#[from] ChunkError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("invalid {0} encoding")]
    InvalidBytes(&'static str),

    #[error("blst error {0:?}")]
    Blst(BLST_ERROR),

    #[error("a zero scalar has no hardened children")]
    ZeroScalar,
}

impl From<BLST_ERROR> for KeyError {
    fn from(e: BLST_ERROR) -> Self {
        Self::Blst(e)
    }
}

/// Failure reported by a program evaluator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvaluationError {
    #[error("cost limit {0} exceeded")]
    CostExceeded(u64),

    #[error("evaluation failed: {0}")]
    Failed(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SigningError {
    #[error(transparent)]
    Evaluation(#[from] EvaluationError),

    #[error("malformed signature condition: {0}")]
    MalformedCondition(String),

    #[error("synthetic offset signature for key {fingerprint:08x} does not verify")]
    OffsetSelfCheck { fingerprint: u32 },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
