//! Offline partial BLS signing of ledger spends.
//!
//! An [`UnsignedSpend`] carries coin spends plus hints describing how each
//! required public key was built from component keys. Each holder of a
//! component secret runs [`sign`] independently; the partial signatures are
//! summed with the synthetic offset signatures into a [`SpendBundle`].

pub mod bls;
pub mod chunks;
pub mod codec;
mod coin;
pub mod conditions;
mod config;
mod error;
mod evaluator;
mod hints;
pub mod node;
pub mod qrint;
mod sign;
mod spend_bundle;
mod unsigned_spend;

pub use crate::bls::{calculate_synthetic_offset, PublicPoint, SecretScalar, Signature};
pub use crate::chunks::Assembler;
pub use crate::coin::{Bytes32, Coin, CoinSpend};
pub use crate::config::Config;
pub use crate::error::{
    ChunkError, ConfigError, EncodingError, Error, EvaluationError, KeyError, Result,
    SigningError, TransportError, TypeResolutionError,
};
pub use crate::evaluator::{Evaluator, QuoteEvaluator};
pub use crate::hints::HintIndex;
pub use crate::node::Node;
pub use crate::sign::{
    aggregate, create_spend_bundle, generate_synthetic_offset_signatures, sign, verify_pairs,
    CoinFailure, SigningReport,
};
pub use crate::spend_bundle::SpendBundle;
pub use crate::unsigned_spend::{PathHint, SignatureInfo, SumHint, UnsignedSpend};
