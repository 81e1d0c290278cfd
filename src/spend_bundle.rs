use crate::bls::{PublicPoint, Signature, SIGNATURE_SIZE};
use crate::coin::{Coin, CoinSpend};
use crate::conditions::generate_verify_pairs;
use crate::error::{EncodingError, Result, SigningError};
use crate::evaluator::Evaluator;
use crate::node::Node;
use std::ops::Add;

/// Coin spends with the single aggregated signature authorizing all of them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpendBundle {
    pub coin_spends: Vec<CoinSpend>,
    pub aggregated_signature: Signature,
}

impl SpendBundle {
    pub fn new(coin_spends: Vec<CoinSpend>, aggregated_signature: Signature) -> Self {
        Self {
            coin_spends,
            aggregated_signature,
        }
    }

    /// Every `(public key, message)` pair the bundle's spends require.
    pub fn verify_pairs(
        &self,
        domain_suffix: &[u8],
        evaluator: &dyn Evaluator,
        cost_limit: u64,
    ) -> std::result::Result<Vec<(PublicPoint, Vec<u8>)>, SigningError> {
        let mut pairs = Vec::new();
        for coin_spend in &self.coin_spends {
            pairs.extend(generate_verify_pairs(
                coin_spend,
                domain_suffix,
                evaluator,
                cost_limit,
            )?);
        }
        Ok(pairs)
    }

    /// Whether the aggregated signature covers every pair the spends require.
    pub fn verify(
        &self,
        domain_suffix: &[u8],
        evaluator: &dyn Evaluator,
        cost_limit: u64,
    ) -> std::result::Result<bool, SigningError> {
        let pairs = self.verify_pairs(domain_suffix, evaluator, cost_limit)?;
        Ok(self
            .aggregated_signature
            .aggregate_verify(pairs.iter().map(|(pk, msg)| (pk, msg.as_slice()))))
    }

    /// Ledger binary layout: a big-endian u32 count of coin spends, each as
    /// parent, puzzle hash, big-endian u64 amount, serialized puzzle and
    /// serialized solution, then the 96-byte signature.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&(self.coin_spends.len() as u32).to_be_bytes());
        for spend in &self.coin_spends {
            out.extend_from_slice(&spend.coin.parent_coin_info);
            out.extend_from_slice(&spend.coin.puzzle_hash);
            out.extend_from_slice(&spend.coin.amount.to_be_bytes());
            out.extend_from_slice(&spend.puzzle_reveal.to_bytes());
            out.extend_from_slice(&spend.solution.to_bytes());
        }
        out.extend_from_slice(&self.aggregated_signature.to_bytes());
        out
    }

    pub fn from_bytes(blob: &[u8]) -> Result<Self> {
        let mut reader = Reader { blob, pos: 0 };
        let count = u32::from_be_bytes(reader.array()?);
        let mut coin_spends = Vec::new();
        for _ in 0..count {
            let coin = Coin::new(
                reader.array()?,
                reader.array()?,
                u64::from_be_bytes(reader.array()?),
            );
            let puzzle_reveal = reader.node()?;
            let solution = reader.node()?;
            if coin.puzzle_hash != puzzle_reveal.tree_hash() {
                return Err(EncodingError::ValueMismatch("puzzle hash").into());
            }
            coin_spends.push(CoinSpend {
                coin,
                puzzle_reveal,
                solution,
            });
        }
        let signature: [u8; SIGNATURE_SIZE] = reader.array()?;
        if reader.pos != blob.len() {
            return Err(EncodingError::TrailingBytes(blob.len() - reader.pos).into());
        }
        Ok(Self::new(coin_spends, Signature::from_bytes(&signature)?))
    }
}

impl Add for SpendBundle {
    type Output = SpendBundle;

    fn add(mut self, rhs: Self) -> Self {
        self.coin_spends.extend(rhs.coin_spends);
        self.aggregated_signature = self.aggregated_signature + rhs.aggregated_signature;
        self
    }
}

struct Reader<'a> {
    blob: &'a [u8],
    pos: usize,
}

impl Reader<'_> {
    fn array<const N: usize>(&mut self) -> std::result::Result<[u8; N], EncodingError> {
        let bytes = self
            .blob
            .get(self.pos..self.pos + N)
            .ok_or(EncodingError::Serialization("truncated spend bundle"))?;
        self.pos += N;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    fn node(&mut self) -> std::result::Result<Node, EncodingError> {
        let (node, used) = Node::parse(&self.blob[self.pos..])?;
        self.pos += used;
        Ok(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bls::SecretScalar;
    use crate::conditions::AGG_SIG_ME;
    use crate::evaluator::QuoteEvaluator;

    fn bundle(sk: &SecretScalar, suffix: &[u8]) -> SpendBundle {
        let pk = sk.public_key();
        let program = Node::pair(
            Node::from_int(1),
            Node::list(vec![Node::list(vec![
                Node::from_int(AGG_SIG_ME),
                Node::atom(pk.as_bytes()),
                Node::atom(b"pay".to_vec()),
            ])]),
        );
        let spend = CoinSpend::new([5; 32], program, 42, Node::nil());
        let msg = [&b"pay"[..], &spend.coin.name()[..], suffix].concat();
        SpendBundle::new(vec![spend], sk.sign(&msg, None))
    }

    #[test]
    fn verifies_against_required_pairs() -> Result<()> {
        let sk = SecretScalar::from_seed(b"bundle");
        let sb = bundle(&sk, b"net");
        assert!(sb.verify(b"net", &QuoteEvaluator, 1000)?);
        assert!(!sb.verify(b"other", &QuoteEvaluator, 1000)?);
        Ok(())
    }

    #[test]
    fn binary_round_trip() -> Result<()> {
        let sb = bundle(&SecretScalar::from_seed(b"bytes"), b"");
        let blob = sb.to_bytes();
        assert_eq!(SpendBundle::from_bytes(&blob)?, sb);
        assert!(SpendBundle::from_bytes(&blob[..blob.len() - 1]).is_err());

        let mut extra = blob.clone();
        extra.push(0);
        assert!(SpendBundle::from_bytes(&extra).is_err());
        Ok(())
    }

    #[test]
    fn bundles_add() -> Result<()> {
        let a = bundle(&SecretScalar::from_seed(b"a"), b"n");
        let b = bundle(&SecretScalar::from_seed(b"b"), b"n");
        let sum = a.clone() + b;
        assert_eq!(sum.coin_spends.len(), 2);
        assert!(sum.verify(b"n", &QuoteEvaluator, 1000)?);
        assert!(a.verify(b"n", &QuoteEvaluator, 1000)?);
        Ok(())
    }
}
