//! Partial signing of an [`UnsignedSpend`] and aggregation of the results.

use crate::bls::{PublicPoint, SecretScalar, Signature};
use crate::coin::{Bytes32, CoinSpend};
use crate::conditions::generate_verify_pairs;
use crate::config::Config;
use crate::error::SigningError;
use crate::evaluator::Evaluator;
use crate::hints::HintIndex;
use crate::spend_bundle::SpendBundle;
use crate::unsigned_spend::{SignatureInfo, UnsignedSpend};
use tracing::{debug, info, warn};

/// A coin spend that could not be processed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CoinFailure {
    pub coin_id: Bytes32,
    pub error: SigningError,
}

/// Output of a signing pass. Failing coins do not stop the others.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SigningReport {
    pub signatures: Vec<SignatureInfo>,
    pub failures: Vec<CoinFailure>,
}

impl SigningReport {
    fn fail(&mut self, coin_spend: &CoinSpend, error: SigningError) {
        let coin_id = coin_spend.coin.name();
        warn!(coin = %hex::encode(coin_id), %error, "skipping coin spend");
        self.failures.push(CoinFailure { coin_id, error });
    }
}

/// Produces every partial signature the `secrets` can contribute to `spend`.
pub fn sign(
    spend: &UnsignedSpend,
    secrets: &[SecretScalar],
    evaluator: &dyn Evaluator,
    config: &Config,
) -> SigningReport {
    let hints = HintIndex::new(spend);
    let mut report = SigningReport::default();
    for coin_spend in &spend.coin_spends {
        let pairs = match generate_verify_pairs(
            coin_spend,
            &spend.domain_suffix,
            evaluator,
            config.cost_limit,
        ) {
            Ok(pairs) => pairs,
            Err(e) => {
                report.fail(coin_spend, e);
                continue;
            }
        };
        for (final_public_key, message) in pairs {
            for partial_public_key in hints.components(&final_public_key) {
                let Some(secret) = hints.secret_for(&partial_public_key, secrets) else {
                    continue;
                };
                debug!(
                    partial = partial_public_key.fingerprint(),
                    final_key = final_public_key.fingerprint(),
                    "signing"
                );
                report.signatures.push(SignatureInfo {
                    signature: secret.sign(&message, Some(&final_public_key)),
                    partial_public_key,
                    final_public_key,
                    message: message.clone(),
                });
            }
        }
    }
    info!(
        coins = spend.coin_spends.len(),
        signatures = report.signatures.len(),
        failures = report.failures.len(),
        "signing pass done"
    );
    report
}

/// Produces, for every required key with a sum hint, the signature of the
/// hint's synthetic offset. Needs no secrets.
///
/// When a final key is the offset's own public key, the signature must verify
/// on its own; otherwise the pass fails.
pub fn generate_synthetic_offset_signatures(
    spend: &UnsignedSpend,
    evaluator: &dyn Evaluator,
    config: &Config,
) -> Result<SigningReport, SigningError> {
    let hints = HintIndex::new(spend);
    let mut report = SigningReport::default();
    for coin_spend in &spend.coin_spends {
        let pairs = match generate_verify_pairs(
            coin_spend,
            &spend.domain_suffix,
            evaluator,
            config.cost_limit,
        ) {
            Ok(pairs) => pairs,
            Err(e) => {
                report.fail(coin_spend, e);
                continue;
            }
        };
        for (final_public_key, message) in pairs {
            let Some(hint) = hints.sum_hint(&final_public_key) else {
                continue;
            };
            let offset = hint.synthetic_offset;
            let partial_public_key = offset.public_key();
            let signature = offset.sign(&message, Some(&final_public_key));
            if final_public_key == partial_public_key
                && !signature.verify(&partial_public_key, &message)
            {
                return Err(SigningError::OffsetSelfCheck {
                    fingerprint: final_public_key.fingerprint(),
                });
            }
            report.signatures.push(SignatureInfo {
                signature,
                partial_public_key,
                final_public_key,
                message,
            });
        }
    }
    info!(
        signatures = report.signatures.len(),
        failures = report.failures.len(),
        "synthetic offset pass done"
    );
    Ok(report)
}

/// Every `(final public key, message)` pair `spend` needs signed.
pub fn verify_pairs(
    spend: &UnsignedSpend,
    evaluator: &dyn Evaluator,
    config: &Config,
) -> Result<Vec<(PublicPoint, Vec<u8>)>, SigningError> {
    let mut pairs = Vec::new();
    for coin_spend in &spend.coin_spends {
        pairs.extend(generate_verify_pairs(
            coin_spend,
            &spend.domain_suffix,
            evaluator,
            config.cost_limit,
        )?);
    }
    Ok(pairs)
}

/// Sums partial signatures, starting from the identity.
pub fn aggregate<'a, I>(signatures: I) -> Signature
where
    I: IntoIterator<Item = &'a Signature>,
{
    signatures.into_iter().copied().sum()
}

/// Adds the synthetic offset signatures to `signatures` and wraps the total
/// with the spend's coin spends.
pub fn create_spend_bundle(
    spend: &UnsignedSpend,
    signatures: &[Signature],
    evaluator: &dyn Evaluator,
    config: &Config,
) -> Result<SpendBundle, SigningError> {
    let extra = generate_synthetic_offset_signatures(spend, evaluator, config)?;
    if let Some(failure) = extra.failures.into_iter().next() {
        return Err(failure.error);
    }
    let total = aggregate(
        signatures
            .iter()
            .chain(extra.signatures.iter().map(|info| &info.signature)),
    );
    Ok(SpendBundle::new(spend.coin_spends.clone(), total))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conditions::{AGG_SIG_ME, AGG_SIG_UNSAFE};
    use crate::error::EvaluationError;
    use crate::evaluator::QuoteEvaluator;
    use crate::node::Node;
    use crate::unsigned_spend::{PathHint, SumHint};

    fn secret(seed: &str) -> SecretScalar {
        SecretScalar::from_seed(seed.as_bytes())
    }

    fn quoted(conditions: Vec<Node>) -> Node {
        Node::pair(Node::from_int(1), Node::list(conditions))
    }

    fn agg_sig(opcode: i128, pk: &PublicPoint, msg: &[u8]) -> Node {
        Node::list(vec![
            Node::from_int(opcode),
            Node::atom(pk.as_bytes()),
            Node::atom(msg),
        ])
    }

    struct Fixture {
        a: SecretScalar,
        b: SecretScalar,
        path: Vec<u32>,
        spend: UnsignedSpend,
    }

    /// Final key `A' + B + pub(O)` where `A'` is A derived along `[i, j]`.
    fn fixture() -> Fixture {
        let a = secret("A");
        let b = secret("B");
        let offset = secret("O");
        let path = vec![7, 11];
        let a_child = a.child_for_path(&path).public_key();
        let hint = SumHint::new(vec![a_child, b.public_key()], offset);
        let final_pk = hint.final_public_key();
        let spend = UnsignedSpend {
            coin_spends: vec![CoinSpend::new(
                [1; 32],
                quoted(vec![
                    agg_sig(AGG_SIG_UNSAFE, &final_pk, b"raw"),
                    agg_sig(AGG_SIG_ME, &final_pk, b"bound"),
                ]),
                10,
                Node::nil(),
            )],
            sum_hints: vec![hint],
            path_hints: vec![PathHint::new(a.public_key(), path.clone())],
            domain_suffix: vec![0xab; 32],
        };
        Fixture { a, b, path, spend }
    }

    #[test]
    fn each_party_signs_its_component() {
        let f = fixture();
        let config = Config::default();
        let report_a = sign(&f.spend, &[f.a], &QuoteEvaluator, &config);
        assert!(report_a.failures.is_empty());
        assert_eq!(report_a.signatures.len(), 2);
        let a_child = f.a.child_for_path(&f.path).public_key();
        assert!(report_a
            .signatures
            .iter()
            .all(|info| info.partial_public_key == a_child));
        // ME messages first, bound to coin and domain
        let coin_id = f.spend.coin_spends[0].coin.name();
        assert_eq!(
            report_a.signatures[0].message,
            [&b"bound"[..], &coin_id[..], &[0xab; 32][..]].concat()
        );
        assert_eq!(report_a.signatures[1].message, b"raw".to_vec());

        let report_b = sign(&f.spend, &[f.b], &QuoteEvaluator, &config);
        assert_eq!(report_b.signatures.len(), 2);

        let nobody = sign(&f.spend, &[secret("C")], &QuoteEvaluator, &config);
        assert!(nobody.signatures.is_empty());
        assert!(nobody.failures.is_empty());
    }

    #[test]
    fn partial_signatures_aggregate_to_a_valid_bundle() -> Result<(), SigningError> {
        let f = fixture();
        let config = Config::default();
        let mut signatures = Vec::new();
        for secrets in [[f.a], [f.b]] {
            let report = sign(&f.spend, &secrets, &QuoteEvaluator, &config);
            signatures.extend(report.signatures.iter().map(|info| info.signature));
        }

        let bundle = create_spend_bundle(&f.spend, &signatures, &QuoteEvaluator, &config)?;
        assert!(bundle.verify(&f.spend.domain_suffix, &QuoteEvaluator, config.cost_limit)?);

        let pairs = verify_pairs(&f.spend, &QuoteEvaluator, &config)?;
        assert_eq!(pairs.len(), 2);

        let missing_b = create_spend_bundle(
            &f.spend,
            &signatures[..2],
            &QuoteEvaluator,
            &config,
        )?;
        assert!(!missing_b.verify(&f.spend.domain_suffix, &QuoteEvaluator, config.cost_limit)?);
        Ok(())
    }

    #[test]
    fn offset_alone_signs_its_own_key() -> Result<(), SigningError> {
        let offset = secret("solo");
        let final_pk = offset.public_key();
        let spend = UnsignedSpend {
            coin_spends: vec![CoinSpend::new(
                [2; 32],
                quoted(vec![agg_sig(AGG_SIG_ME, &final_pk, b"m")]),
                1,
                Node::nil(),
            )],
            sum_hints: vec![SumHint::new(vec![], offset)],
            ..UnsignedSpend::default()
        };
        let config = Config::default();
        let report = generate_synthetic_offset_signatures(&spend, &QuoteEvaluator, &config)?;
        assert_eq!(report.signatures.len(), 1);
        let info = &report.signatures[0];
        assert_eq!(info.partial_public_key, final_pk);
        assert!(info.signature.verify(&final_pk, &info.message));

        let bundle = create_spend_bundle(&spend, &[], &QuoteEvaluator, &config)?;
        assert!(bundle.verify(&[], &QuoteEvaluator, config.cost_limit)?);
        Ok(())
    }

    #[test]
    fn keys_without_sum_hints_get_no_offset_signature() -> Result<(), SigningError> {
        let sk = secret("plain");
        let spend = UnsignedSpend {
            coin_spends: vec![CoinSpend::new(
                [3; 32],
                quoted(vec![agg_sig(AGG_SIG_UNSAFE, &sk.public_key(), b"m")]),
                1,
                Node::nil(),
            )],
            ..UnsignedSpend::default()
        };
        let config = Config::default();
        let report = generate_synthetic_offset_signatures(&spend, &QuoteEvaluator, &config)?;
        assert!(report.signatures.is_empty());

        // own root, empty path
        let signed = sign(&spend, &[sk], &QuoteEvaluator, &config);
        assert_eq!(signed.signatures.len(), 1);
        assert_eq!(signed.signatures[0].signature, sk.sign(b"m", None));
        Ok(())
    }

    #[test]
    fn failing_coins_are_reported_and_skipped() {
        let mut f = fixture();
        let good = f.spend.coin_spends[0].clone();
        let apply = Node::pair(Node::from_int(2), Node::nil());
        let bad = CoinSpend::new([9; 32], apply, 1, Node::nil());
        f.spend.coin_spends = vec![bad.clone(), good];
        let config = Config::default();
        let report = sign(&f.spend, &[f.a], &QuoteEvaluator, &config);
        assert_eq!(report.signatures.len(), 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].coin_id, bad.coin.name());

        let tight = Config {
            cost_limit: 1,
            ..Config::default()
        };
        let report = sign(&f.spend, &[f.a], &QuoteEvaluator, &tight);
        assert!(report.signatures.is_empty());
        assert!(report.failures.iter().any(|failure| failure.error
            == SigningError::Evaluation(EvaluationError::CostExceeded(1))));

        assert!(create_spend_bundle(&f.spend, &[], &QuoteEvaluator, &config).is_err());
    }

    #[test]
    fn aggregate_skips_identity() {
        let sig = secret("x").sign(b"m", None);
        assert_eq!(aggregate(&[]), Signature::identity());
        assert_eq!(aggregate(&[Signature::identity(), sig]), sig);
    }
}
