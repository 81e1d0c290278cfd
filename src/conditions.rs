//! Extraction of signature-requiring conditions.

use crate::bls::PublicPoint;
use crate::coin::CoinSpend;
use crate::error::SigningError;
use crate::evaluator::Evaluator;
use crate::node::Node;
use std::collections::BTreeMap;

pub const AGG_SIG_UNSAFE: i128 = 49;
pub const AGG_SIG_ME: i128 = 50;

/// Groups conditions by their integer opcode. Atom conditions and
/// conditions whose opcode is not an integer atom are skipped.
pub fn conditions_by_opcode(conditions: &Node) -> BTreeMap<i128, Vec<&Node>> {
    let mut by_opcode: BTreeMap<i128, Vec<&Node>> = BTreeMap::new();
    let mut cursor = conditions;
    while let Some((condition, rest)) = cursor.as_pair() {
        if let Some((opcode, _)) = condition.as_pair() {
            if let Ok(opcode) = opcode.as_int() {
                by_opcode.entry(opcode).or_default().push(condition);
            }
        }
        cursor = rest;
    }
    by_opcode
}

/// Leading atoms of a list, stopping at the first pair or terminator.
fn atom_prefix(node: &Node) -> Vec<&[u8]> {
    let mut atoms = Vec::new();
    let mut cursor = node;
    while let Some((first, rest)) = cursor.as_pair() {
        match first.as_atom() {
            Some(atom) => atoms.push(atom),
            None => break,
        }
        cursor = rest;
    }
    atoms
}

fn key_and_message(condition: &Node) -> Result<(PublicPoint, &[u8]), SigningError> {
    let atoms = atom_prefix(condition);
    if atoms.len() < 3 {
        return Err(SigningError::MalformedCondition(format!("{condition}")));
    }
    let public_key = PublicPoint::from_bytes(atoms[1])
        .map_err(|e| SigningError::MalformedCondition(format!("{condition}: {e}")))?;
    Ok((public_key, atoms[2]))
}

/// The `(public key, message)` pairs a condition list requires signatures
/// for. `AGG_SIG_ME` messages get `me_suffix` appended and come first,
/// followed by `AGG_SIG_UNSAFE` messages, verbatim.
pub fn verify_pairs_for_conditions(
    conditions: &Node,
    me_suffix: &[u8],
) -> Result<Vec<(PublicPoint, Vec<u8>)>, SigningError> {
    let by_opcode = conditions_by_opcode(conditions);
    let mut pairs = Vec::new();
    for condition in by_opcode.get(&AGG_SIG_ME).into_iter().flatten() {
        let (public_key, message) = key_and_message(condition)?;
        pairs.push((public_key, [message, me_suffix].concat()));
    }
    for condition in by_opcode.get(&AGG_SIG_UNSAFE).into_iter().flatten() {
        let (public_key, message) = key_and_message(condition)?;
        pairs.push((public_key, message.to_vec()));
    }
    Ok(pairs)
}

/// Evaluates a coin spend and returns the pairs it needs signed, with
/// `AGG_SIG_ME` messages bound to the coin id and `domain_suffix`.
pub fn generate_verify_pairs(
    coin_spend: &CoinSpend,
    domain_suffix: &[u8],
    evaluator: &dyn Evaluator,
    cost_limit: u64,
) -> Result<Vec<(PublicPoint, Vec<u8>)>, SigningError> {
    let me_suffix = [&coin_spend.coin.name()[..], domain_suffix].concat();
    let conditions = evaluator.run(&coin_spend.puzzle_reveal, &coin_spend.solution, cost_limit)?;
    verify_pairs_for_conditions(&conditions, &me_suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bls::SecretScalar;
    use crate::evaluator::QuoteEvaluator;

    fn condition(opcode: i128, pk: &PublicPoint, msg: &[u8]) -> Node {
        Node::list(vec![
            Node::from_int(opcode),
            Node::atom(pk.as_bytes()),
            Node::atom(msg),
        ])
    }

    #[test]
    fn me_pairs_come_first_and_are_suffixed() {
        let pk = SecretScalar::from_seed(b"k").public_key();
        let conditions = Node::list(vec![
            condition(AGG_SIG_UNSAFE, &pk, b"unsafe"),
            Node::list(vec![Node::from_int(51), Node::atom(vec![0; 32]), Node::from_int(5)]),
            condition(AGG_SIG_ME, &pk, b"me"),
            Node::from_int(7),
        ]);
        let pairs = verify_pairs_for_conditions(&conditions, b"-sfx").unwrap();
        assert_eq!(
            pairs,
            vec![(pk, b"me-sfx".to_vec()), (pk, b"unsafe".to_vec())]
        );
    }

    #[test]
    fn short_or_bad_key_conditions_are_malformed() {
        let short = Node::list(vec![Node::list(vec![
            Node::from_int(AGG_SIG_ME),
            Node::atom(vec![1; 48]),
        ])]);
        assert!(matches!(
            verify_pairs_for_conditions(&short, b""),
            Err(SigningError::MalformedCondition(_))
        ));
        let bad_key = Node::list(vec![Node::list(vec![
            Node::from_int(AGG_SIG_UNSAFE),
            Node::atom(vec![1; 48]),
            Node::atom(b"m".to_vec()),
        ])]);
        assert!(verify_pairs_for_conditions(&bad_key, b"").is_err());
    }

    #[test]
    fn spend_pairs_bind_coin_and_domain() {
        let pk = SecretScalar::from_seed(b"k").public_key();
        let program = Node::pair(
            Node::from_int(1),
            Node::list(vec![condition(AGG_SIG_ME, &pk, b"hi")]),
        );
        let spend = CoinSpend::new([4; 32], program, 77, Node::nil());
        let pairs = generate_verify_pairs(&spend, &[9; 32], &QuoteEvaluator, 1000).unwrap();
        let expected = [&b"hi"[..], &spend.coin.name()[..], &[9u8; 32][..]].concat();
        assert_eq!(pairs, vec![(pk, expected)]);

        assert!(matches!(
            generate_verify_pairs(&spend, &[], &QuoteEvaluator, 1),
            Err(SigningError::Evaluation(_))
        ));
    }
}
