//! Recovering which local secrets can sign for a key from the hints carried
//! by an [`UnsignedSpend`].

use crate::bls::{PublicPoint, SecretScalar};
use crate::unsigned_spend::{PathHint, SumHint, UnsignedSpend};
use std::collections::HashMap;
use tracing::debug;

/// Hint lookups for one unsigned spend.
#[derive(Debug)]
pub struct HintIndex<'a> {
    sum_hint_by_final_key: HashMap<PublicPoint, &'a SumHint>,
    path_hint_by_partial_key: HashMap<PublicPoint, &'a PathHint>,
}

impl<'a> HintIndex<'a> {
    pub fn new(spend: &'a UnsignedSpend) -> Self {
        Self {
            sum_hint_by_final_key: spend
                .sum_hints
                .iter()
                .map(|hint| (hint.final_public_key(), hint))
                .collect(),
            path_hint_by_partial_key: spend
                .path_hints
                .iter()
                .map(|hint| (hint.public_key(), hint))
                .collect(),
        }
    }

    pub fn sum_hint(&self, final_public_key: &PublicPoint) -> Option<&'a SumHint> {
        self.sum_hint_by_final_key.get(final_public_key).copied()
    }

    /// The component keys summed into `final_public_key`. A key without a sum
    /// hint is its own only component.
    pub fn components(&self, final_public_key: &PublicPoint) -> Vec<PublicPoint> {
        match self.sum_hint(final_public_key) {
            Some(hint) => hint.public_keys.clone(),
            None => vec![*final_public_key],
        }
    }

    /// The root and path deriving `component`. A key without a path hint is
    /// its own root.
    pub fn path_for(&self, component: &PublicPoint) -> (PublicPoint, &'a [u32]) {
        match self.path_hint_by_partial_key.get(component).copied() {
            Some(hint) => (hint.root_public_key, hint.path.as_slice()),
            None => (*component, &[]),
        }
    }

    /// Finds the local secret for `component`: a secret whose public key is
    /// the hinted root and which derives along the hinted path to exactly
    /// `component`.
    pub fn secret_for(
        &self,
        component: &PublicPoint,
        secrets: &[SecretScalar],
    ) -> Option<SecretScalar> {
        let (root, path) = self.path_for(component);
        for secret in secrets {
            if secret.public_key() != root {
                continue;
            }
            let child = secret.child_for_path(path);
            if child.public_key() == *component {
                debug!(
                    component = component.fingerprint(),
                    root = root.fingerprint(),
                    ?path,
                    "found secret for key"
                );
                return Some(child);
            }
            debug!(
                component = component.fingerprint(),
                root = root.fingerprint(),
                ?path,
                "derived key does not match hint"
            );
        }
        debug!(component = component.fingerprint(), "key not owned");
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret(seed: &str) -> SecretScalar {
        SecretScalar::from_seed(seed.as_bytes())
    }

    #[test]
    fn sum_and_path_hints_resolve() {
        let a = secret("A");
        let b = secret("B");
        let offset = secret("O");
        let path = vec![3, 9];
        let a_child = a.child_for_path(&path).public_key();
        let sum = SumHint::new(vec![a_child, b.public_key()], offset);
        let final_pk = a_child + b.public_key() + offset.public_key();
        let spend = UnsignedSpend {
            sum_hints: vec![sum],
            path_hints: vec![PathHint::new(a.public_key(), path.clone())],
            ..UnsignedSpend::default()
        };
        let index = HintIndex::new(&spend);

        assert_eq!(index.components(&final_pk), vec![a_child, b.public_key()]);
        assert_eq!(index.path_for(&a_child), (a.public_key(), &path[..]));
        let no_path: &[u32] = &[];
        assert_eq!(index.path_for(&b.public_key()), (b.public_key(), no_path));

        assert_eq!(
            index.secret_for(&a_child, &[b, a]),
            Some(a.child_for_path(&path))
        );
        assert_eq!(index.secret_for(&b.public_key(), &[a, b]), Some(b));
        assert_eq!(index.secret_for(&a_child, &[secret("C")]), None);
        assert_eq!(index.secret_for(&b.public_key(), &[]), None);
    }

    #[test]
    fn unknown_final_key_is_its_own_component() {
        let spend = UnsignedSpend::default();
        let index = HintIndex::new(&spend);
        let pk = secret("X").public_key();
        assert_eq!(index.components(&pk), vec![pk]);
        assert!(index.sum_hint(&pk).is_none());
    }

    #[test]
    fn unhinted_child_is_not_owned() {
        let a = secret("A");
        let hinted = a.child_for_path(&[1]).public_key();
        let spend = UnsignedSpend {
            path_hints: vec![PathHint::new(a.public_key(), vec![1])],
            ..UnsignedSpend::default()
        };
        let index = HintIndex::new(&spend);
        assert_eq!(index.secret_for(&hinted, &[a]), Some(a.child(1)));
        assert_eq!(index.secret_for(&a.child(2).public_key(), &[a]), None);
    }
}
