use crate::node::{int_to_atom, Node};
use sha2::{Digest, Sha256};

pub type Bytes32 = [u8; 32];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Coin {
    pub parent_coin_info: Bytes32,
    pub puzzle_hash: Bytes32,
    pub amount: u64,
}

impl Coin {
    pub fn new(parent_coin_info: Bytes32, puzzle_hash: Bytes32, amount: u64) -> Self {
        Self {
            parent_coin_info,
            puzzle_hash,
            amount,
        }
    }

    /// The coin id: sha256 of parent, puzzle hash and the minimal integer
    /// encoding of the amount.
    pub fn name(&self) -> Bytes32 {
        let mut hasher = Sha256::new();
        hasher.update(self.parent_coin_info);
        hasher.update(self.puzzle_hash);
        hasher.update(int_to_atom(i128::from(self.amount)));
        hasher.finalize().into()
    }
}

/// A coin together with the program locking it and the solution unlocking it.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CoinSpend {
    pub coin: Coin,
    pub puzzle_reveal: Node,
    pub solution: Node,
}

impl CoinSpend {
    /// Builds a spend whose coin puzzle hash is the tree hash of `puzzle_reveal`.
    pub fn new(
        parent_coin_info: Bytes32,
        puzzle_reveal: Node,
        amount: u64,
        solution: Node,
    ) -> Self {
        let puzzle_hash = puzzle_reveal.tree_hash();
        Self {
            coin: Coin::new(parent_coin_info, puzzle_hash, amount),
            puzzle_reveal,
            solution,
        }
    }
}
