//! Fixed-depth keccak256 Merkle tree over the transactions of a child block.
//!
//! The root contract commits to child blocks with a depth-16 binary tree whose leaves are
//! the keccak hashes of the encoded signed transactions, padded on the right with a
//! precomputed empty-subtree hash chain. The watcher only ever produces proofs against
//! these roots; verification in production belongs to the contract. The [`verify`] helper
//! exists for tests.

use ethereum_types::H256;
use keccak_hash::keccak;

use crate::errors::MerkleError;

/// The depth of the child-block transaction tree.
pub const MERKLE_DEPTH: usize = 16;

/// The number of bytes in an inclusion proof: one sibling hash per level, bottom-up.
pub const PROOF_SIZE: usize = MERKLE_DEPTH * 32;

/// A fully materialised child-block transaction tree.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    leaf_count: usize,
    // layers[0] holds the leaf hashes, layers[MERKLE_DEPTH] the root alone.
    layers: Vec<Vec<H256>>,
}

impl MerkleTree {
    /// Builds the tree over the encoded transactions of one block.
    pub fn new<T: AsRef<[u8]>>(transactions: &[T]) -> Result<Self, MerkleError> {
        let max_leaves = 1usize << MERKLE_DEPTH;
        if transactions.len() > max_leaves {
            return Err(MerkleError::TooManyLeaves {
                depth: MERKLE_DEPTH,
                count: transactions.len(),
            });
        }

        let defaults = default_hashes();
        let mut layers = Vec::with_capacity(MERKLE_DEPTH + 1);
        layers.push(
            transactions
                .iter()
                .map(|tx| keccak(tx.as_ref()))
                .collect::<Vec<_>>(),
        );

        for level in 0..MERKLE_DEPTH {
            let lower = &layers[level];
            let mut upper = Vec::with_capacity(lower.len().div_ceil(2));
            for pair in lower.chunks(2) {
                let left = pair[0];
                let right = pair.get(1).copied().unwrap_or(defaults[level]);
                upper.push(hash_pair(left, right));
            }
            if upper.is_empty() {
                upper.push(defaults[level + 1]);
            }
            layers.push(upper);
        }

        Ok(MerkleTree {
            leaf_count: transactions.len(),
            layers,
        })
    }

    /// The root hash the contract expects for this block.
    pub fn root(&self) -> H256 {
        self.layers[MERKLE_DEPTH][0]
    }

    /// The inclusion proof for the transaction at `txindex`: [`PROOF_SIZE`] bytes of
    /// concatenated sibling hashes, bottom-up.
    pub fn proof(&self, txindex: usize) -> Result<Vec<u8>, MerkleError> {
        if txindex >= self.leaf_count {
            return Err(MerkleError::LeafIndexOutOfRange(txindex));
        }

        let defaults = default_hashes();
        let mut proof = Vec::with_capacity(PROOF_SIZE);
        let mut index = txindex;
        for level in 0..MERKLE_DEPTH {
            let sibling_index = index ^ 1;
            let sibling = self.layers[level]
                .get(sibling_index)
                .copied()
                .unwrap_or(defaults[level]);
            proof.extend_from_slice(sibling.as_bytes());
            index /= 2;
        }

        Ok(proof)
    }
}

/// Checks an inclusion proof against a root. Test support only; the on-chain contract is
/// the production verifier.
pub fn verify(root: H256, leaf: &[u8], txindex: usize, proof: &[u8]) -> bool {
    if proof.len() != PROOF_SIZE {
        return false;
    }

    let mut hash = keccak(leaf);
    let mut index = txindex;
    for sibling in proof.chunks(32) {
        let sibling = H256::from_slice(sibling);
        hash = if index % 2 == 0 {
            hash_pair(hash, sibling)
        } else {
            hash_pair(sibling, hash)
        };
        index /= 2;
    }

    hash == root
}

fn hash_pair(left: H256, right: H256) -> H256 {
    let mut buf = [0u8; 64];
    buf[..32].copy_from_slice(left.as_bytes());
    buf[32..].copy_from_slice(right.as_bytes());
    keccak(buf)
}

// Empty-subtree hashes per level: defaults[0] = keccak([]), defaults[n + 1] is the hash of
// two level-n defaults.
fn default_hashes() -> [H256; MERKLE_DEPTH + 1] {
    let mut defaults = [H256::zero(); MERKLE_DEPTH + 1];
    defaults[0] = keccak([]);
    for level in 0..MERKLE_DEPTH {
        defaults[level + 1] = hash_pair(defaults[level], defaults[level]);
    }
    defaults
}
