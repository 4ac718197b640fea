//! RFC-6962 hashing with domain-separated leaf and inner nodes, as used for
//! the public randomness commitments.
use sha2::{Digest, Sha256};

pub const HASH_SIZE: usize = 32;

const LEAF_PREFIX: u8 = 0;
const INNER_PREFIX: u8 = 1;

/// Reuses one SHA-256 state across the nodes of a tree.
#[derive(Default)]
pub(crate) struct NodeHasher(Sha256);

impl NodeHasher {
    pub fn empty(&mut self) -> Vec<u8> {
        self.0.finalize_reset().to_vec()
    }

    pub fn leaf(&mut self, leaf: &[u8]) -> Vec<u8> {
        self.0.update([LEAF_PREFIX]);
        self.0.update(leaf);
        self.0.finalize_reset().to_vec()
    }

    pub fn inner(&mut self, left: &[u8], right: &[u8]) -> Vec<u8> {
        self.0.update([INNER_PREFIX]);
        self.0.update(left);
        self.0.update(right);
        self.0.finalize_reset().to_vec()
    }
}

pub fn leaf_hash(leaf: &[u8]) -> Vec<u8> {
    NodeHasher::default().leaf(leaf)
}

pub fn inner_hash(left: &[u8], right: &[u8]) -> Vec<u8> {
    NodeHasher::default().inner(left, right)
}
