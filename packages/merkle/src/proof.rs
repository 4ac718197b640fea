//! Inclusion proofs over RFC-6962 trees, wire compatible with CometBFT's
//! `merkle.Proof`.
use cosmwasm_schema::cw_serde;
use cosmwasm_std::Binary;

use crate::error::MerkleError;
use crate::hash::{inner_hash, leaf_hash, HASH_SIZE};
use crate::tree::{hash_from_byte_slices, split_point};

/// Proof that the leaf at `index` belongs to a tree of `total` leaves.
///
/// The leaf hash is included, the root is not. `aunts` are the sibling
/// hashes ordered from the leaf level up to the root.
#[cw_serde]
pub struct Proof {
    pub total: u64,
    pub index: u64,
    pub leaf_hash: Binary,
    pub aunts: Vec<Binary>,
}

impl Proof {
    pub const MAX_AUNTS: usize = 100;

    /// Checks hash sizes and the aunt count bound, without touching the tree shape
    pub fn validate_basic(&self) -> Result<(), MerkleError> {
        if self.leaf_hash.len() != HASH_SIZE {
            return Err(MerkleError::InvalidLeafHashSize {
                expected: HASH_SIZE,
                actual: self.leaf_hash.len(),
            });
        }
        if self.aunts.len() > Self::MAX_AUNTS {
            return Err(MerkleError::TooManyAunts(self.aunts.len(), Self::MAX_AUNTS));
        }
        if let Some((index, aunt)) = self
            .aunts
            .iter()
            .enumerate()
            .find(|(_, aunt)| aunt.len() != HASH_SIZE)
        {
            return Err(MerkleError::InvalidAuntSize {
                index,
                expected: HASH_SIZE,
                actual: aunt.len(),
            });
        }
        Ok(())
    }

    /// Verifies that `leaf` sits at `self.index` in the tree rooted at `root_hash`
    pub fn verify(&self, root_hash: &[u8], leaf: &[u8]) -> Result<(), MerkleError> {
        if root_hash.is_empty() {
            return Err(MerkleError::EmptyRoot);
        }
        self.validate_basic()?;
        if self.leaf_hash.as_slice() != leaf_hash(leaf).as_slice() {
            return Err(MerkleError::LeafHashMismatch);
        }
        if self.compute_root_hash()? != root_hash {
            return Err(MerkleError::RootHashMismatch);
        }
        Ok(())
    }

    pub fn compute_root_hash(&self) -> Result<Vec<u8>, MerkleError> {
        compute_hash_from_aunts(self.index, self.total, &self.leaf_hash, &self.aunts)
    }
}

/// Folds the aunts onto `leaf_hash` to obtain the root of a tree of `total` leaves
pub fn compute_hash_from_aunts(
    index: u64,
    total: u64,
    leaf_hash: &[u8],
    aunts: &[Binary],
) -> Result<Vec<u8>, MerkleError> {
    if index >= total {
        return Err(MerkleError::InvalidIndex { index, total });
    }
    // Walk down from the root, recording on which side of each split the leaf lies
    let mut in_left = Vec::new();
    let (mut index, mut size) = (index, total);
    while size > 1 {
        let k = split_point(size as usize) as u64;
        if index < k {
            in_left.push(true);
            size = k;
        } else {
            in_left.push(false);
            index -= k;
            size -= k;
        }
    }
    if in_left.len() != aunts.len() {
        return Err(MerkleError::WrongAuntCount {
            expected: in_left.len(),
            actual: aunts.len(),
        });
    }
    let root = in_left
        .iter()
        .rev()
        .zip(aunts)
        .fold(leaf_hash.to_vec(), |hash, (left, aunt)| {
            if *left {
                inner_hash(&hash, aunt)
            } else {
                inner_hash(aunt, &hash)
            }
        });
    Ok(root)
}

/// Root hash of `items` together with an inclusion proof for each of them
pub fn proofs_from_byte_slices(items: &[Vec<u8>]) -> (Vec<u8>, Vec<Proof>) {
    let root = hash_from_byte_slices(items.to_vec());
    let total = items.len() as u64;
    let proofs = items
        .iter()
        .enumerate()
        .map(|(i, item)| Proof {
            total,
            index: i as u64,
            leaf_hash: leaf_hash(item).into(),
            aunts: aunts_for(items, i).into_iter().map(Binary::from).collect(),
        })
        .collect();
    (root, proofs)
}

fn aunts_for(items: &[Vec<u8>], index: usize) -> Vec<Vec<u8>> {
    if items.len() <= 1 {
        return vec![];
    }
    let k = split_point(items.len());
    let (mut aunts, sibling) = if index < k {
        (aunts_for(&items[..k], index), &items[k..])
    } else {
        (aunts_for(&items[k..], index - k), &items[..k])
    };
    aunts.push(hash_from_byte_slices(sibling.to_vec()));
    aunts
}
