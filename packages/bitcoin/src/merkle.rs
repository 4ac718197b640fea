use bitcoin::blockdata::transaction::Transaction;
use bitcoin::hashes::{sha256d, Hash};
use bitcoin::Txid;

use crate::error::Error;
use crate::Result;

pub fn verify_merkle_proof(
    tx: &Transaction,
    proof: &[&[u8]],
    tx_index: usize,
    root: &sha256d::Hash,
) -> bool {
    let mut current_hash = tx.txid().to_raw_hash();

    for (i, next_hash) in proof.iter().enumerate() {
        let mut concat = vec![];
        // extracts the i-th bit of tx idx
        if ((tx_index >> i) & 1) == 1 {
            // If the bit is 1, the transaction is in the right subtree of the current hash
            // Append the next hash and then the current hash to the concatenated hash value
            concat.extend_from_slice(next_hash);
            concat.extend_from_slice(&current_hash[..]);
        } else {
            // If the bit is 0, the transaction is in the left subtree of the current hash
            // Append the current hash and then the next hash to the concatenated hash value
            concat.extend_from_slice(&current_hash[..]);
            concat.extend_from_slice(next_hash);
        }

        current_hash = sha256d::Hash::hash(&concat);
    }

    &current_hash == root
}

/// Splits a flattened merkle path into its 32-byte nodes
pub fn split_merkle_path(path: &[u8]) -> Result<Vec<&[u8]>> {
    if path.len() % 32 != 0 {
        return Err(Error::InvalidMerkleProofElement(path.len() / 32));
    }
    Ok(path.chunks(32).collect())
}

/// Computes the block merkle root over `txids` and the merkle path of the
/// transaction at `tx_index`, following Bitcoin's duplicate-last-node rule
/// for odd levels.
pub fn merkle_root_and_path(
    txids: &[Txid],
    tx_index: usize,
) -> Result<(sha256d::Hash, Vec<[u8; 32]>)> {
    if txids.is_empty() {
        return Err(Error::EmptyBlock {});
    }
    if tx_index >= txids.len() {
        return Err(Error::TxIndexOutOfRange(tx_index, txids.len()));
    }

    let mut level: Vec<sha256d::Hash> = txids.iter().map(|txid| txid.to_raw_hash()).collect();
    let mut index = tx_index;
    let mut path = vec![];
    while level.len() > 1 {
        let sibling = if index ^ 1 < level.len() {
            level[index ^ 1]
        } else {
            level[index]
        };
        path.push(sibling.to_byte_array());

        level = level
            .chunks(2)
            .map(|pair| {
                let left = pair[0];
                let right = pair.get(1).copied().unwrap_or(left);
                let mut concat = left.to_byte_array().to_vec();
                concat.extend_from_slice(&right[..]);
                sha256d::Hash::hash(&concat)
            })
            .collect();
        index /= 2;
    }

    Ok((level[0], path))
}
