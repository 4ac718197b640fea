//! Types shared between the finality gadget and its hosts: indexed blocks,
//! public randomness commitments and equivocation evidence.
use cosmwasm_schema::cw_serde;

use crate::Bytes;

/// A block known to the finality gadget
#[cw_serde]
pub struct IndexedBlock {
    pub height: u64,
    pub app_hash: Bytes,
    /// Set once the block gathered a quorum of voting power and every
    /// preceding block is finalized
    pub finalized: bool,
}

/// Merkle commitment to `num_pub_rand` EOTS public randomness values, the
/// first one being used at `start_height`.
#[cw_serde]
pub struct PubRandCommit {
    pub start_height: u64,
    pub num_pub_rand: u64,
    /// Babylon height the commitment was submitted at
    pub height: u64,
    /// Epoch of `height`. The commitment is usable once this epoch is
    /// finalized on Bitcoin.
    pub epoch_num: u64,
    /// Merkle root over the public randomness list
    pub commitment: Bytes,
}

impl PubRandCommit {
    pub fn in_range(&self, height: u64) -> bool {
        self.start_height <= height && height <= self.end_height()
    }

    /// Last height covered by the commitment
    pub fn end_height(&self) -> u64 {
        self.start_height + self.num_pub_rand - 1
    }
}

/// Two valid finality signatures from the same finality provider, at the same
/// height and with the same public randomness, over different blocks.
///
/// Together they leak the finality provider's secret key.
#[cw_serde]
pub struct Evidence {
    /// x-only BTC public key of the offender
    pub fp_btc_pk: Bytes,
    pub block_height: u64,
    /// Committed public randomness used by both votes
    pub pub_rand: Bytes,
    pub canonical_app_hash: Bytes,
    pub fork_app_hash: Bytes,
    /// EOTS signature (the `s` scalar) over the canonical block
    pub canonical_finality_sig: Bytes,
    /// EOTS signature (the `s` scalar) over the fork block
    pub fork_finality_sig: Bytes,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commitment_range_is_inclusive() {
        let commit = PubRandCommit {
            start_height: 100,
            num_pub_rand: 50,
            height: 10,
            epoch_num: 1,
            commitment: vec![0; 32],
        };
        assert_eq!(commit.end_height(), 149);
        assert!(!commit.in_range(99));
        assert!(commit.in_range(100));
        assert!(commit.in_range(149));
        assert!(!commit.in_range(150));
    }
}
