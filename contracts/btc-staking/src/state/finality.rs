use cosmwasm_schema::cw_serde;
use cw_storage_plus::{Item, Map};

use babylon_apis::btc_staking_api::HASH_SIZE;
use babylon_apis::finality_api::{Evidence, IndexedBlock};
use babylon_apis::Bytes;

use crate::msg::FinalityProviderInfo;

/// A finality vote of a finality provider
#[cw_serde]
pub struct Vote {
    pub app_hash: Bytes,
    pub pub_rand: Bytes,
    pub signature: Bytes,
}

/// Liveness tracking of a finality provider
#[cw_serde]
#[derive(Default)]
pub struct SigningInfo {
    /// Height at which the finality provider first entered the active set
    pub start_height: u64,
    /// Consecutive blocks the finality provider did not vote for
    pub missed_blocks_counter: u64,
}

/// A delegation slashed on Bitcoin through the equivocation of one of its finality providers
#[cw_serde]
pub struct SlashedDelegation {
    pub fp_btc_pk_hex: String,
    /// The slashing tx, with its full witness, ready to be broadcast
    pub slashing_tx: Bytes,
    /// Whether the unbonding output (instead of the staking output) gets slashed
    pub unbonded: bool,
}

/// Map of votes by block height and FP
pub(crate) const VOTES: Map<(u64, &str), Vote> = Map::new("fp_votes");

/// Map of blocks information by height
pub(crate) const BLOCKS: Map<u64, IndexedBlock> = Map::new("blocks");

/// Next height to finalise
pub(crate) const NEXT_HEIGHT: Item<u64> = Item::new("next_height");

/// `FP_SET` is the calculated list of the active finality providers by height
pub(crate) const FP_SET: Map<u64, Vec<FinalityProviderInfo>> = Map::new("fp_set");

/// Map of double signing evidence by FP and block height
pub(crate) const EVIDENCES: Map<(&str, u64), Evidence> = Map::new("evidences");

/// Liveness of the finality providers
pub(crate) const FP_SIGNING_INFO: Map<&str, SigningInfo> = Map::new("fp_signing_info");

/// Height of the block whose resume-finality proposal jailed a finality provider
pub(crate) const RESUME_FINALITY_BLOCK: Map<&str, u64> = Map::new("resume_finality_block");

/// Last epoch finalized on Bitcoin
pub(crate) const LAST_FINALIZED_EPOCH: Item<u64> = Item::new("last_finalized_epoch");

/// Map of BTC tip height by block height
pub(crate) const BTC_HEIGHT: Map<u64, u32> = Map::new("btc_height");

/// Slashing txs by staking tx hash
pub(crate) const SLASHED_DELEGATIONS: Map<&[u8; HASH_SIZE], SlashedDelegation> =
    Map::new("slashed_delegations");
