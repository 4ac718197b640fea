use cosmwasm_schema::cw_serde;
use cosmwasm_std::{Addr, Uint128, Uint256};
use cw_storage_plus::{Item, Map};

/// Reward gauges by kind and owner
pub(crate) const REWARD_GAUGES: Map<(&str, &Addr), Uint128> = Map::new("reward_gauges");

/// Delegator reward distribution of each finality provider
pub(crate) const FP_DISTRIBUTION: Map<&str, Distribution> = Map::new("fp_distribution");

/// Part of the contract balance already owed to someone
pub(crate) const ACCOUNTED: Item<Uint128> = Item::new("accounted_rewards");

#[cw_serde]
#[derive(Default)]
pub struct Distribution {
    /// Points per satoshi of stake, shifted left by `POINTS_SHIFT`
    pub points_per_stake: Uint256,
    /// Points that could not be distributed because of rounding
    pub points_leftover: Uint256,
}

/// Bits points are shifted by, to keep precision on small distributions
pub const POINTS_SHIFT: u8 = 32;
