use cosmwasm_schema::cw_serde;
use cosmwasm_std::{Addr, Empty, Uint128, Uint256};
use cw_storage_plus::{Item, Map};

/// Scale of the cumulative rewards-per-score values
pub const DECIMAL_REWARDS: u128 = 1_000_000_000_000_000_000;

/// Rewards of the running period
#[cw_serde]
pub struct CurrentRewards {
    pub period: u64,
    /// Rewards deposited during the period
    pub rewards: Uint128,
    /// Sum of the scores of every co-staker
    pub total_score: Uint128,
}

/// A co-staker's stake and the period its rewards were last settled at
#[cw_serde]
#[derive(Default)]
pub struct CostakerTracker {
    /// Satoshis of active delegations to non-jailed, non-slashed finality providers
    pub active_satoshis: u64,
    /// Native stake to non-jailed validators
    pub active_baby: Uint128,
    pub total_score: Uint128,
    /// The period whose cumulative rewards-per-score is this co-staker's baseline
    pub start_period: u64,
}

pub(crate) const CURRENT_REWARDS: Item<CurrentRewards> = Item::new("costaking_current");

/// Cumulative rewards per score at the end of a period
#[cw_serde]
pub struct HistoricalRewards {
    /// Scaled by `DECIMAL_REWARDS`
    pub cumulative: Uint256,
    /// Trackers starting at this period, plus one while it precedes the running period.
    /// The entry is removed when it drops to zero
    pub reference_count: u32,
}

pub(crate) const HISTORICAL_REWARDS: Map<u64, HistoricalRewards> =
    Map::new("costaking_historical");

pub(crate) const COSTAKERS: Map<&Addr, CostakerTracker> = Map::new("costakers");

/// Native stake by validator and delegator
pub(crate) const BABY_DELEGATIONS: Map<(&str, &Addr), Uint128> = Map::new("baby_delegations");

pub(crate) const JAILED_VALIDATORS: Map<&str, Empty> = Map::new("jailed_validators");
