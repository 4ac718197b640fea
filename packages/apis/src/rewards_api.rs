use cosmwasm_schema::cw_serde;

/// RewardKind identifies one of the reward gauges of an address
#[cw_serde]
#[derive(Copy, Eq, Hash, PartialOrd, Ord)]
pub enum RewardKind {
    /// Commission earned by a finality provider
    FinalityProvider,
    /// Rewards of a BTC staker, from the finality providers it delegates to
    BtcStaker,
    /// Co-staking rewards, from the combined BTC and native stake score
    Costaker,
}

impl RewardKind {
    /// Storage key of the gauges of this kind
    pub fn as_key(&self) -> &'static str {
        match self {
            RewardKind::FinalityProvider => "finality_provider",
            RewardKind::BtcStaker => "btc_staker",
            RewardKind::Costaker => "costaker",
        }
    }
}
