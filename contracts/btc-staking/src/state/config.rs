use cosmwasm_schema::cw_serde;
use cosmwasm_std::{Addr, Decimal};

use cw_controllers::Admin;
use cw_storage_plus::Item;
use derivative::Derivative;

use crate::error::ContractError;

pub(crate) const CONFIG: Item<Config> = Item::new("config");
pub(crate) const FINALITY_CONFIG: Item<FinalityConfig> = Item::new("finality_config");
/// Storage for admin
pub(crate) const ADMIN: Admin = Admin::new("admin");

/// Config is the fixed configuration of the contract, set on instantiation
#[cw_serde]
pub struct Config {
    /// `babylon` is the address receiving the protocol commission
    pub babylon: Addr,
    /// `consumer_id` is the chain id of this chain, as used by finality providers when
    /// registering and in every signing context
    pub consumer_id: String,
}

/// FinalityConfig holds the governance-tunable knobs of the finality and reward engines
#[cw_serde]
#[derive(Derivative)]
#[derivative(Default)]
pub struct FinalityConfig {
    /// `max_active_finality_providers` is the maximum size of the active finality provider set
    #[derivative(Default(value = "100"))]
    pub max_active_finality_providers: u32,
    /// `min_pub_rand` is the minimum number of public randomness each commitment must carry
    #[derivative(Default(value = "1"))]
    pub min_pub_rand: u64,
    /// `finality_activation_height` is the first height finality votes are accepted for
    pub finality_activation_height: u64,
    /// `finality_sig_timeout` is how many blocks a finality provider has to vote for a block
    /// before the vote counts as missed
    #[derivative(Default(value = "3"))]
    pub finality_sig_timeout: u64,
    /// `signed_blocks_window` is the number of consecutive missed votes that gets a finality
    /// provider jailed
    #[derivative(Default(value = "100"))]
    pub signed_blocks_window: u64,
    /// `jail_duration` is how long (in seconds) a jailed finality provider must wait before
    /// unjailing itself
    #[derivative(Default(value = "86400"))]
    pub jail_duration: u64,
    /// `epoch_length` is the number of blocks per checkpointing epoch
    #[derivative(Default(value = "50"))]
    pub epoch_length: u64,
    /// `btc_confirmation_depth` is the number of BTC blocks (k) a transaction needs to be
    /// considered confirmed
    #[derivative(Default(value = "6"))]
    pub btc_confirmation_depth: u32,
    /// `checkpoint_finalization_timeout` is the number of BTC blocks (w) after which a
    /// checkpoint is considered final
    #[derivative(Default(value = "20"))]
    pub checkpoint_finalization_timeout: u32,
    /// `babylon_commission` is the share of the rewards sent to the `babylon` address
    #[derivative(Default(value = "Decimal::percent(10)"))]
    pub babylon_commission: Decimal,
    /// `costaking_portion` is the share of the remaining rewards that goes to co-stakers
    #[derivative(Default(value = "Decimal::percent(10)"))]
    pub costaking_portion: Decimal,
    /// `reward_denom` is the denom rewards are paid in
    #[derivative(Default(value = "String::from(\"ubbn\")"))]
    pub reward_denom: String,
}

impl FinalityConfig {
    pub fn validate(&self) -> Result<(), ContractError> {
        if self.max_active_finality_providers == 0 {
            return Err(ContractError::InvalidParams(
                "max_active_finality_providers must be positive".to_string(),
            ));
        }
        if self.min_pub_rand == 0 {
            return Err(ContractError::InvalidParams(
                "min_pub_rand must be positive".to_string(),
            ));
        }
        if self.epoch_length == 0 {
            return Err(ContractError::InvalidParams(
                "epoch_length must be positive".to_string(),
            ));
        }
        if self.signed_blocks_window == 0 {
            return Err(ContractError::InvalidParams(
                "signed_blocks_window must be positive".to_string(),
            ));
        }
        if self.btc_confirmation_depth == 0 {
            return Err(ContractError::InvalidParams(
                "btc_confirmation_depth must be positive".to_string(),
            ));
        }
        if self.babylon_commission > Decimal::one() || self.costaking_portion > Decimal::one() {
            return Err(ContractError::InvalidParams(
                "reward shares must not exceed one".to_string(),
            ));
        }
        if self.reward_denom.is_empty() {
            return Err(ContractError::InvalidParams(
                "reward_denom cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Minimum unbonding time (in BTC blocks) of a delegation
    pub fn min_unbonding_time(&self) -> u32 {
        self.btc_confirmation_depth + self.checkpoint_finalization_timeout
    }
}
