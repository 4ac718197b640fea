use std::str::FromStr;

use bitcoin::{ScriptBuf, XOnlyPublicKey};
use cosmwasm_schema::cw_serde;
use cosmwasm_std::{Decimal, Order, StdResult, Storage, Uint128};
use cw_storage_plus::Map;
use derivative::Derivative;

use babylon_bitcoin::chain_params::Network;
use babylon_btcstaking::tx_verify::is_rate_valid;

use crate::error::ContractError;

/// Staking parameters by version. Versions are never overwritten, so every delegation can
/// always be checked against the parameters it was created under
pub(crate) const PARAMS: Map<u32, Params> = Map::new("params");

/// x-only key of the secp256k1 generator, the default regtest covenant committee
const REGTEST_COVENANT_PK: &str =
    "79be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798";

/// Params define the BTC staking parameters
#[cw_serde]
#[derive(Derivative)]
#[derivative(Default)]
pub struct Params {
    /// `covenant_pks` is the list of public keys held by the covenant committee each PK
    /// follows encoding in BIP-340 spec on Bitcoin. Defaults to a single-key regtest committee
    #[derivative(Default(value = "vec![String::from(REGTEST_COVENANT_PK)]"))]
    pub covenant_pks: Vec<String>,
    /// `covenant_quorum` is the minimum number of signatures needed for the covenant multi-signature
    #[derivative(Default(value = "1"))]
    pub covenant_quorum: u32,
    /// `btc_network` is the network the BTC staking protocol is running on
    #[derivative(Default(value = "Network::Regtest"))]
    pub btc_network: Network,
    /// `min_staking_time_blocks` is the minimum staking time-lock, in BTC blocks
    #[derivative(Default(value = "100"))]
    pub min_staking_time_blocks: u32,
    /// `max_staking_time_blocks` is the maximum staking time-lock, in BTC blocks
    #[derivative(Default(value = "65535"))]
    pub max_staking_time_blocks: u32,
    /// `min_staking_value_sat` is the minimum amount of satoshis of a delegation
    #[derivative(Default(value = "10000"))]
    pub min_staking_value_sat: u64,
    /// `max_staking_value_sat` is the maximum amount of satoshis of a delegation
    #[derivative(Default(value = "10_000_000_000"))]
    pub max_staking_value_sat: u64,
    /// `slashing_pk_script` is the pk script that the slashed BTC goes to.
    /// The pk script is in hex format
    #[derivative(Default(
        value = "String::from(\"76a914010101010101010101010101010101010101010188ac\")"
    ))]
    pub slashing_pk_script: String,
    /// `slashing_rate` determines the portion of the staked amount to be slashed,
    /// expressed as a decimal (e.g. 0.5 for 50%), with at most two decimal places
    #[derivative(Default(value = "String::from(\"0.1\")"))]
    pub slashing_rate: String,
    /// `min_slashing_tx_fee_sat` is the minimum amount of tx fee (quantified in Satoshi) needed for
    /// the pre-signed slashing tx
    #[derivative(Default(value = "1000"))]
    pub min_slashing_tx_fee_sat: u64,
    /// `min_commission_rate` is the chain-wide minimum commission rate that a finality provider
    /// can charge their delegators
    pub min_commission_rate: Decimal,
    /// `unbonding_time_blocks` is the unbonding time-lock every delegation must use, in BTC blocks
    #[derivative(Default(value = "101"))]
    pub unbonding_time_blocks: u32,
    /// `unbonding_fee_sat` is the fee the unbonding tx must pay
    #[derivative(Default(value = "1000"))]
    pub unbonding_fee_sat: u64,
    /// `score_ratio_btc_by_baby` is how many native tokens back one satoshi in the
    /// co-staking score
    #[derivative(Default(value = "Uint128::new(50)"))]
    pub score_ratio_btc_by_baby: Uint128,
}

impl Params {
    pub fn validate(&self) -> Result<(), ContractError> {
        let covenant_keys = self.covenant_keys()?;
        if covenant_keys.is_empty() {
            return Err(ContractError::InvalidParams(
                "covenant committee cannot be empty".to_string(),
            ));
        }
        if self.covenant_quorum == 0 || self.covenant_quorum as usize > covenant_keys.len() {
            return Err(ContractError::InvalidParams(format!(
                "covenant quorum {} is not in [1, {}]",
                self.covenant_quorum,
                covenant_keys.len()
            )));
        }
        if self.min_staking_time_blocks == 0
            || self.min_staking_time_blocks > self.max_staking_time_blocks
            || self.max_staking_time_blocks > u16::MAX as u32
        {
            return Err(ContractError::InvalidParams(
                "invalid staking time range".to_string(),
            ));
        }
        if self.min_staking_value_sat == 0
            || self.min_staking_value_sat > self.max_staking_value_sat
        {
            return Err(ContractError::InvalidParams(
                "invalid staking value range".to_string(),
            ));
        }
        self.slashing_script()?;
        if !is_rate_valid(self.slashing_rate()?) {
            return Err(ContractError::InvalidParams(format!(
                "invalid slashing rate {}",
                self.slashing_rate
            )));
        }
        if self.min_slashing_tx_fee_sat == 0 {
            return Err(ContractError::InvalidParams(
                "min_slashing_tx_fee_sat must be positive".to_string(),
            ));
        }
        if self.min_commission_rate > Decimal::one() {
            return Err(ContractError::InvalidParams(
                "min_commission_rate must not exceed one".to_string(),
            ));
        }
        if self.unbonding_time_blocks == 0 || self.unbonding_time_blocks > u16::MAX as u32 {
            return Err(ContractError::InvalidParams(
                "invalid unbonding time".to_string(),
            ));
        }
        if self.unbonding_fee_sat == 0 || self.unbonding_fee_sat >= self.min_staking_value_sat {
            return Err(ContractError::InvalidParams(
                "unbonding fee must be positive and below the minimum stake".to_string(),
            ));
        }
        if self.score_ratio_btc_by_baby.is_zero() {
            return Err(ContractError::InvalidParams(
                "score_ratio_btc_by_baby must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn covenant_keys(&self) -> Result<Vec<XOnlyPublicKey>, ContractError> {
        self.covenant_pks.iter().map(|pk| parse_btc_pk(pk)).collect()
    }

    pub fn slashing_rate(&self) -> Result<rust_decimal::Decimal, ContractError> {
        rust_decimal::Decimal::from_str(&self.slashing_rate)
            .map_err(|e| ContractError::InvalidParams(format!("slashing rate: {e}")))
    }

    pub fn slashing_script(&self) -> Result<ScriptBuf, ContractError> {
        let script = hex::decode(&self.slashing_pk_script)?;
        if script.is_empty() {
            return Err(ContractError::InvalidParams(
                "slashing pk script cannot be empty".to_string(),
            ));
        }
        Ok(ScriptBuf::from_bytes(script))
    }

    pub fn network(&self) -> bitcoin::Network {
        self.btc_network.into()
    }
}

/// Parses a hex-encoded BIP-340 public key
pub fn parse_btc_pk(pk_hex: &str) -> Result<XOnlyPublicKey, ContractError> {
    let bytes = hex::decode(pk_hex)?;
    XOnlyPublicKey::from_slice(&bytes)
        .map_err(|e| ContractError::InvalidParams(format!("invalid BTC public key {pk_hex}: {e}")))
}

pub fn get_params(storage: &dyn Storage, version: u32) -> Result<Params, ContractError> {
    PARAMS
        .may_load(storage, version)?
        .ok_or(ContractError::UnknownParamVersion(version))
}

/// The latest parameters and their version
pub fn latest_params(storage: &dyn Storage) -> Result<(u32, Params), ContractError> {
    PARAMS
        .range(storage, None, None, Order::Descending)
        .next()
        .transpose()?
        .ok_or(ContractError::UnknownParamVersion(0))
}

/// Appends a new parameters version, returning it
pub fn add_params(storage: &mut dyn Storage, params: &Params) -> Result<u32, ContractError> {
    let version = match PARAMS
        .keys(storage, None, None, Order::Descending)
        .next()
        .transpose()?
    {
        Some(last) => last + 1,
        None => 0,
    };
    PARAMS.save(storage, version, params)?;
    Ok(version)
}

pub fn all_params(storage: &dyn Storage) -> StdResult<Vec<(u32, Params)>> {
    PARAMS
        .range(storage, None, None, Order::Ascending)
        .collect()
}
