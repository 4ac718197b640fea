use cosmwasm_schema::cw_serde;
use cosmwasm_std::{Order, StdResult, Storage};
use cw_storage_plus::{Bound, IndexedSnapshotMap, Item, Map, MultiIndex, Strategy};

use babylon_apis::btc_staking_api::FinalityProvider;

use crate::error::ContractError;
use crate::state::fp_index::FinalityProviderIndexes;

/// Finality providers by their BTC public key
pub(crate) const FPS: Map<&str, FinalityProvider> = Map::new("fps");

pub const FP_STATE_KEY: &str = "fp_state";
const FP_STATE_CHECKPOINTS: &str = "fp_state__checkpoints";
const FP_STATE_CHANGELOG: &str = "fp_state__changelog";
pub const FP_POWER_KEY: &str = "fp_state__power";

/// The height at which the first active finality provider set was computed
pub(crate) const ACTIVATED_HEIGHT: Item<u64> = Item::new("activated_height");

#[cw_serde]
#[derive(Default)]
pub struct FinalityProviderState {
    /// Finality provider power, in satoshis
    pub power: u64,
}

/// Indexed snapshot map for finality providers.
///
/// This allows querying the map finality providers, sorted by their (aggregated) power.
/// The power index is a `MultiIndex`, as there can be multiple FPs with the same power.
///
/// The indexes are not snapshotted; only the current power is indexed at any given time.
pub fn fps<'a>() -> IndexedSnapshotMap<&'a str, FinalityProviderState, FinalityProviderIndexes<'a>>
{
    let indexes = FinalityProviderIndexes {
        power: MultiIndex::new(|_, fp_state| fp_state.power, FP_STATE_KEY, FP_POWER_KEY),
    };
    IndexedSnapshotMap::new(
        FP_STATE_KEY,
        FP_STATE_CHECKPOINTS,
        FP_STATE_CHANGELOG,
        Strategy::EveryBlock,
        indexes,
    )
}

pub fn load_fp(storage: &dyn Storage, fp_btc_pk_hex: &str) -> Result<FinalityProvider, ContractError> {
    FPS.may_load(storage, fp_btc_pk_hex)?
        .ok_or_else(|| ContractError::FinalityProviderNotFound(fp_btc_pk_hex.to_string()))
}

/// Current voting power of a finality provider
pub fn fp_power(storage: &dyn Storage, fp_btc_pk_hex: &str) -> StdResult<u64> {
    Ok(fps()
        .may_load(storage, fp_btc_pk_hex)?
        .map(|state| state.power)
        .unwrap_or_default())
}

/// Voting power of a finality provider at the given height
pub fn fp_power_at_height(
    storage: &dyn Storage,
    fp_btc_pk_hex: &str,
    height: u64,
) -> StdResult<u64> {
    Ok(fps()
        .may_load_at_height(storage, fp_btc_pk_hex, height)?
        .map(|state| state.power)
        .unwrap_or_default())
}

/// Adds (or removes, for a negative `delta`) voting power of a finality provider
pub fn update_fp_power(
    storage: &mut dyn Storage,
    height: u64,
    fp_btc_pk_hex: &str,
    delta: i128,
) -> Result<u64, ContractError> {
    let state = fps().update(storage, fp_btc_pk_hex, height, |state| {
        let mut state = state.unwrap_or_default();
        let power = i128::from(state.power) + delta;
        state.power = u64::try_from(power).map_err(|_| {
            ContractError::StdError(cosmwasm_std::StdError::generic_err(format!(
                "negative voting power for {fp_btc_pk_hex}"
            )))
        })?;
        Ok::<_, ContractError>(state)
    })?;
    Ok(state.power)
}

/// Finality providers by descending voting power, starting below `start_after`
pub fn fps_by_power(
    storage: &dyn Storage,
    start_after: Option<(u64, String)>,
    limit: Option<usize>,
) -> StdResult<Vec<(String, u64)>> {
    let start_after = start_after.map(|(power, pk)| Bound::exclusive((power, pk)));
    let iter = fps()
        .idx
        .power
        .range(storage, None, start_after, Order::Descending)
        .map(|item| item.map(|(pk, state)| (pk, state.power)));
    match limit {
        Some(limit) => iter.take(limit).collect(),
        None => iter.collect(),
    }
}
