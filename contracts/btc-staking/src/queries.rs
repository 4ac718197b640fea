use bitcoin::hashes::Hash;
use bitcoin::Txid;
use cosmwasm_std::Order::{Ascending, Descending};
use cosmwasm_std::{Deps, Order, StdResult};
use cw_storage_plus::Bound;

use babylon_apis::btc_staking_api::{BTCDelegationStatus, FinalityProvider, HASH_SIZE};
use babylon_apis::finality_api::{IndexedBlock, PubRandCommit};
use babylon_apis::rewards_api::RewardKind;

use crate::error::ContractError;
use crate::finality::voted_at;
use crate::light_client::display_hash;
use crate::msg::{
    ActivatedHeightResponse, AllParamsResponse, BlocksResponse, BtcDelegationsResponse,
    BtcTipResponse, DelegationResponse, DelegationsByFPResponse, EvidenceResponse,
    FinalityProviderInfo, FinalityProvidersByPowerResponse, FinalityProvidersResponse,
    FinalitySignatureResponse, ParamsResponse, PendingRewardsResponse, VotesResponse,
};
use crate::staking::{delegation_status, staking_tx_hash};
use crate::state::config::{Config, FinalityConfig, CONFIG, FINALITY_CONFIG};
use crate::state::costaking::{CostakerTracker, CurrentRewards, COSTAKERS, CURRENT_REWARDS};
use crate::state::delegations::{delegations as distribution_entries, BtcDelegation, DELEGATIONS};
use crate::state::finality::{
    SigningInfo, SlashedDelegation, BLOCKS, EVIDENCES, FP_SET, FP_SIGNING_INFO,
    LAST_FINALIZED_EPOCH, SLASHED_DELEGATIONS, VOTES,
};
use crate::state::light_client::BTC_TIP;
use crate::state::params::{all_params as stored_params, get_params, latest_params};
use crate::state::public_randomness::{
    get_first_pub_rand_commit, get_last_pub_rand_commit, get_pub_rand_commit,
    get_pub_rand_commit_for_height,
};
use crate::state::staking::{fps, load_fp, FinalityProviderState, ACTIVATED_HEIGHT, FPS};
use crate::rewards;

pub fn config(deps: Deps) -> StdResult<Config> {
    CONFIG.load(deps.storage)
}

pub fn finality_config(deps: Deps) -> StdResult<FinalityConfig> {
    FINALITY_CONFIG.load(deps.storage)
}

/// The given version of the staking parameters, or the latest one
pub fn params(deps: Deps, version: Option<u32>) -> Result<ParamsResponse, ContractError> {
    let (version, params) = match version {
        Some(version) => (version, get_params(deps.storage, version)?),
        None => latest_params(deps.storage)?,
    };
    Ok(ParamsResponse { version, params })
}

pub fn all_params(deps: Deps) -> StdResult<AllParamsResponse> {
    let params = stored_params(deps.storage)?
        .into_iter()
        .map(|(version, params)| ParamsResponse { version, params })
        .collect();
    Ok(AllParamsResponse { params })
}

pub fn finality_provider(
    deps: Deps,
    btc_pk_hex: String,
) -> Result<FinalityProvider, ContractError> {
    load_fp(deps.storage, &btc_pk_hex)
}

// Settings for pagination
const MAX_LIMIT: u32 = 30;
const DEFAULT_LIMIT: u32 = 10;

pub fn finality_providers(
    deps: Deps,
    start_after: Option<String>,
    limit: Option<u32>,
) -> StdResult<FinalityProvidersResponse> {
    let limit = limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT) as usize;
    let start_after = start_after.as_ref().map(|s| Bound::exclusive(&**s));
    let fps = FPS
        .range_raw(deps.storage, start_after, None, Order::Ascending)
        .take(limit)
        .map(|item| item.map(|(_, v)| v))
        .collect::<StdResult<Vec<FinalityProvider>>>()?;
    Ok(FinalityProvidersResponse { fps })
}

pub fn finality_provider_info(
    deps: Deps,
    btc_pk_hex: String,
    height: Option<u64>,
) -> StdResult<FinalityProviderInfo> {
    let fp_state = match height {
        Some(h) => fps().may_load_at_height(deps.storage, &btc_pk_hex, h),
        None => fps().may_load(deps.storage, &btc_pk_hex),
    }?
    .unwrap_or_default();

    Ok(FinalityProviderInfo {
        btc_pk_hex,
        power: fp_state.power,
    })
}

pub fn finality_providers_by_power(
    deps: Deps,
    start_after: Option<FinalityProviderInfo>,
    limit: Option<u32>,
) -> StdResult<FinalityProvidersByPowerResponse> {
    let limit = limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT) as usize;
    let start = start_after.map(|fpp| Bound::exclusive((fpp.power, fpp.btc_pk_hex.clone())));
    let fps = fps()
        .idx
        .power
        .range(deps.storage, None, start, Order::Descending)
        .take(limit)
        .map(|item| {
            let (btc_pk_hex, FinalityProviderState { power }) = item?;
            Ok(FinalityProviderInfo { btc_pk_hex, power })
        })
        .collect::<StdResult<Vec<_>>>()?;

    Ok(FinalityProvidersByPowerResponse { fps })
}

/// The active finality provider set at `height`, empty if finality is not active there
pub fn active_finality_providers(
    deps: Deps,
    height: u64,
) -> StdResult<FinalityProvidersByPowerResponse> {
    let fps = FP_SET.may_load(deps.storage, height)?.unwrap_or_default();
    Ok(FinalityProvidersByPowerResponse { fps })
}

pub fn signing_info(deps: Deps, btc_pk_hex: String) -> StdResult<Option<SigningInfo>> {
    FP_SIGNING_INFO.may_load(deps.storage, &btc_pk_hex)
}

fn delegation_response(
    deps: Deps,
    staking_tx_hash: &[u8; HASH_SIZE],
    delegation: BtcDelegation,
) -> Result<DelegationResponse, ContractError> {
    Ok(DelegationResponse {
        staking_tx_hash_hex: Txid::from_byte_array(*staking_tx_hash).to_string(),
        status: delegation_status(deps.storage, &delegation)?,
        delegation,
    })
}

fn hash_from_key(key: &[u8]) -> Result<[u8; HASH_SIZE], ContractError> {
    key.try_into()
        .map_err(|_| ContractError::DelegationNotFound(hex::encode(key)))
}

/// Get the delegation info by staking tx hash.
/// `staking_tx_hash_hex`: The (reversed) staking tx hash, in hex
pub fn delegation(
    deps: Deps,
    staking_tx_hash_hex: String,
) -> Result<DelegationResponse, ContractError> {
    let hash = staking_tx_hash(&staking_tx_hash_hex)?;
    let del = DELEGATIONS
        .may_load(deps.storage, &hash)?
        .ok_or(ContractError::DelegationNotFound(staking_tx_hash_hex))?;
    delegation_response(deps, &hash, del)
}

/// Get list of delegations.
/// `start_after`: The (reversed) associated staking tx hash of the delegation in hex, if provided.
/// `status`: List only delegations in that status, if provided.
pub fn delegations(
    deps: Deps,
    start_after: Option<String>,
    limit: Option<u32>,
    status: Option<BTCDelegationStatus>,
) -> Result<BtcDelegationsResponse, ContractError> {
    let limit = limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT) as usize;
    let start_after = start_after
        .as_deref()
        .map(staking_tx_hash)
        .transpose()?;
    let start_after = start_after.as_ref().map(Bound::exclusive);
    let mut delegations = vec![];
    for item in DELEGATIONS.range_raw(deps.storage, start_after, None, Order::Ascending) {
        if delegations.len() >= limit {
            break;
        }
        let (hash, del) = item?;
        let hash = hash_from_key(&hash)?;
        let response = delegation_response(deps, &hash, del)?;
        if status.as_ref().is_some_and(|status| status != &response.status) {
            continue;
        }
        delegations.push(response);
    }
    Ok(BtcDelegationsResponse { delegations })
}

/// Delegation hashes by FP query.
///
/// `btc_pk_hex`: The BTC public key of the finality provider, in hex
pub fn delegations_by_fp(
    deps: Deps,
    btc_pk_hex: String,
) -> Result<DelegationsByFPResponse, ContractError> {
    let hashes = distribution_entries()
        .delegations_by_fp(deps.storage, &btc_pk_hex)?
        .into_iter()
        .map(|(hash, _)| Ok(Txid::from_byte_array(hash_from_key(&hash)?).to_string()))
        .collect::<Result<_, ContractError>>()?;
    Ok(DelegationsByFPResponse { hashes })
}

/// Delegations of a staker, optionally filtered by status
pub fn delegations_by_staker(
    deps: Deps,
    staker_addr: String,
    status: Option<BTCDelegationStatus>,
) -> Result<BtcDelegationsResponse, ContractError> {
    let staker = deps.api.addr_validate(&staker_addr)?;
    let mut hashes = distribution_entries()
        .delegations_by_staker(deps.storage, &staker)?
        .into_iter()
        .map(|((hash, _), _)| hash)
        .collect::<Vec<_>>();
    // One entry per finality provider of the delegation
    hashes.dedup();

    let mut delegations = vec![];
    for hash in hashes {
        let hash = hash_from_key(&hash)?;
        let response = delegation_response(deps, &hash, DELEGATIONS.load(deps.storage, &hash)?)?;
        if status.as_ref().is_some_and(|status| status != &response.status) {
            continue;
        }
        delegations.push(response);
    }
    Ok(BtcDelegationsResponse { delegations })
}

pub fn slashed_delegation(
    deps: Deps,
    staking_tx_hash_hex: String,
) -> Result<Option<SlashedDelegation>, ContractError> {
    let hash = staking_tx_hash(&staking_tx_hash_hex)?;
    Ok(SLASHED_DELEGATIONS.may_load(deps.storage, &hash)?)
}

pub fn pub_rand_commits(
    deps: Deps,
    btc_pk_hex: String,
    start_after: Option<u64>,
    limit: Option<u32>,
    reverse: Option<bool>,
) -> Result<Vec<PubRandCommit>, ContractError> {
    get_pub_rand_commit(deps.storage, &btc_pk_hex, start_after, limit, reverse)
}

pub fn pub_rand_commit_for_height(
    deps: Deps,
    btc_pk_hex: String,
    height: u64,
) -> Result<Option<PubRandCommit>, ContractError> {
    get_pub_rand_commit_for_height(deps.storage, &btc_pk_hex, height)
}

pub fn first_pub_rand_commit(
    deps: Deps,
    btc_pk_hex: String,
) -> Result<Option<PubRandCommit>, ContractError> {
    get_first_pub_rand_commit(deps.storage, &btc_pk_hex)
}

pub fn last_pub_rand_commit(
    deps: Deps,
    btc_pk_hex: String,
) -> Result<Option<PubRandCommit>, ContractError> {
    get_last_pub_rand_commit(deps.storage, &btc_pk_hex)
}

pub fn finality_signature(
    deps: Deps,
    btc_pk_hex: String,
    height: u64,
) -> StdResult<FinalitySignatureResponse> {
    match VOTES.may_load(deps.storage, (height, &btc_pk_hex))? {
        Some(vote) => Ok(FinalitySignatureResponse {
            signature: vote.signature,
        }),
        None => Ok(FinalitySignatureResponse {
            signature: Vec::new(),
        }), // Empty signature response
    }
}

pub fn votes(deps: Deps, height: u64) -> StdResult<VotesResponse> {
    let btc_pks = voted_at(deps.storage, height)?;
    Ok(VotesResponse { btc_pks })
}

pub fn block(deps: Deps, height: u64) -> StdResult<IndexedBlock> {
    BLOCKS.load(deps.storage, height)
}

/// Get list of blocks.
/// `start_after`: The height to start after, if any.
/// `finalised`: List only finalised blocks if true, otherwise list all blocks.
/// `reverse`: List in descending order if present and true, otherwise in ascending order.
pub fn blocks(
    deps: Deps,
    start_after: Option<u64>,
    limit: Option<u32>,
    finalised: Option<bool>,
    reverse: Option<bool>,
) -> Result<BlocksResponse, ContractError> {
    let finalised = finalised.unwrap_or_default();
    let limit = limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT) as usize;
    let start_after = start_after.map(Bound::exclusive);
    let (start, end, order) = if reverse.unwrap_or(false) {
        (None, start_after, Descending)
    } else {
        (start_after, None, Ascending)
    };
    let blocks = BLOCKS
        .range_raw(deps.storage, start, end, order)
        .filter(|item| {
            if let Ok((_, block)) = item {
                !finalised || block.finalized
            } else {
                true // don't filter errors
            }
        })
        .take(limit)
        .map(|item| item.map(|(_, v)| v))
        .collect::<Result<Vec<IndexedBlock>, _>>()?;
    Ok(BlocksResponse { blocks })
}

pub fn evidence(deps: Deps, btc_pk_hex: String, height: u64) -> StdResult<EvidenceResponse> {
    let evidence = EVIDENCES.may_load(deps.storage, (&btc_pk_hex, height))?;
    Ok(EvidenceResponse { evidence })
}

pub fn activated_height(deps: Deps) -> StdResult<ActivatedHeightResponse> {
    let height = ACTIVATED_HEIGHT.may_load(deps.storage)?.unwrap_or_default();
    Ok(ActivatedHeightResponse { height })
}

pub fn btc_tip(deps: Deps) -> Result<BtcTipResponse, ContractError> {
    let tip = BTC_TIP
        .may_load(deps.storage)?
        .ok_or_else(|| ContractError::HeaderUnknown("light client is not initialised".to_string()))?;
    let hash: [u8; HASH_SIZE] = tip
        .hash
        .as_slice()
        .try_into()
        .map_err(|_| ContractError::InvalidHeader(hex::encode(&tip.hash)))?;
    Ok(BtcTipResponse {
        height: tip.height,
        hash_hex: display_hash(&hash),
    })
}

pub fn last_finalized_epoch(deps: Deps) -> StdResult<Option<u64>> {
    LAST_FINALIZED_EPOCH.may_load(deps.storage)
}

pub fn costaker(deps: Deps, address: String) -> StdResult<CostakerTracker> {
    let addr = deps.api.addr_validate(&address)?;
    Ok(COSTAKERS.may_load(deps.storage, &addr)?.unwrap_or_default())
}

pub fn current_rewards(deps: Deps) -> StdResult<CurrentRewards> {
    CURRENT_REWARDS.load(deps.storage)
}

pub fn pending_rewards(
    deps: Deps,
    address: String,
    kind: RewardKind,
) -> Result<PendingRewardsResponse, ContractError> {
    let addr = deps.api.addr_validate(&address)?;
    let amount = rewards::pending_rewards(deps, &addr, kind)?;
    Ok(PendingRewardsResponse { amount })
}
