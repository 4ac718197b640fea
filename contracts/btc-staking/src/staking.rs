use std::str::FromStr;

use bitcoin::consensus::serialize;
use bitcoin::hashes::Hash;
use bitcoin::{OutPoint, Transaction, TxOut, Txid};

use cosmwasm_std::Order::Ascending;
use cosmwasm_std::{
    Addr, Decimal, DepsMut, Env, Event, MessageInfo, Response, StdResult, Storage,
};
use cw_storage_plus::Bound;

use babylon_apis::btc_staking_api::{
    BTCDelegationStatus, BtcInclusionProof, FinalityProvider, FinalityProviderDescription,
    NewBtcDelegation, NewFinalityProvider, HASH_SIZE,
};
use babylon_apis::Validate;
use babylon_bindings::BabylonMsg;
use babylon_btcstaking::signing_context::{fp_pop_context, staker_pop_context};
use babylon_btcstaking::witness::verify_unbonding_path_witness;

use crate::error::ContractError;
use crate::hooks::{dispatch, StakingHook};
use crate::light_client::{verify_tx_inclusion, BtcLightClient, StoredLightClient};
use crate::msg::ExecuteResult;
use crate::state::config::{FinalityConfig, CONFIG, FINALITY_CONFIG};
use crate::state::delegations::{
    delegations, schedule_expiry, unschedule_expiry, BtcDelegation, DelegatorUnbondingInfo,
    StakeExpansion, UndelegationInfo, DELEGATIONS, EXPIRY_QUEUE,
};
use crate::state::params::{get_params, latest_params};
use crate::state::staking::{load_fp, FPS};
use crate::validation::{
    decode_tx, verify_commission, verify_new_delegation, verify_pop, DelegationKeys,
};

/// Parses a staking tx hash in the usual (reversed) hex encoding
pub fn staking_tx_hash(staking_tx_hash_hex: &str) -> Result<[u8; HASH_SIZE], ContractError> {
    Txid::from_str(staking_tx_hash_hex)
        .map(|txid| txid.to_byte_array())
        .map_err(|_| ContractError::DelegationNotFound(staking_tx_hash_hex.to_string()))
}

fn hash_hex(staking_tx_hash: &[u8; HASH_SIZE]) -> String {
    Txid::from_byte_array(*staking_tx_hash).to_string()
}

pub(crate) fn load_delegation(
    storage: &dyn Storage,
    staking_tx_hash: &[u8; HASH_SIZE],
) -> Result<BtcDelegation, ContractError> {
    DELEGATIONS
        .may_load(storage, staking_tx_hash)?
        .ok_or_else(|| ContractError::DelegationNotFound(hash_hex(staking_tx_hash)))
}

/// Satoshis of the delegation currently giving voting power to its native finality provider
pub(crate) fn active_stake(
    storage: &dyn Storage,
    staking_tx_hash: &[u8; HASH_SIZE],
    del: &BtcDelegation,
) -> Result<u64, ContractError> {
    Ok(delegations()
        .delegation
        .may_load(storage, (staking_tx_hash.as_slice(), del.native_fp.as_str()))?
        .map(|entry| entry.stake)
        .unwrap_or_default())
}

/// Status of a delegation at the current BTC tip
pub(crate) fn delegation_status(
    storage: &dyn Storage,
    del: &BtcDelegation,
) -> Result<BTCDelegationStatus, ContractError> {
    let params = get_params(storage, del.params_version)?;
    let cfg = FINALITY_CONFIG.load(storage)?;
    let tip = StoredLightClient::new(storage).tip_height()?;
    Ok(del.get_status(tip, cfg.btc_confirmation_depth, params.covenant_quorum))
}

pub fn new_btc_delegation(
    staker_addr: Addr,
    del: &NewBtcDelegation,
    native_fp: String,
    staking_output_idx: u32,
    params_version: u32,
    stk_exp: Option<StakeExpansion>,
) -> BtcDelegation {
    BtcDelegation {
        staker_addr,
        btc_pk_hex: del.btc_pk_hex.clone(),
        fp_btc_pk_list: del.fp_btc_pk_list.clone(),
        native_fp,
        start_height: 0,
        end_height: 0,
        total_sat: del.staking_value,
        staking_time: del.staking_time,
        staking_tx: del.staking_tx.to_vec(),
        staking_output_idx,
        slashing_tx: del.slashing_tx.to_vec(),
        delegator_slashing_sig: del.delegator_slashing_sig.to_vec(),
        covenant_sigs: vec![],
        unbonding_time: del.unbonding_time,
        undelegation_info: UndelegationInfo {
            unbonding_tx: del.unbonding_tx.to_vec(),
            covenant_unbonding_sig_list: vec![],
            slashing_tx: del.unbonding_slashing_tx.to_vec(),
            delegator_slashing_sig: del.delegator_unbonding_slashing_sig.to_vec(),
            covenant_slashing_sigs: vec![],
            delegator_unbonding_info: None,
        },
        params_version,
        stk_exp,
    }
}

/// handle_create_fp registers the sender as a finality provider
pub fn handle_create_fp(
    deps: DepsMut,
    info: &MessageInfo,
    new_fp: &NewFinalityProvider,
) -> Result<Response<BabylonMsg>, ContractError> {
    new_fp.validate()?;
    // Avoid overwriting existing finality providers
    if FPS.has(deps.storage, &new_fp.btc_pk_hex) {
        return Err(ContractError::FinalityProviderAlreadyExists(
            new_fp.btc_pk_hex.clone(),
        ));
    }
    let (_, params) = latest_params(deps.storage)?;
    verify_commission(new_fp.commission, &params)?;

    let config = CONFIG.load(deps.storage)?;
    let pop = new_fp
        .pop
        .as_ref()
        .ok_or_else(|| ContractError::InvalidPop("missing proof of possession".to_string()))?;
    verify_pop(
        &new_fp.btc_pk_hex,
        &fp_pop_context(&config.consumer_id, info.sender.as_str()),
        info.sender.as_str(),
        pop,
    )?;

    let fp = FinalityProvider::new(info.sender.clone(), new_fp);
    FPS.save(deps.storage, &fp.btc_pk_hex, &fp)?;

    Ok(Response::new().add_event(
        Event::new("fp_created")
            .add_attribute("fp_btc_pk", &fp.btc_pk_hex)
            .add_attribute("addr", &fp.addr)
            .add_attribute("consumer_id", &fp.consumer_id)
            .add_attribute("commission", fp.commission.to_string()),
    ))
}

/// handle_edit_fp updates the description and commission of a finality provider
pub fn handle_edit_fp(
    deps: DepsMut,
    info: &MessageInfo,
    btc_pk_hex: &str,
    description: Option<FinalityProviderDescription>,
    commission: Decimal,
) -> Result<Response<BabylonMsg>, ContractError> {
    let mut fp = load_fp(deps.storage, btc_pk_hex)?;
    if fp.addr != info.sender {
        return Err(ContractError::Unauthorized);
    }
    if let Some(description) = &description {
        description.validate()?;
    }
    let (_, params) = latest_params(deps.storage)?;
    verify_commission(commission, &params)?;
    if commission > Decimal::one() {
        return Err(ContractError::CommissionTooLow(
            commission.to_string(),
            Decimal::one().to_string(),
        ));
    }

    fp.description = description;
    fp.commission = commission;
    FPS.save(deps.storage, btc_pk_hex, &fp)?;

    Ok(Response::new().add_event(
        Event::new("fp_edited")
            .add_attribute("fp_btc_pk", btc_pk_hex)
            .add_attribute("commission", commission.to_string()),
    ))
}

/// Checks the finality providers of a delegation, returning the one of this chain
fn native_fp(
    storage: &dyn Storage,
    fp_btc_pk_list: &[String],
    consumer_id: &str,
) -> Result<String, ContractError> {
    let mut native = vec![];
    for fp_btc_pk_hex in fp_btc_pk_list {
        let fp = load_fp(storage, fp_btc_pk_hex)?;
        if fp.is_slashed() {
            return Err(ContractError::FinalityProviderSlashed(fp_btc_pk_hex.clone()));
        }
        if fp.consumer_id == consumer_id {
            native.push(fp.btc_pk_hex);
        }
    }
    match native.as_slice() {
        [fp] => Ok(fp.clone()),
        _ => Err(ContractError::InvalidNativeFpCount(native.len())),
    }
}

/// Checks that the staking tx of `del` is k-deep in the main chain and that its time-lock
/// does not elapse before it could become active. Returns the start and end heights
fn verify_staking_inclusion(
    storage: &dyn Storage,
    cfg: &FinalityConfig,
    del: &BtcDelegation,
    staking_tx: &Transaction,
    proof: &BtcInclusionProof,
) -> Result<(u32, u32), ContractError> {
    let block = verify_tx_inclusion(storage, staking_tx, proof)?;
    let tip = StoredLightClient::new(storage).tip_height()?;
    let depth = tip.saturating_sub(block.height);
    if depth < cfg.btc_confirmation_depth {
        return Err(ContractError::InsufficientDepth(
            depth,
            cfg.btc_confirmation_depth,
        ));
    }
    let start_height = block.height;
    let end_height = start_height + del.staking_time;
    if tip >= (end_height + 1).saturating_sub(del.unbonding_time) {
        return Err(ContractError::StakingTimeExpired(
            staking_tx.txid().to_string(),
        ));
    }
    Ok((start_height, end_height))
}

/// Verifies and stores a new pending delegation by the sender
fn register_delegation(
    deps: &mut DepsMut,
    info: &MessageInfo,
    del: &NewBtcDelegation,
    stk_exp: Option<StakeExpansion>,
) -> Result<([u8; HASH_SIZE], BtcDelegation), ContractError> {
    del.validate()?;
    let (params_version, params) = latest_params(deps.storage)?;
    let config = CONFIG.load(deps.storage)?;
    let cfg = FINALITY_CONFIG.load(deps.storage)?;

    let staking_tx = decode_tx(&del.staking_tx)?;
    let staking_tx_hash = staking_tx.txid().to_byte_array();
    if DELEGATIONS.has(deps.storage, &staking_tx_hash) {
        return Err(ContractError::DelegationAlreadyExists(
            staking_tx.txid().to_string(),
        ));
    }

    let native_fp = native_fp(deps.storage, &del.fp_btc_pk_list, &config.consumer_id)?;
    verify_pop(
        &del.btc_pk_hex,
        &staker_pop_context(&config.consumer_id, info.sender.as_str()),
        info.sender.as_str(),
        &del.pop,
    )?;
    let verified = verify_new_delegation(&params, cfg.min_unbonding_time(), del)?;

    let mut btc_del = new_btc_delegation(
        info.sender.clone(),
        del,
        native_fp,
        verified.staking_output_idx,
        params_version,
        stk_exp,
    );
    if let Some(proof) = &del.staking_tx_inclusion_proof {
        let (start_height, end_height) =
            verify_staking_inclusion(deps.storage, &cfg, &btc_del, &verified.staking_tx, proof)?;
        btc_del.start_height = start_height;
        btc_del.end_height = end_height;
    }

    DELEGATIONS.save(deps.storage, &staking_tx_hash, &btc_del)?;
    let dels = delegations();
    for fp_btc_pk_hex in &btc_del.fp_btc_pk_list {
        dels.create_distribution(deps.storage, &staking_tx_hash, fp_btc_pk_hex, &info.sender)?;
    }
    Ok((staking_tx_hash, btc_del))
}

fn pending_delegation_event(staking_tx_hash: &[u8; HASH_SIZE], del: &BtcDelegation) -> Event {
    let mut event = Event::new("pending_delegation")
        .add_attribute("staking_tx_hash", hash_hex(staking_tx_hash))
        .add_attribute("staker", &del.staker_addr)
        .add_attribute("btc_pk", &del.btc_pk_hex)
        .add_attribute("native_fp", &del.native_fp)
        .add_attribute("total_sat", del.total_sat.to_string())
        .add_attribute("params_version", del.params_version.to_string());
    if del.is_included() {
        event = event.add_attribute("btc_height", del.start_height.to_string());
    }
    event
}

/// handle_create_delegation stores a new delegation, pending covenant signatures
pub fn handle_create_delegation(
    mut deps: DepsMut,
    info: &MessageInfo,
    del: &NewBtcDelegation,
) -> Result<Response<BabylonMsg>, ContractError> {
    let (staking_tx_hash, btc_del) = register_delegation(&mut deps, info, del, None)?;
    Ok(Response::new().add_event(pending_delegation_event(&staking_tx_hash, &btc_del)))
}

/// handle_stake_expand stores a delegation replacing the active delegation
/// `previous_staking_tx_hash_hex`, with at least the same value and finality providers. Its
/// staking tx spends the previous staking output and the first input of `funding_tx`
pub fn handle_stake_expand(
    mut deps: DepsMut,
    info: &MessageInfo,
    previous_staking_tx_hash_hex: &str,
    del: &NewBtcDelegation,
    funding_tx: &[u8],
) -> Result<Response<BabylonMsg>, ContractError> {
    if del.staking_tx_inclusion_proof.is_some() {
        return Err(ContractError::InvalidStakeExpansion(
            "the inclusion proof must be submitted once the covenants signed".to_string(),
        ));
    }
    let prev_hash = staking_tx_hash(previous_staking_tx_hash_hex)?;
    let prev = load_delegation(deps.storage, &prev_hash)?;
    let status = delegation_status(deps.storage, &prev)?;
    if status != BTCDelegationStatus::ACTIVE {
        return Err(ContractError::WrongDelegationState {
            expected: BTCDelegationStatus::ACTIVE,
            actual: status,
        });
    }
    if prev.staker_addr != info.sender || prev.btc_pk_hex != del.btc_pk_hex {
        return Err(ContractError::InvalidStakeExpansion(
            "the staker must stay the same".to_string(),
        ));
    }
    if let Some(missing) = prev
        .fp_btc_pk_list
        .iter()
        .find(|fp| !del.fp_btc_pk_list.contains(fp))
    {
        return Err(ContractError::InvalidStakeExpansion(format!(
            "finality provider {missing} of the previous delegation is missing"
        )));
    }
    if del.staking_value < prev.total_sat {
        return Err(ContractError::InvalidStakeExpansion(format!(
            "staking value {} is lower than the previous {}",
            del.staking_value, prev.total_sat
        )));
    }

    let staking_tx = decode_tx(&del.staking_tx)?;
    let funding_tx = decode_tx(funding_tx)?;
    let prev_outpoint = OutPoint {
        txid: Txid::from_byte_array(prev_hash),
        vout: prev.staking_output_idx,
    };
    let funding_out = match staking_tx.input.as_slice() {
        [prev_in, funding_in]
            if prev_in.previous_output == prev_outpoint
                && funding_in.previous_output.txid == funding_tx.txid() =>
        {
            funding_tx
                .output
                .get(funding_in.previous_output.vout as usize)
                .cloned()
                .ok_or_else(|| {
                    ContractError::InvalidStakeExpansion("funding output not found".to_string())
                })?
        }
        _ => {
            return Err(ContractError::InvalidStakeExpansion(
                "staking tx must spend the previous staking output and the funding tx"
                    .to_string(),
            ))
        }
    };

    let stk_exp = StakeExpansion {
        previous_staking_tx_hash: prev_hash.to_vec(),
        other_funding_tx_out: serialize(&funding_out),
        previous_stk_covenant_sigs: vec![],
    };
    let (staking_tx_hash, btc_del) = register_delegation(&mut deps, info, del, Some(stk_exp))?;
    Ok(Response::new().add_event(
        pending_delegation_event(&staking_tx_hash, &btc_del)
            .add_attribute("previous_staking_tx_hash", previous_staking_tx_hash_hex),
    ))
}

/// handle_inclusion_proof records the BTC block of the staking tx of a verified delegation,
/// activating it. For a stake expansion, the expanded delegation gets unbonded
pub fn handle_inclusion_proof(
    deps: DepsMut,
    env: &Env,
    staking_tx_hash_hex: &str,
    proof: &BtcInclusionProof,
) -> Result<Response<BabylonMsg>, ContractError> {
    let hash = staking_tx_hash(staking_tx_hash_hex)?;
    let mut del = load_delegation(deps.storage, &hash)?;
    if del.is_included() {
        return Err(ContractError::AlreadyIncluded(staking_tx_hash_hex.to_string()));
    }
    let status = delegation_status(deps.storage, &del)?;
    if status != BTCDelegationStatus::VERIFIED {
        return Err(ContractError::WrongDelegationState {
            expected: BTCDelegationStatus::VERIFIED,
            actual: status,
        });
    }
    // A provider may have been slashed since the covenant quorum was reached
    for fp_btc_pk_hex in &del.fp_btc_pk_list {
        if load_fp(deps.storage, fp_btc_pk_hex)?.is_slashed() {
            return Err(ContractError::FinalityProviderSlashed(fp_btc_pk_hex.clone()));
        }
    }

    let cfg = FINALITY_CONFIG.load(deps.storage)?;
    let staking_tx = decode_tx(&del.staking_tx)?;
    let (start_height, end_height) =
        verify_staking_inclusion(deps.storage, &cfg, &del, &staking_tx, proof)?;
    del.start_height = start_height;
    del.end_height = end_height;
    DELEGATIONS.save(deps.storage, &hash, &del)?;

    let mut res = Response::new();
    let mut hooks = vec![];
    if let Some(stk_exp) = &del.stk_exp {
        let prev_hash: [u8; HASH_SIZE] =
            stk_exp.previous_staking_tx_hash.as_slice().try_into().map_err(|_| {
                ContractError::InvalidStakeExpansion("invalid previous staking tx hash".to_string())
            })?;
        let (hook, event) = unbond(deps.storage, &prev_hash, del.staking_tx.clone(), start_height)?;
        hooks.extend(hook);
        res = res.add_event(event);
    }
    let (hook, event) = activate(deps.storage, &hash, &del)?;
    hooks.push(hook);
    dispatch(deps.storage, env.block.height, &hooks)?;

    ExecuteResult::refundable()
        .attach(res.add_event(event))
        .map_err(Into::into)
}

/// Schedules the expiry of an included delegation with covenant quorum, returning the
/// hook giving it voting power
pub(crate) fn activate(
    storage: &mut dyn Storage,
    staking_tx_hash: &[u8; HASH_SIZE],
    del: &BtcDelegation,
) -> Result<(StakingHook, Event), ContractError> {
    schedule_expiry(storage, del.expiry_height(), staking_tx_hash)?;
    let hook = StakingHook::DelegationActivated {
        staking_tx_hash: *staking_tx_hash,
        staker: del.staker_addr.clone(),
        native_fp: del.native_fp.clone(),
        sats: del.total_sat,
    };
    let event = Event::new("delegation_active")
        .add_attribute("staking_tx_hash", hash_hex(staking_tx_hash))
        .add_attribute("fp_btc_pk", &del.native_fp)
        .add_attribute("btc_height", del.start_height.to_string())
        .add_attribute("expiry_height", del.expiry_height().to_string())
        .add_attribute("total_sat", del.total_sat.to_string());
    Ok((hook, event))
}

/// Marks a delegation as spent by `spend_stake_tx`, returning the hook removing its voting
/// power if it still had some
fn unbond(
    storage: &mut dyn Storage,
    staking_tx_hash: &[u8; HASH_SIZE],
    spend_stake_tx: Vec<u8>,
    btc_height: u32,
) -> Result<(Option<StakingHook>, Event), ContractError> {
    let mut del = load_delegation(storage, staking_tx_hash)?;
    if del.is_unbonded_early() {
        return Err(ContractError::WrongDelegationState {
            expected: BTCDelegationStatus::ACTIVE,
            actual: BTCDelegationStatus::UNBONDED,
        });
    }
    del.undelegation_info.delegator_unbonding_info =
        Some(DelegatorUnbondingInfo { spend_stake_tx });
    DELEGATIONS.save(storage, staking_tx_hash, &del)?;
    if del.is_included() {
        unschedule_expiry(storage, del.expiry_height(), staking_tx_hash)?;
    }

    let stake = active_stake(storage, staking_tx_hash, &del)?;
    let hook = (stake > 0).then(|| StakingHook::DelegationUnbonded {
        staking_tx_hash: *staking_tx_hash,
        staker: del.staker_addr.clone(),
        native_fp: del.native_fp.clone(),
        sats: stake,
    });
    let event = Event::new("delegation_unbonded")
        .add_attribute("staking_tx_hash", hash_hex(staking_tx_hash))
        .add_attribute("fp_btc_pk", &del.native_fp)
        .add_attribute("btc_height", btc_height.to_string());
    Ok((hook, event))
}

/// Removes the voting power of the delegations whose staking time ends within `unbonding_time`
/// of the BTC tip `btc_tip`. Expired delegations stay in storage
pub(crate) fn expire_delegations(
    storage: &mut dyn Storage,
    btc_tip: u32,
) -> Result<(Vec<StakingHook>, Vec<Event>), ContractError> {
    let due = EXPIRY_QUEUE
        .range(storage, None, Some(Bound::inclusive(btc_tip)), Ascending)
        .collect::<StdResult<Vec<_>>>()?;
    let mut hooks = vec![];
    let mut events = vec![];
    for (btc_height, hashes) in due {
        EXPIRY_QUEUE.remove(storage, btc_height);
        for hash in hashes {
            let staking_tx_hash: [u8; HASH_SIZE] = hash
                .as_slice()
                .try_into()
                .map_err(|_| ContractError::DelegationNotFound(hex::encode(&hash)))?;
            let del = load_delegation(storage, &staking_tx_hash)?;
            let stake = active_stake(storage, &staking_tx_hash, &del)?;
            if stake > 0 {
                hooks.push(StakingHook::DelegationUnbonded {
                    staking_tx_hash,
                    staker: del.staker_addr.clone(),
                    native_fp: del.native_fp.clone(),
                    sats: stake,
                });
            }
            events.push(
                Event::new("delegation_expired")
                    .add_attribute("module", "btc_staking")
                    .add_attribute("staking_tx_hash", hash_hex(&staking_tx_hash))
                    .add_attribute("fp_btc_pk", &del.native_fp)
                    .add_attribute("btc_height", btc_height.to_string()),
            );
        }
    }
    Ok((hooks, events))
}

/// handle_undelegate records that the staking output of a delegation was spent on Bitcoin
/// through its unbonding path, by a k-deep transaction
pub fn handle_undelegate(
    deps: DepsMut,
    env: &Env,
    staking_tx_hash_hex: &str,
    stake_spending_tx: &[u8],
    proof: &BtcInclusionProof,
    funding_txs: &[cosmwasm_std::Binary],
) -> Result<Response<BabylonMsg>, ContractError> {
    let hash = staking_tx_hash(staking_tx_hash_hex)?;
    let del = load_delegation(deps.storage, &hash)?;
    let status = delegation_status(deps.storage, &del)?;
    if !matches!(
        status,
        BTCDelegationStatus::VERIFIED
            | BTCDelegationStatus::ACTIVE
            | BTCDelegationStatus::EXPIRED
    ) {
        return Err(ContractError::WrongDelegationState {
            expected: BTCDelegationStatus::ACTIVE,
            actual: status,
        });
    }

    let params = get_params(deps.storage, del.params_version)?;
    let cfg = FINALITY_CONFIG.load(deps.storage)?;
    let staking_tx = decode_tx(&del.staking_tx)?;
    let spend_tx = decode_tx(stake_spending_tx)?;
    let funding_txs = funding_txs
        .iter()
        .map(|tx| decode_tx(tx))
        .collect::<Result<Vec<_>, _>>()?;

    let staking_outpoint = OutPoint {
        txid: staking_tx.txid(),
        vout: del.staking_output_idx,
    };
    let input_index = spend_tx
        .input
        .iter()
        .position(|input| input.previous_output == staking_outpoint)
        .ok_or_else(|| {
            ContractError::InvalidUnbondingWitness(
                "tx does not spend the staking output".to_string(),
            )
        })?;
    let prevouts = spend_tx
        .input
        .iter()
        .map(|input| {
            let out = if input.previous_output == staking_outpoint {
                staking_tx.output.get(del.staking_output_idx as usize)
            } else {
                funding_txs
                    .iter()
                    .find(|tx| tx.txid() == input.previous_output.txid)
                    .and_then(|tx| tx.output.get(input.previous_output.vout as usize))
            };
            out.cloned().ok_or_else(|| {
                ContractError::InvalidUnbondingWitness(format!(
                    "missing funding tx of input {}",
                    input.previous_output
                ))
            })
        })
        .collect::<Result<Vec<TxOut>, _>>()?;

    let keys = DelegationKeys::for_delegation(&params, &del)?;
    let paths = keys.staking_paths(del.staking_time)?;
    verify_unbonding_path_witness(
        &spend_tx,
        input_index,
        &prevouts,
        &paths.staking_spend_info()?,
        &paths.unbonding_path_script,
        &keys.staker,
        &keys.covenants,
        keys.covenant_quorum,
    )
    .map_err(|e| ContractError::InvalidUnbondingWitness(e.to_string()))?;

    let block = verify_tx_inclusion(deps.storage, &spend_tx, proof)?;
    let depth = StoredLightClient::new(deps.storage)
        .tip_height()?
        .saturating_sub(block.height);
    if depth < cfg.btc_confirmation_depth {
        return Err(ContractError::NotEnoughConfirmations(
            depth,
            cfg.btc_confirmation_depth,
        ));
    }

    let (hook, event) = unbond(deps.storage, &hash, stake_spending_tx.to_vec(), block.height)?;
    if let Some(hook) = hook {
        dispatch(deps.storage, env.block.height, &[hook])?;
    }
    ExecuteResult::refundable()
        .attach(Response::new().add_event(event))
        .map_err(Into::into)
}
