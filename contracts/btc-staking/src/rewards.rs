use cosmwasm_std::{
    coins, Addr, BankMsg, Deps, DepsMut, Env, Event, MessageInfo, Response, StdError, Storage,
    Uint128, Uint256,
};
use cw_utils::{must_pay, nonpayable};

use babylon_apis::rewards_api::RewardKind;
use babylon_bindings::BabylonMsg;

use crate::costaking;
use crate::error::ContractError;
use crate::finality::block_voters;
use crate::state::config::{CONFIG, FINALITY_CONFIG};
use crate::state::delegations::{delegations, Delegation};
use crate::state::rewards::{Distribution, ACCOUNTED, FP_DISTRIBUTION, POINTS_SHIFT, REWARD_GAUGES};
use crate::state::staking::{fp_power, load_fp};

fn credit(
    storage: &mut dyn Storage,
    kind: RewardKind,
    addr: &Addr,
    amount: Uint128,
) -> Result<(), ContractError> {
    if amount.is_zero() {
        return Ok(());
    }
    REWARD_GAUGES.update(storage, (kind.as_key(), addr), |gauge| -> Result<_, ContractError> {
        Ok(gauge.unwrap_or_default().checked_add(amount)?)
    })?;
    Ok(())
}

fn add_accounted(storage: &mut dyn Storage, amount: Uint128) -> Result<(), ContractError> {
    let accounted = ACCOUNTED.may_load(storage)?.unwrap_or_default();
    ACCOUNTED.save(storage, &accounted.checked_add(amount)?)?;
    Ok(())
}

/// distribute_rewards splits the funds received since the last distribution among the babylon
/// commission, the co-staking pool and the finality providers that voted for the `finalized`
/// blocks. Funds stay in the pool while no block gets finalized
pub fn distribute_rewards(
    deps: &mut DepsMut,
    env: &Env,
    finalized: &[u64],
) -> Result<Response<BabylonMsg>, ContractError> {
    if finalized.is_empty() {
        return Ok(Response::new());
    }
    let cfg = FINALITY_CONFIG.load(deps.storage)?;
    let balance = deps
        .querier
        .query_balance(&env.contract.address, &cfg.reward_denom)?
        .amount;
    let accounted = ACCOUNTED.may_load(deps.storage)?.unwrap_or_default();
    let new_funds = balance.saturating_sub(accounted);
    if new_funds.is_zero() {
        return Ok(Response::new());
    }

    let commission = new_funds.mul_floor(cfg.babylon_commission);
    let remaining = new_funds - commission;
    let costaking_share = remaining.mul_floor(cfg.costaking_portion);
    let fp_pool = remaining - costaking_share;
    if !costaking_share.is_zero() {
        costaking::deposit(deps.storage, costaking_share)?;
    }

    let per_block = fp_pool.multiply_ratio(1u128, finalized.len() as u128);
    let mut distributed = Uint128::zero();
    for height in finalized {
        let voters = block_voters(deps.storage, *height)?;
        let total_power: u128 = voters.iter().map(|(_, power)| u128::from(*power)).sum();
        if total_power == 0 {
            continue;
        }
        for (fp, power) in voters {
            let share = per_block.multiply_ratio(u128::from(power), total_power);
            distribute_to_fp(deps.storage, &fp, share)?;
            distributed += share;
        }
    }
    add_accounted(deps.storage, costaking_share + distributed)?;

    let mut res = Response::new().add_event(
        Event::new("rewards_distributed")
            .add_attribute("module", "btc_staking")
            .add_attribute("babylon_commission", commission)
            .add_attribute("costaking", costaking_share)
            .add_attribute("finality_providers", distributed)
            .add_attribute("blocks", finalized.len().to_string()),
    );
    if !commission.is_zero() {
        let config = CONFIG.load(deps.storage)?;
        res = res.add_message(BankMsg::Send {
            to_address: config.babylon.to_string(),
            amount: coins(commission.u128(), &cfg.reward_denom),
        });
    }
    Ok(res)
}

/// The finality provider keeps its commission; the rest goes to its delegators, by stake
fn distribute_to_fp(
    storage: &mut dyn Storage,
    fp_btc_pk_hex: &str,
    amount: Uint128,
) -> Result<(), ContractError> {
    if amount.is_zero() {
        return Ok(());
    }
    let fp = load_fp(storage, fp_btc_pk_hex)?;
    let stake = fp_power(storage, fp_btc_pk_hex)?;
    let mut commission = amount.mul_floor(fp.commission);
    let mut for_delegators = amount - commission;
    if stake == 0 {
        commission += for_delegators;
        for_delegators = Uint128::zero();
    }
    credit(storage, RewardKind::FinalityProvider, &fp.addr, commission)?;

    if !for_delegators.is_zero() {
        let mut dist = FP_DISTRIBUTION
            .may_load(storage, fp_btc_pk_hex)?
            .unwrap_or_default();
        let points = (Uint256::from(for_delegators) << u32::from(POINTS_SHIFT))
            + dist.points_leftover;
        let stake = Uint256::from(stake);
        dist.points_per_stake += points / stake;
        dist.points_leftover = points % stake;
        FP_DISTRIBUTION.save(storage, fp_btc_pk_hex, &dist)?;
    }
    Ok(())
}

/// Rewards of a distribution entry not yet moved to the staker's gauge
fn withdrawable(dist: &Distribution, entry: &Delegation) -> Result<Uint128, ContractError> {
    let points = entry
        .points_alignment
        .align(dist.points_per_stake * Uint256::from(entry.stake));
    let earned = Uint128::try_from(points >> u32::from(POINTS_SHIFT)).map_err(StdError::from)?;
    Ok(earned.saturating_sub(entry.withdrawn_funds))
}

/// Moves everything the staker earned through its delegations to its gauge
pub fn collect_staker_rewards(
    storage: &mut dyn Storage,
    staker: &Addr,
) -> Result<Uint128, ContractError> {
    let dels = delegations();
    let mut total = Uint128::zero();
    for ((hash, fp), mut entry) in dels.delegations_by_staker(storage, staker)? {
        let dist = FP_DISTRIBUTION.may_load(storage, &fp)?.unwrap_or_default();
        let amount = withdrawable(&dist, &entry)?;
        if amount.is_zero() {
            continue;
        }
        entry.withdrawn_funds += amount;
        dels.delegation
            .save(storage, (hash.as_slice(), fp.as_str()), &entry)?;
        total += amount;
    }
    credit(storage, RewardKind::BtcStaker, staker, total)?;
    Ok(total)
}

/// Withdrawable rewards of `addr`, including what is not yet collected to its gauge
pub fn pending_rewards(
    deps: Deps,
    addr: &Addr,
    kind: RewardKind,
) -> Result<Uint128, ContractError> {
    let gauge = REWARD_GAUGES
        .may_load(deps.storage, (kind.as_key(), addr))?
        .unwrap_or_default();
    let uncollected = match kind {
        RewardKind::FinalityProvider => Uint128::zero(),
        RewardKind::BtcStaker => {
            let mut total = Uint128::zero();
            for ((_, fp), entry) in delegations().delegations_by_staker(deps.storage, addr)? {
                let dist = FP_DISTRIBUTION.may_load(deps.storage, &fp)?.unwrap_or_default();
                total += withdrawable(&dist, &entry)?;
            }
            total
        }
        RewardKind::Costaker => costaking::pending_rewards(deps.storage, addr)?,
    };
    Ok(gauge + uncollected)
}

/// withdraw_rewards drains the sender's gauge of the given kind
pub fn withdraw_rewards(
    deps: DepsMut,
    info: &MessageInfo,
    kind: RewardKind,
) -> Result<Response<BabylonMsg>, ContractError> {
    nonpayable(info)?;
    match kind {
        RewardKind::FinalityProvider => {}
        RewardKind::BtcStaker => {
            collect_staker_rewards(deps.storage, &info.sender)?;
        }
        RewardKind::Costaker => costaking::settle_costaker(deps.storage, &info.sender)?,
    }

    let key = (kind.as_key(), &info.sender);
    let amount = REWARD_GAUGES.may_load(deps.storage, key)?.unwrap_or_default();
    let mut res = Response::new().add_event(
        Event::new("withdraw_rewards")
            .add_attribute("kind", kind.as_key())
            .add_attribute("recipient", &info.sender)
            .add_attribute("amount", amount),
    );
    if !amount.is_zero() {
        REWARD_GAUGES.remove(deps.storage, key);
        let accounted = ACCOUNTED.may_load(deps.storage)?.unwrap_or_default();
        ACCOUNTED.save(deps.storage, &accounted.saturating_sub(amount))?;
        let denom = FINALITY_CONFIG.load(deps.storage)?.reward_denom;
        res = res.add_message(BankMsg::Send {
            to_address: info.sender.to_string(),
            amount: coins(amount.u128(), denom),
        });
    }
    Ok(res)
}

/// Deposits the attached funds into the co-staking pool
pub fn add_costaking_rewards(
    deps: DepsMut,
    info: &MessageInfo,
) -> Result<Response<BabylonMsg>, ContractError> {
    let denom = FINALITY_CONFIG.load(deps.storage)?.reward_denom;
    let amount = must_pay(info, &denom)?;
    costaking::deposit(deps.storage, amount)?;
    add_accounted(deps.storage, amount)?;
    Ok(Response::new().add_event(
        Event::new("costaking_rewards_added")
            .add_attribute("sender", &info.sender)
            .add_attribute("amount", amount),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cosmwasm_std::testing::{MockApi, MockStorage};
    use cosmwasm_std::Decimal;

    use babylon_apis::btc_staking_api::{FinalityProvider, NewFinalityProvider, HASH_SIZE};

    use crate::hooks::{dispatch, StakingHook};
    use crate::state::params::{add_params, Params};
    use crate::state::staking::FPS;

    fn register_fp(storage: &mut dyn Storage, api: &MockApi, pk: &str, commission: u64) {
        let fp = FinalityProvider::new(
            api.addr_make(pk),
            &NewFinalityProvider {
                description: None,
                commission: Decimal::percent(commission),
                btc_pk_hex: pk.to_string(),
                pop: None,
                consumer_id: "consumer".to_string(),
            },
        );
        FPS.save(storage, pk, &fp).unwrap();
    }

    fn stake(storage: &mut dyn Storage, hash: u8, staker: &Addr, fp: &str, sats: u64) {
        delegations()
            .create_distribution(storage, &[hash; HASH_SIZE], fp, staker)
            .unwrap();
        dispatch(
            storage,
            1,
            &[StakingHook::DelegationActivated {
                staking_tx_hash: [hash; HASH_SIZE],
                staker: staker.clone(),
                native_fp: fp.to_string(),
                sats,
            }],
        )
        .unwrap();
    }

    fn gauge(storage: &dyn Storage, kind: RewardKind, addr: &Addr) -> Uint128 {
        REWARD_GAUGES
            .may_load(storage, (kind.as_key(), addr))
            .unwrap()
            .unwrap_or_default()
    }

    #[test]
    fn fp_share_splits_commission_and_stake() {
        let mut storage = MockStorage::new();
        let api = MockApi::default();
        costaking::init(&mut storage).unwrap();
        add_params(&mut storage, &Params::default()).unwrap();
        register_fp(&mut storage, &api, "fp1", 10);
        let (alice, bob) = (api.addr_make("alice"), api.addr_make("bob"));
        stake(&mut storage, 1, &alice, "fp1", 24_576);
        stake(&mut storage, 2, &bob, "fp1", 8_192);

        distribute_to_fp(&mut storage, "fp1", Uint128::new(1_000)).unwrap();
        assert_eq!(
            gauge(&storage, RewardKind::FinalityProvider, &api.addr_make("fp1")),
            Uint128::new(100)
        );
        assert_eq!(
            collect_staker_rewards(&mut storage, &alice).unwrap(),
            Uint128::new(675)
        );
        assert_eq!(
            collect_staker_rewards(&mut storage, &bob).unwrap(),
            Uint128::new(225)
        );
        // Nothing left to collect
        assert_eq!(
            collect_staker_rewards(&mut storage, &alice).unwrap(),
            Uint128::zero()
        );

        // Stake joining afterwards does not earn past rewards
        let carol = api.addr_make("carol");
        stake(&mut storage, 3, &carol, "fp1", 32_768);
        assert_eq!(
            collect_staker_rewards(&mut storage, &carol).unwrap(),
            Uint128::zero()
        );
        distribute_to_fp(&mut storage, "fp1", Uint128::new(1_000)).unwrap();
        assert_eq!(
            collect_staker_rewards(&mut storage, &carol).unwrap(),
            Uint128::new(450)
        );
        collect_staker_rewards(&mut storage, &alice).unwrap();
        // Rounded down
        assert_eq!(gauge(&storage, RewardKind::BtcStaker, &alice), Uint128::new(675 + 337));
    }

    #[test]
    fn fp_without_stake_keeps_everything() {
        let mut storage = MockStorage::new();
        let api = MockApi::default();
        register_fp(&mut storage, &api, "fp1", 10);
        distribute_to_fp(&mut storage, "fp1", Uint128::new(1_000)).unwrap();
        assert_eq!(
            gauge(&storage, RewardKind::FinalityProvider, &api.addr_make("fp1")),
            Uint128::new(1_000)
        );
    }
}
