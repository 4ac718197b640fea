use cosmwasm_std::{Addr, Decimal, Event, Order, StdError, StdResult, Storage, Uint128, Uint256};

use babylon_apis::rewards_api::RewardKind;

use crate::error::ContractError;
use crate::state::costaking::{
    CostakerTracker, CurrentRewards, HistoricalRewards, BABY_DELEGATIONS, COSTAKERS,
    CURRENT_REWARDS, DECIMAL_REWARDS, HISTORICAL_REWARDS, JAILED_VALIDATORS,
};
use crate::state::params::latest_params;
use crate::state::rewards::REWARD_GAUGES;

/// Opens the first rewards period
pub fn init(storage: &mut dyn Storage) -> Result<(), ContractError> {
    HISTORICAL_REWARDS.save(
        storage,
        0,
        &HistoricalRewards {
            cumulative: Uint256::zero(),
            reference_count: 1,
        },
    )?;
    CURRENT_REWARDS.save(
        storage,
        &CurrentRewards {
            period: 1,
            rewards: Uint128::zero(),
            total_score: Uint128::zero(),
        },
    )?;
    Ok(())
}

fn retain_period(storage: &mut dyn Storage, period: u64) -> Result<(), ContractError> {
    let mut historical = HISTORICAL_REWARDS.load(storage, period)?;
    historical.reference_count += 1;
    HISTORICAL_REWARDS.save(storage, period, &historical)?;
    Ok(())
}

fn release_period(storage: &mut dyn Storage, period: u64) -> Result<(), ContractError> {
    let mut historical = HISTORICAL_REWARDS.load(storage, period)?;
    historical.reference_count = historical.reference_count.saturating_sub(1);
    if historical.reference_count == 0 {
        HISTORICAL_REWARDS.remove(storage, period);
    } else {
        HISTORICAL_REWARDS.save(storage, period, &historical)?;
    }
    Ok(())
}

/// score = min(active_satoshis, active_baby / ratio)
pub fn score(tracker: &CostakerTracker, score_ratio_btc_by_baby: Uint128) -> Uint128 {
    let baby_score = tracker
        .active_baby
        .checked_div(score_ratio_btc_by_baby)
        .unwrap_or_default();
    baby_score.min(Uint128::from(tracker.active_satoshis))
}

/// Adds rewards to the running period
pub fn deposit(storage: &mut dyn Storage, amount: Uint128) -> Result<(), ContractError> {
    CURRENT_REWARDS.update(storage, |mut current| -> Result<_, ContractError> {
        current.rewards = current.rewards.checked_add(amount)?;
        Ok(current)
    })?;
    Ok(())
}

/// Cumulative rewards per score the running period would close with
fn running_cumulative(storage: &dyn Storage, current: &CurrentRewards) -> Result<Uint256, ContractError> {
    let previous = HISTORICAL_REWARDS.load(storage, current.period - 1)?.cumulative;
    if current.total_score.is_zero() {
        return Ok(previous);
    }
    let per_score = Uint256::from(current.rewards) * Uint256::from(DECIMAL_REWARDS)
        / Uint256::from(current.total_score);
    Ok(previous + per_score)
}

/// Closes the running period, returning its id. Rewards deposited while nobody had a score are
/// carried over to the next period
fn increment_period(storage: &mut dyn Storage) -> Result<u64, ContractError> {
    let current = CURRENT_REWARDS.load(storage)?;
    let cumulative = running_cumulative(storage, &current)?;
    HISTORICAL_REWARDS.save(
        storage,
        current.period,
        &HistoricalRewards {
            cumulative,
            reference_count: 1,
        },
    )?;
    release_period(storage, current.period - 1)?;
    let carried = if current.total_score.is_zero() {
        current.rewards
    } else {
        Uint128::zero()
    };
    CURRENT_REWARDS.save(
        storage,
        &CurrentRewards {
            period: current.period + 1,
            rewards: carried,
            total_score: current.total_score,
        },
    )?;
    Ok(current.period)
}

fn owed_since(
    storage: &dyn Storage,
    tracker: &CostakerTracker,
    cumulative: Uint256,
) -> Result<Uint128, ContractError> {
    let start = HISTORICAL_REWARDS.load(storage, tracker.start_period)?.cumulative;
    let owed = Uint256::from(tracker.total_score) * (cumulative - start)
        / Uint256::from(DECIMAL_REWARDS);
    Ok(Uint128::try_from(owed).map_err(StdError::from)?)
}

/// Credits what a stored co-staker earned up to the `ended` period to its gauge, and drops
/// its reference to its previous start period
fn settle(
    storage: &mut dyn Storage,
    addr: &Addr,
    tracker: &CostakerTracker,
    ended: u64,
) -> Result<Uint128, ContractError> {
    let cumulative = HISTORICAL_REWARDS.load(storage, ended)?.cumulative;
    let owed = owed_since(storage, tracker, cumulative)?;
    release_period(storage, tracker.start_period)?;
    if !owed.is_zero() {
        REWARD_GAUGES.update(
            storage,
            (RewardKind::Costaker.as_key(), addr),
            |gauge| -> Result<_, ContractError> {
                Ok(gauge.unwrap_or_default().checked_add(owed)?)
            },
        )?;
    }
    Ok(owed)
}

/// update_costaker settles the rewards of `addr`, applies `change` to its tracker and rescores
/// it with the latest score ratio
pub fn update_costaker<F>(
    storage: &mut dyn Storage,
    addr: &Addr,
    change: F,
) -> Result<CostakerTracker, ContractError>
where
    F: FnOnce(&mut CostakerTracker) -> Result<(), ContractError>,
{
    let (_, params) = latest_params(storage)?;
    let ended = increment_period(storage)?;
    let mut tracker = match COSTAKERS.may_load(storage, addr)? {
        Some(tracker) => {
            settle(storage, addr, &tracker, ended)?;
            tracker
        }
        None => CostakerTracker::default(),
    };

    change(&mut tracker)?;
    let old_score = tracker.total_score;
    tracker.total_score = score(&tracker, params.score_ratio_btc_by_baby);
    CURRENT_REWARDS.update(storage, |mut current| -> Result<_, ContractError> {
        current.total_score = current
            .total_score
            .checked_sub(old_score)?
            .checked_add(tracker.total_score)?;
        Ok(current)
    })?;

    if tracker.active_satoshis == 0 && tracker.active_baby.is_zero() {
        COSTAKERS.remove(storage, addr);
    } else {
        tracker.start_period = ended;
        retain_period(storage, ended)?;
        COSTAKERS.save(storage, addr, &tracker)?;
    }
    Ok(tracker)
}

/// Rescores every co-staker with the latest score ratio, settling their rewards on the way.
/// Returns the number of trackers visited
pub fn rescore_all(storage: &mut dyn Storage) -> Result<usize, ContractError> {
    let addrs = COSTAKERS
        .keys(storage, None, None, Order::Ascending)
        .collect::<StdResult<Vec<Addr>>>()?;
    for addr in &addrs {
        update_costaker(storage, addr, |_| Ok(()))?;
    }
    Ok(addrs.len())
}

/// Settles a co-staker without changing its stake
pub fn settle_costaker(storage: &mut dyn Storage, addr: &Addr) -> Result<(), ContractError> {
    if COSTAKERS.has(storage, addr) {
        update_costaker(storage, addr, |_| Ok(()))?;
    }
    Ok(())
}

pub fn add_satoshis(storage: &mut dyn Storage, addr: &Addr, sats: u64) -> Result<(), ContractError> {
    update_costaker(storage, addr, |tracker| {
        tracker.active_satoshis += sats;
        Ok(())
    })?;
    Ok(())
}

pub fn remove_satoshis(
    storage: &mut dyn Storage,
    addr: &Addr,
    sats: u64,
) -> Result<(), ContractError> {
    update_costaker(storage, addr, |tracker| {
        tracker.active_satoshis = tracker.active_satoshis.checked_sub(sats).ok_or_else(|| {
            ContractError::StdError(StdError::generic_err(format!(
                "co-staker {addr} has fewer than {sats} active satoshis"
            )))
        })?;
        Ok(())
    })?;
    Ok(())
}

/// Rewards a co-staker would get by settling now, on top of its gauge
pub fn pending_rewards(storage: &dyn Storage, addr: &Addr) -> Result<Uint128, ContractError> {
    let Some(tracker) = COSTAKERS.may_load(storage, addr)? else {
        return Ok(Uint128::zero());
    };
    let current = CURRENT_REWARDS.load(storage)?;
    let cumulative = running_cumulative(storage, &current)?;
    owed_since(storage, &tracker, cumulative)
}

/// The native stake of `delegator` to `validator` is now `shares`
pub fn handle_baby_delegation_changed(
    storage: &mut dyn Storage,
    delegator: &Addr,
    validator: &str,
    shares: Uint128,
) -> Result<Event, ContractError> {
    let old = BABY_DELEGATIONS
        .may_load(storage, (validator, delegator))?
        .unwrap_or_default();
    if shares.is_zero() {
        BABY_DELEGATIONS.remove(storage, (validator, delegator));
    } else {
        BABY_DELEGATIONS.save(storage, (validator, delegator), &shares)?;
    }
    if !JAILED_VALIDATORS.has(storage, validator) && old != shares {
        update_costaker(storage, delegator, |tracker| {
            tracker.active_baby = tracker.active_baby.checked_sub(old)?.checked_add(shares)?;
            Ok(())
        })?;
    }
    Ok(Event::new("baby_delegation_changed")
        .add_attribute("module", "btc_staking")
        .add_attribute("delegator", delegator)
        .add_attribute("validator", validator)
        .add_attribute("shares", shares))
}

fn validator_stakes(storage: &dyn Storage, validator: &str) -> Result<Vec<(Addr, Uint128)>, ContractError> {
    Ok(BABY_DELEGATIONS
        .prefix(validator)
        .range(storage, None, None, Order::Ascending)
        .collect::<StdResult<_>>()?)
}

/// The native stake to a jailed validator does not count towards scores
pub fn handle_validator_jailed(
    storage: &mut dyn Storage,
    validator: &str,
) -> Result<Event, ContractError> {
    if !JAILED_VALIDATORS.has(storage, validator) {
        JAILED_VALIDATORS.save(storage, validator, &cosmwasm_std::Empty {})?;
        for (delegator, shares) in validator_stakes(storage, validator)? {
            update_costaker(storage, &delegator, |tracker| {
                tracker.active_baby = tracker.active_baby.checked_sub(shares)?;
                Ok(())
            })?;
        }
    }
    Ok(Event::new("validator_jailed")
        .add_attribute("module", "btc_staking")
        .add_attribute("validator", validator))
}

pub fn handle_validator_unjailed(
    storage: &mut dyn Storage,
    validator: &str,
) -> Result<Event, ContractError> {
    if JAILED_VALIDATORS.has(storage, validator) {
        JAILED_VALIDATORS.remove(storage, validator);
        for (delegator, shares) in validator_stakes(storage, validator)? {
            update_costaker(storage, &delegator, |tracker| {
                tracker.active_baby = tracker.active_baby.checked_add(shares)?;
                Ok(())
            })?;
        }
    }
    Ok(Event::new("validator_unjailed")
        .add_attribute("module", "btc_staking")
        .add_attribute("validator", validator))
}

/// Burns `fraction` of the native stake to the validator
pub fn handle_validator_slashed(
    storage: &mut dyn Storage,
    validator: &str,
    fraction: Decimal,
) -> Result<Event, ContractError> {
    if fraction > Decimal::one() {
        return Err(ContractError::InvalidParams(format!(
            "slashing fraction {fraction} exceeds one"
        )));
    }
    let jailed = JAILED_VALIDATORS.has(storage, validator);
    for (delegator, shares) in validator_stakes(storage, validator)? {
        let burnt = shares.mul_ceil(fraction);
        let remaining = shares - burnt;
        if remaining.is_zero() {
            BABY_DELEGATIONS.remove(storage, (validator, &delegator));
        } else {
            BABY_DELEGATIONS.save(storage, (validator, &delegator), &remaining)?;
        }
        if !jailed && !burnt.is_zero() {
            update_costaker(storage, &delegator, |tracker| {
                tracker.active_baby = tracker.active_baby.checked_sub(burnt)?;
                Ok(())
            })?;
        }
    }
    Ok(Event::new("validator_slashed")
        .add_attribute("module", "btc_staking")
        .add_attribute("validator", validator)
        .add_attribute("fraction", fraction.to_string()))
}
