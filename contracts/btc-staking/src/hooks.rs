use cosmwasm_std::{Addr, Storage};

use babylon_apis::btc_staking_api::HASH_SIZE;

use crate::costaking;
use crate::error::ContractError;
use crate::state::delegations::delegations;
use crate::state::rewards::FP_DISTRIBUTION;
use crate::state::staking::{load_fp, update_fp_power};

/// A staking state change other components react to
#[derive(Clone, Debug, PartialEq)]
pub enum StakingHook {
    /// A delegation got voting power
    DelegationActivated {
        staking_tx_hash: [u8; HASH_SIZE],
        staker: Addr,
        native_fp: String,
        sats: u64,
    },
    /// An active delegation lost its voting power, through unbonding or expiry
    DelegationUnbonded {
        staking_tx_hash: [u8; HASH_SIZE],
        staker: Addr,
        native_fp: String,
        sats: u64,
    },
    FpJailed { fp: String },
    FpUnjailed { fp: String },
    /// `was_jailed` tells whether the stake of the finality provider was already discounted
    FpSlashed { fp: String, was_jailed: bool },
}

/// dispatch applies the hooks in two phases: the finality provider state (voting power and
/// reward distribution entries) first, then the co-staking tracker. The finality provider
/// records must already reflect the jail / slash status the hooks announce
pub fn dispatch(
    storage: &mut dyn Storage,
    height: u64,
    hooks: &[StakingHook],
) -> Result<(), ContractError> {
    for hook in hooks {
        apply_fp_state(storage, height, hook)?;
    }
    for hook in hooks {
        apply_costaking(storage, hook)?;
    }
    Ok(())
}

fn apply_fp_state(
    storage: &mut dyn Storage,
    height: u64,
    hook: &StakingHook,
) -> Result<(), ContractError> {
    match hook {
        StakingHook::DelegationActivated {
            staking_tx_hash,
            native_fp,
            sats,
            ..
        } => {
            update_fp_power(storage, height, native_fp, i128::from(*sats))?;
            let pps = FP_DISTRIBUTION
                .may_load(storage, native_fp)?
                .unwrap_or_default()
                .points_per_stake;
            delegations().delegation.update(
                storage,
                (staking_tx_hash.as_slice(), native_fp.as_str()),
                |entry| {
                    let mut entry = entry.ok_or_else(|| {
                        ContractError::DelegationNotFound(hex::encode(staking_tx_hash))
                    })?;
                    entry.stake += sats;
                    entry.points_alignment.stake_increased(*sats, pps);
                    Ok::<_, ContractError>(entry)
                },
            )?;
        }
        StakingHook::DelegationUnbonded {
            staking_tx_hash,
            native_fp,
            sats,
            ..
        } => {
            update_fp_power(storage, height, native_fp, -i128::from(*sats))?;
            let pps = FP_DISTRIBUTION
                .may_load(storage, native_fp)?
                .unwrap_or_default()
                .points_per_stake;
            delegations().delegation.update(
                storage,
                (staking_tx_hash.as_slice(), native_fp.as_str()),
                |entry| {
                    let mut entry = entry.ok_or_else(|| {
                        ContractError::DelegationNotFound(hex::encode(staking_tx_hash))
                    })?;
                    entry.stake = entry.stake.saturating_sub(*sats);
                    entry.points_alignment.stake_decreased(*sats, pps);
                    Ok::<_, ContractError>(entry)
                },
            )?;
        }
        // Jailed and slashed providers keep their power; they are left out of the active set
        StakingHook::FpJailed { .. }
        | StakingHook::FpUnjailed { .. }
        | StakingHook::FpSlashed { .. } => {}
    }
    Ok(())
}

fn apply_costaking(storage: &mut dyn Storage, hook: &StakingHook) -> Result<(), ContractError> {
    match hook {
        StakingHook::DelegationActivated {
            staker,
            native_fp,
            sats,
            ..
        } => {
            if counts_for_costaking(storage, native_fp)? {
                costaking::add_satoshis(storage, staker, *sats)?;
            }
        }
        StakingHook::DelegationUnbonded {
            staker,
            native_fp,
            sats,
            ..
        } => {
            if counts_for_costaking(storage, native_fp)? {
                costaking::remove_satoshis(storage, staker, *sats)?;
            }
        }
        StakingHook::FpJailed { fp } => {
            for (staker, stake) in stake_by_staker(storage, fp)? {
                costaking::remove_satoshis(storage, &staker, stake)?;
            }
        }
        StakingHook::FpUnjailed { fp } => {
            for (staker, stake) in stake_by_staker(storage, fp)? {
                costaking::add_satoshis(storage, &staker, stake)?;
            }
        }
        StakingHook::FpSlashed { fp, was_jailed } => {
            if !was_jailed {
                for (staker, stake) in stake_by_staker(storage, fp)? {
                    costaking::remove_satoshis(storage, &staker, stake)?;
                }
            }
        }
    }
    Ok(())
}

fn counts_for_costaking(storage: &dyn Storage, fp_btc_pk_hex: &str) -> Result<bool, ContractError> {
    let fp = load_fp(storage, fp_btc_pk_hex)?;
    Ok(!fp.jailed && !fp.is_slashed())
}

/// Active stake to a finality provider, per staker
fn stake_by_staker(
    storage: &dyn Storage,
    fp_btc_pk_hex: &str,
) -> Result<Vec<(Addr, u64)>, ContractError> {
    let mut stakes: Vec<(Addr, u64)> = vec![];
    for (_, entry) in delegations().delegations_by_fp(storage, fp_btc_pk_hex)? {
        if entry.stake == 0 {
            continue;
        }
        match stakes.iter_mut().find(|(staker, _)| *staker == entry.staker_addr) {
            Some((_, stake)) => *stake += entry.stake,
            None => stakes.push((entry.staker_addr, entry.stake)),
        }
    }
    Ok(stakes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cosmwasm_std::testing::{MockApi, MockStorage};
    use cosmwasm_std::Decimal;

    use babylon_apis::btc_staking_api::{FinalityProvider, NewFinalityProvider};

    use crate::state::costaking::COSTAKERS;
    use crate::state::params::{add_params, Params};
    use crate::state::staking::{fp_power, FPS};

    fn setup(storage: &mut dyn Storage, api: &MockApi) -> Addr {
        costaking::init(storage).unwrap();
        add_params(storage, &Params::default()).unwrap();
        let fp = FinalityProvider::new(
            api.addr_make("fp1"),
            &NewFinalityProvider {
                description: None,
                commission: Decimal::percent(5),
                btc_pk_hex: "fp1".to_string(),
                pop: None,
                consumer_id: "consumer".to_string(),
            },
        );
        FPS.save(storage, "fp1", &fp).unwrap();
        api.addr_make("staker")
    }

    fn active_satoshis(storage: &dyn Storage, staker: &Addr) -> u64 {
        COSTAKERS
            .may_load(storage, staker)
            .unwrap()
            .unwrap_or_default()
            .active_satoshis
    }

    fn activated(hash: u8, staker: &Addr, sats: u64) -> StakingHook {
        StakingHook::DelegationActivated {
            staking_tx_hash: [hash; HASH_SIZE],
            staker: staker.clone(),
            native_fp: "fp1".to_string(),
            sats,
        }
    }

    #[test]
    fn activation_moves_power_and_satoshis() {
        let mut storage = MockStorage::new();
        let api = MockApi::default();
        let staker = setup(&mut storage, &api);
        let dels = delegations();
        dels.create_distribution(&mut storage, &[1; HASH_SIZE], "fp1", &staker)
            .unwrap();

        dispatch(&mut storage, 10, &[activated(1, &staker, 20_000)]).unwrap();
        assert_eq!(fp_power(&storage, "fp1").unwrap(), 20_000);
        assert_eq!(active_satoshis(&storage, &staker), 20_000);
        let entry = dels
            .delegation
            .load(&storage, (&[1u8; HASH_SIZE][..], "fp1"))
            .unwrap();
        assert_eq!(entry.stake, 20_000);

        dispatch(
            &mut storage,
            11,
            &[StakingHook::DelegationUnbonded {
                staking_tx_hash: [1; HASH_SIZE],
                staker: staker.clone(),
                native_fp: "fp1".to_string(),
                sats: 20_000,
            }],
        )
        .unwrap();
        assert_eq!(fp_power(&storage, "fp1").unwrap(), 0);
        assert_eq!(active_satoshis(&storage, &staker), 0);
    }

    #[test]
    fn jailing_discounts_satoshis_until_unjailed() {
        let mut storage = MockStorage::new();
        let api = MockApi::default();
        let staker = setup(&mut storage, &api);
        let dels = delegations();
        dels.create_distribution(&mut storage, &[1; HASH_SIZE], "fp1", &staker)
            .unwrap();
        dels.create_distribution(&mut storage, &[2; HASH_SIZE], "fp1", &staker)
            .unwrap();
        dispatch(
            &mut storage,
            10,
            &[activated(1, &staker, 10_000), activated(2, &staker, 5_000)],
        )
        .unwrap();

        let mut fp = FPS.load(&storage, "fp1").unwrap();
        fp.jailed = true;
        FPS.save(&mut storage, "fp1", &fp).unwrap();
        dispatch(&mut storage, 11, &[StakingHook::FpJailed { fp: "fp1".into() }]).unwrap();
        assert_eq!(active_satoshis(&storage, &staker), 0);
        // Power stays, the active set skips jailed providers
        assert_eq!(fp_power(&storage, "fp1").unwrap(), 15_000);

        fp.jailed = false;
        FPS.save(&mut storage, "fp1", &fp).unwrap();
        dispatch(&mut storage, 12, &[StakingHook::FpUnjailed { fp: "fp1".into() }]).unwrap();
        assert_eq!(active_satoshis(&storage, &staker), 15_000);

        fp.slashed_babylon_height = 13;
        FPS.save(&mut storage, "fp1", &fp).unwrap();
        dispatch(
            &mut storage,
            13,
            &[StakingHook::FpSlashed {
                fp: "fp1".into(),
                was_jailed: false,
            }],
        )
        .unwrap();
        assert_eq!(active_satoshis(&storage, &staker), 0);
    }
}
