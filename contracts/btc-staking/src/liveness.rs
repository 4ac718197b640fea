use cosmwasm_std::Order::Ascending;
use cosmwasm_std::{DepsMut, Env, Event, MessageInfo, Response, Storage};
use cw_storage_plus::Bound;

use babylon_bindings::BabylonMsg;

use crate::error::ContractError;
use crate::finality::tally_blocks;
use crate::hooks::{dispatch, StakingHook};
use crate::msg::ExecuteResult;
use crate::rewards::distribute_rewards;
use crate::state::config::{ADMIN, FINALITY_CONFIG};
use crate::state::finality::{
    SigningInfo, FP_SET, FP_SIGNING_INFO, RESUME_FINALITY_BLOCK, VOTES,
};
use crate::state::staking::{load_fp, ACTIVATED_HEIGHT, FPS};

/// Checks the votes of the active set at `height - finality_sig_timeout`, the last height whose
/// voting period is over. Finality providers reaching `signed_blocks_window` consecutive missed
/// votes get jailed
pub fn handle_liveness(
    storage: &mut dyn Storage,
    env: &Env,
    activated_height: u64,
) -> Result<Vec<Event>, ContractError> {
    let cfg = FINALITY_CONFIG.load(storage)?;
    let Some(height) = env.block.height.checked_sub(cfg.finality_sig_timeout) else {
        return Ok(vec![]);
    };
    if height < activated_height {
        return Ok(vec![]);
    }
    let Some(fp_set) = FP_SET.may_load(storage, height)? else {
        return Ok(vec![]);
    };

    let mut events = vec![];
    for fp_info in fp_set {
        let mut fp = load_fp(storage, &fp_info.btc_pk_hex)?;
        if fp.jailed || fp.is_slashed() {
            continue;
        }
        let mut signing_info = FP_SIGNING_INFO
            .may_load(storage, &fp.btc_pk_hex)?
            .unwrap_or(SigningInfo {
                start_height: height,
                missed_blocks_counter: 0,
            });
        if VOTES.has(storage, (height, fp.btc_pk_hex.as_str())) {
            signing_info.missed_blocks_counter = 0;
        } else {
            signing_info.missed_blocks_counter += 1;
        }

        if signing_info.missed_blocks_counter >= cfg.signed_blocks_window {
            let jailed_until = env.block.time.plus_seconds(cfg.jail_duration);
            fp.jailed = true;
            fp.jailed_until = Some(jailed_until);
            FPS.save(storage, &fp.btc_pk_hex, &fp)?;
            signing_info.missed_blocks_counter = 0;
            dispatch(
                storage,
                env.block.height,
                &[StakingHook::FpJailed {
                    fp: fp.btc_pk_hex.clone(),
                }],
            )?;
            events.push(
                Event::new("fp_jailed")
                    .add_attribute("module", "btc_staking")
                    .add_attribute("fp_btc_pk", &fp.btc_pk_hex)
                    .add_attribute("height", height.to_string())
                    .add_attribute("jailed_until", jailed_until.seconds().to_string()),
            );
        }
        FP_SIGNING_INFO.save(storage, &fp.btc_pk_hex, &signing_info)?;
    }
    Ok(events)
}

/// Admin can unjail anyone anytime, owners can unjail their finality provider only once the
/// jail period passed
pub fn handle_unjail(
    deps: DepsMut,
    env: &Env,
    info: &MessageInfo,
    fp_btc_pk_hex: &str,
) -> Result<Response<BabylonMsg>, ContractError> {
    let mut fp = load_fp(deps.storage, fp_btc_pk_hex)?;
    if fp.is_slashed() {
        return Err(ContractError::FinalityProviderSlashed(fp_btc_pk_hex.to_string()));
    }
    if !fp.jailed {
        return Err(ContractError::FinalityProviderNotJailed(
            fp_btc_pk_hex.to_string(),
        ));
    }
    if RESUME_FINALITY_BLOCK.may_load(deps.storage, fp_btc_pk_hex)? == Some(env.block.height) {
        return Err(ContractError::UnjailBlockedByResumeFinality(
            fp_btc_pk_hex.to_string(),
        ));
    }

    if !ADMIN.is_admin(deps.as_ref(), &info.sender)? {
        if info.sender != fp.addr {
            return Err(ContractError::Unauthorized);
        }
        if let Some(jailed_until) = fp.jailed_until {
            if env.block.time < jailed_until {
                return Err(ContractError::JailPeriodNotPassed(
                    fp_btc_pk_hex.to_string(),
                ));
            }
        }
    }

    fp.jailed = false;
    fp.jailed_until = None;
    FPS.save(deps.storage, fp_btc_pk_hex, &fp)?;
    FP_SIGNING_INFO.save(
        deps.storage,
        fp_btc_pk_hex,
        &SigningInfo {
            start_height: env.block.height,
            missed_blocks_counter: 0,
        },
    )?;
    dispatch(
        deps.storage,
        env.block.height,
        &[StakingHook::FpUnjailed {
            fp: fp_btc_pk_hex.to_string(),
        }],
    )?;

    let res = Response::new().add_event(
        Event::new("fp_unjailed")
            .add_attribute("fp_btc_pk", fp_btc_pk_hex)
            .add_attribute("height", env.block.height.to_string()),
    );
    Ok(ExecuteResult::refundable().attach(res)?)
}

/// handle_resume_finality jails the listed finality providers of the active set at
/// `halting_height`, and removes them from every active set since then, so that blocks stuck
/// waiting for their votes can be finalized by the remaining ones
pub fn handle_resume_finality(
    mut deps: DepsMut,
    env: &Env,
    info: &MessageInfo,
    fp_pks_hex: &[String],
    halting_height: u64,
) -> Result<Response<BabylonMsg>, ContractError> {
    ADMIN.assert_admin(deps.as_ref(), &info.sender)?;
    let activated_height = ACTIVATED_HEIGHT
        .may_load(deps.storage)?
        .ok_or(ContractError::InvalidHaltingHeight(
            halting_height,
            env.block.height,
        ))?;
    if halting_height < activated_height || halting_height >= env.block.height {
        return Err(ContractError::InvalidHaltingHeight(
            halting_height,
            env.block.height,
        ));
    }

    let cfg = FINALITY_CONFIG.load(deps.storage)?;
    let halting_set = FP_SET.may_load(deps.storage, halting_height)?.unwrap_or_default();
    let mut jailed = vec![];
    let mut hooks = vec![];
    for fp_btc_pk_hex in fp_pks_hex {
        if !halting_set.iter().any(|fp| &fp.btc_pk_hex == fp_btc_pk_hex) {
            deps.api.debug(&format!(
                "Finality provider {fp_btc_pk_hex} not in the active set at {halting_height}"
            ));
            continue;
        }
        let mut fp = load_fp(deps.storage, fp_btc_pk_hex)?;
        if fp.is_slashed() {
            continue;
        }
        if !fp.jailed {
            fp.jailed = true;
            hooks.push(StakingHook::FpJailed {
                fp: fp_btc_pk_hex.clone(),
            });
        }
        fp.jailed_until = Some(env.block.time.plus_seconds(cfg.jail_duration));
        FPS.save(deps.storage, fp_btc_pk_hex, &fp)?;
        RESUME_FINALITY_BLOCK.save(deps.storage, fp_btc_pk_hex, &env.block.height)?;
        jailed.push(fp_btc_pk_hex.clone());
    }
    dispatch(deps.storage, env.block.height, &hooks)?;

    let fp_sets = FP_SET
        .range(
            deps.storage,
            Some(Bound::inclusive(halting_height)),
            None,
            Ascending,
        )
        .collect::<Result<Vec<_>, _>>()?;
    for (height, mut fp_set) in fp_sets {
        fp_set.retain(|fp| !jailed.contains(&fp.btc_pk_hex));
        if fp_set.is_empty() {
            FP_SET.remove(deps.storage, height);
        } else {
            FP_SET.save(deps.storage, height, &fp_set)?;
        }
    }

    let (finalized, finalized_events) =
        tally_blocks(deps.storage, activated_height, env.block.height)?;
    let rewards = distribute_rewards(&mut deps, env, &finalized)?;

    let mut res = Response::new()
        .add_event(
            Event::new("finality_resumed")
                .add_attribute("halting_height", halting_height.to_string())
                .add_attribute("jailed_fps", jailed.join(",")),
        )
        .add_events(finalized_events)
        .add_submessages(rewards.messages)
        .add_events(rewards.events);
    for fp in &jailed {
        res = res.add_event(
            Event::new("fp_jailed")
                .add_attribute("fp_btc_pk", fp)
                .add_attribute("height", halting_height.to_string()),
        );
    }
    Ok(res)
}
