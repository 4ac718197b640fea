use bitcoin::hashes::Hash;
use bitcoin::Txid;
use cosmwasm_std::{DepsMut, Env, Event, Response};

use babylon_apis::btc_staking_api::{
    BTCDelegationStatus, CovenantAdaptorSignatures, CovenantSigs, SignatureInfo, HASH_SIZE,
};
use babylon_apis::Validate;
use babylon_bindings::BabylonMsg;

use crate::error::ContractError;
use crate::hooks::dispatch;
use crate::msg::ExecuteResult;
use crate::staking::{activate, delegation_status, load_delegation, staking_tx_hash};
use crate::state::delegations::DELEGATIONS;
use crate::state::params::get_params;
use crate::state::staking::load_fp;
use crate::validation::{decode_btc_pk, verify_covenant_sigs, ExpandedDelegation};

/// handle_covenant_sigs stores the signature bundle of a covenant member on a pending
/// delegation. Once the quorum is reached the delegation is verified and, if its staking tx
/// is already k-deep, activated
pub fn handle_covenant_sigs(
    deps: DepsMut,
    env: &Env,
    sigs: &CovenantSigs,
) -> Result<Response<BabylonMsg>, ContractError> {
    sigs.validate()?;
    let hash = staking_tx_hash(&sigs.staking_tx_hash_hex)?;
    let mut del = load_delegation(deps.storage, &hash)?;
    let params = get_params(deps.storage, del.params_version)?;

    if !params.covenant_pks.contains(&sigs.pk_hex) {
        return Err(ContractError::UnknownCovenantKey(sigs.pk_hex.clone()));
    }
    let cov_pk = decode_btc_pk(&sigs.pk_hex)?;
    let cov_pk_bytes = cov_pk.serialize().to_vec();
    if del.covenant_sigs.iter().any(|s| s.cov_pk == cov_pk_bytes) {
        return Err(ContractError::DuplicateCovenantSig(
            sigs.pk_hex.clone(),
            sigs.staking_tx_hash_hex.clone(),
        ));
    }
    let status = delegation_status(deps.storage, &del)?;
    if status != BTCDelegationStatus::PENDING {
        return Err(ContractError::WrongDelegationState {
            expected: BTCDelegationStatus::PENDING,
            actual: status,
        });
    }
    if load_fp(deps.storage, &del.native_fp)?.is_slashed() {
        return Err(ContractError::FinalityProviderSlashed(del.native_fp.clone()));
    }

    let expanded = match &del.stk_exp {
        Some(stk_exp) => {
            let prev_hash: [u8; HASH_SIZE] = stk_exp
                .previous_staking_tx_hash
                .as_slice()
                .try_into()
                .map_err(|_| {
                    ContractError::InvalidStakeExpansion(
                        "invalid previous staking tx hash".to_string(),
                    )
                })?;
            let prev = load_delegation(deps.storage, &prev_hash)?;
            let prev_params = get_params(deps.storage, prev.params_version)?;
            Some((prev, prev_params))
        }
        None => None,
    };
    verify_covenant_sigs(
        &params,
        &del,
        &cov_pk,
        sigs,
        expanded.as_ref().map(|(delegation, params)| ExpandedDelegation {
            delegation,
            params,
        }),
    )?;

    del.covenant_sigs.push(CovenantAdaptorSignatures {
        cov_pk: cov_pk_bytes.clone(),
        adaptor_sigs: sigs.slashing_tx_sigs.iter().map(|s| s.to_vec()).collect(),
    });
    del.undelegation_info
        .covenant_unbonding_sig_list
        .push(SignatureInfo {
            pk: cov_pk_bytes.clone(),
            sig: sigs.unbonding_tx_sig.to_vec(),
        });
    del.undelegation_info
        .covenant_slashing_sigs
        .push(CovenantAdaptorSignatures {
            cov_pk: cov_pk_bytes.clone(),
            adaptor_sigs: sigs
                .slashing_unbonding_tx_sigs
                .iter()
                .map(|s| s.to_vec())
                .collect(),
        });
    if let (Some(stk_exp), Some(sig)) = (del.stk_exp.as_mut(), &sigs.stake_expansion_tx_sig) {
        stk_exp.previous_stk_covenant_sigs.push(SignatureInfo {
            pk: cov_pk_bytes,
            sig: sig.to_vec(),
        });
    }
    DELEGATIONS.save(deps.storage, &hash, &del)?;

    let mut res = Response::new().add_event(
        Event::new("covenant_sigs_added")
            .add_attribute("staking_tx_hash", &sigs.staking_tx_hash_hex)
            .add_attribute("covenant_pk", &sigs.pk_hex)
            .add_attribute("num_sigs", del.covenant_sigs.len().to_string()),
    );
    match delegation_status(deps.storage, &del)? {
        BTCDelegationStatus::PENDING => {}
        BTCDelegationStatus::ACTIVE => {
            res = res.add_event(verified_event(&hash));
            let (hook, event) = activate(deps.storage, &hash, &del)?;
            dispatch(deps.storage, env.block.height, &[hook])?;
            res = res.add_event(event);
        }
        _ => res = res.add_event(verified_event(&hash)),
    }
    ExecuteResult::refundable().attach(res).map_err(Into::into)
}

fn verified_event(staking_tx_hash: &[u8; HASH_SIZE]) -> Event {
    Event::new("delegation_verified").add_attribute(
        "staking_tx_hash",
        Txid::from_byte_array(*staking_tx_hash).to_string(),
    )
}
