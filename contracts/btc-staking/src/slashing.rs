use bitcoin::consensus::serialize;
use bitcoin::hashes::Hash;
use bitcoin::{Txid, XOnlyPublicKey};
use cosmwasm_std::{DepsMut, Env, Event, Response, Storage};
use k256::schnorr::SigningKey;

use babylon_apis::btc_staking_api::{CovenantAdaptorSignatures, HASH_SIZE};
use babylon_apis::finality_api::Evidence;
use babylon_apis::Validate;
use babylon_bindings::BabylonMsg;
use babylon_btcstaking::sig_verify::new_schnorr_sig;
use babylon_btcstaking::signing_context::{fp_fin_vote_context, vote_message};
use babylon_btcstaking::witness::assemble_slashing_tx;
use babylon_btcstaking::AdaptorSignature;
use babylon_merkle::Proof;

use crate::error::ContractError;
use crate::finality::verify_finality_signature;
use crate::hooks::{dispatch, StakingHook};
use crate::light_client::{BtcLightClient, StoredLightClient};
use crate::state::config::CONFIG;
use crate::state::delegations::{delegations, BtcDelegation, DELEGATIONS};
use crate::state::finality::{SlashedDelegation, EVIDENCES, SLASHED_DELEGATIONS};
use crate::state::params::get_params;
use crate::state::public_randomness::get_pub_rand_commit_for_height;
use crate::state::staking::{load_fp, FPS};
use crate::validation::{decode_tx, DelegationKeys};

/// handle_equivocation_evidence slashes a finality provider proven to have signed two blocks
/// at the same height with the same public randomness. `proof` proves the randomness against
/// the finality provider's commitment
pub fn handle_equivocation_evidence(
    mut deps: DepsMut,
    env: &Env,
    evidence: &Evidence,
    proof: &Proof,
) -> Result<Response<BabylonMsg>, ContractError> {
    evidence.validate()?;
    let fp_btc_pk_hex = hex::encode(&evidence.fp_btc_pk);
    let fp = load_fp(deps.storage, &fp_btc_pk_hex)?;
    if fp.is_slashed() {
        return Err(ContractError::FinalityProviderSlashed(fp_btc_pk_hex));
    }

    let pr_commit =
        get_pub_rand_commit_for_height(deps.storage, &fp_btc_pk_hex, evidence.block_height)?
            .ok_or_else(|| {
                ContractError::PubRandNotCommitted(fp_btc_pk_hex.clone(), evidence.block_height)
            })?;
    let consumer_id = CONFIG.load(deps.storage)?.consumer_id;
    let vote_ctx = fp_fin_vote_context(&consumer_id, fp.addr.as_str());
    for (app_hash, sig) in [
        (&evidence.canonical_app_hash, &evidence.canonical_finality_sig),
        (&evidence.fork_app_hash, &evidence.fork_finality_sig),
    ] {
        verify_finality_signature(
            &fp_btc_pk_hex,
            evidence.block_height,
            &evidence.pub_rand,
            proof,
            &pr_commit,
            &vote_ctx,
            app_hash,
            sig,
        )?;
    }

    let (msg, events) = slash_finality_provider(&mut deps, env, evidence, &vote_ctx)?;
    Ok(Response::new().add_message(msg).add_events(events))
}

/// `slash_finality_provider` extracts the BTC secret key of an equivocating finality provider,
/// marks it as slashed, and assembles the slashing txs of its delegations
pub(crate) fn slash_finality_provider(
    deps: &mut DepsMut,
    env: &Env,
    evidence: &Evidence,
    vote_ctx: &str,
) -> Result<(BabylonMsg, Vec<Event>), ContractError> {
    let fp_btc_pk_hex = hex::encode(&evidence.fp_btc_pk);
    let pk = eots::PublicKey::from_hex(&fp_btc_pk_hex)?;
    let pub_rand = eots::new_pub_rand(&evidence.pub_rand)?;
    let btc_sk = eots::extract(
        &pk,
        &pub_rand,
        &vote_message(vote_ctx, evidence.block_height, &evidence.canonical_app_hash),
        &eots::new_sig(&evidence.canonical_finality_sig)?,
        &vote_message(vote_ctx, evidence.block_height, &evidence.fork_app_hash),
        &eots::new_sig(&evidence.fork_finality_sig)?,
    )
    .map_err(|err| ContractError::SecretKeyExtraction(err.to_string()))?;

    let mut fp = load_fp(deps.storage, &fp_btc_pk_hex)?;
    let was_jailed = fp.jailed;
    fp.slashed_babylon_height = env.block.height;
    fp.slashed_btc_height = StoredLightClient::new(deps.storage).tip_height()?;
    FPS.save(deps.storage, &fp_btc_pk_hex, &fp)?;
    EVIDENCES.save(
        deps.storage,
        (&fp_btc_pk_hex, evidence.block_height),
        evidence,
    )?;
    dispatch(
        deps.storage,
        env.block.height,
        &[StakingHook::FpSlashed {
            fp: fp_btc_pk_hex.clone(),
            was_jailed,
        }],
    )?;

    let signing_key = SigningKey::from_bytes(&btc_sk.to_bytes())
        .map_err(|e| ContractError::SecretKeyExtraction(e.to_string()))?;
    let dec_key = btc_sk.to_scalar();
    let mut slashed = 0;
    for (hash, _) in delegations().delegations_by_fp(deps.storage, &fp_btc_pk_hex)? {
        let hash: [u8; HASH_SIZE] = hash.as_slice().try_into().map_err(|_| {
            ContractError::DelegationNotFound(hex::encode(&hash))
        })?;
        let del = DELEGATIONS.load(deps.storage, &hash)?;
        let quorum = get_params(deps.storage, del.params_version)?.covenant_quorum;
        if !del.has_covenant_quorum(quorum) {
            continue;
        }
        let slashing_tx = assemble_delegation_slashing_tx(
            deps.storage,
            &del,
            &fp_btc_pk_hex,
            &signing_key,
            &dec_key,
        )?;
        SLASHED_DELEGATIONS.save(
            deps.storage,
            &hash,
            &SlashedDelegation {
                fp_btc_pk_hex: fp_btc_pk_hex.clone(),
                slashing_tx,
                unbonded: del.is_unbonded_early(),
            },
        )?;
        deps.api.debug(&format!(
            "Assembled slashing tx of delegation {}",
            Txid::from_byte_array(hash)
        ));
        slashed += 1;
    }

    let equivocation = Event::new("equivocation")
        .add_attribute("fp_btc_pk", &fp_btc_pk_hex)
        .add_attribute("height", evidence.block_height.to_string())
        .add_attribute(
            "canonical_app_hash",
            hex::encode(&evidence.canonical_app_hash),
        )
        .add_attribute("fork_app_hash", hex::encode(&evidence.fork_app_hash))
        .add_attribute("secret_key", hex::encode(btc_sk.to_bytes()));
    let fp_slashed = Event::new("fp_slashed")
        .add_attribute("fp_btc_pk", &fp_btc_pk_hex)
        .add_attribute("height", fp.slashed_babylon_height.to_string())
        .add_attribute("btc_height", fp.slashed_btc_height.to_string())
        .add_attribute("slashed_delegations", slashed.to_string());
    Ok((evidence.clone().into(), vec![equivocation, fp_slashed]))
}

/// Completes the slashing tx of a delegation with the covenant signatures decrypted by the
/// finality provider's secret key. Unbonded delegations get their unbonding output slashed
fn assemble_delegation_slashing_tx(
    storage: &dyn Storage,
    del: &BtcDelegation,
    fp_btc_pk_hex: &str,
    signing_key: &SigningKey,
    dec_key: &k256::Scalar,
) -> Result<Vec<u8>, ContractError> {
    let params = get_params(storage, del.params_version)?;
    let keys = DelegationKeys::for_delegation(&params, del)?;
    let fp_idx = del
        .fp_btc_pk_list
        .iter()
        .position(|pk| pk == fp_btc_pk_hex)
        .ok_or_else(|| ContractError::FinalityProviderNotFound(fp_btc_pk_hex.to_string()))?;

    let (slashing_tx, funding_tx, funding_idx, paths, spend_info, staker_sig, cov_sigs) =
        if del.is_unbonded_early() {
            let paths = keys.unbonding_paths(del.unbonding_time)?;
            let spend_info = paths.unbonding_spend_info()?;
            (
                &del.undelegation_info.slashing_tx,
                decode_tx(&del.undelegation_info.unbonding_tx)?,
                0,
                paths,
                spend_info,
                &del.undelegation_info.delegator_slashing_sig,
                &del.undelegation_info.covenant_slashing_sigs,
            )
        } else {
            let paths = keys.staking_paths(del.staking_time)?;
            let spend_info = paths.staking_spend_info()?;
            (
                &del.slashing_tx,
                decode_tx(&del.staking_tx)?,
                del.staking_output_idx as usize,
                paths,
                spend_info,
                &del.delegator_slashing_sig,
                &del.covenant_sigs,
            )
        };
    let funding_output = funding_tx
        .output
        .get(funding_idx)
        .ok_or_else(|| ContractError::InvalidStakingTx("missing funding output".to_string()))?;

    let covenant_sigs = decrypt_covenant_sigs(cov_sigs, fp_idx, dec_key)?;
    let tx = assemble_slashing_tx(
        &decode_tx(slashing_tx)?,
        funding_output,
        &spend_info,
        &paths.slashing_path_script,
        &keys.covenants,
        &covenant_sigs,
        keys.covenant_quorum,
        &keys.fps,
        signing_key,
        &new_schnorr_sig(staker_sig)?,
    )?;
    Ok(serialize(&tx))
}

fn decrypt_covenant_sigs(
    cov_sigs: &[CovenantAdaptorSignatures],
    fp_idx: usize,
    dec_key: &k256::Scalar,
) -> Result<Vec<(XOnlyPublicKey, k256::schnorr::Signature)>, ContractError> {
    cov_sigs
        .iter()
        .map(|cov| {
            let cov_pk = XOnlyPublicKey::from_slice(&cov.cov_pk)
                .map_err(|e| ContractError::AdaptorSigInvalid(e.to_string()))?;
            let adaptor_sig = cov
                .adaptor_sigs
                .get(fp_idx)
                .ok_or(ContractError::WrongAdaptorSigCount(
                    fp_idx + 1,
                    cov.adaptor_sigs.len(),
                ))?;
            let sig = AdaptorSignature::new(adaptor_sig)?.decrypt(dec_key)?;
            Ok((cov_pk, sig))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use cosmwasm_std::testing::{message_info, mock_dependencies};
    use cosmwasm_std::CosmosMsg;

    use babylon_btcstaking::sig_verify::verify_transaction_sig_with_output;

    use crate::contract::execute;
    use crate::contract::tests::{end_block, env_at, CHAIN_ID};
    use crate::finality::tests::{active_fp, vote_msg};
    use crate::msg::ExecuteMsg;
    use crate::queries;
    use crate::state::finality::VOTES;

    #[test]
    fn double_vote_slashes_finality_provider() {
        let mut deps = mock_dependencies();
        let (fp1, owner, list) = active_fp(deps.as_mut());
        end_block(deps.as_mut(), 151, b"block-151");
        let info = message_info(&owner, &[]);

        execute(
            deps.as_mut(),
            env_at(152),
            info.clone(),
            vote_msg(&list, owner.as_str(), 151, b"block-151"),
        )
        .unwrap();
        let res = execute(
            deps.as_mut(),
            env_at(152),
            info.clone(),
            vote_msg(&list, owner.as_str(), 151, b"fork-151"),
        )
        .unwrap();

        // The host gets the evidence
        assert_eq!(res.messages.len(), 1);
        assert_matches!(
            &res.messages[0].msg,
            CosmosMsg::Custom(BabylonMsg::EquivocationEvidence { evidence })
                if evidence.block_height == 151
        );
        let equivocation = res.events.iter().find(|e| e.ty == "equivocation").unwrap();
        let sk = equivocation
            .attributes
            .iter()
            .find(|a| a.key == "secret_key")
            .unwrap();
        let extracted = eots::SecretKey::from_hex(&sk.value).unwrap();
        assert_eq!(
            extracted.pubkey().to_bytes(),
            hex::decode(fp1.pk_hex()).unwrap()
        );

        // The fork vote is discarded
        let vote = VOTES
            .load(&deps.storage, (151, fp1.pk_hex().as_str()))
            .unwrap();
        assert_eq!(vote.app_hash, b"block-151".to_vec());

        let fp = queries::finality_provider(deps.as_ref(), fp1.pk_hex()).unwrap();
        assert_eq!(fp.slashed_babylon_height, 152);
        assert!(fp.slashed_btc_height > 0);
        let evidence = queries::evidence(deps.as_ref(), fp1.pk_hex(), 151).unwrap();
        assert!(evidence.evidence.is_some());

        // The only delegation of the provider has a broadcastable slashing tx
        let hashes = queries::delegations_by_fp(deps.as_ref(), fp1.pk_hex()).unwrap();
        assert_eq!(hashes.hashes.len(), 1);
        let slashed =
            queries::slashed_delegation(deps.as_ref(), hashes.hashes[0].clone())
                .unwrap()
                .unwrap();
        assert!(!slashed.unbonded);
        let slashing_tx = decode_tx(&slashed.slashing_tx).unwrap();
        assert!(!slashing_tx.input[0].witness.is_empty());

        let del = queries::delegation(deps.as_ref(), hashes.hashes[0].clone()).unwrap();
        let staking_tx = decode_tx(&del.delegation.staking_tx).unwrap();
        let params = get_params(&deps.storage, del.delegation.params_version).unwrap();
        let keys = DelegationKeys::for_delegation(&params, &del.delegation).unwrap();
        let paths = keys.staking_paths(del.delegation.staking_time).unwrap();
        // The staker signature in the witness signs the slashing tx
        let witness = slashing_tx.input[0].witness.to_vec();
        let staker_sig = &witness[witness.len() - 3];
        verify_transaction_sig_with_output(
            &slashing_tx,
            &staking_tx.output[0],
            &paths.slashing_path_script,
            &keys.staker,
            &new_schnorr_sig(staker_sig).unwrap(),
        )
        .unwrap();

        // No more votes from a slashed provider
        let err = execute(
            deps.as_mut(),
            env_at(153),
            info,
            vote_msg(&list, owner.as_str(), 152, b"block-152"),
        )
        .unwrap_err();
        assert_eq!(err, ContractError::FinalityProviderSlashed(fp1.pk_hex()));
    }

    #[test]
    fn submitted_evidence_slashes_finality_provider() {
        let mut deps = mock_dependencies();
        let (fp1, owner, list) = active_fp(deps.as_mut());
        let reporter = deps.api.addr_make("reporter");

        let height = 160;
        let mut evidence = Evidence {
            fp_btc_pk: hex::decode(fp1.pk_hex()).unwrap(),
            block_height: height,
            pub_rand: list.pub_rand(height).to_vec(),
            canonical_app_hash: b"block-160".to_vec(),
            fork_app_hash: b"fork-160".to_vec(),
            canonical_finality_sig: list
                .vote(CHAIN_ID, owner.as_str(), height, b"block-160")
                .to_vec(),
            fork_finality_sig: list
                .vote(CHAIN_ID, owner.as_str(), height, b"fork-160")
                .to_vec(),
        };
        let fork_sig = evidence.fork_finality_sig.clone();
        evidence.fork_finality_sig = evidence.canonical_finality_sig.clone();
        let err = execute(
            deps.as_mut(),
            env_at(155),
            message_info(&reporter, &[]),
            ExecuteMsg::SubmitEquivocationEvidence {
                evidence: evidence.clone(),
                proof: list.proof(height),
            },
        )
        .unwrap_err();
        assert_eq!(err, ContractError::EotsSigInvalid);

        evidence.fork_finality_sig = fork_sig;
        let res = execute(
            deps.as_mut(),
            env_at(155),
            message_info(&reporter, &[]),
            ExecuteMsg::SubmitEquivocationEvidence {
                evidence: evidence.clone(),
                proof: list.proof(height),
            },
        )
        .unwrap();
        assert_eq!(res.messages.len(), 1);
        let fp = queries::finality_provider(deps.as_ref(), fp1.pk_hex()).unwrap();
        assert_eq!(fp.slashed_babylon_height, 155);

        // Slashing is final
        let err = execute(
            deps.as_mut(),
            env_at(156),
            message_info(&reporter, &[]),
            ExecuteMsg::SubmitEquivocationEvidence {
                evidence,
                proof: list.proof(height),
            },
        )
        .unwrap_err();
        assert_eq!(err, ContractError::FinalityProviderSlashed(fp1.pk_hex()));
    }
}
