use bitcoin::consensus::deserialize;
use bitcoin::{Transaction, TxOut, XOnlyPublicKey};
use cosmwasm_std::Decimal;

use babylon_apis::btc_staking_api::{CovenantSigs, NewBtcDelegation, ProofOfPossessionBtc};
use babylon_btcstaking::scripts_utils::{relative_lock_time, BabylonScriptPaths};
use babylon_btcstaking::sig_verify::{
    enc_verify_transaction_sig_with_output, new_schnorr_sig, verify_transaction_sig_with_output,
    verify_transaction_sig_with_prevouts,
};
use babylon_btcstaking::signing_context::verify_context_signature;
use babylon_btcstaking::tx_verify::{check_staking_output, check_transactions, check_unbonding_tx};
use babylon_btcstaking::AdaptorSignature;

use crate::error::ContractError;
use crate::state::delegations::BtcDelegation;
use crate::state::params::Params;

/// Decodes a hex-encoded BIP-340 public key
pub fn decode_btc_pk(pk_hex: &str) -> Result<XOnlyPublicKey, ContractError> {
    let bytes = hex::decode(pk_hex)?;
    XOnlyPublicKey::from_slice(&bytes)
        .map_err(|e| ContractError::InvalidStakingTx(format!("invalid BTC public key {pk_hex}: {e}")))
}

pub fn decode_tx(tx: &[u8]) -> Result<Transaction, ContractError> {
    deserialize(tx).map_err(|_| ContractError::InvalidBtcTx(hex::encode(tx)))
}

/// verify_pop verifies a BIP-340 proof of possession of `btc_pk_hex` by `address`
pub fn verify_pop(
    btc_pk_hex: &str,
    context: &str,
    address: &str,
    pop: &ProofOfPossessionBtc,
) -> Result<(), ContractError> {
    let btc_pk = decode_btc_pk(btc_pk_hex)?;
    verify_context_signature(&btc_pk, context, address.as_bytes(), &pop.btc_sig)
        .map_err(|e| ContractError::InvalidPop(e.to_string()))
}

pub fn verify_commission(commission: Decimal, params: &Params) -> Result<(), ContractError> {
    if commission < params.min_commission_rate {
        return Err(ContractError::CommissionTooLow(
            commission.to_string(),
            params.min_commission_rate.to_string(),
        ));
    }
    Ok(())
}

/// The keys every script path of a delegation commits to
pub struct DelegationKeys {
    pub staker: XOnlyPublicKey,
    pub fps: Vec<XOnlyPublicKey>,
    pub covenants: Vec<XOnlyPublicKey>,
    pub covenant_quorum: usize,
}

impl DelegationKeys {
    pub fn new(
        params: &Params,
        staker_pk_hex: &str,
        fp_pk_hex_list: &[String],
    ) -> Result<Self, ContractError> {
        Ok(DelegationKeys {
            staker: decode_btc_pk(staker_pk_hex)?,
            fps: fp_pk_hex_list
                .iter()
                .map(|pk| decode_btc_pk(pk))
                .collect::<Result<_, _>>()?,
            covenants: params.covenant_keys()?,
            covenant_quorum: params.covenant_quorum as usize,
        })
    }

    pub fn for_delegation(params: &Params, del: &BtcDelegation) -> Result<Self, ContractError> {
        Self::new(params, &del.btc_pk_hex, &del.fp_btc_pk_list)
    }

    /// Script paths of the staking output
    pub fn staking_paths(&self, staking_time: u32) -> Result<BabylonScriptPaths, ContractError> {
        self.paths(staking_time)
    }

    /// Script paths of the unbonding output
    pub fn unbonding_paths(
        &self,
        unbonding_time: u32,
    ) -> Result<BabylonScriptPaths, ContractError> {
        self.paths(unbonding_time)
    }

    fn paths(&self, lock_time: u32) -> Result<BabylonScriptPaths, ContractError> {
        Ok(BabylonScriptPaths::new(
            &self.staker,
            &self.fps,
            &self.covenants,
            self.covenant_quorum,
            relative_lock_time(lock_time)?,
        )?)
    }
}

/// The decoded staking tx of a delegation that passed every stateless check
#[derive(Debug)]
pub struct VerifiedStakingTx {
    pub staking_tx: Transaction,
    pub staking_output_idx: u32,
}

/// verify_new_delegation checks a delegation request against the given parameters:
/// value and time ranges, the staking output commitment, the structure of the slashing and
/// unbonding txs, and the delegator signatures on both slashing txs
pub fn verify_new_delegation(
    params: &Params,
    min_unbonding_time: u32,
    del: &NewBtcDelegation,
) -> Result<VerifiedStakingTx, ContractError> {
    if del.staking_value < params.min_staking_value_sat
        || del.staking_value > params.max_staking_value_sat
    {
        return Err(ContractError::StakeOutOfRange(
            del.staking_value,
            params.min_staking_value_sat,
            params.max_staking_value_sat,
        ));
    }
    if del.staking_time < params.min_staking_time_blocks
        || del.staking_time > params.max_staking_time_blocks
    {
        return Err(ContractError::StakingTimeOutOfRange(
            del.staking_time,
            params.min_staking_time_blocks,
            params.max_staking_time_blocks,
        ));
    }
    if params.unbonding_time_blocks < min_unbonding_time {
        return Err(ContractError::InvalidUnbondingTime(
            params.unbonding_time_blocks,
            min_unbonding_time,
        ));
    }
    if del.unbonding_time != params.unbonding_time_blocks {
        return Err(ContractError::InvalidUnbondingTime(
            del.unbonding_time,
            params.unbonding_time_blocks,
        ));
    }
    let expected_unbonding_value = del.staking_value.saturating_sub(params.unbonding_fee_sat);
    if del.unbonding_value != expected_unbonding_value {
        return Err(ContractError::InvalidUnbondingValue(
            del.unbonding_value,
            expected_unbonding_value,
        ));
    }

    let keys = DelegationKeys::new(params, &del.btc_pk_hex, &del.fp_btc_pk_list)?;
    let staking_paths = keys.staking_paths(del.staking_time)?;
    let unbonding_paths = keys.unbonding_paths(del.unbonding_time)?;

    // Staking output
    let staking_tx = decode_tx(&del.staking_tx)?;
    let staking_pk_script = staking_paths.staking_pk_script()?;
    let staking_output_idx = staking_tx
        .output
        .iter()
        .position(|out| out.script_pubkey == staking_pk_script)
        .ok_or_else(|| {
            ContractError::InvalidStakingTx("staking output not found in staking tx".to_string())
        })? as u32;
    check_staking_output(
        &staking_tx,
        staking_output_idx,
        &staking_pk_script,
        del.staking_value,
    )
    .map_err(|e| ContractError::InvalidStakingTx(e.to_string()))?;
    let staking_output = &staking_tx.output[staking_output_idx as usize];

    let slashing_rate = params.slashing_rate()?;
    let slashing_script = params.slashing_script()?;
    let change_lock_time = relative_lock_time(del.unbonding_time)?;

    // Slashing tx, spending the staking output
    let slashing_tx = decode_tx(&del.slashing_tx)?;
    check_transactions(
        &slashing_tx,
        &staking_tx,
        staking_output_idx,
        params.min_slashing_tx_fee_sat,
        slashing_rate,
        &slashing_script,
        &keys.staker,
        change_lock_time,
        params.network(),
    )
    .map_err(|e| ContractError::InvalidBtcTx(e.to_string()))?;
    verify_delegator_sig(
        &slashing_tx,
        staking_output,
        &staking_paths.slashing_path_script,
        &keys.staker,
        &del.delegator_slashing_sig,
    )?;

    // Unbonding tx, and its own slashing tx
    let unbonding_tx = decode_tx(&del.unbonding_tx)?;
    check_unbonding_tx(
        &unbonding_tx,
        &staking_tx,
        staking_output_idx,
        &unbonding_paths.unbonding_pk_script()?,
        del.unbonding_value,
    )
    .map_err(|e| ContractError::InvalidBtcTx(e.to_string()))?;
    let unbonding_slashing_tx = decode_tx(&del.unbonding_slashing_tx)?;
    check_transactions(
        &unbonding_slashing_tx,
        &unbonding_tx,
        0,
        params.min_slashing_tx_fee_sat,
        slashing_rate,
        &slashing_script,
        &keys.staker,
        change_lock_time,
        params.network(),
    )
    .map_err(|e| ContractError::InvalidBtcTx(e.to_string()))?;
    verify_delegator_sig(
        &unbonding_slashing_tx,
        &unbonding_tx.output[0],
        &unbonding_paths.slashing_path_script,
        &keys.staker,
        &del.delegator_unbonding_slashing_sig,
    )?;

    Ok(VerifiedStakingTx {
        staking_tx,
        staking_output_idx,
    })
}

fn verify_delegator_sig(
    tx: &Transaction,
    funding_output: &TxOut,
    path_script: &bitcoin::Script,
    staker: &XOnlyPublicKey,
    sig: &[u8],
) -> Result<(), ContractError> {
    let sig = new_schnorr_sig(sig).map_err(|e| ContractError::InvalidDelegatorSig(e.to_string()))?;
    verify_transaction_sig_with_output(tx, funding_output, path_script, staker, &sig)
        .map_err(|e| ContractError::InvalidDelegatorSig(e.to_string()))
}

/// The delegation a stake expansion spends, with the parameters it was created under
pub struct ExpandedDelegation<'a> {
    pub delegation: &'a BtcDelegation,
    pub params: &'a Params,
}

/// verify_covenant_sigs verifies the signature bundle of covenant member `cov_pk` on a
/// delegation: one adaptor signature per finality provider on each slashing tx, a Schnorr
/// signature on the unbonding tx and, for stake expansions, a Schnorr signature spending the
/// previous staking output through its unbonding path
pub fn verify_covenant_sigs(
    params: &Params,
    del: &BtcDelegation,
    cov_pk: &XOnlyPublicKey,
    sigs: &CovenantSigs,
    expanded: Option<ExpandedDelegation>,
) -> Result<(), ContractError> {
    let num_fps = del.fp_btc_pk_list.len();
    if sigs.slashing_tx_sigs.len() != num_fps {
        return Err(ContractError::WrongAdaptorSigCount(
            num_fps,
            sigs.slashing_tx_sigs.len(),
        ));
    }
    if sigs.slashing_unbonding_tx_sigs.len() != num_fps {
        return Err(ContractError::WrongAdaptorSigCount(
            num_fps,
            sigs.slashing_unbonding_tx_sigs.len(),
        ));
    }

    let keys = DelegationKeys::for_delegation(params, del)?;
    let staking_paths = keys.staking_paths(del.staking_time)?;
    let unbonding_paths = keys.unbonding_paths(del.unbonding_time)?;

    let staking_tx = decode_tx(&del.staking_tx)?;
    let staking_output = staking_tx
        .output
        .get(del.staking_output_idx as usize)
        .ok_or_else(|| ContractError::InvalidStakingTx("missing staking output".to_string()))?;
    let slashing_tx = decode_tx(&del.slashing_tx)?;
    let unbonding_tx = decode_tx(&del.undelegation_info.unbonding_tx)?;
    let unbonding_slashing_tx = decode_tx(&del.undelegation_info.slashing_tx)?;

    verify_adaptor_sigs(
        &slashing_tx,
        staking_output,
        &staking_paths.slashing_path_script,
        cov_pk,
        &keys.fps,
        &sigs.slashing_tx_sigs,
    )?;

    let unbonding_sig = new_schnorr_sig(&sigs.unbonding_tx_sig)
        .map_err(|e| ContractError::SchnorrSigInvalid(e.to_string()))?;
    verify_transaction_sig_with_output(
        &unbonding_tx,
        staking_output,
        &staking_paths.unbonding_path_script,
        cov_pk,
        &unbonding_sig,
    )
    .map_err(|e| ContractError::SchnorrSigInvalid(e.to_string()))?;

    verify_adaptor_sigs(
        &unbonding_slashing_tx,
        &unbonding_tx.output[0],
        &unbonding_paths.slashing_path_script,
        cov_pk,
        &keys.fps,
        &sigs.slashing_unbonding_tx_sigs,
    )?;

    match (&del.stk_exp, expanded) {
        (None, _) => Ok(()),
        (Some(stk_exp), Some(prev)) => {
            let sig = sigs.stake_expansion_tx_sig.as_ref().ok_or_else(|| {
                ContractError::InvalidStakeExpansion(
                    "missing stake expansion signature".to_string(),
                )
            })?;
            let sig = new_schnorr_sig(sig)
                .map_err(|e| ContractError::SchnorrSigInvalid(e.to_string()))?;

            let prev_keys = DelegationKeys::for_delegation(prev.params, prev.delegation)?;
            let prev_paths = prev_keys.staking_paths(prev.delegation.staking_time)?;
            let prev_staking_tx = decode_tx(&prev.delegation.staking_tx)?;
            let prev_output = prev_staking_tx
                .output
                .get(prev.delegation.staking_output_idx as usize)
                .ok_or_else(|| {
                    ContractError::InvalidStakingTx("missing staking output".to_string())
                })?
                .clone();
            let funding_output: TxOut = deserialize(&stk_exp.other_funding_tx_out)
                .map_err(|_| ContractError::InvalidBtcTx(hex::encode(&stk_exp.other_funding_tx_out)))?;

            verify_transaction_sig_with_prevouts(
                &staking_tx,
                &[prev_output, funding_output],
                0,
                &prev_paths.unbonding_path_script,
                cov_pk,
                &sig,
            )
            .map_err(|e| ContractError::SchnorrSigInvalid(e.to_string()))
        }
        (Some(_), None) => Err(ContractError::InvalidStakeExpansion(
            "expanded delegation not found".to_string(),
        )),
    }
}

fn verify_adaptor_sigs(
    tx: &Transaction,
    funding_output: &TxOut,
    path_script: &bitcoin::Script,
    cov_pk: &XOnlyPublicKey,
    fp_pks: &[XOnlyPublicKey],
    sigs: &[cosmwasm_std::Binary],
) -> Result<(), ContractError> {
    for (fp_pk, sig) in fp_pks.iter().zip(sigs) {
        let adaptor_sig = AdaptorSignature::new(sig.as_slice())
            .map_err(|e| ContractError::AdaptorSigInvalid(e.to_string()))?;
        enc_verify_transaction_sig_with_output(
            tx,
            funding_output,
            path_script,
            cov_pk,
            fp_pk,
            &adaptor_sig,
        )
        .map_err(|e| ContractError::AdaptorSigInvalid(e.to_string()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use cosmwasm_std::Binary;

    use crate::test_utils::{covenants, staking_params, staking_setup};
    use babylon_btcstaking::signing_context::staker_pop_context;
    use test_utils::BtcKey;

    #[test]
    fn valid_delegation_passes() {
        let params = staking_params();
        let fp = BtcKey::from_seed("fp1");
        let txs = staking_setup("staker", &[&fp], 100_000, 1000).build();
        let del = txs.new_delegation("chain", "staker", None);

        let verified = verify_new_delegation(&params, 26, &del).unwrap();
        assert_eq!(verified.staking_output_idx, 0);
        assert_eq!(verified.staking_tx.txid(), txs.staking_tx_hash());

        verify_pop(
            &del.btc_pk_hex,
            &staker_pop_context("chain", "staker"),
            "staker",
            &del.pop,
        )
        .unwrap();
        assert_matches!(
            verify_pop(
                &del.btc_pk_hex,
                &staker_pop_context("chain", "someone-else"),
                "someone-else",
                &del.pop,
            ),
            Err(ContractError::InvalidPop(_))
        );
    }

    #[test]
    fn delegation_ranges_are_enforced() {
        let params = staking_params();
        let fp = BtcKey::from_seed("fp1");

        let del = staking_setup("staker", &[&fp], 5_000, 1000)
            .build()
            .new_delegation("chain", "staker", None);
        assert_eq!(
            verify_new_delegation(&params, 26, &del).unwrap_err(),
            ContractError::StakeOutOfRange(5_000, 10_000, 10_000_000_000)
        );

        let del = staking_setup("staker", &[&fp], 100_000, 10)
            .build()
            .new_delegation("chain", "staker", None);
        assert_eq!(
            verify_new_delegation(&params, 26, &del).unwrap_err(),
            ContractError::StakingTimeOutOfRange(10, 100, 65535)
        );

        let mut del = staking_setup("staker", &[&fp], 100_000, 1000)
            .build()
            .new_delegation("chain", "staker", None);
        del.unbonding_value -= 1;
        assert_eq!(
            verify_new_delegation(&params, 26, &del).unwrap_err(),
            ContractError::InvalidUnbondingValue(98_999, 99_000)
        );

        // Unbonding time below k + w
        assert_matches!(
            verify_new_delegation(&params, 200, &del),
            Err(ContractError::InvalidUnbondingTime(101, 200))
        );
    }

    #[test]
    fn forged_delegator_sig_is_rejected() {
        let params = staking_params();
        let fp = BtcKey::from_seed("fp1");
        let txs = staking_setup("staker", &[&fp], 100_000, 1000).build();
        let mut del = txs.new_delegation("chain", "staker", None);
        del.delegator_slashing_sig = del.delegator_unbonding_slashing_sig.clone();

        assert_matches!(
            verify_new_delegation(&params, 26, &del),
            Err(ContractError::InvalidDelegatorSig(_))
        );
    }

    #[test]
    fn covenant_sigs_verify() {
        let params = staking_params();
        let fp = BtcKey::from_seed("fp1");
        let txs = staking_setup("staker", &[&fp], 100_000, 1000).build();
        let del = txs.new_delegation("chain", "staker", None);
        let verified = verify_new_delegation(&params, 26, &del).unwrap();
        let stored = crate::staking::new_btc_delegation(
            cosmwasm_std::Addr::unchecked("staker"),
            &del,
            fp.pk_hex(),
            verified.staking_output_idx,
            0,
            None,
        );

        let covenants = covenants();
        let sigs = txs.covenant_sigs(&covenants[0]);
        verify_covenant_sigs(&params, &stored, &covenants[0].pk, &sigs, None).unwrap();

        // Signatures of another member don't verify under this key
        assert_matches!(
            verify_covenant_sigs(&params, &stored, &covenants[1].pk, &sigs, None),
            Err(ContractError::AdaptorSigInvalid(_))
        );

        let mut short = sigs.clone();
        short.slashing_tx_sigs.pop();
        assert_eq!(
            verify_covenant_sigs(&params, &stored, &covenants[0].pk, &short, None).unwrap_err(),
            ContractError::WrongAdaptorSigCount(1, 0)
        );

        let mut bad_unbonding = sigs;
        bad_unbonding.unbonding_tx_sig = Binary::new(vec![1u8; 64]);
        assert_matches!(
            verify_covenant_sigs(&params, &stored, &covenants[0].pk, &bad_unbonding, None),
            Err(ContractError::SchnorrSigInvalid(_))
        );
    }
}
