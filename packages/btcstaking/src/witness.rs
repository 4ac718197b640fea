//! Witness assembly and checks for the script paths of staking outputs.
//!
//! A multisig section `<K1> OP_CHECKSIG <K2> OP_CHECKSIGADD ...` with keys in
//! lexicographic order consumes the signature of `K1` first, so its witness
//! items are listed in reverse key order. Keys without a signature get an
//! empty item.

use bitcoin::taproot::TaprootSpendInfo;
use bitcoin::{Script, Transaction, TxOut, Witness, XOnlyPublicKey};
use k256::schnorr::signature::hazmat::PrehashSigner;
use k256::schnorr::{Signature as SchnorrSignature, SigningKey};

use crate::error::Error;
use crate::scripts_utils::{control_block, sort_keys};
use crate::sig_verify::{calc_sighash, new_schnorr_sig, verify_schnorr_sig};
use crate::Result;

/// Witness items of a multisig section over `keys`, using at most `limit`
/// of the given signatures (taken in key order)
pub fn multisig_witness_items(
    keys: &[XOnlyPublicKey],
    sigs: &[(XOnlyPublicKey, SchnorrSignature)],
    limit: usize,
) -> Vec<Vec<u8>> {
    let mut sorted = keys.to_vec();
    sort_keys(&mut sorted);

    let mut used = 0;
    let mut items: Vec<Vec<u8>> = sorted
        .iter()
        .map(|pk| {
            match sigs.iter().find(|(sig_pk, _)| sig_pk == pk) {
                Some((_, sig)) if used < limit => {
                    used += 1;
                    sig.to_bytes().to_vec()
                }
                _ => vec![],
            }
        })
        .collect();
    items.reverse();
    items
}

/// Witness items for the covenant section of a path with the given quorum.
/// The script requires exactly `quorum` valid signatures
pub fn covenant_witness_items(
    covenant_pks: &[XOnlyPublicKey],
    covenant_sigs: &[(XOnlyPublicKey, SchnorrSignature)],
    quorum: usize,
) -> Result<Vec<Vec<u8>>> {
    let available = covenant_sigs
        .iter()
        .filter(|(pk, _)| covenant_pks.contains(pk))
        .count();
    if available < quorum {
        return Err(Error::CovenantQuorumNotMet(available, quorum));
    }
    Ok(multisig_witness_items(covenant_pks, covenant_sigs, quorum))
}

/// Signs the single input of `slashing_tx` with a finality provider's key and
/// attaches the complete slashing path witness:
/// covenant items, finality provider items, the staker signature, the script
/// and its control block
#[allow(clippy::too_many_arguments)]
pub fn assemble_slashing_tx(
    slashing_tx: &Transaction,
    funding_output: &TxOut,
    spend_info: &TaprootSpendInfo,
    slashing_path_script: &Script,
    covenant_pks: &[XOnlyPublicKey],
    covenant_sigs: &[(XOnlyPublicKey, SchnorrSignature)],
    covenant_quorum: usize,
    fp_pks: &[XOnlyPublicKey],
    fp_signing_key: &SigningKey,
    staker_sig: &SchnorrSignature,
) -> Result<Transaction> {
    let fp_pk = XOnlyPublicKey::from_slice(&fp_signing_key.verifying_key().to_bytes())
        .map_err(|e| Error::FailedToParsePublicKey(e.to_string()))?;
    if !fp_pks.contains(&fp_pk) {
        return Err(Error::MissingFinalityProviderKey(fp_pk.to_string()));
    }

    let sighash = calc_sighash(
        slashing_tx,
        std::slice::from_ref(funding_output),
        0,
        slashing_path_script,
    )?;
    let fp_sig: SchnorrSignature = fp_signing_key
        .sign_prehash(&sighash)
        .map_err(|e| Error::InvalidSchnorrSignature(e.to_string()))?;

    let mut witness = Witness::new();
    for item in covenant_witness_items(covenant_pks, covenant_sigs, covenant_quorum)? {
        witness.push(item);
    }
    for item in multisig_witness_items(fp_pks, &[(fp_pk, fp_sig)], 1) {
        witness.push(item);
    }
    witness.push(staker_sig.to_bytes());
    witness.push(slashing_path_script.as_bytes());
    witness.push(control_block(spend_info, slashing_path_script)?);

    let mut tx = slashing_tx.clone();
    if tx.input.len() != 1 {
        return Err(Error::TxInputCountMismatch(1, tx.input.len()));
    }
    tx.input[0].witness = witness;
    Ok(tx)
}

/// Builds the unbonding path witness of a staking output spend
pub fn unbonding_path_witness(
    spend_info: &TaprootSpendInfo,
    unbonding_path_script: &Script,
    covenant_pks: &[XOnlyPublicKey],
    covenant_sigs: &[(XOnlyPublicKey, SchnorrSignature)],
    covenant_quorum: usize,
    staker_sig: &SchnorrSignature,
) -> Result<Witness> {
    let mut witness = Witness::new();
    for item in covenant_witness_items(covenant_pks, covenant_sigs, covenant_quorum)? {
        witness.push(item);
    }
    witness.push(staker_sig.to_bytes());
    witness.push(unbonding_path_script.as_bytes());
    witness.push(control_block(spend_info, unbonding_path_script)?);
    Ok(witness)
}

/// Checks that input `input_index` of `spend_tx` spends a staking output
/// through its unbonding path, with a valid staker signature and at least
/// `covenant_quorum` valid covenant signatures. `prevouts` are the outputs
/// spent by every input of the tx
#[allow(clippy::too_many_arguments)]
pub fn verify_unbonding_path_witness(
    spend_tx: &Transaction,
    input_index: usize,
    prevouts: &[TxOut],
    spend_info: &TaprootSpendInfo,
    unbonding_path_script: &Script,
    staker_pk: &XOnlyPublicKey,
    covenant_pks: &[XOnlyPublicKey],
    covenant_quorum: usize,
) -> Result<()> {
    let input = spend_tx
        .input
        .get(input_index)
        .ok_or(Error::TxInputCountMismatch(input_index + 1, spend_tx.input.len()))?;
    let items: Vec<Vec<u8>> = input.witness.to_vec();
    let expected_len = covenant_pks.len() + 3;
    if items.len() != expected_len {
        return Err(Error::MalformedWitness(format!(
            "expected {expected_len} items, got {}",
            items.len()
        )));
    }

    let script = &items[expected_len - 2];
    if script.as_slice() != unbonding_path_script.as_bytes() {
        return Err(Error::WitnessScriptMismatch {});
    }
    if items[expected_len - 1] != control_block(spend_info, unbonding_path_script)? {
        return Err(Error::WitnessScriptMismatch {});
    }

    let sighash = calc_sighash(spend_tx, prevouts, input_index, unbonding_path_script)?;

    let staker_sig = new_schnorr_sig(&items[expected_len - 3])?;
    verify_schnorr_sig(staker_pk, &sighash, &staker_sig)?;

    let mut sorted = covenant_pks.to_vec();
    sort_keys(&mut sorted);
    let mut valid = 0;
    for (pk, item) in sorted.iter().rev().zip(items.iter()) {
        if item.is_empty() {
            continue;
        }
        let sig = new_schnorr_sig(item)?;
        verify_schnorr_sig(pk, &sighash, &sig)?;
        valid += 1;
    }
    if valid < covenant_quorum {
        return Err(Error::CovenantQuorumNotMet(valid, covenant_quorum));
    }
    Ok(())
}
