use crate::adaptor_sig::AdaptorSignature;
use crate::error::Error;
use crate::Result;
use bitcoin::hashes::Hash;
use bitcoin::sighash::{Prevouts, SighashCache};
use bitcoin::Transaction;
use bitcoin::{Script, TxOut, XOnlyPublicKey};
use k256::schnorr::signature::hazmat::{PrehashSigner, PrehashVerifier};
use k256::schnorr::Signature as SchnorrSignature;
use k256::schnorr::{SigningKey, VerifyingKey};

/// calc_sighash computes the taproot script-spend sighash of the input at
/// `input_index`, given the outputs spent by every input of the tx
pub fn calc_sighash(
    transaction: &Transaction,
    prevouts: &[TxOut],
    input_index: usize,
    path_script: &Script,
) -> Result<[u8; 32]> {
    if transaction.input.len() != prevouts.len() {
        return Err(Error::PrevoutCountMismatch(
            transaction.input.len(),
            prevouts.len(),
        ));
    }

    // calculate tap leaf hash for the given path of the script
    let tap_leaf_hash = path_script.tapscript_leaf_hash();

    // calculate the sig hash of the tx with the given funding outputs
    let mut sighash_cache = SighashCache::new(transaction);
    let sighash = sighash_cache
        .taproot_script_spend_signature_hash(
            input_index,
            &Prevouts::All(prevouts),
            tap_leaf_hash,
            bitcoin::TapSighashType::Default,
        )
        .map_err(|e| Error::SighashFailed(e.to_string()))?;

    Ok(sighash.to_raw_hash().to_byte_array())
}

/// calc_single_input_sighash computes the sighash of a tx that spends exactly
/// one output
fn calc_single_input_sighash(
    transaction: &Transaction,
    funding_output: &TxOut,
    path_script: &Script,
) -> Result<[u8; 32]> {
    // Check for incorrect input count
    if transaction.input.len() != 1 {
        return Err(Error::TxInputCountMismatch(1, transaction.input.len()));
    }
    calc_sighash(
        transaction,
        std::slice::from_ref(funding_output),
        0,
        path_script,
    )
}

pub fn to_verifying_key(pub_key: &XOnlyPublicKey) -> Result<VerifyingKey> {
    VerifyingKey::from_bytes(&pub_key.serialize())
        .map_err(|e| Error::FailedToParsePublicKey(e.to_string()))
}

pub fn new_schnorr_sig(sig_bytes: &[u8]) -> Result<SchnorrSignature> {
    SchnorrSignature::try_from(sig_bytes).map_err(|e| Error::InvalidSchnorrSignature(e.to_string()))
}

/// verify_schnorr_sig verifies a BIP340 signature over a 32-byte message
pub fn verify_schnorr_sig(
    pub_key: &XOnlyPublicKey,
    msg: &[u8; 32],
    signature: &SchnorrSignature,
) -> Result<()> {
    to_verifying_key(pub_key)?
        .verify_prehash(msg, signature)
        .map_err(|e| Error::InvalidSchnorrSignature(e.to_string()))
}

/// verify_transaction_sig_with_output verifies the validity of a Schnorr signature for a given transaction
pub fn verify_transaction_sig_with_output(
    transaction: &Transaction,
    funding_output: &TxOut,
    path_script: &Script,
    pub_key: &XOnlyPublicKey,
    signature: &SchnorrSignature,
) -> Result<()> {
    // calculate the sig hash of the tx for the given spending path
    let sighash = calc_single_input_sighash(transaction, funding_output, path_script)?;
    // verify the signature w.r.t. the signature, the sig hash, and the public key
    verify_schnorr_sig(pub_key, &sighash, signature)
}

/// verify_transaction_sig_with_prevouts verifies a Schnorr signature on the
/// input at `input_index` of a tx spending several outputs
pub fn verify_transaction_sig_with_prevouts(
    transaction: &Transaction,
    prevouts: &[TxOut],
    input_index: usize,
    path_script: &Script,
    pub_key: &XOnlyPublicKey,
    signature: &SchnorrSignature,
) -> Result<()> {
    let sighash = calc_sighash(transaction, prevouts, input_index, path_script)?;
    verify_schnorr_sig(pub_key, &sighash, signature)
}

/// enc_verify_transaction_sig_with_output verifies the validity of a Schnorr adaptor signature for a given transaction
pub fn enc_verify_transaction_sig_with_output(
    transaction: &Transaction,
    funding_output: &TxOut,
    path_script: &Script,
    pub_key: &XOnlyPublicKey,
    enc_key: &XOnlyPublicKey,
    signature: &AdaptorSignature,
) -> Result<()> {
    // calculate the sig hash of the tx for the given spending path
    let sighash_msg = calc_single_input_sighash(transaction, funding_output, path_script)?;

    // verify the signature w.r.t. the signature, the sig hash, and the public key
    signature.verify(
        &to_verifying_key(pub_key)?,
        &to_verifying_key(enc_key)?,
        sighash_msg,
    )
}

/// sign_transaction_with_output signs the single input of `transaction`
/// through the given spending path
pub fn sign_transaction_with_output(
    transaction: &Transaction,
    funding_output: &TxOut,
    path_script: &Script,
    signing_key: &SigningKey,
) -> Result<SchnorrSignature> {
    let sighash = calc_single_input_sighash(transaction, funding_output, path_script)?;
    signing_key
        .sign_prehash(&sighash)
        .map_err(|e| Error::InvalidSchnorrSignature(e.to_string()))
}

/// enc_sign_transaction_with_output creates an adaptor signature on the single
/// input of `transaction`, encrypted under `enc_key`
pub fn enc_sign_transaction_with_output(
    transaction: &Transaction,
    funding_output: &TxOut,
    path_script: &Script,
    signing_key: &SigningKey,
    enc_key: &XOnlyPublicKey,
) -> Result<AdaptorSignature> {
    let sighash = calc_single_input_sighash(transaction, funding_output, path_script)?;
    AdaptorSignature::enc_sign(signing_key, &to_verifying_key(enc_key)?, sighash, sighash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripts_utils::BabylonScriptPaths;
    use bitcoin::absolute::LockTime;
    use bitcoin::hashes::sha256d;
    use bitcoin::transaction::Version;
    use bitcoin::{Amount, OutPoint, ScriptBuf, Sequence, TxIn, Txid, Witness};
    use sha2::{Digest, Sha256};

    fn key(seed: u8) -> (SigningKey, XOnlyPublicKey) {
        let sk = SigningKey::from_bytes(&Sha256::digest([seed])).unwrap();
        let pk = XOnlyPublicKey::from_slice(&sk.verifying_key().to_bytes()).unwrap();
        (sk, pk)
    }

    fn spending_tx(value: u64) -> Transaction {
        Transaction {
            version: Version::TWO,
            lock_time: LockTime::ZERO,
            input: vec![TxIn {
                previous_output: OutPoint {
                    txid: Txid::from_raw_hash(sha256d::Hash::hash(b"staking")),
                    vout: 0,
                },
                script_sig: ScriptBuf::new(),
                sequence: Sequence::MAX,
                witness: Witness::new(),
            }],
            output: vec![TxOut {
                value: Amount::from_sat(value),
                script_pubkey: ScriptBuf::new(),
            }],
        }
    }

    #[test]
    fn test_schnorr_and_adaptor_sigs_over_paths() {
        let (staker_sk, staker_pk) = key(1);
        let (fp_sk, fp_pk) = key(2);
        let covenants: Vec<(SigningKey, XOnlyPublicKey)> = (3..6).map(key).collect();
        let cov_pks: Vec<XOnlyPublicKey> = covenants.iter().map(|(_, pk)| *pk).collect();

        let paths = BabylonScriptPaths::new(&staker_pk, &[fp_pk], &cov_pks, 2, 100).unwrap();
        let funding_output = TxOut {
            value: Amount::from_sat(100_000),
            script_pubkey: paths.staking_pk_script().unwrap(),
        };
        let tx = spending_tx(99_000);

        // plain Schnorr signature on the unbonding path
        let sig = sign_transaction_with_output(
            &tx,
            &funding_output,
            &paths.unbonding_path_script,
            &staker_sk,
        )
        .unwrap();
        verify_transaction_sig_with_output(
            &tx,
            &funding_output,
            &paths.unbonding_path_script,
            &staker_pk,
            &sig,
        )
        .unwrap();
        // a signature over another path does not verify
        assert!(verify_transaction_sig_with_output(
            &tx,
            &funding_output,
            &paths.slashing_path_script,
            &staker_pk,
            &sig,
        )
        .is_err());

        // covenant adaptor signature on the slashing path, encrypted by the FP key
        let (cov_sk, cov_pk) = &covenants[0];
        let asig = enc_sign_transaction_with_output(
            &tx,
            &funding_output,
            &paths.slashing_path_script,
            cov_sk,
            &fp_pk,
        )
        .unwrap();
        enc_verify_transaction_sig_with_output(
            &tx,
            &funding_output,
            &paths.slashing_path_script,
            cov_pk,
            &fp_pk,
            &asig,
        )
        .unwrap();

        // decrypting with the FP secret gives a valid covenant signature
        let decrypted = asig.decrypt(fp_sk.as_nonzero_scalar()).unwrap();
        verify_transaction_sig_with_output(
            &tx,
            &funding_output,
            &paths.slashing_path_script,
            cov_pk,
            &decrypted,
        )
        .unwrap();
    }

    #[test]
    fn test_sighash_requires_matching_prevouts() {
        let (_, pk) = key(9);
        let tx = spending_tx(1_000);
        let script = crate::scripts_utils::build_single_key_sig_script(&pk, false).unwrap();
        assert_eq!(
            calc_sighash(&tx, &[], 0, &script),
            Err(Error::PrevoutCountMismatch(1, 0))
        );
    }
}
