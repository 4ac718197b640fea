//! Domain-separated signing contexts.
//!
//! Every signature a BTC key produces for the chain is bound to a context
//! string `btcstaking/0/<tag>/<chain_id>/<address>`. The signed message is the
//! hex encoding of `sha256(context)` followed by the payload, and the BIP340
//! signature is over `sha256(message)`.

use bitcoin::XOnlyPublicKey;
use k256::schnorr::Signature as SchnorrSignature;
use sha2::{Digest, Sha256};

use crate::sig_verify::{new_schnorr_sig, verify_schnorr_sig};
use crate::Result;

const PROTOCOL_NAME: &str = "btcstaking";
const VERSION: &str = "0";

const FP_POP: &str = "fp_pop";
const STAKER_POP: &str = "staker_pop";
const FP_RAND_COMMIT: &str = "fp_rand_commit";
const FP_FIN_VOTE: &str = "fp_fin_vote";

fn context(tag: &str, chain_id: &str, address: &str) -> String {
    format!("{PROTOCOL_NAME}/{VERSION}/{tag}/{chain_id}/{address}")
}

/// Context of the proof of possession of a finality provider key
pub fn fp_pop_context(chain_id: &str, address: &str) -> String {
    context(FP_POP, chain_id, address)
}

/// Context of the proof of possession of a staker key
pub fn staker_pop_context(chain_id: &str, address: &str) -> String {
    context(STAKER_POP, chain_id, address)
}

/// Context of a public randomness commitment
pub fn fp_rand_commit_context(chain_id: &str, address: &str) -> String {
    context(FP_RAND_COMMIT, chain_id, address)
}

/// Context of a finality vote
pub fn fp_fin_vote_context(chain_id: &str, address: &str) -> String {
    context(FP_FIN_VOTE, chain_id, address)
}

/// Hex-encoded sha256 of the context, prepended to every signed payload
pub fn context_prefix(context: &str) -> Vec<u8> {
    hex::encode(Sha256::digest(context.as_bytes())).into_bytes()
}

pub fn signed_message(context: &str, payload: &[u8]) -> Vec<u8> {
    let mut msg = context_prefix(context);
    msg.extend_from_slice(payload);
    msg
}

/// 32-byte digest a BIP340 signature covers for `payload` under `context`
pub fn message_hash(context: &str, payload: &[u8]) -> [u8; 32] {
    Sha256::digest(signed_message(context, payload)).into()
}

/// Verifies a BIP340 signature over `payload` in the given context
pub fn verify_context_signature(
    pub_key: &XOnlyPublicKey,
    context: &str,
    payload: &[u8],
    sig: &[u8],
) -> Result<()> {
    let sig: SchnorrSignature = new_schnorr_sig(sig)?;
    verify_schnorr_sig(pub_key, &message_hash(context, payload), &sig)
}

/// Payload of a public randomness commitment signature
pub fn rand_commit_payload(start_height: u64, num_pub_rand: u64, commitment: &[u8]) -> Vec<u8> {
    let mut payload = Vec::with_capacity(16 + commitment.len());
    payload.extend_from_slice(&start_height.to_be_bytes());
    payload.extend_from_slice(&num_pub_rand.to_be_bytes());
    payload.extend_from_slice(commitment);
    payload
}

/// Message an EOTS finality vote signs: the hash of the context prefix, the
/// big-endian height and the block's app hash
pub fn vote_message(context: &str, height: u64, app_hash: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(context_prefix(context));
    hasher.update(height.to_be_bytes());
    hasher.update(app_hash);
    hasher.finalize().into()
}
