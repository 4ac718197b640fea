use bitcoin::XOnlyPublicKey;
use cosmwasm_std::Binary;
use k256::schnorr::signature::hazmat::PrehashSigner;
use k256::schnorr::{Signature, SigningKey};
use sha2::{Digest, Sha256};

use babylon_apis::btc_staking_api::{ProofOfPossessionBtc, BIP340_SIG_TYPE};
use babylon_btcstaking::signing_context::message_hash;

/// A BIP340 key pair derived from a string seed
#[derive(Clone)]
pub struct BtcKey {
    pub sk: SigningKey,
    pub pk: XOnlyPublicKey,
}

impl BtcKey {
    pub fn from_seed(seed: &str) -> Self {
        let sk = SigningKey::from_bytes(&Sha256::digest(seed.as_bytes())).unwrap();
        let pk = XOnlyPublicKey::from_slice(&sk.verifying_key().to_bytes()).unwrap();
        BtcKey { sk, pk }
    }

    pub fn pk_hex(&self) -> String {
        hex::encode(self.pk.serialize())
    }

    /// The same key as an EOTS secret key
    pub fn eots_sk(&self) -> eots::SecretKey {
        let bytes: [u8; 32] = self.sk.to_bytes().into();
        eots::SecretKey::from_bytes(bytes).unwrap()
    }

    pub fn sign_prehash(&self, msg: &[u8; 32]) -> Signature {
        self.sk.sign_prehash(msg).unwrap()
    }

    /// BIP340 signature over `payload` bound to `context`
    pub fn sign_context(&self, context: &str, payload: &[u8]) -> Binary {
        Binary::new(
            self.sign_prehash(&message_hash(context, payload))
                .to_bytes()
                .to_vec(),
        )
    }

    /// Proof of possession of this key by `address`, in the given context
    pub fn pop(&self, context: &str, address: &str) -> ProofOfPossessionBtc {
        ProofOfPossessionBtc {
            btc_sig_type: BIP340_SIG_TYPE,
            btc_sig: self.sign_context(context, address.as_bytes()),
        }
    }
}

/// `n` covenant member keys
pub fn covenant_keys(n: usize) -> Vec<BtcKey> {
    (0..n)
        .map(|i| BtcKey::from_seed(&format!("covenant-{i}")))
        .collect()
}
