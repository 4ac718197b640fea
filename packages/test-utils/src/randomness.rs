use cosmwasm_std::Binary;
use sha2::{Digest, Sha256};

use babylon_btcstaking::signing_context::{
    fp_fin_vote_context, fp_rand_commit_context, rand_commit_payload, vote_message,
};
use babylon_merkle::{proofs_from_byte_slices, Proof};
use eots::SecRand;

use crate::keys::BtcKey;

/// A list of public randomness of a finality provider, committed through a merkle root
pub struct PubRandList {
    pub fp: BtcKey,
    pub start_height: u64,
    pub commitment: Vec<u8>,
    sec_rands: Vec<SecRand>,
    pub_rands: Vec<[u8; 32]>,
    proofs: Vec<Proof>,
}

impl PubRandList {
    pub fn generate(fp: &BtcKey, start_height: u64, num_pub_rand: u64) -> Self {
        let sec_rands: Vec<SecRand> = (start_height..start_height + num_pub_rand)
            .map(|h| {
                let seed = Sha256::digest(format!("{}/{h}", fp.pk_hex()).as_bytes());
                eots::new_sec_rand(&seed).unwrap()
            })
            .collect();
        let pub_rands: Vec<[u8; 32]> = sec_rands
            .iter()
            .map(|r| eots::pub_rand_to_bytes(&eots::pub_rand_from_sec_rand(r)))
            .collect();
        let leaves: Vec<Vec<u8>> = pub_rands.iter().map(|r| r.to_vec()).collect();
        let (commitment, proofs) = proofs_from_byte_slices(&leaves);
        PubRandList {
            fp: fp.clone(),
            start_height,
            commitment,
            sec_rands,
            pub_rands,
            proofs,
        }
    }

    pub fn num_pub_rand(&self) -> u64 {
        self.pub_rands.len() as u64
    }

    /// Commitment signature of the finality provider registered under `fp_addr`
    pub fn commit_sig(&self, chain_id: &str, fp_addr: &str) -> Binary {
        self.fp.sign_context(
            &fp_rand_commit_context(chain_id, fp_addr),
            &rand_commit_payload(self.start_height, self.num_pub_rand(), &self.commitment),
        )
    }

    fn index(&self, height: u64) -> usize {
        (height - self.start_height) as usize
    }

    pub fn pub_rand(&self, height: u64) -> Binary {
        Binary::new(self.pub_rands[self.index(height)].to_vec())
    }

    pub fn proof(&self, height: u64) -> Proof {
        self.proofs[self.index(height)].clone()
    }

    /// EOTS signature of the finality provider on `app_hash` at `height`
    pub fn vote(&self, chain_id: &str, fp_addr: &str, height: u64, app_hash: &[u8]) -> Binary {
        let msg = vote_message(&fp_fin_vote_context(chain_id, fp_addr), height, app_hash);
        let sig = self
            .fp
            .eots_sk()
            .sign(&self.sec_rands[self.index(height)], &msg);
        Binary::new(eots::sig_to_bytes(&sig).to_vec())
    }
}
