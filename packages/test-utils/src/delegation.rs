use bitcoin::absolute::LockTime;
use bitcoin::hashes::Hash;
use bitcoin::transaction::Version;
use bitcoin::{
    Amount, Network, OutPoint, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Txid, Witness,
    XOnlyPublicKey,
};
use cosmwasm_std::Binary;
use k256::schnorr::Signature;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};

use babylon_apis::btc_staking_api::{BtcInclusionProof, CovenantSigs, NewBtcDelegation};
use babylon_btcstaking::scripts_utils::{build_relative_time_lock_pk_script, BabylonScriptPaths};
use babylon_btcstaking::sig_verify::{
    calc_sighash, enc_sign_transaction_with_output, sign_transaction_with_output,
};
use babylon_btcstaking::signing_context::staker_pop_context;
use babylon_btcstaking::witness::unbonding_path_witness;

use crate::keys::BtcKey;

/// An outpoint of a made-up transaction, unique per seed
pub fn funding_outpoint(seed: &str) -> OutPoint {
    let txid = Txid::from_byte_array(Sha256::digest(seed.as_bytes()).into());
    OutPoint { txid, vout: 0 }
}

/// A transaction with a single `value` output to `owner`, to fund a stake expansion
pub fn funding_tx(seed: &str, owner: &BtcKey, value: u64) -> Transaction {
    tx(
        vec![funding_outpoint(seed)],
        vec![TxOut {
            value: Amount::from_sat(value),
            script_pubkey: ScriptBuf::new_p2tr_tweaked(
                bitcoin::key::TweakedPublicKey::dangerous_assume_tweaked(owner.pk),
            ),
        }],
    )
}

fn tx(inputs: Vec<OutPoint>, outputs: Vec<TxOut>) -> Transaction {
    Transaction {
        version: Version::TWO,
        lock_time: LockTime::ZERO,
        input: inputs
            .into_iter()
            .map(|previous_output| TxIn {
                previous_output,
                script_sig: ScriptBuf::new(),
                sequence: Sequence::MAX,
                witness: Witness::new(),
            })
            .collect(),
        output: outputs,
    }
}

/// Everything that determines the transactions of a delegation
#[derive(Clone)]
pub struct StakingSetup {
    pub staker: BtcKey,
    pub fp_pks: Vec<XOnlyPublicKey>,
    pub covenant_pks: Vec<XOnlyPublicKey>,
    pub covenant_quorum: u32,
    pub staking_time: u32,
    pub staking_value: u64,
    pub unbonding_time: u32,
    pub unbonding_fee: u64,
    pub slashing_pk_script: ScriptBuf,
    pub slashing_rate: Decimal,
    pub slashing_fee: u64,
    pub network: Network,
    pub funding: OutPoint,
}

impl StakingSetup {
    pub fn staking_paths(&self) -> BabylonScriptPaths {
        BabylonScriptPaths::new(
            &self.staker.pk,
            &self.fp_pks,
            &self.covenant_pks,
            self.covenant_quorum as usize,
            self.staking_time as u16,
        )
        .unwrap()
    }

    pub fn unbonding_paths(&self) -> BabylonScriptPaths {
        BabylonScriptPaths::new(
            &self.staker.pk,
            &self.fp_pks,
            &self.covenant_pks,
            self.covenant_quorum as usize,
            self.unbonding_time as u16,
        )
        .unwrap()
    }

    pub fn unbonding_value(&self) -> u64 {
        self.staking_value - self.unbonding_fee
    }

    fn slashing_tx(&self, spent: OutPoint, value: u64) -> Transaction {
        let slashed = (Decimal::from(value) * self.slashing_rate)
            .round()
            .to_u64()
            .unwrap();
        let change_script = build_relative_time_lock_pk_script(
            &self.staker.pk,
            self.unbonding_time as u16,
            self.network,
        )
        .unwrap();
        tx(
            vec![spent],
            vec![
                TxOut {
                    value: Amount::from_sat(slashed),
                    script_pubkey: self.slashing_pk_script.clone(),
                },
                TxOut {
                    value: Amount::from_sat(value - slashed - self.slashing_fee),
                    script_pubkey: change_script,
                },
            ],
        )
    }

    /// Builds the transactions of a delegation funded by `self.funding`
    pub fn build(&self) -> StakingTxs {
        self.build_spending(vec![self.funding])
    }

    /// Builds the transactions of a stake expansion of `prev`, whose staking tx spends the
    /// previous staking output and the first output of `funding_tx`
    pub fn build_expansion(&self, prev: &StakingTxs, funding_tx: &Transaction) -> StakingTxs {
        self.build_spending(vec![
            prev.staking_outpoint(),
            OutPoint {
                txid: funding_tx.txid(),
                vout: 0,
            },
        ])
    }

    fn build_spending(&self, inputs: Vec<OutPoint>) -> StakingTxs {
        let staking_paths = self.staking_paths();
        let unbonding_paths = self.unbonding_paths();

        let staking_tx = tx(
            inputs,
            vec![TxOut {
                value: Amount::from_sat(self.staking_value),
                script_pubkey: staking_paths.staking_pk_script().unwrap(),
            }],
        );
        let staking_outpoint = OutPoint {
            txid: staking_tx.txid(),
            vout: 0,
        };
        let slashing_tx = self.slashing_tx(staking_outpoint, self.staking_value);
        let unbonding_tx = tx(
            vec![staking_outpoint],
            vec![TxOut {
                value: Amount::from_sat(self.unbonding_value()),
                script_pubkey: unbonding_paths.unbonding_pk_script().unwrap(),
            }],
        );
        let unbonding_slashing_tx = self.slashing_tx(
            OutPoint {
                txid: unbonding_tx.txid(),
                vout: 0,
            },
            self.unbonding_value(),
        );

        let delegator_slashing_sig = sign_transaction_with_output(
            &slashing_tx,
            &staking_tx.output[0],
            &staking_paths.slashing_path_script,
            &self.staker.sk,
        )
        .unwrap();
        let delegator_unbonding_slashing_sig = sign_transaction_with_output(
            &unbonding_slashing_tx,
            &unbonding_tx.output[0],
            &unbonding_paths.slashing_path_script,
            &self.staker.sk,
        )
        .unwrap();

        StakingTxs {
            setup: self.clone(),
            staking_tx,
            slashing_tx,
            unbonding_tx,
            unbonding_slashing_tx,
            delegator_slashing_sig,
            delegator_unbonding_slashing_sig,
        }
    }
}

/// The transactions and delegator signatures of a delegation
#[derive(Clone)]
pub struct StakingTxs {
    pub setup: StakingSetup,
    pub staking_tx: Transaction,
    pub slashing_tx: Transaction,
    pub unbonding_tx: Transaction,
    pub unbonding_slashing_tx: Transaction,
    pub delegator_slashing_sig: Signature,
    pub delegator_unbonding_slashing_sig: Signature,
}

impl StakingTxs {
    pub fn staking_tx_hash(&self) -> Txid {
        self.staking_tx.txid()
    }

    pub fn staking_tx_hash_hex(&self) -> String {
        self.staking_tx.txid().to_string()
    }

    pub fn staking_outpoint(&self) -> OutPoint {
        OutPoint {
            txid: self.staking_tx.txid(),
            vout: 0,
        }
    }

    /// The delegation creation payload, signed by the staker for `staker_addr`
    pub fn new_delegation(
        &self,
        chain_id: &str,
        staker_addr: &str,
        inclusion_proof: Option<BtcInclusionProof>,
    ) -> NewBtcDelegation {
        let setup = &self.setup;
        NewBtcDelegation {
            btc_pk_hex: setup.staker.pk_hex(),
            pop: setup
                .staker
                .pop(&staker_pop_context(chain_id, staker_addr), staker_addr),
            fp_btc_pk_list: setup
                .fp_pks
                .iter()
                .map(|pk| hex::encode(pk.serialize()))
                .collect(),
            staking_time: setup.staking_time,
            staking_value: setup.staking_value,
            staking_tx: Binary::new(bitcoin::consensus::serialize(&self.staking_tx)),
            staking_tx_inclusion_proof: inclusion_proof,
            slashing_tx: Binary::new(bitcoin::consensus::serialize(&self.slashing_tx)),
            delegator_slashing_sig: Binary::new(self.delegator_slashing_sig.to_bytes().to_vec()),
            unbonding_time: setup.unbonding_time,
            unbonding_tx: Binary::new(bitcoin::consensus::serialize(&self.unbonding_tx)),
            unbonding_value: setup.unbonding_value(),
            unbonding_slashing_tx: Binary::new(bitcoin::consensus::serialize(
                &self.unbonding_slashing_tx,
            )),
            delegator_unbonding_slashing_sig: Binary::new(
                self.delegator_unbonding_slashing_sig.to_bytes().to_vec(),
            ),
        }
    }

    /// The signature bundle of covenant member `cov`
    pub fn covenant_sigs(&self, cov: &BtcKey) -> CovenantSigs {
        let staking_paths = self.setup.staking_paths();
        let unbonding_paths = self.setup.unbonding_paths();
        let staking_out = &self.staking_tx.output[0];
        let unbonding_out = &self.unbonding_tx.output[0];

        let slashing_tx_sigs = self
            .setup
            .fp_pks
            .iter()
            .map(|fp_pk| {
                let sig = enc_sign_transaction_with_output(
                    &self.slashing_tx,
                    staking_out,
                    &staking_paths.slashing_path_script,
                    &cov.sk,
                    fp_pk,
                )
                .unwrap();
                Binary::new(sig.to_bytes())
            })
            .collect();
        let slashing_unbonding_tx_sigs = self
            .setup
            .fp_pks
            .iter()
            .map(|fp_pk| {
                let sig = enc_sign_transaction_with_output(
                    &self.unbonding_slashing_tx,
                    unbonding_out,
                    &unbonding_paths.slashing_path_script,
                    &cov.sk,
                    fp_pk,
                )
                .unwrap();
                Binary::new(sig.to_bytes())
            })
            .collect();
        let unbonding_tx_sig = sign_transaction_with_output(
            &self.unbonding_tx,
            staking_out,
            &staking_paths.unbonding_path_script,
            &cov.sk,
        )
        .unwrap();

        CovenantSigs {
            pk_hex: cov.pk_hex(),
            staking_tx_hash_hex: self.staking_tx_hash_hex(),
            slashing_tx_sigs,
            unbonding_tx_sig: Binary::new(unbonding_tx_sig.to_bytes().to_vec()),
            slashing_unbonding_tx_sigs,
            stake_expansion_tx_sig: None,
        }
    }

    /// The signature bundle of `cov` for a stake expansion of `prev` funded by `funding_tx`
    pub fn expansion_covenant_sigs(
        &self,
        cov: &BtcKey,
        prev: &StakingTxs,
        funding_tx: &Transaction,
    ) -> CovenantSigs {
        let prevouts = vec![
            prev.staking_tx.output[0].clone(),
            funding_tx.output[0].clone(),
        ];
        let sighash = calc_sighash(
            &self.staking_tx,
            &prevouts,
            0,
            &prev.setup.staking_paths().unbonding_path_script,
        )
        .unwrap();
        let mut sigs = self.covenant_sigs(cov);
        sigs.stake_expansion_tx_sig = Some(Binary::new(
            cov.sign_prehash(&sighash).to_bytes().to_vec(),
        ));
        sigs
    }

    /// The unbonding tx with a complete unbonding path witness, signed by the staker and
    /// the given covenant members
    pub fn signed_unbonding_tx(&self, covenants: &[BtcKey]) -> Transaction {
        let staking_paths = self.setup.staking_paths();
        let staking_out = &self.staking_tx.output[0];
        let staker_sig = sign_transaction_with_output(
            &self.unbonding_tx,
            staking_out,
            &staking_paths.unbonding_path_script,
            &self.setup.staker.sk,
        )
        .unwrap();
        let covenant_sigs: Vec<(XOnlyPublicKey, Signature)> = covenants
            .iter()
            .map(|cov| {
                let sig = sign_transaction_with_output(
                    &self.unbonding_tx,
                    staking_out,
                    &staking_paths.unbonding_path_script,
                    &cov.sk,
                )
                .unwrap();
                (cov.pk, sig)
            })
            .collect();
        let witness = unbonding_path_witness(
            &staking_paths.staking_spend_info().unwrap(),
            &staking_paths.unbonding_path_script,
            &self.setup.covenant_pks,
            &covenant_sigs,
            self.setup.covenant_quorum as usize,
            &staker_sig,
        )
        .unwrap();

        let mut unbonding_tx = self.unbonding_tx.clone();
        unbonding_tx.input[0].witness = witness;
        unbonding_tx
    }
}
