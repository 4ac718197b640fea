/// BTC staking messages / API
/// The definitions here follow the structure of the BTC staking protocol types:
/// finality providers, BTC delegations and covenant signatures
use cosmwasm_schema::cw_serde;
use cosmwasm_std::{Addr, Binary, Decimal, Timestamp};

use crate::Bytes;

/// Hash size in bytes
pub const HASH_SIZE: usize = 32;

/// BIP-340 signature type of a proof of possession
pub const BIP340_SIG_TYPE: i32 = 0;

/// NewFinalityProvider is the payload of a finality provider registration.
/// The sender of the registration message becomes the finality provider's address
#[cw_serde]
pub struct NewFinalityProvider {
    /// description defines the description terms for the finality provider
    pub description: Option<FinalityProviderDescription>,
    /// commission defines the commission rate of the finality provider.
    pub commission: Decimal,
    /// btc_pk_hex is the Bitcoin secp256k1 PK of this finality provider
    /// the PK follows encoding in BIP-340 spec in hex format
    pub btc_pk_hex: String,
    /// pop is the proof of possession of the btc_pk_hex, bound to the sender's address
    pub pop: Option<ProofOfPossessionBtc>,
    /// consumer_id is the ID of the consumer chain the finality provider is operating on.
    pub consumer_id: String,
}

/// FinalityProvider is a registered finality provider
#[cw_serde]
pub struct FinalityProvider {
    /// addr is the address that registered the finality provider and receives its rewards
    pub addr: Addr,
    /// description defines the description terms for the finality provider
    pub description: Option<FinalityProviderDescription>,
    /// commission defines the commission rate of the finality provider.
    pub commission: Decimal,
    /// btc_pk_hex is the Bitcoin secp256k1 PK of this finality provider
    /// the PK follows encoding in BIP-340 spec in hex format
    pub btc_pk_hex: String,
    /// pop is the proof of possession of the btc_pk_hex
    pub pop: Option<ProofOfPossessionBtc>,
    /// slashed_babylon_height indicates the height when
    /// the finality provider is slashed.
    /// if it's 0, then the finality provider is not slashed
    pub slashed_babylon_height: u64,
    /// slashed_btc_height indicates the BTC height when
    /// the finality provider is slashed.
    /// if it's 0, then the finality provider is not slashed
    pub slashed_btc_height: u32,
    /// jailed defines whether the finality provider is jailed
    pub jailed: bool,
    /// jailed_until is the time until which a jailed finality provider cannot unjail itself
    pub jailed_until: Option<Timestamp>,
    /// consumer_id is the ID of the consumer chain the finality provider is operating on.
    pub consumer_id: String,
}

impl FinalityProvider {
    pub fn new(addr: Addr, fp: &NewFinalityProvider) -> Self {
        FinalityProvider {
            addr,
            description: fp.description.clone(),
            commission: fp.commission,
            btc_pk_hex: fp.btc_pk_hex.clone(),
            pop: fp.pop.clone(),
            slashed_babylon_height: 0,
            slashed_btc_height: 0,
            jailed: false,
            jailed_until: None,
            consumer_id: fp.consumer_id.clone(),
        }
    }

    pub fn is_slashed(&self) -> bool {
        self.slashed_babylon_height > 0
    }
}

#[cw_serde]
pub struct FinalityProviderDescription {
    /// moniker is the name of the finality provider
    pub moniker: String,
    /// identity is the identity of the finality provider
    pub identity: String,
    /// website is the website of the finality provider
    pub website: String,
    /// security_contact is the security contact of the finality provider
    pub security_contact: String,
    /// details is the details of the finality provider
    pub details: String,
}

impl FinalityProviderDescription {
    /// Description field lengths
    pub const MAX_MONIKER_LENGTH: usize = 70;
    pub const MAX_IDENTITY_LENGTH: usize = 3000;
    pub const MAX_WEBSITE_LENGTH: usize = 140;
    pub const MAX_SECURITY_CONTACT_LENGTH: usize = 140;
    pub const MAX_DETAILS_LENGTH: usize = 280;
}

/// ProofOfPossessionBtc is the proof of possession that a Babylon address and a Bitcoin
/// secp256k1 secret key are held by the same person
#[cw_serde]
pub struct ProofOfPossessionBtc {
    /// btc_sig_type indicates the type of btc_sig in the pop. Only BIP-340 is supported
    pub btc_sig_type: i32,
    /// btc_sig is the BIP-340 signature of the context-bound address, by the BTC key
    pub btc_sig: Binary,
}

/// BTCDelegationStatus is the status of a delegation.
/// The state transition path is PENDING -> VERIFIED -> ACTIVE -> UNBONDED / EXPIRED.
/// A delegation reaches UNBONDED through an early unbonding tx included on Bitcoin, and
/// EXPIRED when the staking time-lock (minus the unbonding time) elapses.
#[cw_serde]
#[derive(Copy)]
pub enum BTCDelegationStatus {
    /// PENDING defines a delegation waiting for covenant signatures
    PENDING = 0,
    /// VERIFIED defines a delegation with a covenant quorum, whose staking tx is not yet
    /// k-deep on Bitcoin
    VERIFIED = 1,
    /// ACTIVE defines a delegation that has voting power
    ACTIVE = 2,
    /// UNBONDED defines a delegation whose staking output was spent early on Bitcoin
    UNBONDED = 3,
    /// EXPIRED defines a delegation whose staking time-lock elapsed
    EXPIRED = 4,
    /// ANY is any of the status above
    ANY = 5,
}

/// BtcInclusionProof proves a transaction is included in a Bitcoin block known to the
/// light client
#[cw_serde]
pub struct BtcInclusionProof {
    /// block_hash_hex is the hash of the block, in the usual (reversed) hex encoding
    pub block_hash_hex: String,
    /// tx_index is the index of the transaction in the block
    pub tx_index: u32,
    /// merkle_path is the concatenation of the 32-byte sibling hashes, leaf to root
    pub merkle_path: Binary,
}

/// NewBtcDelegation is the payload of a BTC delegation creation.
/// The sender of the message is the staker address that receives rewards
#[cw_serde]
pub struct NewBtcDelegation {
    /// btc_pk_hex is the Bitcoin secp256k1 PK of the BTC delegator.
    /// The PK follows encoding in BIP-340 spec in hex format
    pub btc_pk_hex: String,
    /// pop is the proof of possession of btc_pk_hex, bound to the sender's address
    pub pop: ProofOfPossessionBtc,
    /// fp_btc_pk_list is the list of BIP-340 PKs of the finality providers that
    /// this BTC delegation delegates to
    pub fp_btc_pk_list: Vec<String>,
    /// staking_time is the time-lock of the staking output, in BTC blocks
    pub staking_time: u32,
    /// staking_value is the amount of satoshis locked in the staking output
    pub staking_value: u64,
    /// staking_tx is the staking tx
    pub staking_tx: Binary,
    /// staking_tx_inclusion_proof optionally proves the staking tx is already on Bitcoin
    pub staking_tx_inclusion_proof: Option<BtcInclusionProof>,
    /// slashing_tx is the slashing tx spending the staking output
    pub slashing_tx: Binary,
    /// delegator_slashing_sig is the signature on the slashing tx
    /// by the delegator (i.e. SK corresponding to btc_pk).
    pub delegator_slashing_sig: Binary,
    /// unbonding_time is used in unbonding output time-lock path and in slashing transactions
    /// change outputs
    pub unbonding_time: u32,
    /// unbonding_tx is the transaction which will transfer the funds from staking
    /// output to unbonding output
    pub unbonding_tx: Binary,
    /// unbonding_value is the amount of satoshis locked in the unbonding output
    pub unbonding_value: u64,
    /// unbonding_slashing_tx is the slashing tx spending the unbonding output
    pub unbonding_slashing_tx: Binary,
    /// delegator_unbonding_slashing_sig is the signature on the unbonding slashing tx
    /// by the delegator
    pub delegator_unbonding_slashing_sig: Binary,
}

/// CovenantSigs is the bundle of signatures a covenant member submits for a delegation
#[cw_serde]
pub struct CovenantSigs {
    /// pk_hex is the BIP-340 PK of the covenant member
    pub pk_hex: String,
    /// staking_tx_hash_hex is the hash of the staking tx of the delegation
    pub staking_tx_hash_hex: String,
    /// slashing_tx_sigs are the adaptor signatures on the slashing tx, one per finality
    /// provider of the delegation, in the delegation's order
    pub slashing_tx_sigs: Vec<Binary>,
    /// unbonding_tx_sig is the Schnorr signature on the unbonding tx
    pub unbonding_tx_sig: Binary,
    /// slashing_unbonding_tx_sigs are the adaptor signatures on the unbonding slashing tx
    pub slashing_unbonding_tx_sigs: Vec<Binary>,
    /// stake_expansion_tx_sig is the Schnorr signature on the expansion tx, spending the
    /// previous staking output through its unbonding path. Only for stake expansions
    pub stake_expansion_tx_sig: Option<Binary>,
}

/// CovenantAdaptorSignatures is a list adaptor signatures signed by the
/// covenant with different finality provider's public keys as encryption keys
#[cw_serde]
pub struct CovenantAdaptorSignatures {
    /// cov_pk is the public key of the covenant emulator, used as the public key of the adaptor signature
    pub cov_pk: Bytes,
    /// adaptor_sigs is a list of adaptor signatures, each encrypted by a restaked BTC finality provider's public key
    pub adaptor_sigs: Vec<Bytes>,
}

/// SignatureInfo is a BIP-340 signature together with its signer's BIP-340 PK
#[cw_serde]
pub struct SignatureInfo {
    pub pk: Bytes,
    pub sig: Bytes,
}
